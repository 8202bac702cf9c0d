//! Provider endpoint kinds and their validation requirements

use serde::{Deserialize, Serialize};
use std::fmt;

/// Endpoint kinds exposed by the market-data provider.
///
/// Each kind corresponds to one path prefix of the provider's REST API and
/// carries the field set its payloads are checked against. The field check
/// is any-of: payloads differ across provider plans and endpoint
/// revisions, and partial records are filtered downstream, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    #[serde(rename = "profile")]
    Profile,
    #[serde(rename = "balance-sheet-statement")]
    BalanceSheet,
    #[serde(rename = "income-statement")]
    IncomeStatement,
    #[serde(rename = "cash-flow-statement")]
    CashFlow,
    #[serde(rename = "key-metrics-ttm")]
    KeyMetricsTtm,
    #[serde(rename = "ratios-ttm")]
    RatiosTtm,
    #[serde(rename = "market-sentiment")]
    MarketSentiment,
    #[serde(rename = "financial-growth-ttm")]
    FinancialGrowthTtm,
    #[serde(rename = "enterprise-values")]
    EnterpriseValues,
    #[serde(rename = "historical-price-full")]
    HistoricalPrices,
}

impl Endpoint {
    /// Every endpoint kind, in provider documentation order.
    pub const ALL: [Endpoint; 10] = [
        Endpoint::Profile,
        Endpoint::BalanceSheet,
        Endpoint::IncomeStatement,
        Endpoint::CashFlow,
        Endpoint::KeyMetricsTtm,
        Endpoint::RatiosTtm,
        Endpoint::MarketSentiment,
        Endpoint::FinancialGrowthTtm,
        Endpoint::EnterpriseValues,
        Endpoint::HistoricalPrices,
    ];

    /// Stable path prefix, used in request URLs, cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Profile => "profile",
            Endpoint::BalanceSheet => "balance-sheet-statement",
            Endpoint::IncomeStatement => "income-statement",
            Endpoint::CashFlow => "cash-flow-statement",
            Endpoint::KeyMetricsTtm => "key-metrics-ttm",
            Endpoint::RatiosTtm => "ratios-ttm",
            Endpoint::MarketSentiment => "market-sentiment",
            Endpoint::FinancialGrowthTtm => "financial-growth-ttm",
            Endpoint::EnterpriseValues => "enterprise-values",
            Endpoint::HistoricalPrices => "historical-price-full",
        }
    }

    /// Relative request path for one symbol.
    pub fn path(&self, symbol: &str) -> String {
        format!("{}/{}", self.as_str(), symbol)
    }

    /// Fields a payload must contain at least one of to be considered a
    /// legitimate response for this kind.
    pub fn required_any_of(&self) -> &'static [&'static str] {
        match self {
            Endpoint::Profile => &["symbol", "price", "mktCap"],
            Endpoint::BalanceSheet => &[
                "totalAssets",
                "totalLiabilities",
                "totalStockholdersEquity",
            ],
            Endpoint::IncomeStatement => &["revenue", "netIncome", "eps"],
            Endpoint::CashFlow => &["operatingCashFlow", "freeCashFlow", "capitalExpenditure"],
            Endpoint::KeyMetricsTtm => &["peRatioTTM", "pbRatioTTM", "roeTTM"],
            Endpoint::RatiosTtm => &[
                "priceEarningsRatioTTM",
                "priceToBookRatioTTM",
                "returnOnEquityTTM",
            ],
            Endpoint::MarketSentiment => &["rating", "targetPrice", "recommendation"],
            Endpoint::FinancialGrowthTtm => &["revenueGrowth", "netIncomeGrowth", "epsGrowth"],
            Endpoint::EnterpriseValues => &["enterpriseValue", "enterpriseValueMultiple"],
            Endpoint::HistoricalPrices => &["date", "close"],
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================
