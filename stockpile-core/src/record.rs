//! Canonical record schema and fetch request types

use crate::{Endpoint, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One fully assembled record for one identifier.
///
/// This is the single canonical schema every provider payload is mapped
/// into. All analytic fields are optional: an endpoint the provider could
/// not serve degrades to `None` values, never to a missing column. Only
/// `symbol` and `fetched_at` are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    // Identity
    pub symbol: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub exchange: Option<String>,

    // Market
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub beta: Option<f64>,

    // Valuation (trailing twelve months)
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub ev_to_ebitda: Option<f64>,

    // Profitability (trailing twelve months)
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub net_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub gross_margin: Option<f64>,

    // Financial health
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub interest_coverage: Option<f64>,
    pub total_debt: Option<f64>,
    pub total_cash: Option<f64>,
    pub total_equity: Option<f64>,

    // Cash flow
    pub free_cash_flow: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub fcf_yield: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,

    // Income statement
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub eps: Option<f64>,

    // Growth (trailing twelve months)
    pub revenue_growth: Option<f64>,
    pub net_income_growth: Option<f64>,
    pub eps_growth: Option<f64>,
    pub fcf_growth: Option<f64>,

    // Analyst sentiment
    pub analyst_rating: Option<String>,
    pub price_target: Option<f64>,
    pub price_target_high: Option<f64>,
    pub price_target_low: Option<f64>,
    pub recommendation: Option<String>,

    // Provenance
    pub fetched_at: Timestamp,
}

impl StockRecord {
    /// Create an empty record for a symbol, stamped with the current time.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            company_name: None,
            sector: None,
            industry: None,
            exchange: None,
            price: None,
            market_cap: None,
            beta: None,
            pe_ratio: None,
            forward_pe: None,
            price_to_book: None,
            price_to_sales: None,
            ev_to_ebitda: None,
            roe: None,
            roa: None,
            net_margin: None,
            operating_margin: None,
            gross_margin: None,
            debt_to_equity: None,
            current_ratio: None,
            quick_ratio: None,
            interest_coverage: None,
            total_debt: None,
            total_cash: None,
            total_equity: None,
            free_cash_flow: None,
            operating_cash_flow: None,
            fcf_yield: None,
            dividend_yield: None,
            payout_ratio: None,
            revenue: None,
            net_income: None,
            eps: None,
            revenue_growth: None,
            net_income_growth: None,
            eps_growth: None,
            fcf_growth: None,
            analyst_rating: None,
            price_target: None,
            price_target_high: None,
            price_target_low: None,
            recommendation: None,
            fetched_at: Utc::now(),
        }
    }
}

/// One retrieval request: an identifier, an endpoint kind, and extra query
/// parameters. Parameters are kept sorted so that equivalent requests
/// produce identical cache keys regardless of construction order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub symbol: String,
    pub endpoint: Endpoint,
    pub params: Vec<(String, String)>,
}

impl FetchRequest {
    /// Build a request with a normalized (trimmed, uppercased) symbol.
    pub fn new(symbol: impl AsRef<str>, endpoint: Endpoint) -> Self {
        Self {
            symbol: symbol.as_ref().trim().to_uppercase(),
            endpoint,
            params: Vec::new(),
        }
    }

    /// Attach query parameters; they are stored sorted by key, then value.
    pub fn with_params(mut self, mut params: Vec<(String, String)>) -> Self {
        params.sort();
        self.params = params;
        self
    }

    /// Relative request path for this request's symbol.
    pub fn path(&self) -> String {
        self.endpoint.path(&self.symbol)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_empty_except_identity() {
        let record = StockRecord::new("AAPL");
        assert_eq!(record.symbol, "AAPL");
        assert!(record.pe_ratio.is_none());
        assert!(record.recommendation.is_none());
    }

    #[test]
    fn test_record_serde_round_trip() {
        let mut record = StockRecord::new("AAPL");
        record.pe_ratio = Some(9.4);
        record.analyst_rating = Some("A-".to_string());

        let json = serde_json::to_string(&record).unwrap();
        let back: StockRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_request_normalizes_symbol() {
        let req = FetchRequest::new("  aapl ", Endpoint::Profile);
        assert_eq!(req.symbol, "AAPL");
        assert_eq!(req.path(), "profile/AAPL");
    }

    #[test]
    fn test_request_params_are_sorted() {
        let req = FetchRequest::new("AAPL", Endpoint::HistoricalPrices).with_params(vec![
            ("serietype".to_string(), "line".to_string()),
            ("limit".to_string(), "1".to_string()),
        ]);
        assert_eq!(req.params[0].0, "limit");
        assert_eq!(req.params[1].0, "serietype");
    }
}
