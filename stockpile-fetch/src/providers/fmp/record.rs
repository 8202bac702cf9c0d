//! Mapping from raw FMP payloads into the canonical record schema.
//!
//! Every payload is indexed at its first element only; the TTM endpoints
//! return a single-element array and the statement endpoints are fetched
//! with `limit=1`, most recent period first. Missing or non-numeric
//! fields degrade to `None`.

use serde_json::{Map, Value};
use stockpile_core::StockRecord;

type Row<'a> = Option<&'a Map<String, Value>>;

/// Assemble one canonical record from the per-endpoint payloads.
///
/// The metrics and ratios payloads are mandatory and pre-validated; the
/// rest are best-effort and may be absent entirely.
#[allow(clippy::too_many_arguments)]
pub(super) fn assemble_record(
    symbol: &str,
    key_metrics: &Value,
    ratios: &Value,
    profile: Option<&Value>,
    balance_sheet: Option<&Value>,
    income: Option<&Value>,
    cash_flow: Option<&Value>,
    growth: Option<&Value>,
    sentiment: Option<&Value>,
) -> StockRecord {
    let km = first_row(key_metrics);
    let rt = first_row(ratios);
    let pf = profile.and_then(first_row);
    let bs = balance_sheet.and_then(first_row);
    let inc = income.and_then(first_row);
    let cf = cash_flow.and_then(first_row);
    let gr = growth.and_then(first_row);
    let st = sentiment.and_then(first_row);

    let mut record = StockRecord::new(symbol);

    record.company_name = text(pf, "companyName");
    record.sector = text(pf, "sector");
    record.industry = text(pf, "industry");
    record.exchange = text(pf, "exchangeShortName");

    record.price = num(pf, "price");
    record.market_cap = num(km, "marketCapTTM").or_else(|| num(pf, "mktCap"));
    record.beta = num(km, "beta").or_else(|| num(pf, "beta"));

    record.pe_ratio = num(km, "peRatioTTM");
    record.forward_pe = num(km, "forwardPE");
    record.price_to_book = num(km, "pbRatioTTM");
    record.price_to_sales = num(km, "priceToSalesRatioTTM");
    record.ev_to_ebitda = num(km, "enterpriseValueOverEBITDATTM");
    record.fcf_yield = num(km, "freeCashFlowYieldTTM");

    record.roe = num(rt, "returnOnEquityTTM");
    record.roa = num(rt, "returnOnAssetsTTM");
    record.net_margin = num(rt, "netProfitMarginTTM");
    record.operating_margin = num(rt, "operatingProfitMarginTTM");
    record.gross_margin = num(rt, "grossProfitMarginTTM");
    record.debt_to_equity = num(rt, "debtEquityRatioTTM");
    record.current_ratio = num(rt, "currentRatioTTM");
    record.quick_ratio = num(rt, "quickRatioTTM");
    record.interest_coverage = num(rt, "interestCoverageTTM");
    // The provider misspells this field; accept the corrected form too.
    record.dividend_yield = num(rt, "dividendYielTTM").or_else(|| num(rt, "dividendYieldTTM"));
    record.payout_ratio = num(rt, "payoutRatioTTM");

    record.total_debt = num(bs, "totalDebt");
    record.total_cash = num(bs, "cashAndCashEquivalents");
    record.total_equity = num(bs, "totalStockholdersEquity");

    record.revenue = num(inc, "revenue");
    record.net_income = num(inc, "netIncome");
    record.eps = num(inc, "eps");

    record.free_cash_flow = num(cf, "freeCashFlow");
    record.operating_cash_flow = num(cf, "operatingCashFlow");

    record.revenue_growth = num(gr, "revenueGrowth");
    record.net_income_growth = num(gr, "netIncomeGrowth");
    record.eps_growth = num(gr, "epsgrowth").or_else(|| num(gr, "epsGrowth"));
    record.fcf_growth = num(gr, "freeCashFlowGrowth");

    record.analyst_rating = text(st, "rating");
    record.price_target = num(st, "targetPrice");
    record.price_target_high = num(st, "targetHighPrice");
    record.price_target_low = num(st, "targetLowPrice");
    record.recommendation = text(st, "recommendation");

    record
}

fn first_row(document: &Value) -> Row<'_> {
    document.as_array()?.first()?.as_object()
}

fn num(row: Row<'_>, field: &str) -> Option<f64> {
    row?.get(field)?.as_f64()
}

fn text(row: Row<'_>, field: &str) -> Option<String> {
    Some(row?.get(field)?.as_str()?.to_string())
}
