//! Response shape and required-field validation.
//!
//! Every payload is checked before it is cached or merged into a record,
//! so a "successful" HTTP exchange that carried an empty or malformed
//! body is surfaced as a retryable [`FetchError::Validation`] instead of
//! poisoning the cache.

use serde_json::Value;
use stockpile_core::{Endpoint, FetchError};

/// Check one payload against the expectations for its endpoint kind.
///
/// Pure function over the parsed document. Accepts the payload when it
/// is a non-empty array of objects whose first element carries at least
/// one of the endpoint's required fields. Historical price payloads
/// arrive wrapped in an object; the `historical` array inside is what
/// gets checked.
pub fn validate_response(endpoint: Endpoint, document: &Value) -> Result<(), FetchError> {
    let rows = match document {
        Value::Array(rows) => rows,
        Value::Object(map) => match map.get("historical") {
            Some(Value::Array(rows)) => rows,
            _ => return fail(endpoint, "expected an array or a historical wrapper object"),
        },
        Value::Null => return fail(endpoint, "response is null"),
        _ => return fail(endpoint, "expected a JSON array"),
    };

    if rows.is_empty() {
        return fail(endpoint, "response is empty");
    }

    let first = match &rows[0] {
        Value::Object(first) => first,
        _ => return fail(endpoint, "first element is not an object"),
    };

    let required = endpoint.required_any_of();
    if !required.iter().any(|field| first.contains_key(*field)) {
        return fail(
            endpoint,
            &format!("missing all expected fields {:?}", required),
        );
    }

    Ok(())
}

fn fail(endpoint: Endpoint, reason: &str) -> Result<(), FetchError> {
    Err(FetchError::Validation {
        endpoint: endpoint.as_str().to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_complete_profile_payload() {
        let document = json!([{
            "symbol": "AAPL",
            "price": 185.2,
            "mktCap": 2_900_000_000_000_u64,
            "companyName": "Apple Inc."
        }]);
        assert!(validate_response(Endpoint::Profile, &document).is_ok());
    }

    #[test]
    fn accepts_payload_with_any_single_required_field() {
        // Any-of semantics: one recognizable field is enough.
        let document = json!([{ "peRatioTTM": 24.1 }]);
        assert!(validate_response(Endpoint::KeyMetricsTtm, &document).is_ok());
    }

    #[test]
    fn rejects_payload_missing_all_required_fields() {
        let document = json!([{ "unrelated": 1, "alsoUnrelated": "x" }]);
        let err = validate_response(Endpoint::RatiosTtm, &document).unwrap_err();
        assert!(matches!(err, FetchError::Validation { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn rejects_empty_array() {
        let err = validate_response(Endpoint::Profile, &json!([])).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn rejects_null_document() {
        let err = validate_response(Endpoint::Profile, &Value::Null).unwrap_err();
        assert!(err.to_string().contains("null"));
    }

    #[test]
    fn rejects_scalar_document() {
        assert!(validate_response(Endpoint::Profile, &json!("ok")).is_err());
        assert!(validate_response(Endpoint::Profile, &json!(42)).is_err());
    }

    #[test]
    fn rejects_array_of_non_objects() {
        let err = validate_response(Endpoint::Profile, &json!(["AAPL", "MSFT"])).unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn unwraps_historical_price_payload() {
        let document = json!({
            "symbol": "AAPL",
            "historical": [
                { "date": "2024-01-02", "close": 185.64 },
                { "date": "2024-01-03", "close": 184.25 }
            ]
        });
        assert!(validate_response(Endpoint::HistoricalPrices, &document).is_ok());
    }

    #[test]
    fn rejects_historical_wrapper_without_array() {
        let document = json!({ "symbol": "AAPL" });
        assert!(validate_response(Endpoint::HistoricalPrices, &document).is_err());

        let document = json!({ "symbol": "AAPL", "historical": {} });
        assert!(validate_response(Endpoint::HistoricalPrices, &document).is_err());
    }

    #[test]
    fn rejects_empty_historical_array() {
        let document = json!({ "symbol": "AAPL", "historical": [] });
        assert!(validate_response(Endpoint::HistoricalPrices, &document).is_err());
    }

    #[test]
    fn statement_payloads_accept_any_required_field() {
        let balance = json!([{ "totalAssets": 352_583_000_000_u64 }]);
        assert!(validate_response(Endpoint::BalanceSheet, &balance).is_ok());

        let income = json!([{ "netIncome": 96_995_000_000_u64 }]);
        assert!(validate_response(Endpoint::IncomeStatement, &income).is_ok());

        let cash_flow = json!([{ "freeCashFlow": 99_584_000_000_u64 }]);
        assert!(validate_response(Endpoint::CashFlow, &cash_flow).is_ok());
    }

    #[test]
    fn validation_reason_names_the_endpoint() {
        let err = validate_response(Endpoint::MarketSentiment, &json!([])).unwrap_err();
        assert!(err.to_string().contains("market-sentiment"));
    }
}
