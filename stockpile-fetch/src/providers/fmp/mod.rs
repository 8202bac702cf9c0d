//! Financial Modeling Prep provider.
//!
//! A record is assembled from eight endpoints per identifier. The TTM
//! key-metrics and ratios payloads are mandatory: without them the
//! record would carry none of the fields downstream screening needs, so
//! their failures propagate. The remaining endpoints are best-effort
//! and only degrade the record when unavailable.

mod client;
mod record;

pub use client::FmpClient;

use crate::RecordSource;
use async_trait::async_trait;
use serde_json::Value;
use stockpile_core::{Endpoint, FetchError, FetchRequest, StockRecord};

/// Assembles canonical records from the provider's REST endpoints.
#[derive(Debug)]
pub struct FmpRecordSource {
    client: FmpClient,
}

impl FmpRecordSource {
    pub fn new(client: FmpClient) -> Self {
        Self { client }
    }

    /// Fetch an endpoint whose absence only degrades the record.
    ///
    /// Authentication failures are the exception: a rejected key will
    /// reject every request, so it propagates instead of degrading.
    async fn fetch_optional(
        &self,
        symbol: &str,
        endpoint: Endpoint,
    ) -> Result<Option<Value>, FetchError> {
        let request = statement_request(symbol, endpoint);
        match self.client.fetch(&request).await {
            Ok(document) => Ok(Some(document)),
            Err(err @ FetchError::Auth { .. }) => Err(err),
            Err(err) => {
                tracing::warn!(
                    symbol,
                    endpoint = %endpoint,
                    error = %err,
                    "Endpoint unavailable, its fields degrade to null"
                );
                Ok(None)
            }
        }
    }
}

/// Statement endpoints only need the most recent period.
fn statement_request(symbol: &str, endpoint: Endpoint) -> FetchRequest {
    match endpoint {
        Endpoint::BalanceSheet | Endpoint::IncomeStatement | Endpoint::CashFlow => {
            FetchRequest::new(symbol, endpoint)
                .with_params(vec![("limit".to_string(), "1".to_string())])
        }
        _ => FetchRequest::new(symbol, endpoint),
    }
}

#[async_trait]
impl RecordSource for FmpRecordSource {
    async fn fetch_record(&self, symbol: &str) -> Result<StockRecord, FetchError> {
        let symbol = symbol.trim().to_uppercase();

        let key_metrics = self
            .client
            .fetch(&FetchRequest::new(&symbol, Endpoint::KeyMetricsTtm))
            .await?;
        let ratios = self
            .client
            .fetch(&FetchRequest::new(&symbol, Endpoint::RatiosTtm))
            .await?;

        let profile = self.fetch_optional(&symbol, Endpoint::Profile).await?;
        let balance_sheet = self.fetch_optional(&symbol, Endpoint::BalanceSheet).await?;
        let income = self
            .fetch_optional(&symbol, Endpoint::IncomeStatement)
            .await?;
        let cash_flow = self.fetch_optional(&symbol, Endpoint::CashFlow).await?;
        let sentiment = self
            .fetch_optional(&symbol, Endpoint::MarketSentiment)
            .await?;
        let growth = self
            .fetch_optional(&symbol, Endpoint::FinancialGrowthTtm)
            .await?;

        Ok(record::assemble_record(
            &symbol,
            &key_metrics,
            &ratios,
            profile.as_ref(),
            balance_sheet.as_ref(),
            income.as_ref(),
            cash_flow.as_ref(),
            growth.as_ref(),
            sentiment.as_ref(),
        ))
    }
}

/// Startup probe: fetch one well-known profile so a dead key fails the
/// run before any batch work starts. Only an authentication rejection
/// fails the probe; transient errors are logged and waved through.
pub async fn probe_auth(client: &FmpClient) -> Result<(), FetchError> {
    match client
        .fetch(&FetchRequest::new("AAPL", Endpoint::Profile))
        .await
    {
        Ok(_) => Ok(()),
        Err(err @ FetchError::Auth { .. }) => Err(err),
        Err(err) => {
            tracing::warn!(error = %err, "Auth probe inconclusive, continuing");
            Ok(())
        }
    }
}
