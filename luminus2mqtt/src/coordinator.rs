//! Single poll cycle over the API, so every sensor reads from the same
//! consistent fetch.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::debug;
use thiserror::Error;

use crate::api::{ApiClient, ApiError};
use crate::models::Snapshot;

/// Fixed distance between poll cycles. A failed cycle simply waits for the
/// next tick; there is no jitter and no backoff.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Statement texts are requested in Dutch, like the provider's own app.
const STATEMENT_LANGUAGE: &str = "nl";

#[derive(Debug, Error)]
pub enum UpdateError {
    /// The API rejected the credentials. Retrying with the same ones is
    /// pointless; the account needs re-authentication.
    #[error("authentication rejected by the API")]
    AuthFailed(#[source] ApiError),
    /// Transient request failure; the next scheduled cycle retries.
    #[error("refresh cycle failed")]
    UpdateFailed(#[source] ApiError),
    /// The payload violated the one-line-per-Ean contract.
    #[error("budget lines contain duplicate Ean {0}")]
    InconsistentData(String),
}

impl UpdateError {
    /// True when the only way forward is re-entered credentials.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, UpdateError::AuthFailed(_))
    }
}

/// Fetches budget lines and the account statement on demand and keeps the
/// last snapshot that completed.
pub struct Coordinator {
    client: ApiClient,
    last: Option<Arc<Snapshot>>,
}

impl Coordinator {
    pub fn new(client: ApiClient) -> Self {
        Self { client, last: None }
    }

    /// Last successfully fetched snapshot, if any cycle completed yet.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.last.clone()
    }

    /// Runs one poll cycle: fresh token, then budget lines, then the
    /// account statement, strictly in that order. The token only lives for
    /// the duration of this call. On success the new snapshot replaces the
    /// previous one in a single swap; on failure the previous one stays.
    pub async fn refresh(&mut self) -> Result<Arc<Snapshot>, UpdateError> {
        let token = self.client.request_token().await.map_err(map_api_error)?;
        debug!("received access token, expires in {}s", token.expires_in);

        let budget = self
            .client
            .get_budget(&token.access_token)
            .await
            .map_err(map_api_error)?;
        debug!("received {} budget line(s)", budget.lines.len());

        // the Ean is the natural key of a line; a payload repeating it is
        // malformed and must not become the published snapshot
        {
            let mut seen = HashSet::new();
            for line in &budget.lines {
                if !seen.insert(line.ean.as_str()) {
                    return Err(UpdateError::InconsistentData(line.ean.clone()));
                }
            }
        }

        let statement = self
            .client
            .get_account_statement(&token.access_token, STATEMENT_LANGUAGE)
            .await
            .map_err(map_api_error)?;

        let snapshot = Arc::new(Snapshot {
            lines: budget.lines,
            statement,
            fetched_at: Utc::now(),
        });
        self.last = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// A rejected token or a 401 on a data endpoint both mean the entry needs
/// re-authentication; everything else is retried on the next tick.
fn map_api_error(error: ApiError) -> UpdateError {
    match error {
        ApiError::Authentication { .. } => UpdateError::AuthFailed(error),
        ApiError::Communication(_) | ApiError::Client(_) => UpdateError::UpdateFailed(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Server, ServerGuard};
    use serde_json::json;

    fn token_body() -> String {
        json!({
            "access_token": "tok",
            "token_type": "bearer",
            "expires_in": 1199,
            "refresh_token": "ref"
        })
        .to_string()
    }

    fn budget_body() -> String {
        json!({
            "Lines": [{
                "Ean": "541448812345678901",
                "NextInvoiceDate": "2023-08-14",
                "Frequency": "Monthly",
                "CurrentAmount": 116.0,
                "IdealAmount": 192.0,
                "MinimumAmount": 117.0,
                "MaximumAmount": 1876.0,
                "CurrentSettlementAmount": 1755.0,
                "SubTotal": 1915.19,
                "OpenSlices": 10
            }]
        })
        .to_string()
    }

    fn statement_body() -> String {
        json!({
            "AmountOpen": { "Value": 42.5, "CurrencyCode": "EUR" },
            "Invoices": [],
            "Payments": []
        })
        .to_string()
    }

    async fn mock_happy_cycle(server: &mut ServerGuard) {
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(token_body())
            .create_async()
            .await;
        server
            .mock("GET", "/api/v11/GetBudgetBillLines")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(budget_body())
            .create_async()
            .await;
        server
            .mock("GET", "/api/v11/GetAccountStatement")
            .match_header("authorization", "Bearer tok")
            .match_header("accept-language", "nl")
            .with_status(200)
            .with_body(statement_body())
            .create_async()
            .await;
    }

    fn coordinator_for(server: &ServerGuard) -> Coordinator {
        let client = ApiClient::with_base_url("user", "pw", &server.url()).unwrap();
        Coordinator::new(client)
    }

    #[tokio::test]
    async fn successful_cycle_publishes_snapshot() {
        let mut server = Server::new_async().await;
        mock_happy_cycle(&mut server).await;

        let mut coordinator = coordinator_for(&server);
        assert!(coordinator.snapshot().is_none());

        let snapshot = coordinator.refresh().await.unwrap();
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.lines[0].ean, "541448812345678901");
        assert_eq!(snapshot.statement.amount_open.value, json!(42.5));
        assert!(coordinator.snapshot().is_some());
    }

    #[tokio::test]
    async fn rejected_token_fails_with_auth_and_no_snapshot() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(401)
            .create_async()
            .await;

        let mut coordinator = coordinator_for(&server);
        let error = coordinator.refresh().await.unwrap_err();
        assert!(error.needs_reauth());
        assert!(coordinator.snapshot().is_none());
    }

    #[tokio::test]
    async fn failed_budget_call_keeps_previous_snapshot() {
        let mut server = Server::new_async().await;
        mock_happy_cycle(&mut server).await;

        let mut coordinator = coordinator_for(&server);
        let first = coordinator.refresh().await.unwrap();

        // newest mock wins, so this shadows the happy budget endpoint
        server
            .mock("GET", "/api/v11/GetBudgetBillLines")
            .with_status(500)
            .create_async()
            .await;

        let error = coordinator.refresh().await.unwrap_err();
        assert!(matches!(error, UpdateError::UpdateFailed(_)));
        assert!(!error.needs_reauth());

        let current = coordinator.snapshot().expect("previous snapshot kept");
        assert!(Arc::ptr_eq(&first, &current));
    }

    #[tokio::test]
    async fn duplicate_ean_fails_the_cycle() {
        let mut server = Server::new_async().await;
        mock_happy_cycle(&mut server).await;
        server
            .mock("GET", "/api/v11/GetBudgetBillLines")
            .with_status(200)
            .with_body(
                json!({
                    "Lines": [
                        { "Ean": "1111", "CurrentAmount": 10.0 },
                        { "Ean": "1111", "CurrentAmount": 20.0 }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut coordinator = coordinator_for(&server);
        let error = coordinator.refresh().await.unwrap_err();
        assert!(matches!(error, UpdateError::InconsistentData(ean) if ean == "1111"));
        assert!(coordinator.snapshot().is_none());
    }
}
