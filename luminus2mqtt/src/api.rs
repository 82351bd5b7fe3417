use std::time::Duration;

use log::debug;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{AccountStatement, BudgetData, Contracts, Meters, Token};

/// Production host of the mobile API.
pub const DEFAULT_BASE_URL: &str = "https://mobileapi.luminus.be";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials rejected: HTTP 401, 403 or the provider's own 601.
    /// Never retried here; the caller decides how to re-authenticate.
    #[error("invalid credentials (status {status})")]
    Authentication { status: u16 },
    /// Transient transport or server trouble; safe to retry next cycle.
    #[error("error communicating with the API: {0}")]
    Communication(String),
    /// Anything unexpected, e.g. a response body that does not decode.
    #[error("API client error: {0}")]
    Client(String),
}

/// Thin wrapper around the five REST endpoints. Holds the credentials it
/// was configured with; tokens are requested by the caller once per cycle
/// and passed back in.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl ApiClient {
    pub fn new(username: &str, password: &str) -> Result<Self, ApiError> {
        Self::with_base_url(username, password, DEFAULT_BASE_URL)
    }

    /// Points the client at a different host, e.g. a mock server in tests.
    pub fn with_base_url(username: &str, password: &str, base_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Client(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// POST `/token` with the password grant as an URL-encoded form body.
    ///
    /// The endpoint also accepts `grant_type=refresh_token`; deliberately
    /// unused, a fresh token is cheap and requested once per cycle.
    pub async fn request_token(&self) -> Result<Token, ApiError> {
        let url = format!("{}/token", self.base_url);
        debug!("POST {url}");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    /// GET `GetContracts`: overview of the account's energy contracts.
    pub async fn get_contracts(&self, token: &str) -> Result<Contracts, ApiError> {
        self.get("/api/v11/GetContracts", token, None).await
    }

    /// GET `GetMetersConsumptionSources`: available meters and which
    /// backend feeds their consumption data.
    pub async fn get_meters(&self, token: &str) -> Result<Meters, ApiError> {
        self.get("/api/v11/GetMetersConsumptionSources", token, None).await
    }

    /// GET `GetBudgetBillLines`: one budget line per metering point.
    pub async fn get_budget(&self, token: &str) -> Result<BudgetData, ApiError> {
        self.get("/api/v11/GetBudgetBillLines", token, None).await
    }

    /// GET `GetAccountStatement`: open amount, invoices and payments.
    /// Free-text parts of the response follow `Accept-Language`.
    pub async fn get_account_statement(
        &self,
        token: &str,
        language: &str,
    ) -> Result<AccountStatement, ApiError> {
        self.get("/api/v11/GetAccountStatement", token, Some(language))
            .await
    }

    // Not consumed here: the write path (InsertMeterReading,
    // DeleteMeterReading) and the dozen-odd other read endpoints the
    // mobile app calls (GetBusinessPartner, GetConsumptions, GetAlerts...).

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        language: Option<&str>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url}");
        let mut request = self.http.get(&url).bearer_auth(token);
        if let Some(language) = language {
            request = request.header(header::ACCEPT_LANGUAGE, language);
        }
        let response = request.send().await.map_err(transport_error)?;
        decode(response).await
    }
}

/// The provider signals rejected credentials with 601 besides the usual pair.
fn is_auth_status(status: u16) -> bool {
    matches!(status, 401 | 403 | 601)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if is_auth_status(status.as_u16()) {
        return Err(ApiError::Authentication {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(ApiError::Communication(format!(
            "unexpected status {}",
            status.as_u16()
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Client(format!("undecodable response body: {e}")))
}

fn transport_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Communication("request timed out".to_string())
    } else if error.is_connect() || error.is_request() {
        ApiError::Communication(error.to_string())
    } else {
        ApiError::Client(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn token_body() -> String {
        json!({
            "access_token": "tok-123",
            "token_type": "bearer",
            "expires_in": 1199,
            "refresh_token": "ref-456"
        })
        .to_string()
    }

    #[tokio::test]
    async fn token_request_sends_password_grant_form() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "password".into()),
                Matcher::UrlEncoded("username".into(), "user@example.com".into()),
                Matcher::UrlEncoded("password".into(), "hunter2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body())
            .create_async()
            .await;

        let client = ApiClient::with_base_url("user@example.com", "hunter2", &server.url()).unwrap();
        let token = client.request_token().await.unwrap();
        assert!(!token.access_token.is_empty());
        assert_eq!(token.access_token, "tok-123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn auth_statuses_map_to_authentication_error() {
        for status in [401_usize, 403, 601] {
            let mut server = Server::new_async().await;
            let _mock = server
                .mock("POST", "/token")
                .with_status(status)
                .create_async()
                .await;

            let client = ApiClient::with_base_url("user", "bad", &server.url()).unwrap();
            let result = client.request_token().await;
            assert!(
                matches!(result, Err(ApiError::Authentication { status: s }) if s == status as u16),
                "expected Authentication for status {status}, got {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn other_error_statuses_map_to_communication_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v11/GetBudgetBillLines")
            .with_status(500)
            .create_async()
            .await;

        let client = ApiClient::with_base_url("user", "pw", &server.url()).unwrap();
        let result = client.get_budget("tok").await;
        assert!(matches!(result, Err(ApiError::Communication(_))));
    }

    #[tokio::test]
    async fn data_requests_carry_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v11/GetContracts")
            .match_header("authorization", "Bearer tok-123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "Contracts": [{ "Ean": "54144881234", "EnergyType": "Electricity" }],
                    "PendingContracts": []
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::with_base_url("user", "pw", &server.url()).unwrap();
        let contracts = client.get_contracts("tok-123").await.unwrap();
        assert_eq!(contracts.contracts[0].ean, "54144881234");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn statement_request_sets_accept_language() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v11/GetAccountStatement")
            .match_header("authorization", "Bearer tok-123")
            .match_header("accept-language", "nl")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "AmountOpen": { "Value": 42.5, "CurrencyCode": "EUR" },
                    "Invoices": [],
                    "Payments": []
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::with_base_url("user", "pw", &server.url()).unwrap();
        let statement = client.get_account_statement("tok-123", "nl").await.unwrap();
        assert_eq!(statement.amount_open.currency_code.as_deref(), Some("EUR"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn connection_failure_is_communication_error() {
        // discard port, nothing listens there
        let client = ApiClient::with_base_url("user", "pw", "http://127.0.0.1:9").unwrap();
        let result = client.request_token().await;
        assert!(matches!(result, Err(ApiError::Communication(_))));
    }

    #[tokio::test]
    async fn undecodable_body_is_client_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v11/GetBudgetBillLines")
            .with_status(200)
            .with_body("this is not json")
            .create_async()
            .await;

        let client = ApiClient::with_base_url("user", "pw", &server.url()).unwrap();
        let result = client.get_budget("tok").await;
        assert!(matches!(result, Err(ApiError::Client(_))));
    }
}
