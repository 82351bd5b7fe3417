//! Process-owned bookkeeping of one coordinator per configured account,
//! plus the credential check a setup dialog runs before anything else.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::api::{ApiClient, ApiError};
use crate::coordinator::{Coordinator, UpdateError};
use crate::models::{Snapshot, Token};

/// Credential-validation outcome, bucketed the way a setup dialog needs it.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("username or password rejected")]
    InvalidAuth(#[source] ApiError),
    #[error("cannot connect to the API")]
    CannotConnect(#[source] ApiError),
    #[error("unexpected error while validating credentials")]
    Unknown(#[source] ApiError),
}

/// Checks user-supplied credentials with a single token request and hands
/// the token back for immediate follow-up calls.
pub async fn validate_credentials(client: &ApiClient) -> Result<Token, CredentialsError> {
    client.request_token().await.map_err(|error| match error {
        ApiError::Authentication { .. } => CredentialsError::InvalidAuth(error),
        ApiError::Communication(_) => CredentialsError::CannotConnect(error),
        ApiError::Client(_) => CredentialsError::Unknown(error),
    })
}

/// Explicit account → coordinator map. Owns the coordinators for their
/// whole lifetime; the poll timer stays with the caller, so unloading an
/// account is nothing more than dropping its entry.
#[derive(Default)]
pub struct CoordinatorRegistry {
    entries: HashMap<String, Coordinator>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account and runs its first refresh. On failure nothing
    /// is registered and the error propagates, so a broken account never
    /// ends up half set up.
    pub async fn setup(
        &mut self,
        account: &str,
        client: ApiClient,
    ) -> Result<Arc<Snapshot>, UpdateError> {
        let mut coordinator = Coordinator::new(client);
        let snapshot = coordinator.refresh().await?;
        self.entries.insert(account.to_string(), coordinator);
        info!(
            "account {account} set up with {} budget line(s)",
            snapshot.lines.len()
        );
        Ok(snapshot)
    }

    pub fn coordinator(&self, account: &str) -> Option<&Coordinator> {
        self.entries.get(account)
    }

    pub fn coordinator_mut(&mut self, account: &str) -> Option<&mut Coordinator> {
        self.entries.get_mut(account)
    }

    /// Drops the account's coordinator. False when the account was unknown.
    pub fn unload(&mut self, account: &str) -> bool {
        self.entries.remove(account).is_some()
    }

    /// Tear down and set up again, e.g. after changed credentials.
    pub async fn reload(
        &mut self,
        account: &str,
        client: ApiClient,
    ) -> Result<Arc<Snapshot>, UpdateError> {
        self.unload(account);
        self.setup(account, client).await
    }
}
