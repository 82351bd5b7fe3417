use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Password-grant token returned by `/token`. Short-lived; a fresh one is
/// requested at the start of every poll cycle instead of refreshing.
#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contracts {
    #[serde(rename = "Contracts", default)]
    pub contracts: Vec<Contract>,
    #[serde(rename = "PendingContracts", default)]
    pub pending_contracts: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contract {
    #[serde(rename = "Ean")]
    pub ean: String,
    #[serde(rename = "EnergyType", default)]
    pub energy_type: Option<String>,
    #[serde(rename = "Product", default)]
    pub product: Option<String>,
    #[serde(rename = "PriceVariability", default)]
    pub price_variability: Option<String>,
    #[serde(rename = "EndDate", default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Meters {
    #[serde(rename = "Meters", default)]
    pub meters: Vec<Meter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Meter {
    #[serde(rename = "Ean")]
    pub ean: String,
    #[serde(rename = "EnergyType", default)]
    pub energy_type: Option<String>,
    #[serde(rename = "Sources", default)]
    pub sources: Vec<MeterSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeterSource {
    #[serde(rename = "SourceProvider", default)]
    pub source_provider: Option<String>,
}

/// Response of `GetBudgetBillLines`: one line per metering point.
#[derive(Debug, Clone, Deserialize)]
pub struct BudgetData {
    #[serde(rename = "Lines", default)]
    pub lines: Vec<BudgetLine>,
}

/// A per-meter budget summary. Only the Ean is structural; the provider
/// serves the remaining fields sometimes as numbers and sometimes as
/// strings, so they stay raw JSON and are resolved by name at projection
/// time. Unknown provider fields survive in the same map.
#[derive(Debug, Clone, Deserialize)]
pub struct BudgetLine {
    #[serde(rename = "Ean")]
    pub ean: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl BudgetLine {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Response of `GetAccountStatement`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountStatement {
    #[serde(rename = "AmountOpen", default)]
    pub amount_open: AmountOpen,
    #[serde(rename = "Invoices", default)]
    pub invoices: Vec<Value>,
    #[serde(rename = "Payments", default)]
    pub payments: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmountOpen {
    #[serde(rename = "Value", default)]
    pub value: Value,
    #[serde(rename = "CurrencyCode", default)]
    pub currency_code: Option<String>,
}

/// Everything one successful poll cycle fetched. Built once per cycle and
/// swapped in wholesale; readers keep seeing the previous snapshot until
/// the swap happens.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub lines: Vec<BudgetLine>,
    pub statement: AccountStatement,
    pub fetched_at: DateTime<Utc>,
}
