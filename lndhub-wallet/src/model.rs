use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payment hash as sent by lndhub.
///
/// The backend serializes node buffers as `{"type": "Buffer", "data": [..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRHash {
    Buffer { data: Vec<u8> },
    Encoded(String),
}

impl RawRHash {
    /// Standard base64 of the hash bytes. Already encoded hashes are passed through.
    pub fn normalize(self) -> String {
        match self {
            Self::Buffer { data } => general_purpose::STANDARD.encode(data),
            Self::Encoded(encoded) => encoded,
        }
    }
}

/// Invoice record exactly as returned by `/addinvoice` and `/getuserinvoices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInvoice {
    pub r_hash: RawRHash,
    pub payment_request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amt: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default)]
    pub ispaid: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Invoice with its `r_hash` normalized to base64.
///
/// Only obtainable from a [`RawInvoice`], so normalization happens exactly once per record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub r_hash: String,
    pub payment_request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amt: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default)]
    pub ispaid: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<RawInvoice> for Invoice {
    fn from(raw: RawInvoice) -> Self {
        Self {
            r_hash: raw.r_hash.normalize(),
            payment_request: raw.payment_request,
            amt: raw.amt,
            memo: raw.memo,
            ispaid: raw.ispaid,
            extra: raw.extra,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAccountRequest {
    pub partnerid: String,
    pub accounttype: String,
}

impl Default for CreateAccountRequest {
    fn default() -> Self {
        Self {
            partnerid: "bluewallet".to_owned(),
            accounttype: "common".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddInvoiceRequest {
    pub amt: u64,
    pub memo: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayInvoiceRequest {
    pub invoice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayInvoiceResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PayInvoiceResponse {
    pub fn code_string(&self) -> String {
        match &self.code {
            Some(Value::String(code)) => code.clone(),
            Some(code) => code.to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(rename = "BTC", default, skip_serializing_if = "Option::is_none")]
    pub btc: Option<BtcBalance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BtcBalance {
    #[serde(rename = "AvailableBalance", default)]
    pub available_balance: u64,
}

impl BalanceResponse {
    pub fn available_balance(&self) -> u64 {
        self.btc
            .as_ref()
            .map(|btc| btc.available_balance)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcAddress {
    pub address: String,
}
