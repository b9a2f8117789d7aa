use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ValidationError;

pub const PAY_REQUEST_TAG: &str = "payRequest";

const REQUIRED_FIELDS: [&str; 3] = ["maxSendable", "minSendable", "tag"];

/// LNURL-pay parameters served from `/.well-known/lnurlp/{user}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequestParams {
    /// millisatoshis
    pub min_sendable: u64,
    /// millisatoshis
    pub max_sendable: u64,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_allowed: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of the pay request callback.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackResponse {
    pub pr: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub fn to_msat(amount_sat: u64) -> Result<u64, ValidationError> {
    amount_sat
        .checked_mul(1000)
        .ok_or(ValidationError::AmountOverflow(amount_sat))
}

/// Checks a pay request document against the amount (in sat) we intend to pay.
///
/// Checks run in order: required fields, lower bound, upper bound, tag.
pub fn validate_pay_request(
    document: &Value,
    amount_sat: u64,
) -> Result<PayRequestParams, ValidationError> {
    let missing = REQUIRED_FIELDS
        .iter()
        .filter(|field| document.get(**field).is_none())
        .map(|field| field.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    let amount_msat = to_msat(amount_sat)?;
    let min_sendable = msat_field(document, "minSendable")?;
    let max_sendable = msat_field(document, "maxSendable")?;

    if min_sendable > amount_msat {
        return Err(ValidationError::AmountBelowMinimum {
            min_sendable,
            amount_msat,
        });
    }
    if max_sendable < amount_msat {
        return Err(ValidationError::AmountAboveMaximum {
            max_sendable,
            amount_msat,
        });
    }

    let tag = &document["tag"];
    if tag.as_str() != Some(PAY_REQUEST_TAG) {
        let found = tag.as_str().map_or_else(|| tag.to_string(), str::to_owned);
        return Err(ValidationError::NotPayRequest(found));
    }

    let mut normalized = document.clone();
    normalized["minSendable"] = min_sendable.into();
    normalized["maxSendable"] = max_sendable.into();
    serde_json::from_value(normalized).map_err(|err| ValidationError::InvalidField {
        field: "document".to_owned(),
        value: err.to_string(),
    })
}

fn msat_field(document: &Value, field: &str) -> Result<u64, ValidationError> {
    let value = &document[field];
    value
        .as_u64()
        // some servers send whole numbers as floats
        .or_else(|| {
            value
                .as_f64()
                .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= u64::MAX as f64)
                .map(|v| v as u64)
        })
        .ok_or_else(|| ValidationError::InvalidField {
            field: field.to_owned(),
            value: value.to_string(),
        })
}
