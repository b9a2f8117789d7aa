use thiserror::Error;

#[derive(Error, Debug)]
pub enum LnurlError {
    #[error("The address has to include exactly one '@' and a valid domain. Address supplied: '{0}'")]
    MalformedAddress(String),

    #[error("Unable to reach {url}, got error: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Bad response from lightning address server {url}: {reason}")]
    ServerError { url: String, reason: String },

    #[error("Malformed pay request document from {url}: {reason}")]
    MalformedMetadata { url: String, reason: String },

    #[error("Invalid pay request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Callback {url} returned no invoice: {body}")]
    MalformedCallbackResponse { url: String, body: String },
}

/// Rejections of a pay request document.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Response is missing the fields {0:?}")]
    MissingFields(Vec<String>),

    #[error("Field {field} has an invalid value {value}")]
    InvalidField { field: String, value: String },

    #[error("min sendable is {min_sendable} msat which is more than the requested {amount_msat} msat")]
    AmountBelowMinimum { min_sendable: u64, amount_msat: u64 },

    #[error("max sendable is {max_sendable} msat which is less than the requested {amount_msat} msat")]
    AmountAboveMaximum { max_sendable: u64, amount_msat: u64 },

    #[error("Response is not a pay request, it is instead {0}")]
    NotPayRequest(String),

    #[error("Amount of {0} sat can't be expressed in msat")]
    AmountOverflow(u64),
}
