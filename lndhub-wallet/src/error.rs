use lightning_invoice::ParseOrSemanticError;
use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::lnurl::error::LnurlError;

#[derive(Error, Debug)]
pub enum LndHubWalletError {
    #[error("{operation} requires a wallet initialized with login and password")]
    CredentialsMissing { operation: &'static str },

    #[error("Rate limit dropped to {remaining}, headers: {headers:?}")]
    RateLimitExceeded { remaining: u64, headers: HeaderMap },

    #[error("Request to {url} failed with status {status}: {body}")]
    Transport {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Error paying the invoice '{invoice}': {message}, code: {code}")]
    PaymentFailed {
        invoice: String,
        message: String,
        code: String,
    },

    #[error("Backend returned no on-chain address")]
    NoOnchainAddress,

    #[error("Invoice not found for hash {0}")]
    InvoiceNotFound(String),

    #[error("Failed to decode payment request {0} - Error {1}")]
    DecodeInvoice(String, ParseOrSemanticError),

    #[error("ReqwestError - {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("InvalidHeaderValueError - {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error("SerdeJsonError - {0}")]
    Json(#[from] serde_json::Error),

    #[error("URLParseError - {0}")]
    Url(#[from] url::ParseError),

    #[error("LnurlError - {0}")]
    Lnurl(#[from] LnurlError),
}
