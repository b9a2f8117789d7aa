//! LNURL-pay resolution of lightning addresses.
//!
//! A lightning address `user@domain` is turned into a payable bolt11 invoice in two steps:
//! the pay request document is fetched from `https://{domain}/.well-known/lnurlp/{user}` and
//! validated against the amount, then its callback is invoked to mint the invoice.

pub mod address;
pub mod error;
pub mod model;

use std::{str::FromStr, time::Duration};

use reqwest::Response;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::config::LnurlSettings;

use self::{
    address::LightningAddress,
    error::{LnurlError, ValidationError},
    model::{to_msat, validate_pay_request, CallbackResponse, PayRequestParams},
};

#[derive(Debug, Clone)]
pub struct LnurlResolver {
    request_client: reqwest::Client,
    settings: LnurlSettings,
}

impl LnurlResolver {
    pub fn new(settings: LnurlSettings) -> Self {
        Self {
            request_client: reqwest::Client::new(),
            settings,
        }
    }

    /// Resolves `address` into an invoice over `amount_sat`.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn resolve_invoice(
        &self,
        address: &str,
        amount_sat: u64,
        comment: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<String, LnurlError> {
        let url = LightningAddress::from_str(address)?.lnurlp_url()?;
        self.invoice_from_url(&url, amount_sat, comment, nonce)
            .await
    }

    /// Runs the pay request pipeline against an already known LNURL-pay endpoint.
    pub async fn invoice_from_url(
        &self,
        url: &Url,
        amount_sat: u64,
        comment: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<String, LnurlError> {
        let params = self.fetch_pay_params(url, amount_sat).await?;
        self.request_invoice(&params, amount_sat, comment, nonce)
            .await
    }

    /// Fetches the pay request document and validates it for `amount_sat`.
    #[instrument(level = "debug", skip(self, url), fields(url = %url), err)]
    pub async fn fetch_pay_params(
        &self,
        url: &Url,
        amount_sat: u64,
    ) -> Result<PayRequestParams, LnurlError> {
        let body = self
            .get_body(url.clone(), &[], self.settings.metadata_timeout)
            .await?;
        let document = serde_json::from_str::<Value>(&body).map_err(|err| {
            LnurlError::MalformedMetadata {
                url: url.to_string(),
                reason: format!("{err}: {body}"),
            }
        })?;

        if document.get("status").and_then(Value::as_str) == Some("ERROR") {
            return Err(LnurlError::ServerError {
                url: url.to_string(),
                reason: reason_of(&document),
            });
        }

        Ok(validate_pay_request(&document, amount_sat)?)
    }

    /// Invokes the callback of a validated pay request and returns the invoice.
    #[instrument(level = "debug", skip(self, params), err)]
    pub async fn request_invoice(
        &self,
        params: &PayRequestParams,
        amount_sat: u64,
        comment: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<String, LnurlError> {
        let callback = params
            .callback
            .as_deref()
            .ok_or_else(|| ValidationError::MissingFields(vec!["callback".to_owned()]))?;
        let callback_url = Url::parse(callback).map_err(|err| ValidationError::InvalidField {
            field: "callback".to_owned(),
            value: format!("{callback}: {err}"),
        })?;

        let mut query = vec![("amount", to_msat(amount_sat)?.to_string())];
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            query.push(("comment", comment.to_owned()));
        }
        if let Some(nonce) = nonce.filter(|n| !n.is_empty()) {
            query.push(("nonce", nonce.to_owned()));
        }

        let body = self
            .get_body(callback_url.clone(), &query, self.settings.callback_timeout)
            .await?;

        let malformed = || LnurlError::MalformedCallbackResponse {
            url: callback_url.to_string(),
            body: body.clone(),
        };
        let response =
            serde_json::from_str::<CallbackResponse>(&body).map_err(|_| malformed())?;

        if response.status.as_deref() == Some("ERROR") {
            return Err(LnurlError::ServerError {
                url: callback_url.to_string(),
                reason: response.reason.unwrap_or_default(),
            });
        }
        response.pr.ok_or_else(malformed)
    }

    /// GETs `url` and returns the body of a 2xx response.
    async fn get_body(
        &self,
        url: Url,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<String, LnurlError> {
        let unreachable_err = |reason: String| LnurlError::Unreachable {
            url: url.to_string(),
            reason,
        };

        debug!(%url, ?query, "GET");
        let response = self
            .request_client
            .get(url.clone())
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|err| unreachable_err(err.to_string()))?;

        response
            .text()
            .await
            .map_err(|err| unreachable_err(err.to_string()))
    }
}

impl Default for LnurlResolver {
    fn default() -> Self {
        Self::new(LnurlSettings::default())
    }
}

fn reason_of(document: &Value) -> String {
    document
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_address_fails_before_network() {
        let resolver = LnurlResolver::default();
        let result = resolver
            .resolve_invoice("alice-at-example.com", 100, None, None)
            .await;
        assert!(matches!(
            result,
            Err(LnurlError::MalformedAddress(address)) if address == "alice-at-example.com"
        ));
    }

    #[tokio::test]
    async fn test_missing_callback() -> anyhow::Result<()> {
        let params = validate_pay_request(
            &serde_json::json!({"tag": "payRequest", "minSendable": 1, "maxSendable": 1000000}),
            10,
        )?;
        let result = LnurlResolver::default()
            .request_invoice(&params, 10, None, None)
            .await;
        assert!(matches!(
            result,
            Err(LnurlError::Validation(ValidationError::MissingFields(fields))) if fields == vec!["callback".to_owned()]
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_names_url() -> anyhow::Result<()> {
        // nothing listens on the discard port
        let url = Url::parse("http://127.0.0.1:9/.well-known/lnurlp/alice")?;
        let result = LnurlResolver::default().fetch_pay_params(&url, 10).await;
        match result {
            Err(LnurlError::Unreachable { url: failed, .. }) => assert_eq!(failed, url.to_string()),
            other => panic!("unexpected result {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_reason_of() {
        assert_eq!(
            reason_of(&serde_json::json!({"status": "ERROR", "reason": "unknown user"})),
            "unknown user"
        );
        assert_eq!(reason_of(&serde_json::json!({"status": "ERROR"})), "");
    }
}
