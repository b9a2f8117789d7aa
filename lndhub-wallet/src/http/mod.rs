pub mod retry;

use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    RequestBuilder, Response,
};
use tracing::debug;
use url::Url;

use crate::{config::LndHubSettings, error::LndHubWalletError, ratelimit::check_rate_limit};

use self::retry::RetryPolicy;

/// Whether a request may be replayed by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    Retry,
    /// Sent exactly once, e.g. payment submission which carries no idempotency key.
    Once,
}

/// reqwest based transport to the lndhub backend.
#[derive(Debug, Clone)]
pub struct HttpClient {
    request_client: reqwest::Client,
    settings: LndHubSettings,
}

impl HttpClient {
    pub fn new(settings: LndHubSettings) -> Result<Self, LndHubWalletError> {
        let request_client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            request_client,
            settings,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, LndHubWalletError> {
        let mut base = self.settings.url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(path)?)
    }

    fn authorize(
        request: RequestBuilder,
        access_token: &str,
    ) -> Result<RequestBuilder, LndHubWalletError> {
        // lndhub expects the bare token, without a "Bearer " prefix
        let mut value = HeaderValue::from_str(access_token)?;
        value.set_sensitive(true);
        Ok(request.header(AUTHORIZATION, value))
    }

    /// POST without rate limit inspection, only used for account creation.
    pub(crate) async fn do_post_anonymous<T, B>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LndHubWalletError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self
            .settings
            .retry
            .send(self.request_client.post(url).form(body))
            .await?;
        extract_response_data(response).await
    }

    pub(crate) async fn do_post<T, B>(
        &self,
        path: &str,
        access_token: Option<&str>,
        body: &B,
        replay: Replay,
    ) -> Result<T, LndHubWalletError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        let url = self.endpoint(path)?;
        debug!(%url, ?replay, "POST");
        let mut request = self.request_client.post(url).form(body);
        if let Some(access_token) = access_token {
            request = Self::authorize(request, access_token)?;
        }
        let response = match replay {
            Replay::Retry => self.settings.retry.send(request).await?,
            Replay::Once => RetryPolicy::none().send(request).await?,
        };
        check_rate_limit(response.headers())?;
        extract_response_data(response).await
    }

    pub(crate) async fn do_get<T>(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, LndHubWalletError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, ?query, "GET");
        let request = Self::authorize(self.request_client.get(url).query(query), access_token)?;
        let response = self.settings.retry.send(request).await?;
        check_rate_limit(response.headers())?;
        extract_response_data(response).await
    }
}

async fn extract_response_data<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, LndHubWalletError> {
    let status = response.status();
    let url = response.url().to_string();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(LndHubWalletError::Transport {
            url,
            status: status.as_u16(),
            body,
        });
    }

    Ok(serde_json::from_str::<T>(&body)?)
}
