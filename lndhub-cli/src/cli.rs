use std::time::Duration;

use clap::Args;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use lndhub_wallet::{
    client::LndHubClient,
    config::{LndHubSettings, DEFAULT_LNDHUB_URL},
    error::LndHubWalletError,
    http::HttpClient,
    session::Credentials,
    wallet::{LndHubWallet, WalletBuilder},
};
use num_format::{Locale, ToFormattedString};
use qrcode::{render::unicode, QrCode};
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use url::Url;

/// Backend and account options, taken from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct HubOpts {
    /// lndhub backend url
    #[arg(long, env = "LNDHUB_URL", default_value = DEFAULT_LNDHUB_URL)]
    pub url: Url,

    #[arg(long, env = "LNDHUB_LOGIN")]
    pub login: Option<String>,

    #[arg(long, env = "LNDHUB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// request timeout in seconds
    #[arg(long, env = "LNDHUB_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,
}

impl HubOpts {
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(self.login.clone(), self.password.clone())
    }

    pub fn settings(&self) -> LndHubSettings {
        LndHubSettings::new(self.url.clone())
            .with_request_timeout(Duration::from_secs(self.timeout))
    }

    /// Builds the wallet, logging in when both login and password are set.
    pub async fn wallet(&self) -> Result<LndHubWallet<HttpClient>, LndHubWalletError> {
        self.build_wallet(self.credentials()).await
    }

    /// Builds a wallet that ignores any configured account, for signing up.
    pub async fn anonymous_wallet(&self) -> Result<LndHubWallet<HttpClient>, LndHubWalletError> {
        self.build_wallet(None).await
    }

    async fn build_wallet(
        &self,
        credentials: Option<Credentials>,
    ) -> Result<LndHubWallet<HttpClient>, LndHubWalletError> {
        let client = HttpClient::new(self.settings())?;
        WalletBuilder::new(client)
            .with_optional_credentials(credentials)
            .build()
            .await
    }
}

/// Seconds between invoice status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Polling options shared by every command that waits for a payment.
#[derive(Args, Debug, Clone)]
pub struct PollOpts {
    /// seconds between polls while waiting
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub interval: u64,
}

impl PollOpts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

/// Logs go to stderr, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init();
}

pub fn progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    Ok(pb)
}

pub fn format_sats(amount: u64) -> String {
    format!("{} (sat)", amount.to_formatted_string(&Locale::en))
}

pub fn qr_code(data: &str) -> anyhow::Result<String> {
    Ok(QrCode::new(data)?
        .render::<unicode::Dense1x2>()
        .quiet_zone(true)
        .build())
}

/// Lines to paste into `.env` for a freshly created account.
pub fn env_lines(url: &Url, credentials: &Credentials) -> Vec<String> {
    vec![
        format!("LNDHUB_URL={url}"),
        format!("LNDHUB_LOGIN={}", credentials.login),
        format!("LNDHUB_PASSWORD={}", credentials.password),
    ]
}

pub async fn show_balance(
    term: &Term,
    wallet: &LndHubWallet<impl LndHubClient>,
) -> anyhow::Result<()> {
    let balance = wallet.balance().await?;
    term.write_line(&format!("Balance: {}", style(format_sats(balance)).cyan()))?;
    Ok(())
}

/// Writes a hint for errors a user can fix themselves, returns false for anything else.
pub fn explain_error(term: &Term, err: &LndHubWalletError) -> anyhow::Result<bool> {
    let hint = match err {
        LndHubWalletError::CredentialsMissing { .. } => {
            "No account configured. Set LNDHUB_LOGIN and LNDHUB_PASSWORD or run 'lndhub-cli create-account'"
        }
        LndHubWalletError::RateLimitExceeded { .. } => {
            "The backend rate limit is almost used up, try again later"
        }
        _ => return Ok(false),
    };
    term.write_line(&format!("Error: {}", style(hint).red()))?;
    Ok(true)
}
