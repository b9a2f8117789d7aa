use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::LndHubWalletError,
    model::{BalanceResponse, BtcAddress, PayInvoiceResponse, RawInvoice},
    session::{Credentials, Session},
};

pub mod lndhub;

#[cfg(test)]
use mockall::automock;

/// One method per lndhub endpoint.
///
/// Implementations apply the rate limit guard to every response except account creation
/// and fail on any non-2xx status.
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait LndHubClient {
    /// `POST /create`
    async fn create_account(&self) -> Result<Credentials, LndHubWalletError>;

    /// `POST /auth`
    async fn auth(&self, credentials: &Credentials) -> Result<Session, LndHubWalletError>;

    /// `POST /addinvoice`
    async fn add_invoice(
        &self,
        access_token: &str,
        amt: u64,
        memo: &str,
    ) -> Result<RawInvoice, LndHubWalletError>;

    /// `POST /payinvoice`, never retried
    async fn pay_invoice(
        &self,
        access_token: &str,
        invoice: &str,
        amount: Option<u64>,
    ) -> Result<PayInvoiceResponse, LndHubWalletError>;

    /// `GET /getuserinvoices`
    async fn get_user_invoices(
        &self,
        access_token: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<RawInvoice>, LndHubWalletError>;

    /// `GET /balance`
    async fn get_balance(&self, access_token: &str) -> Result<BalanceResponse, LndHubWalletError>;

    /// `GET /getbtc`
    async fn get_btc(&self, access_token: &str) -> Result<Vec<BtcAddress>, LndHubWalletError>;

    /// `GET /getinfo`
    async fn get_info(&self, access_token: &str) -> Result<Value, LndHubWalletError>;
}
