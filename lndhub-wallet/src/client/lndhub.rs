use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::LndHubWalletError,
    http::{HttpClient, Replay},
    model::{
        AddInvoiceRequest, BalanceResponse, BtcAddress, CreateAccountRequest, PayInvoiceRequest,
        PayInvoiceResponse, RawInvoice,
    },
    session::{Credentials, Session},
};

use super::LndHubClient;

#[async_trait(?Send)]
impl LndHubClient for HttpClient {
    async fn create_account(&self) -> Result<Credentials, LndHubWalletError> {
        self.do_post_anonymous("create", &CreateAccountRequest::default())
            .await
    }

    async fn auth(&self, credentials: &Credentials) -> Result<Session, LndHubWalletError> {
        self.do_post("auth", None, credentials, Replay::Retry).await
    }

    async fn add_invoice(
        &self,
        access_token: &str,
        amt: u64,
        memo: &str,
    ) -> Result<RawInvoice, LndHubWalletError> {
        let body = AddInvoiceRequest {
            amt,
            memo: memo.to_owned(),
        };
        self.do_post("addinvoice", Some(access_token), &body, Replay::Retry)
            .await
    }

    async fn pay_invoice(
        &self,
        access_token: &str,
        invoice: &str,
        amount: Option<u64>,
    ) -> Result<PayInvoiceResponse, LndHubWalletError> {
        let body = PayInvoiceRequest {
            invoice: invoice.to_owned(),
            amount,
        };
        self.do_post("payinvoice", Some(access_token), &body, Replay::Once)
            .await
    }

    async fn get_user_invoices(
        &self,
        access_token: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<RawInvoice>, LndHubWalletError> {
        let mut query = vec![("limit", limit.to_string())];
        if offset > 0 {
            query.push(("offset", offset.to_string()));
        }
        self.do_get("getuserinvoices", access_token, &query).await
    }

    async fn get_balance(&self, access_token: &str) -> Result<BalanceResponse, LndHubWalletError> {
        self.do_get("balance", access_token, &[]).await
    }

    async fn get_btc(&self, access_token: &str) -> Result<Vec<BtcAddress>, LndHubWalletError> {
        self.do_get("getbtc", access_token, &[]).await
    }

    async fn get_info(&self, access_token: &str) -> Result<Value, LndHubWalletError> {
        self.do_get("getinfo", access_token, &[]).await
    }
}
