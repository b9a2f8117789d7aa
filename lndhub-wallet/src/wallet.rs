use std::{collections::HashSet, str::FromStr, time::Duration};

use lightning_invoice::Bolt11Invoice as LNInvoice;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{
    client::LndHubClient,
    error::LndHubWalletError,
    invoice_cache::InvoiceCache,
    lnurl::LnurlResolver,
    model::{Invoice, PayInvoiceResponse},
    session::{Credentials, Session},
};

pub const DEFAULT_LOOKBACK_LIMIT: u64 = 1000;

pub struct LndHubWallet<C: LndHubClient> {
    client: C,
    credentials: Option<Credentials>,
    session: Option<Session>,
    invoices: InvoiceCache,
}

pub struct WalletBuilder<C: LndHubClient> {
    client: C,
    credentials: Option<Credentials>,
}

impl<C: LndHubClient> WalletBuilder<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_optional_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Authenticates right away when credentials were given. Without them the wallet is
    /// anonymous and can only create accounts.
    pub async fn build(self) -> Result<LndHubWallet<C>, LndHubWalletError> {
        let session = match &self.credentials {
            Some(credentials) => {
                let session = self.client.auth(credentials).await?;
                info!(login = %credentials.login, "authenticated");
                Some(session)
            }
            None => None,
        };

        Ok(LndHubWallet {
            client: self.client,
            credentials: self.credentials,
            session,
            invoices: InvoiceCache::default(),
        })
    }
}

impl<C: LndHubClient> LndHubWallet<C> {
    pub fn builder(client: C) -> WalletBuilder<C> {
        WalletBuilder::new(client)
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Gate in front of every privileged operation.
    fn access_token(&self, operation: &'static str) -> Result<&str, LndHubWalletError> {
        self.session
            .as_ref()
            .map(|session| session.access_token.as_str())
            .ok_or(LndHubWalletError::CredentialsMissing { operation })
    }

    /// Registers a new account. The returned credentials are not stored anywhere.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn create_account(&self) -> Result<Credentials, LndHubWalletError> {
        self.client.create_account().await
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn create_invoice(&self, amt: u64, memo: &str) -> Result<Invoice, LndHubWalletError> {
        let access_token = self.access_token("create_invoice")?;
        let invoice = self.client.add_invoice(access_token, amt, memo).await?;
        Ok(invoice.into())
    }

    /// Pays a bolt11 invoice.
    ///
    /// `amount` is only sent for invoices that don't carry an amount themselves. A 2xx
    /// response whose body signals an error is turned into [`LndHubWalletError::PaymentFailed`].
    #[instrument(level = "debug", skip(self), err)]
    pub async fn pay_invoice(
        &self,
        payment_request: &str,
        amount: Option<u64>,
    ) -> Result<PayInvoiceResponse, LndHubWalletError> {
        let access_token = self.access_token("pay_invoice")?;
        let amount = Self::payable_amount(payment_request, amount)?;

        let response = self
            .client
            .pay_invoice(access_token, payment_request, amount)
            .await?;

        if response.error {
            return Err(LndHubWalletError::PaymentFailed {
                invoice: payment_request.to_owned(),
                message: response.message.clone().unwrap_or_default(),
                code: response.code_string(),
            });
        }
        Ok(response)
    }

    /// Resolves a lightning address to an invoice and pays it.
    #[instrument(level = "debug", skip(self, resolver), err)]
    pub async fn pay_lightning_address(
        &self,
        resolver: &LnurlResolver,
        address: &str,
        amount: u64,
        comment: Option<&str>,
    ) -> Result<PayInvoiceResponse, LndHubWalletError> {
        self.access_token("pay_lightning_address")?;
        let payment_request = resolver
            .resolve_invoice(address, amount, comment, None)
            .await?;
        self.pay_invoice(&payment_request, None).await
    }

    fn payable_amount(
        payment_request: &str,
        amount: Option<u64>,
    ) -> Result<Option<u64>, LndHubWalletError> {
        let invoice = LNInvoice::from_str(payment_request)
            .map_err(|err| LndHubWalletError::DecodeInvoice(payment_request.to_owned(), err))?;

        if let Some(invoice_msat) = invoice.amount_milli_satoshis() {
            if amount.is_some() {
                debug!(invoice_msat, "invoice carries an amount, ignoring caller amount");
            }
            return Ok(None);
        }
        Ok(amount.filter(|amount| *amount > 0))
    }

    /// Single page of at most `limit` invoices.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn list_invoices(&self, limit: u64) -> Result<Vec<Invoice>, LndHubWalletError> {
        let access_token = self.access_token("list_invoices")?;
        let page = self.client.get_user_invoices(access_token, limit, 0).await?;
        Ok(page.into_iter().map(Invoice::from).collect())
    }

    /// All invoices, fetched `limit` at a time until a short page is returned.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn list_invoices_paginated(
        &self,
        limit: u64,
    ) -> Result<Vec<Invoice>, LndHubWalletError> {
        let access_token = self.access_token("list_invoices_paginated")?;
        let mut invoices = Vec::new();
        if limit == 0 {
            return Ok(invoices);
        }

        let mut seen = HashSet::new();
        let mut offset = 0;
        loop {
            let page = self
                .client
                .get_user_invoices(access_token, limit, offset)
                .await?;
            let page_len = page.len() as u64;
            debug!(offset, page_len, "fetched invoice page");

            let before = invoices.len();
            for invoice in page.into_iter().map(Invoice::from) {
                if seen.insert(invoice.r_hash.clone()) {
                    invoices.push(invoice);
                }
            }

            if page_len < limit {
                break;
            }
            if invoices.len() == before {
                warn!(offset, "backend returned an already seen page, stopping pagination");
                break;
            }
            offset += page_len;
        }
        Ok(invoices)
    }

    /// Rebuilds the invoice cache from the backend.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn refresh_invoices(&self, limit: u64) -> Result<(), LndHubWalletError> {
        let invoices = self.list_invoices_paginated(limit).await?;
        let count = self.invoices.replace(invoices).await;
        debug!(count, "refreshed invoice cache");
        Ok(())
    }

    /// Looks up an invoice by its base64 `r_hash`. Always refreshes the cache first so
    /// payment status is current.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn lookup_invoice(
        &self,
        r_hash: &str,
        lookback_limit: u64,
    ) -> Result<Option<Invoice>, LndHubWalletError> {
        self.access_token("lookup_invoice")?;
        self.refresh_invoices(lookback_limit).await?;
        Ok(self.invoices.get(r_hash).await)
    }

    /// Polls until the invoice is paid.
    pub async fn wait_for_payment(
        &self,
        r_hash: &str,
        poll_interval: Duration,
        lookback_limit: u64,
    ) -> Result<Invoice, LndHubWalletError> {
        loop {
            let invoice = self
                .lookup_invoice(r_hash, lookback_limit)
                .await?
                .ok_or_else(|| LndHubWalletError::InvoiceNotFound(r_hash.to_owned()))?;
            if invoice.ispaid {
                return Ok(invoice);
            }
            debug!(r_hash, ?poll_interval, "invoice not paid yet");
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Available BTC balance in satoshis, 0 when the backend omits it.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn balance(&self) -> Result<u64, LndHubWalletError> {
        let access_token = self.access_token("balance")?;
        Ok(self.client.get_balance(access_token).await?.available_balance())
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn onchain_address(&self) -> Result<String, LndHubWalletError> {
        let access_token = self.access_token("onchain_address")?;
        self.client
            .get_btc(access_token)
            .await?
            .into_iter()
            .next()
            .map(|btc| btc.address)
            .ok_or(LndHubWalletError::NoOnchainAddress)
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn node_info(&self) -> Result<Value, LndHubWalletError> {
        let access_token = self.access_token("node_info")?;
        self.client.get_info(access_token).await
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose, Engine as _};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{
        client::MockLndHubClient,
        fixture::read_fixture_as,
        model::{BalanceResponse, BtcAddress, RawInvoice},
    };

    // 21 sat regtest invoice
    const INVOICE_21_SAT: &str = "lnbcrt210n1pjg6mqhpp5pza5wzh0csjjuvfpjpv4zdjmg30vedj9ycv5tyfes9x7dp8axy0sdqqcqzzsxqyz5vqsp5vtxg4c5tw2s2zxxya2a7an0psn9mcfmlqctxzntm3sngnpyk3muq9qyyssqf8z5f90yu3wrmsufnnza25qjlnvc6ukdr094ckzn63ktcy6z5fw5mxf9skndpg2p4648gfjfvvx4qg2lqvlryyycg5k7x9h4dw70t4qq37pegm";

    fn session() -> Session {
        Session {
            access_token: "access".to_owned(),
            refresh_token: "refresh".to_owned(),
        }
    }

    fn authenticating_client() -> MockLndHubClient {
        let mut client = MockLndHubClient::new();
        client
            .expect_auth()
            .withf(|creds| creds.login == "alice" && creds.password == "secret")
            .times(1)
            .returning(|_| Ok(session()));
        client
    }

    async fn wallet(client: MockLndHubClient) -> anyhow::Result<LndHubWallet<MockLndHubClient>> {
        Ok(WalletBuilder::new(client)
            .with_credentials(Credentials::new("alice", "secret"))
            .build()
            .await?)
    }

    fn raw_invoice(hash_byte: u8, ispaid: bool) -> RawInvoice {
        serde_json::from_value(json!({
            "r_hash": {"type": "Buffer", "data": vec![hash_byte; 32]},
            "payment_request": format!("lnbc{hash_byte}"),
            "amt": 100,
            "ispaid": ispaid
        }))
        .expect("valid invoice")
    }

    fn r_hash(hash_byte: u8) -> String {
        general_purpose::STANDARD.encode(vec![hash_byte; 32])
    }

    #[tokio::test]
    async fn test_build_authenticates() -> anyhow::Result<()> {
        let wallet = wallet(authenticating_client()).await?;
        assert!(wallet.is_authenticated());
        assert_eq!(wallet.session(), Some(&session()));
        assert_eq!(wallet.credentials().map(|c| c.login.as_str()), Some("alice"));
        Ok(())
    }

    #[tokio::test]
    async fn test_build_propagates_auth_failure() {
        let mut client = MockLndHubClient::new();
        client.expect_auth().returning(|_| {
            Err(LndHubWalletError::Transport {
                url: "https://lndhub.example.com/auth".to_owned(),
                status: 401,
                body: "bad auth".to_owned(),
            })
        });

        let result = WalletBuilder::new(client)
            .with_credentials(Credentials::new("alice", "wrong"))
            .build()
            .await;
        assert!(matches!(
            result,
            Err(LndHubWalletError::Transport { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_anonymous_wallet_only_creates_accounts() -> anyhow::Result<()> {
        let mut client = MockLndHubClient::new();
        client.expect_auth().never();
        client.expect_get_balance().never();
        client.expect_get_user_invoices().never();
        client.expect_pay_invoice().never();
        client
            .expect_create_account()
            .times(1)
            .returning(|| Ok(Credentials::new("new-login", "new-password")));

        let wallet = WalletBuilder::new(client).build().await?;
        assert!(!wallet.is_authenticated());

        let creds = wallet.create_account().await?;
        assert_eq!(creds, Credentials::new("new-login", "new-password"));

        assert!(matches!(
            wallet.balance().await,
            Err(LndHubWalletError::CredentialsMissing {
                operation: "balance"
            })
        ));
        assert!(matches!(
            wallet.lookup_invoice("abc", 10).await,
            Err(LndHubWalletError::CredentialsMissing { .. })
        ));
        assert!(matches!(
            wallet.pay_invoice("not even an invoice", None).await,
            Err(LndHubWalletError::CredentialsMissing { .. })
        ));
        assert!(matches!(
            wallet.create_invoice(1, "memo").await,
            Err(LndHubWalletError::CredentialsMissing { .. })
        ));
        assert!(matches!(
            wallet.node_info().await,
            Err(LndHubWalletError::CredentialsMissing { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_invoice_normalizes_r_hash() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        let raw = read_fixture_as::<RawInvoice>("addinvoice.json")?;
        client
            .expect_add_invoice()
            .withf(|token, amt, memo| token == "access" && *amt == 100 && memo == "coffee")
            .times(1)
            .returning(move |_, _, _| Ok(raw.clone()));

        let invoice = wallet(client).await?.create_invoice(100, "coffee").await?;
        assert_eq!(invoice.r_hash, r_hash(0x33));
        assert_eq!(invoice.payment_request, "lnbc1u1pjaddinvoice");
        Ok(())
    }

    #[tokio::test]
    async fn test_pay_invoice_error_body() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        client.expect_pay_invoice().times(1).returning(|_, _, _| {
            Ok(serde_json::from_value(json!({
                "error": true,
                "message": "insufficient funds",
                "code": "E1"
            }))?)
        });

        let err = wallet(client)
            .await?
            .pay_invoice(INVOICE_21_SAT, None)
            .await
            .expect_err("payment should fail");
        match err {
            LndHubWalletError::PaymentFailed {
                invoice,
                message,
                code,
            } => {
                assert_eq!(invoice, INVOICE_21_SAT);
                assert_eq!(message, "insufficient funds");
                assert_eq!(code, "E1");
            }
            other => panic!("unexpected error {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_pay_invoice_drops_amount_for_invoice_with_amount() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        client
            .expect_pay_invoice()
            .withf(|token, invoice, amount| {
                token == "access" && invoice == INVOICE_21_SAT && amount.is_none()
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(serde_json::from_value(json!({
                    "payment_error": "",
                    "payment_preimage": "00ff"
                }))?)
            });

        let response = wallet(client)
            .await?
            .pay_invoice(INVOICE_21_SAT, Some(500))
            .await?;
        assert!(!response.error);
        assert_eq!(response.extra.get("payment_preimage"), Some(&json!("00ff")));
        Ok(())
    }

    #[tokio::test]
    async fn test_pay_invoice_rejects_garbage() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        client.expect_pay_invoice().never();

        let result = wallet(client).await?.pay_invoice("lnbc...", None).await;
        assert!(matches!(
            result,
            Err(LndHubWalletError::DecodeInvoice(ref pr, _)) if pr == "lnbc..."
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_paginate_until_short_page() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        client
            .expect_get_user_invoices()
            .withf(|_, limit, offset| *limit == 2 && *offset == 0)
            .times(1)
            .returning(|_, _, _| Ok(vec![raw_invoice(1, true), raw_invoice(2, false)]));
        client
            .expect_get_user_invoices()
            .withf(|_, limit, offset| *limit == 2 && *offset == 2)
            .times(1)
            .returning(|_, _, _| Ok(vec![raw_invoice(3, true), raw_invoice(4, false)]));
        client
            .expect_get_user_invoices()
            .withf(|_, limit, offset| *limit == 2 && *offset == 4)
            .times(1)
            .returning(|_, _, _| Ok(vec![raw_invoice(5, false)]));

        let invoices = wallet(client).await?.list_invoices_paginated(2).await?;
        let hashes = invoices.iter().map(|i| i.r_hash.clone()).collect::<Vec<_>>();
        assert_eq!(
            hashes,
            vec![r_hash(1), r_hash(2), r_hash(3), r_hash(4), r_hash(5)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_paginate_stops_when_offset_is_ignored() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        client
            .expect_get_user_invoices()
            .times(2)
            .returning(|_, _, _| Ok(vec![raw_invoice(1, true), raw_invoice(2, false)]));

        let invoices = wallet(client).await?.list_invoices_paginated(2).await?;
        assert_eq!(invoices.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_paginate_zero_limit() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        client.expect_get_user_invoices().never();
        assert!(wallet(client).await?.list_invoices_paginated(0).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_invoice_refreshes_every_time() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        let mut seq = mockall::Sequence::new();
        client
            .expect_get_user_invoices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![raw_invoice(1, false), raw_invoice(2, false)]));
        client
            .expect_get_user_invoices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![raw_invoice(1, true)]));

        let wallet = wallet(client).await?;

        let found = wallet.lookup_invoice(&r_hash(1), 1000).await?;
        assert!(found.is_some_and(|i| !i.ispaid));

        // second lookup sees the new state and the dropped invoice
        let found = wallet.lookup_invoice(&r_hash(1), 1000).await?;
        assert!(found.is_some_and(|i| i.ispaid));
        assert_eq!(wallet.invoices.get(&r_hash(2)).await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_invoice_from_fixture() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        let invoices = read_fixture_as::<Vec<RawInvoice>>("getuserinvoices.json")?;
        client
            .expect_get_user_invoices()
            .times(2)
            .returning(move |_, _, _| Ok(invoices.clone()));

        let wallet = wallet(client).await?;
        let paid = wallet
            .lookup_invoice(&r_hash(0x11), DEFAULT_LOOKBACK_LIMIT)
            .await?
            .expect("invoice present");
        assert!(paid.ispaid);
        assert_eq!(paid.amt, Some(100));

        assert_eq!(
            wallet.lookup_invoice("not-a-hash", DEFAULT_LOOKBACK_LIMIT).await?,
            None
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_payment() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        let mut seq = mockall::Sequence::new();
        client
            .expect_get_user_invoices()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![raw_invoice(7, false)]));
        client
            .expect_get_user_invoices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![raw_invoice(7, true)]));

        let invoice = wallet(client)
            .await?
            .wait_for_payment(&r_hash(7), Duration::from_secs(60), 100)
            .await?;
        assert!(invoice.ispaid);
        Ok(())
    }

    #[tokio::test]
    async fn test_wait_for_unknown_invoice() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        client
            .expect_get_user_invoices()
            .returning(|_, _, _| Ok(vec![]));

        let result = wallet(client)
            .await?
            .wait_for_payment("missing", Duration::from_secs(1), 100)
            .await;
        assert!(matches!(result, Err(LndHubWalletError::InvoiceNotFound(h)) if h == "missing"));
        Ok(())
    }

    #[tokio::test]
    async fn test_balance() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        let mut seq = mockall::Sequence::new();
        client
            .expect_get_balance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(serde_json::from_value::<BalanceResponse>(json!({"BTC": {"AvailableBalance": 4242}}))?));
        client
            .expect_get_balance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(BalanceResponse::default()));

        let wallet = wallet(client).await?;
        assert_eq!(wallet.balance().await?, 4242);
        assert_eq!(wallet.balance().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_onchain_address() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        let mut seq = mockall::Sequence::new();
        client
            .expect_get_btc()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(vec![
                    BtcAddress {
                        address: "bc1qfirst".to_owned(),
                    },
                    BtcAddress {
                        address: "bc1qsecond".to_owned(),
                    },
                ])
            });
        client
            .expect_get_btc()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));

        let wallet = wallet(client).await?;
        assert_eq!(wallet.onchain_address().await?, "bc1qfirst");
        assert!(matches!(
            wallet.onchain_address().await,
            Err(LndHubWalletError::NoOnchainAddress)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_node_info_passthrough() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        let info = read_fixture_as::<Value>("getinfo.json")?;
        let expected = info.clone();
        client
            .expect_get_info()
            .withf(|token| token == "access")
            .returning(move |_| Ok(info.clone()));

        assert_eq!(wallet(client).await?.node_info().await?, expected);
        Ok(())
    }

    #[tokio::test]
    async fn test_rate_limit_error_propagates() -> anyhow::Result<()> {
        let mut client = authenticating_client();
        client.expect_get_balance().returning(|_| {
            Err(LndHubWalletError::RateLimitExceeded {
                remaining: 3,
                headers: Default::default(),
            })
        });

        assert!(matches!(
            wallet(client).await?.balance().await,
            Err(LndHubWalletError::RateLimitExceeded { remaining: 3, .. })
        ));
        Ok(())
    }
}
