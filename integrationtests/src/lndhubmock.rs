use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

pub const LOGIN: &str = "2073a1b8d4d5a9a0e4a1";
pub const PASSWORD: &str = "a35e2d10f7c4b3b1c0de";
pub const ACCESS_TOKEN: &str = "a1b2c3d4e5f6a7b8c9d0";
pub const REFRESH_TOKEN: &str = "0d9c8b7a6f5e4d3c2b1a";

/// Mutable behavior and recorded traffic of the mock backend.
#[derive(Debug, Clone)]
pub struct LndHubMockState {
    pub invoices: Vec<Value>,
    /// Sent as `X-Ratelimit-Remaining` when set
    pub rate_limit_remaining: Option<u64>,
    /// Number of upcoming `/getinfo` calls answered with 503
    pub getinfo_unavailable: u32,
    pub pay_status: StatusCode,
    pub pay_response: Value,
    pub balance: Value,
    pub addresses: Value,

    pub authorization_headers: Vec<String>,
    pub pay_requests: Vec<PayForm>,
    pub getinfo_calls: u32,
    pub invoice_queries: Vec<InvoiceQuery>,
}

impl Default for LndHubMockState {
    fn default() -> Self {
        Self {
            invoices: vec![],
            rate_limit_remaining: None,
            getinfo_unavailable: 0,
            pay_status: StatusCode::OK,
            pay_response: json!({"payment_error": "", "payment_preimage": "00ff"}),
            balance: json!({"BTC": {"AvailableBalance": 1337}}),
            addresses: json!([{"address": "bc1qmockaddress"}]),
            authorization_headers: vec![],
            pay_requests: vec![],
            getinfo_calls: 0,
            invoice_queries: vec![],
        }
    }
}

pub type SharedState = Arc<Mutex<LndHubMockState>>;

#[derive(Debug, Clone, Deserialize)]
pub struct PayForm {
    pub invoice: String,
    pub amount: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceQuery {
    pub limit: u64,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CreateForm {
    partnerid: String,
    accounttype: String,
}

#[derive(Debug, Deserialize)]
struct AuthForm {
    login: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct AddInvoiceForm {
    amt: u64,
    memo: String,
}

fn respond(state: &LndHubMockState, status: StatusCode, body: Value) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(remaining) = state.rate_limit_remaining {
        headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    }
    (status, headers, Json(body)).into_response()
}

/// Records the authorization header, returns an error response when it is wrong.
fn authorize(state: &mut LndHubMockState, headers: &HeaderMap) -> Result<(), Response> {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    state.authorization_headers.push(authorization.clone());
    if authorization != ACCESS_TOKEN {
        return Err(respond(
            state,
            StatusCode::UNAUTHORIZED,
            json!({"error": true, "code": 1, "message": "bad auth"}),
        ));
    }
    Ok(())
}

async fn post_create(State(state): State<SharedState>, Form(form): Form<CreateForm>) -> Response {
    let state = state.lock().await;
    if form.partnerid != "bluewallet" || form.accounttype != "common" {
        return respond(&state, StatusCode::BAD_REQUEST, json!({"error": true}));
    }
    respond(
        &state,
        StatusCode::OK,
        json!({"login": LOGIN, "password": PASSWORD}),
    )
}

async fn post_auth(State(state): State<SharedState>, Form(form): Form<AuthForm>) -> Response {
    let state = state.lock().await;
    if form.login != LOGIN || form.password != PASSWORD {
        return respond(
            &state,
            StatusCode::UNAUTHORIZED,
            json!({"error": true, "code": 1, "message": "bad auth"}),
        );
    }
    respond(
        &state,
        StatusCode::OK,
        json!({"access_token": ACCESS_TOKEN, "refresh_token": REFRESH_TOKEN}),
    )
}

async fn post_add_invoice(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<AddInvoiceForm>,
) -> Response {
    let mut state = state.lock().await;
    if let Err(response) = authorize(&mut state, &headers) {
        return response;
    }

    let index = state.invoices.len() + 1;
    let r_hash = vec![index as u8; 32];
    let payment_request = format!("lnbcmock{index}");
    state.invoices.push(json!({
        "r_hash": {"type": "Buffer", "data": r_hash},
        "payment_request": payment_request,
        "description": form.memo,
        "amt": form.amt,
        "ispaid": false,
        "add_index": index.to_string(),
        "type": "user_invoice"
    }));

    let body = json!({
        "r_hash": {"type": "Buffer", "data": r_hash},
        "payment_request": payment_request,
        "pay_req": payment_request,
        "add_index": index.to_string()
    });
    respond(&state, StatusCode::OK, body)
}

async fn post_pay_invoice(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<PayForm>,
) -> Response {
    let mut state = state.lock().await;
    if let Err(response) = authorize(&mut state, &headers) {
        return response;
    }
    state.pay_requests.push(form);
    let (status, body) = (state.pay_status, state.pay_response.clone());
    respond(&state, status, body)
}

async fn get_user_invoices(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<InvoiceQuery>,
) -> Response {
    let mut state = state.lock().await;
    if let Err(response) = authorize(&mut state, &headers) {
        return response;
    }
    state.invoice_queries.push(query.clone());

    let page = state
        .invoices
        .iter()
        .skip(query.offset.unwrap_or_default() as usize)
        .take(query.limit as usize)
        .cloned()
        .collect::<Vec<_>>();
    respond(&state, StatusCode::OK, Value::Array(page))
}

async fn get_balance(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut state = state.lock().await;
    if let Err(response) = authorize(&mut state, &headers) {
        return response;
    }
    let body = state.balance.clone();
    respond(&state, StatusCode::OK, body)
}

async fn get_btc(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut state = state.lock().await;
    if let Err(response) = authorize(&mut state, &headers) {
        return response;
    }
    let body = state.addresses.clone();
    respond(&state, StatusCode::OK, body)
}

async fn get_info(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut state = state.lock().await;
    if let Err(response) = authorize(&mut state, &headers) {
        return response;
    }
    state.getinfo_calls += 1;
    if state.getinfo_unavailable > 0 {
        state.getinfo_unavailable -= 1;
        return respond(
            &state,
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": true, "message": "try again"}),
        );
    }
    respond(
        &state,
        StatusCode::OK,
        json!({"alias": "LndHub mock", "block_height": 800000, "synced_to_chain": true}),
    )
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/create", post(post_create))
        .route("/auth", post(post_auth))
        .route("/addinvoice", post(post_add_invoice))
        .route("/payinvoice", post(post_pay_invoice))
        .route("/getuserinvoices", get(get_user_invoices))
        .route("/balance", get(get_balance))
        .route("/getbtc", get(get_btc))
        .route("/getinfo", get(get_info))
        .with_state(state)
}

/// Starts a mock lndhub backend, returning its address and a handle to its state.
pub async fn start(state: LndHubMockState) -> anyhow::Result<(SocketAddr, SharedState)> {
    let state = Arc::new(Mutex::new(state));
    let addr = crate::serve(router(state.clone())).await?;
    Ok((addr, state))
}
