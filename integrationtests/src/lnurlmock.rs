use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::sync::Mutex;
use url::Url;

/// Users known to the mock:
///
/// - `alice` pays out [`crate::INVOICE_21_SAT`]
/// - `noinvoice` has a callback that answers without `pr`
/// - `withdraw` serves a withdraw request instead of a pay request
/// - `broken` answers with 500
/// - `garbled` serves a pay request that is not JSON
/// - `badcallback` advertises a callback that is not a url
/// - `cberror` has a callback answering `{"status": "ERROR"}`
/// - `htmlcallback` has a callback answering with an html page
///
/// every other user gets `{"status": "ERROR"}`
#[derive(Debug, Default)]
pub struct LnurlMockState {
    pub addr: Option<SocketAddr>,
    pub callback_queries: Vec<HashMap<String, String>>,
}

pub type SharedState = Arc<Mutex<LnurlMockState>>;

async fn get_pay_request(
    State(state): State<SharedState>,
    Path(user): Path<String>,
) -> Response {
    let state = state.lock().await;
    let addr = match state.addr {
        Some(addr) => addr,
        None => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
    };
    let callback = format!("http://{addr}/callback/{user}");

    match user.as_str() {
        "alice" | "noinvoice" | "cberror" | "htmlcallback" => Json(json!({
            "tag": "payRequest",
            "minSendable": 1000,
            "maxSendable": 100000000,
            "callback": callback,
            "metadata": "[[\"text/plain\",\"pay alice\"]]",
            "commentAllowed": 255
        }))
        .into_response(),
        "withdraw" => Json(json!({
            "tag": "withdrawRequest",
            "minSendable": 1000,
            "maxSendable": 100000000,
            "callback": callback
        }))
        .into_response(),
        "badcallback" => Json(json!({
            "tag": "payRequest",
            "minSendable": 1000,
            "maxSendable": 100000000,
            "callback": "not a url"
        }))
        .into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "garbled" => "<html>oops</html>".into_response(),
        _ => Json(json!({"status": "ERROR", "reason": format!("unknown user {user}")}))
            .into_response(),
    }
}

async fn get_callback(
    State(state): State<SharedState>,
    Path(user): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().await;
    state.callback_queries.push(query);

    match user.as_str() {
        "alice" => Json(json!({"pr": crate::INVOICE_21_SAT, "routes": []})).into_response(),
        "cberror" => {
            Json(json!({"status": "ERROR", "reason": "no route to alice"})).into_response()
        }
        "htmlcallback" => "<html>oops</html>".into_response(),
        _ => Json(json!({"routes": []})).into_response(),
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/.well-known/lnurlp/:user", get(get_pay_request))
        .route("/callback/:user", get(get_callback))
        .with_state(state)
}

/// Starts the mock, returning the state handle and a function building the pay request url
/// for a user.
pub async fn start() -> anyhow::Result<(SharedState, impl Fn(&str) -> anyhow::Result<Url>)> {
    let state = Arc::new(Mutex::new(LnurlMockState::default()));
    let addr = crate::serve(router(state.clone())).await?;
    state.lock().await.addr = Some(addr);

    let url_for = move |user: &str| -> anyhow::Result<Url> {
        Ok(Url::parse(&format!(
            "http://{addr}/.well-known/lnurlp/{user}"
        ))?)
    };
    Ok((state, url_for))
}
