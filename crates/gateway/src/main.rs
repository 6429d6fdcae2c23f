//! Write-path gateway for the Tessera ledger
//!
//! Maps JSON requests onto ledger operations. The ledger library treats the
//! caller identity as a trusted parameter, so the capability decisions live
//! here: requests carry the caller address they act as, and the mint and
//! metadata endpoints additionally require the administrative key. A real
//! deployment would replace the caller field with signature recovery.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use tessera_ledger::{CollectionConfig, LedgerError, MultiTokenLedger};

const ADMIN_KEY_HEADER: &str = "x-admin-key";

#[derive(Clone)]
struct Gateway {
    ledger: Arc<RwLock<MultiTokenLedger>>,
    admin_key: Option<String>,
}

#[derive(Deserialize)]
struct TransferRequest {
    caller: String,
    from: String,
    to: String,
    id: String,
    amount: u64,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize)]
struct BatchTransferRequest {
    caller: String,
    from: String,
    to: String,
    ids: Vec<String>,
    amounts: Vec<u64>,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize)]
struct MintRequest {
    caller: String,
    to: String,
    id: String,
    amount: u64,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize)]
struct BatchMintRequest {
    caller: String,
    to: String,
    ids: Vec<String>,
    amounts: Vec<u64>,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize)]
struct BurnRequest {
    caller: String,
    from: String,
    id: String,
    amount: u64,
}

#[derive(Deserialize)]
struct ApprovalRequest {
    caller: String,
    operator: String,
    approved: bool,
}

#[derive(Deserialize)]
struct UriRequest {
    id: String,
    uri: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let admin_key = std::env::var("GATEWAY_ADMIN_KEY").ok();
    if admin_key.is_none() {
        warn!("GATEWAY_ADMIN_KEY not set, mint and uri endpoints are disabled");
    }

    let gateway = Gateway {
        ledger: Arc::new(RwLock::new(MultiTokenLedger::new(CollectionConfig::default()))),
        admin_key,
    };

    let app = Router::new()
        .route("/transfer", post(transfer))
        .route("/transfer_batch", post(transfer_batch))
        .route("/mint", post(mint))
        .route("/mint_batch", post(mint_batch))
        .route("/burn", post(burn))
        .route("/approve", post(approve))
        .route("/uri", post(set_uri))
        .with_state(gateway);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    let listener = TcpListener::bind(addr).await?;
    info!("Gateway listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn parse_key(s: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(s).ok()?;
    bytes.try_into().ok()
}

fn parse_keys(strings: &[String]) -> Option<Vec<[u8; 32]>> {
    strings.iter().map(|s| parse_key(s)).collect()
}

fn bad_request() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: "identities must be 32-byte hex".to_string(),
        }),
    )
        .into_response()
}

fn ledger_error(err: LedgerError) -> Response {
    let status = match err {
        LedgerError::Unauthorized | LedgerError::SelfApprovalForbidden => StatusCode::FORBIDDEN,
        LedgerError::InsufficientBalance { .. } | LedgerError::RecipientRejected => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn require_admin(gateway: &Gateway, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = gateway.admin_key.as_deref() else {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorBody {
                error: "administrative endpoints are disabled".to_string(),
            }),
        )
            .into_response());
    };
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented != Some(expected) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "missing or wrong admin key".to_string(),
            }),
        )
            .into_response());
    }
    Ok(())
}

async fn transfer(State(gateway): State<Gateway>, Json(req): Json<TransferRequest>) -> Response {
    let (Some(caller), Some(from), Some(to), Some(id)) = (
        parse_key(&req.caller),
        parse_key(&req.from),
        parse_key(&req.to),
        parse_key(&req.id),
    ) else {
        return bad_request();
    };

    let mut ledger = gateway.ledger.write().await;
    match ledger.safe_transfer_from(caller, from, to, id, req.amount, req.data.as_bytes()) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ledger_error(e),
    }
}

async fn transfer_batch(
    State(gateway): State<Gateway>,
    Json(req): Json<BatchTransferRequest>,
) -> Response {
    let (Some(caller), Some(from), Some(to), Some(ids)) = (
        parse_key(&req.caller),
        parse_key(&req.from),
        parse_key(&req.to),
        parse_keys(&req.ids),
    ) else {
        return bad_request();
    };

    let mut ledger = gateway.ledger.write().await;
    match ledger.safe_batch_transfer_from(caller, from, to, &ids, &req.amounts, req.data.as_bytes())
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ledger_error(e),
    }
}

async fn mint(
    State(gateway): State<Gateway>,
    headers: HeaderMap,
    Json(req): Json<MintRequest>,
) -> Response {
    if let Err(resp) = require_admin(&gateway, &headers) {
        return resp;
    }
    let (Some(caller), Some(to), Some(id)) = (
        parse_key(&req.caller),
        parse_key(&req.to),
        parse_key(&req.id),
    ) else {
        return bad_request();
    };

    let mut ledger = gateway.ledger.write().await;
    match ledger.mint(caller, to, id, req.amount, req.data.as_bytes()) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ledger_error(e),
    }
}

async fn mint_batch(
    State(gateway): State<Gateway>,
    headers: HeaderMap,
    Json(req): Json<BatchMintRequest>,
) -> Response {
    if let Err(resp) = require_admin(&gateway, &headers) {
        return resp;
    }
    let (Some(caller), Some(to), Some(ids)) = (
        parse_key(&req.caller),
        parse_key(&req.to),
        parse_keys(&req.ids),
    ) else {
        return bad_request();
    };

    let mut ledger = gateway.ledger.write().await;
    match ledger.mint_batch(caller, to, &ids, &req.amounts, req.data.as_bytes()) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ledger_error(e),
    }
}

async fn burn(State(gateway): State<Gateway>, Json(req): Json<BurnRequest>) -> Response {
    let (Some(caller), Some(from), Some(id)) = (
        parse_key(&req.caller),
        parse_key(&req.from),
        parse_key(&req.id),
    ) else {
        return bad_request();
    };

    let mut ledger = gateway.ledger.write().await;
    match ledger.burn(caller, from, id, req.amount) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ledger_error(e),
    }
}

async fn approve(State(gateway): State<Gateway>, Json(req): Json<ApprovalRequest>) -> Response {
    let (Some(caller), Some(operator)) = (parse_key(&req.caller), parse_key(&req.operator)) else {
        return bad_request();
    };

    let mut ledger = gateway.ledger.write().await;
    match ledger.set_approval_for_all(caller, operator, req.approved) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ledger_error(e),
    }
}

async fn set_uri(
    State(gateway): State<Gateway>,
    headers: HeaderMap,
    Json(req): Json<UriRequest>,
) -> Response {
    if let Err(resp) = require_admin(&gateway, &headers) {
        return resp;
    }
    let Some(id) = parse_key(&req.id) else {
        return bad_request();
    };

    let mut ledger = gateway.ledger.write().await;
    match ledger.set_uri(id, req.uri) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ledger_error(e),
    }
}
