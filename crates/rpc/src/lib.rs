use axum::{routing::get, Router, Json, extract::{Path, Query, WebSocketUpgrade, ws::{Message, WebSocket}}, response::IntoResponse};
use serde::{Serialize, Deserialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tower_http::cors::{CorsLayer, Any};
use axum::http::Method;
use futures::{sink::SinkExt, stream::StreamExt};
use tessera_core::Event;
use tessera_ledger::MultiTokenLedger;

/// Wire view of a committed ledger notification, with identities rendered
/// as hex strings.
#[derive(Serialize, Clone)]
#[serde(tag = "type")]
pub enum EventView {
    #[serde(rename = "transfer_single")]
    TransferSingle {
        operator: String,
        from: String,
        to: String,
        id: String,
        amount: u64,
    },
    #[serde(rename = "transfer_batch")]
    TransferBatch {
        operator: String,
        from: String,
        to: String,
        ids: Vec<String>,
        amounts: Vec<u64>,
    },
    #[serde(rename = "approval_changed")]
    ApprovalChanged {
        owner: String,
        operator: String,
        approved: bool,
    },
    #[serde(rename = "metadata_changed")]
    MetadataChanged {
        uri: String,
        id: String,
    },
}

impl EventView {
    pub fn from_event(event: &Event) -> Self {
        match event {
            Event::TransferSingle { operator, from, to, id, amount } => EventView::TransferSingle {
                operator: hex::encode(operator),
                from: hex::encode(from),
                to: hex::encode(to),
                id: hex::encode(id),
                amount: *amount,
            },
            Event::TransferBatch { operator, from, to, ids, amounts } => EventView::TransferBatch {
                operator: hex::encode(operator),
                from: hex::encode(from),
                to: hex::encode(to),
                ids: ids.iter().map(hex::encode).collect(),
                amounts: amounts.clone(),
            },
            Event::ApprovalChanged { owner, operator, approved } => EventView::ApprovalChanged {
                owner: hex::encode(owner),
                operator: hex::encode(operator),
                approved: *approved,
            },
            Event::MetadataChanged { uri, id } => EventView::MetadataChanged {
                uri: uri.clone(),
                id: hex::encode(id),
            },
        }
    }
}

#[derive(Serialize, Clone)]
pub struct CollectionView {
    pub name: String,
    pub symbol: String,
    pub base_uri: String,
}

#[derive(Serialize, Clone)]
pub struct BalanceView {
    pub account: String,
    pub id: String,
    pub amount: u64,
}

#[derive(Serialize, Clone)]
pub struct SupplyView {
    pub id: String,
    pub minted: u64,
    pub burned: u64,
    pub circulating: u64,
}

#[derive(Serialize, Clone)]
pub struct ApprovalView {
    pub owner: String,
    pub operator: String,
    pub approved: bool,
}

#[derive(Serialize, Clone)]
pub struct UriView {
    pub id: String,
    pub uri: String,
}

#[derive(Clone)]
pub struct SharedState {
    pub ledger: Arc<RwLock<MultiTokenLedger>>,
    pub events: Arc<RwLock<Vec<EventView>>>,
    pub updates: broadcast::Sender<EventView>,
}

impl SharedState {
    pub fn new(ledger: Arc<RwLock<MultiTokenLedger>>) -> Self {
        let (updates, _) = broadcast::channel(1024);
        Self {
            ledger,
            events: Arc::new(RwLock::new(Vec::new())),
            updates,
        }
    }
}

/// Appends committed ledger events to the queryable log and fans them out
/// to WebSocket subscribers. Call with the output of `take_events()` after
/// each successful ledger invocation.
pub async fn publish_events(state: &SharedState, committed: Vec<Event>) {
    let mut log = state.events.write().await;
    for event in &committed {
        let view = EventView::from_event(event);
        log.push(view.clone());
        let _ = state.updates.send(view);
    }
}

fn parse_key(s: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(s).ok()?;
    let mut out = [0u8; 32];
    if bytes.len() != 32 {
        return None;
    }
    out.copy_from_slice(&bytes);
    Some(out)
}

#[derive(Deserialize)]
struct Pagination {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn collection(state: axum::extract::State<SharedState>) -> Json<CollectionView> {
    let ledger = state.ledger.read().await;
    let config = ledger.config();
    Json(CollectionView {
        name: config.name.clone(),
        symbol: config.symbol.clone(),
        base_uri: config.base_uri.clone(),
    })
}

async fn balance(
    Path((account, id)): Path<(String, String)>,
    state: axum::extract::State<SharedState>,
) -> impl IntoResponse {
    let (Some(account_key), Some(id_key)) = (parse_key(&account), parse_key(&id)) else {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    };
    let ledger = state.ledger.read().await;
    Json(BalanceView {
        account,
        id,
        amount: ledger.balance_of(account_key, id_key),
    })
    .into_response()
}

async fn supply(
    Path(id): Path<String>,
    state: axum::extract::State<SharedState>,
) -> impl IntoResponse {
    let Some(id_key) = parse_key(&id) else {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    };
    let ledger = state.ledger.read().await;
    Json(SupplyView {
        id,
        minted: ledger.total_minted(id_key),
        burned: ledger.total_burned(id_key),
        circulating: ledger.total_supply(id_key),
    })
    .into_response()
}

async fn approval(
    Path((owner, operator)): Path<(String, String)>,
    state: axum::extract::State<SharedState>,
) -> impl IntoResponse {
    let (Some(owner_key), Some(operator_key)) = (parse_key(&owner), parse_key(&operator)) else {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    };
    let ledger = state.ledger.read().await;
    Json(ApprovalView {
        owner,
        operator,
        approved: ledger.is_approved_for_all(owner_key, operator_key),
    })
    .into_response()
}

async fn uri(
    Path(id): Path<String>,
    state: axum::extract::State<SharedState>,
) -> impl IntoResponse {
    let Some(id_key) = parse_key(&id) else {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    };
    let ledger = state.ledger.read().await;
    Json(UriView {
        uri: ledger.uri(id_key),
        id,
    })
    .into_response()
}

async fn events(
    Query(p): Query<Pagination>,
    state: axum::extract::State<SharedState>,
) -> Json<Vec<EventView>> {
    let limit = p.limit.unwrap_or(100).min(100);
    let offset = p.offset.unwrap_or(0);

    let log = state.events.read().await;
    let total = log.len();
    if offset >= total {
        return Json(vec![]);
    }
    let end = (offset + limit).min(total);
    Json(log[offset..end].to_vec())
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    state: axum::extract::State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.0))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.updates.subscribe();

    let mut send_task = tokio::spawn(async move {
        while let Ok(update) = rx.recv().await {
            if let Ok(msg) = serde_json::to_string(&update) {
                if sender.send(Message::Text(msg)).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            if let Ok(Message::Close(_)) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

pub async fn run_api(state: SharedState, addr: SocketAddr) {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = Router::new()
        .route("/collection", get(collection))
        .route("/balance/:account/:id", get(balance))
        .route("/supply/:id", get(supply))
        .route("/approval/:owner/:operator", get(approval))
        .route("/uri/:id", get(uri))
        .route("/events", get(events))
        .route("/ws", get(websocket_handler))
        .layer(cors)
        .with_state(state);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
