use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{error, info, warn};

use confab_agent::{
    ChatProfile, ExchangeOutcome, ProfileContext, ProfileKind, SessionDriver, SessionState,
    TranscriptRelay,
};
use confab_config::{redact, AppConfig};
use confab_core::{LlmProvider, RelayEvent, TranscriptWriter};

use crate::analysis::{self, Analysis, EMPTY_SUMMARY_MESSAGE};
use crate::ui;

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// One hosted profile: its driver, its relay, and the session state the
/// driver threads through.
pub struct ProfileSlot {
    pub kind: ProfileKind,
    pub driver: SessionDriver,
    pub relay: Arc<TranscriptRelay>,
    /// Held for the whole exchange; a second submit finds it locked.
    pub state: Mutex<SessionState>,
}

/// Shared application state for API handlers.
pub struct AppState {
    pub config: AppConfig,
    pub profiles: Vec<ProfileSlot>,
    pub analysis_provider: Arc<dyn LlmProvider>,
}

impl AppState {
    pub fn new(ctx: &ProfileContext, kinds: &[ProfileKind]) -> Self {
        let mut profiles: Vec<ProfileSlot> = Vec::new();
        for &kind in kinds {
            if profiles.iter().any(|p| p.kind == kind) {
                continue;
            }
            let profile = ChatProfile::build(kind, ctx);
            let relay = Arc::new(TranscriptRelay::new());
            let mut driver = SessionDriver::new(Arc::new(profile), relay.clone());
            if driver.profile().writes_summary() {
                driver = driver.with_summary(TranscriptWriter::new(&ctx.config.session.summary_path));
            }
            profiles.push(ProfileSlot {
                kind,
                driver,
                relay,
                state: Mutex::new(SessionState::default()),
            });
        }
        Self {
            config: ctx.config.clone(),
            profiles,
            analysis_provider: ctx.provider.clone(),
        }
    }

    pub fn slot(&self, kind: ProfileKind) -> Option<&ProfileSlot> {
        self.profiles.iter().find(|p| p.kind == kind)
    }

    fn slot_by_name(&self, name: &str) -> Result<&ProfileSlot, ApiError> {
        name.parse::<ProfileKind>()
            .ok()
            .and_then(|kind| self.slot(kind))
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Profile '{name}' is not hosted")))
    }
}

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/profiles", get(list_profiles))
        .route("/api/config", get(get_config))
        .route("/api/profiles/:name/chat", post(chat))
        .route("/api/profiles/:name/transcript", get(transcript))
        .route("/api/profiles/:name/workdir/clear", post(clear_work_dir))
        .route("/api/profiles/:name/ws", get(ws_handler))
        .route("/api/analysis", post(run_analysis))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(ui::INDEX_HTML)
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "confab",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_profiles(State(state): State<Arc<AppState>>) -> Json<Value> {
    let profiles: Vec<Value> = state
        .profiles
        .iter()
        .map(|slot| {
            let profile = slot.driver.profile();
            json!({
                "name": slot.kind,
                "title": profile.title(),
                "agents": profile.agent_names(),
                "busy": slot.state.try_lock().is_err(),
            })
        })
        .collect();
    Json(json!({ "profiles": profiles }))
}

/// Current configuration with secrets masked.
async fn get_config(State(state): State<Arc<AppState>>) -> ApiResult {
    let value = serde_json::to_value(&state.config).map_err(|e| {
        error!(error = %e, "Failed to serialize config");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to serialize config")
    })?;
    Ok(Json(redact(&value)))
}

#[derive(Debug, Deserialize)]
struct ChatInput {
    message: String,
}

/// Run one exchange to completion.
async fn chat(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(input): Json<ChatInput>,
) -> ApiResult {
    let slot = state.slot_by_name(&name)?;
    let Ok(mut guard) = slot.state.try_lock() else {
        return Err(api_error(
            StatusCode::CONFLICT,
            "An exchange is already in progress for this profile",
        ));
    };

    // The stored state stays intact if the request is dropped mid-exchange.
    let (next, outcome) = slot.driver.submit(guard.clone(), &input.message).await;
    let exchanges = next.exchanges;
    *guard = next;

    match &outcome {
        ExchangeOutcome::Rejected { reason } => {
            warn!(profile = %slot.kind, reason = %reason, "Input rejected");
            Err(api_error(StatusCode::BAD_REQUEST, reason.clone()))
        }
        _ => {
            info!(profile = %slot.kind, exchanges, phase = %outcome.phase(), "Exchange finished");
            Ok(Json(json!({ "profile": slot.kind, "outcome": outcome })))
        }
    }
}

/// Everything relayed for a profile since the server started.
async fn transcript(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> ApiResult {
    let slot = state.slot_by_name(&name)?;
    Ok(Json(json!({
        "profile": slot.kind,
        "busy": slot.state.try_lock().is_err(),
        "messages": slot.relay.messages(),
    })))
}

async fn clear_work_dir(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> ApiResult {
    let slot = state.slot_by_name(&name)?;
    let work_dir = slot.driver.profile().work_dir().ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("Profile '{name}' has no working directory"),
        )
    })?;
    let Ok(_guard) = slot.state.try_lock() else {
        return Err(api_error(
            StatusCode::CONFLICT,
            "An exchange is already in progress for this profile",
        ));
    };

    let removed = work_dir.clear().await.map_err(|e| {
        error!(error = %e, path = %work_dir.path().display(), "Failed to clear work dir");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    info!(profile = %slot.kind, removed, "Cleared work dir");
    Ok(Json(json!({ "removed": removed })))
}

/// WebSocket handler for live relay events.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let relay = state.slot_by_name(&name)?.relay.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, relay)))
}

async fn handle_socket(socket: WebSocket, relay: Arc<TranscriptRelay>) {
    let (mut sender, mut receiver) = socket.split();
    let mut stream = BroadcastStream::new(relay.subscribe());

    loop {
        tokio::select! {
            event = stream.next() => {
                let Some(event) = event else {
                    break;
                };
                let Some(frame) = relay_frame(event) else {
                    continue;
                };
                if sender.send(frame).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}

/// A slow subscriber skips the events it missed and keeps the socket open.
fn relay_frame(event: Result<RelayEvent, BroadcastStreamRecvError>) -> Option<Message> {
    match event {
        Ok(event) => serde_json::to_string(&event).ok().map(Message::Text),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "WebSocket subscriber lagged behind the relay");
            None
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AnalysisInput {
    summary_path: Option<PathBuf>,
    out_path: Option<PathBuf>,
}

async fn run_analysis(
    State(state): State<Arc<AppState>>,
    body: Option<Json<AnalysisInput>>,
) -> ApiResult {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let summary = input
        .summary_path
        .unwrap_or_else(|| PathBuf::from(&state.config.session.summary_path));
    let out = input
        .out_path
        .unwrap_or_else(|| PathBuf::from(&state.config.session.analysis_path));

    let result = analysis::analyze(state.analysis_provider.as_ref(), &state.config.llm, &summary, &out)
        .await
        .map_err(|e| {
            error!(error = %e, "Analysis failed");
            api_error(StatusCode::BAD_GATEWAY, format!("An error occurred: {e}"))
        })?;

    match result {
        Analysis::NoChatData => Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, EMPTY_SUMMARY_MESSAGE)),
        Analysis::Written { markdown, path } => Ok(Json(json!({
            "analysis": markdown,
            "path": path,
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::SessionPhase;
    use tokio::sync::broadcast;

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_receiving() {
        let (tx, rx) = broadcast::channel(2);
        let mut stream = BroadcastStream::new(rx);
        for phase in [
            SessionPhase::AwaitingReply,
            SessionPhase::ToolDispatch,
            SessionPhase::AwaitingReply,
            SessionPhase::Terminated,
        ] {
            tx.send(RelayEvent::Phase { phase }).unwrap();
        }
        drop(tx);

        let mut frames = Vec::new();
        let mut lagged = 0;
        while let Some(event) = stream.next().await {
            if event.is_err() {
                lagged += 1;
            }
            if let Some(Message::Text(text)) = relay_frame(event) {
                frames.push(text);
            }
        }

        assert_eq!(lagged, 1);
        assert_eq!(frames.len(), 2);
        assert!(frames[1].contains("terminated"));
    }
}
