use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use confab_agent::{ProfileContext, ProfileKind};
use confab_cli::{build_router, AppState};
use confab_config::AppConfig;
use confab_llm::{ApiKeyCredential, ScriptedProvider};
use confab_sandbox::{LocalExecutor, WorkDir};

struct Harness {
    state: Arc<AppState>,
    provider: Arc<ScriptedProvider>,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new(script: Vec<confab_core::LlmResponse>, kinds: &[ProfileKind]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test-secret-key".into());
        config.session.summary_path = dir.path().join("chat_summary.txt").display().to_string();
        config.session.analysis_path = dir.path().join("final_analysis.md").display().to_string();

        let provider = Arc::new(ScriptedProvider::new(script));
        let work_dir = WorkDir::new(dir.path().join("coder_output"));
        let ctx = ProfileContext::new(
            config,
            provider.clone(),
            Arc::new(ApiKeyCredential::new("k")),
            Arc::new(LocalExecutor::new(work_dir, 10)),
        );
        Self {
            state: Arc::new(AppState::new(&ctx, kinds)),
            provider,
            dir,
        }
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_and_profiles() {
    let harness = Harness::new(Vec::new(), &[ProfileKind::Multitools, ProfileKind::Coder]);

    let (status, body) = send(harness.router(), get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "confab");

    let (status, body) = send(harness.router(), get("/api/profiles")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["profiles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["multitools", "coder"]);
    assert_eq!(body["profiles"][1]["agents"], json!(["User_proxy", "Assistant"]));
}

#[tokio::test]
async fn test_index_page() {
    let harness = Harness::new(Vec::new(), &[ProfileKind::Vision]);
    let response = harness.router().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("/api/profiles"));
}

#[tokio::test]
async fn test_config_is_redacted() {
    let harness = Harness::new(Vec::new(), &[ProfileKind::Vision]);
    let (status, body) = send(harness.router(), get("/api/config")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["llm"]["apiKey"], "sk-t***");
}

#[tokio::test]
async fn test_chat_exchange_and_transcript() {
    let harness = Harness::new(
        vec![ScriptedProvider::text("Hello there. TERMINATE")],
        &[ProfileKind::Multitools],
    );

    let (status, body) = send(
        harness.router(),
        post_json("/api/profiles/multitools/chat", json!({"message": "Hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["status"], "completed");
    assert_eq!(body["outcome"]["result"]["summary"], "Hello there.");
    assert_eq!(body["outcome"]["result"]["stopReason"], "terminated");

    let (_, body) = send(harness.router(), get("/api/profiles/multitools/transcript")).await;
    let senders: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["sender"].as_str().unwrap())
        .collect();
    assert_eq!(senders, vec!["User", "Assistant"]);
    assert_eq!(body["busy"], false);
}

#[tokio::test]
async fn test_chat_fault_is_reported_inline() {
    let harness = Harness::new(Vec::new(), &[ProfileKind::Multitools]);
    let (status, body) = send(
        harness.router(),
        post_json("/api/profiles/multitools/chat", json!({"message": "Hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["status"], "faulted");
    assert!(body["outcome"]["message"]
        .as_str()
        .unwrap()
        .starts_with("An error occurred: "));
}

#[tokio::test]
async fn test_busy_profile_conflicts() {
    let harness = Harness::new(Vec::new(), &[ProfileKind::Multitools]);
    let _guard = harness
        .state
        .slot(ProfileKind::Multitools)
        .unwrap()
        .state
        .lock()
        .await;

    let (status, _) = send(
        harness.router(),
        post_json("/api/profiles/multitools/chat", json!({"message": "Hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(harness.provider.requests().is_empty());
}

#[tokio::test]
async fn test_blank_input_and_unknown_profile() {
    let harness = Harness::new(Vec::new(), &[ProfileKind::Multitools]);

    let (status, _) = send(
        harness.router(),
        post_json("/api/profiles/multitools/chat", json!({"message": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        harness.router(),
        post_json("/api/profiles/groupchat/chat", json!({"message": "Hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_work_dir() {
    let harness = Harness::new(Vec::new(), &[ProfileKind::Coder, ProfileKind::Vision]);
    let work_dir = harness.dir.path().join("coder_output");
    std::fs::create_dir_all(&work_dir).unwrap();
    std::fs::write(work_dir.join("tmp_code_1.py"), "print(1)").unwrap();
    std::fs::write(work_dir.join("plot.png"), "png").unwrap();

    let (status, body) = send(
        harness.router(),
        post_json("/api/profiles/coder/workdir/clear", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);
    assert!(work_dir.exists());

    let (status, _) = send(
        harness.router(),
        post_json("/api/profiles/vision/workdir/clear", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analysis_endpoint() {
    let harness = Harness::new(
        vec![ScriptedProvider::text("# Findings")],
        &[ProfileKind::GroupChat],
    );

    let (status, body) = send(harness.router(), post_json("/api/analysis", json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["error"],
        "No chat data available. Please run a focus group before generating an analysis."
    );

    std::fs::write(harness.dir.path().join("chat_summary.txt"), "Admin: Plan a trip").unwrap();
    let (status, body) = send(harness.router(), post_json("/api/analysis", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysis"], "# Findings");
    let written = std::fs::read_to_string(harness.dir.path().join("final_analysis.md")).unwrap();
    assert_eq!(written, "# Findings");
}
