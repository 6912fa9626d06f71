use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use nudge_infra::{Config, NudgeContext, StorageConfig};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One request captured by the test webhook receiver
#[derive(Debug, Clone)]
pub struct ReceivedDelivery {
    pub reminder_id: Option<String>,
    pub attempts: Option<String>,
    pub message_id: Option<String>,
    pub research_id: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Clone, Default)]
struct HookState {
    requests: Arc<Mutex<Vec<ReceivedDelivery>>>,
    fail_budget: Arc<AtomicI64>,
}

/// In-process webhook receiver bound to an ephemeral port. Responds 500 to
/// the first `fail_first` requests and 200 afterwards, recording everything.
pub struct WebhookServer {
    pub url: String,
    state: HookState,
}

impl WebhookServer {
    pub async fn spawn(fail_first: i64) -> Self {
        let state = HookState {
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_budget: Arc::new(AtomicI64::new(fail_first)),
        };
        let app = Router::new()
            .route("/hook", post(receive))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("To bind webhook listener");
        let addr = listener.local_addr().expect("To get local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Webhook server to run");
        });
        Self {
            url: format!("http://{}/hook", addr),
            state,
        }
    }

    pub fn requests(&self) -> Vec<ReceivedDelivery> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn receive(
    State(state): State<HookState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
    };
    state.requests.lock().unwrap().push(ReceivedDelivery {
        reminder_id: header("X-Reminder-Id"),
        attempts: header("X-Reminder-Attempts"),
        message_id: header("X-Message-Id"),
        research_id: header("X-Deep-Research-Id"),
        body,
    });

    if state.fail_budget.fetch_sub(1, Ordering::SeqCst) > 0 {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

/// Context over a throwaway sqlite file with timings tightened so the
/// dispatcher settles within a couple of seconds
pub async fn setup_ctx(webhook_url: &str) -> (NudgeContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("To create tempdir");
    let path = dir
        .path()
        .join("reminders.db")
        .to_str()
        .expect("Tempdir path to be valid utf-8")
        .to_string();
    let ctx = setup_ctx_at(&path, webhook_url).await;
    (ctx, dir)
}

/// Context over a specific sqlite file, for tests that reopen the same store
pub async fn setup_ctx_at(path: &str, webhook_url: &str) -> NudgeContext {
    let config = Config {
        storage: StorageConfig::Sqlite {
            path: path.to_string(),
        },
        poll_interval: Duration::from_millis(100),
        dispatch_batch_size: 10,
        http_timeout: Duration::from_secs(2),
        retry_base: Duration::from_millis(100),
        retry_max: Duration::from_millis(800),
        min_lead: Duration::from_millis(200),
        reminder_webhook_url: webhook_url.to_string(),
        message_webhook_url: webhook_url.to_string(),
        research_webhook_url: webhook_url.to_string(),
    };
    NudgeContext::create(config)
        .await
        .expect("To create context")
}

/// Polls `check` every 50ms until it returns true or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
