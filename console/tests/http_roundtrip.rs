//! End-to-end checks of the console against a stub rules server on a
//! local TCP port, exercising the real reqwest transport.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aml_rule_store::{ApiError, RuleApi, RuleId, RuleStatus, StoreError};
use console::hooks::{Notice, UiEffects};
use console::http_client::{ApiClient, ClientConfig};
use console::persistence::SnapshotPersister;
use console::{Console, ConsoleConfig, LocalStorage, StorageConfig};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ================================================================================================
// STUB SERVER
// ================================================================================================

struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    /// Answers each incoming connection with the next scripted response.
    async fn start(responses: Vec<(u16, Value)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let captured = requests.clone();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let raw = read_request(&mut stream).await.unwrap_or_default();
                captured.lock().push(raw);

                let body = body.to_string();
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            if buf.len() >= pos + 4 + content_length {
                break;
            }
        }
    }
    Ok(String::from_utf8_lossy(&buf).to_string())
}

// ================================================================================================
// HELPERS
// ================================================================================================

#[derive(Default)]
struct RecordedEffects {
    routes: Mutex<Vec<String>>,
    notices: Mutex<Vec<Notice>>,
}

impl UiEffects for RecordedEffects {
    fn navigate(&self, route: &str) {
        self.routes.lock().push(route.to_string());
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

fn rules_payload() -> Value {
    json!({
        "code": 200,
        "data": [
            {
                "id": 1,
                "name": "Large transfer",
                "status": "禁用",
                "threshold": 50000,
                "ruleType": "交易金额",
                "createdAt": "2024-04-01T00:00:00Z",
                "updatedAt": "2024-04-02T00:00:00Z",
                "lastModifiedBy": "admin"
            },
            {
                "id": 2,
                "name": "Burst of payments",
                "status": "启用",
                "threshold": 20,
                "ruleType": "频率",
                "createdAt": "2024-04-01T00:00:00Z",
                "updatedAt": "2024-04-01T00:00:00Z",
                "lastModifiedBy": "admin"
            }
        ]
    })
}

fn open_console(
    server_url: String,
    dir: &TempDir,
    effects: Arc<RecordedEffects>,
) -> Console {
    let config = ConsoleConfig {
        client: ClientConfig {
            base_url: server_url,
            timeout: Duration::from_secs(5),
            ..ClientConfig::default()
        },
        storage: StorageConfig {
            path: dir.path().join("console.db"),
        },
    };
    Console::open(config, effects).unwrap()
}

// ================================================================================================
// TESTS
// ================================================================================================

#[tokio::test]
async fn fetch_sends_bearer_token_and_loads_rules() {
    let server = StubServer::start(vec![(200, rules_payload())]).await;
    let dir = TempDir::new().unwrap();
    let console = open_console(server.base_url(), &dir, Arc::new(RecordedEffects::default()));
    console.storage().set_token("t0k3n").unwrap();

    console.store().fetch_rules().await.unwrap();

    let state = console.store().state();
    assert_eq!(state.rules.len(), 2);
    assert_eq!(state.rules[0].status, RuleStatus::Disabled);
    assert!(!state.loading);
    assert_eq!(state.error, None);

    let request = server.requests()[0].to_lowercase();
    assert!(request.starts_with("get /api/rules http/1.1"));
    assert!(request.contains("authorization: bearer t0k3n"));
    assert!(request.contains("x-request-id: "));
}

#[tokio::test]
async fn unauthorized_redirects_to_login_once_and_fails_fetch() {
    let server = StubServer::start(vec![(401, json!({"message": "expired"}))]).await;
    let dir = TempDir::new().unwrap();
    let effects = Arc::new(RecordedEffects::default());
    let console = open_console(server.base_url(), &dir, effects.clone());

    let result = console.store().fetch_rules().await;

    assert!(matches!(result, Err(StoreError::Fetch(_))));
    assert_eq!(*effects.routes.lock(), vec!["/login".to_string()]);
    assert!(effects.notices.lock().is_empty());
    assert!(!console.store().is_loading());
    assert!(console.store().error().unwrap().contains("401"));
}

#[tokio::test]
async fn server_error_raises_notice() {
    let server = StubServer::start(vec![(500, json!({"message": "db down"}))]).await;
    let dir = TempDir::new().unwrap();
    let effects = Arc::new(RecordedEffects::default());
    let console = open_console(server.base_url(), &dir, effects.clone());

    assert!(console.store().fetch_rules().await.is_err());
    assert_eq!(*effects.notices.lock(), vec![Notice::ServerError]);
}

#[tokio::test]
async fn toggle_patches_status_and_persists_snapshot() {
    let server = StubServer::start(vec![
        (200, rules_payload()),
        (200, json!({"code": 200, "data": null})),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let console = open_console(server.base_url(), &dir, Arc::new(RecordedEffects::default()));

    console.store().fetch_rules().await.unwrap();
    console
        .store()
        .toggle_rule_status(RuleId::new(1), RuleStatus::Enabled)
        .await
        .unwrap();

    let patch = server.requests()[1].clone();
    assert!(patch.to_lowercase().starts_with("patch /api/rules/1/status http/1.1"));
    let body = patch.split("\r\n\r\n").nth(1).unwrap();
    assert_eq!(serde_json::from_str::<Value>(body).unwrap(), json!({"status": "启用"}));

    let rule = console.store().rule(RuleId::new(1)).unwrap();
    assert_eq!(rule.status, RuleStatus::Enabled);
    assert_eq!(rule.name, "Large transfer");

    // Reopen storage as a fresh session would.
    drop(console);
    let storage = Arc::new(
        LocalStorage::open(StorageConfig {
            path: dir.path().join("console.db"),
        })
        .unwrap(),
    );
    let snapshot = SnapshotPersister::with_default_key(storage).load().unwrap().unwrap();
    assert_eq!(snapshot.rules.len(), 2);
    assert_eq!(snapshot.rules[0].status, RuleStatus::Enabled);
}

#[tokio::test]
async fn rejected_envelope_keeps_local_status() {
    let server = StubServer::start(vec![
        (200, rules_payload()),
        (200, json!({"code": 409, "message": "rule is locked", "data": null})),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let console = open_console(server.base_url(), &dir, Arc::new(RecordedEffects::default()));

    console.store().fetch_rules().await.unwrap();
    let before = console.store().state();

    let result = console
        .store()
        .toggle_rule_status(RuleId::new(1), RuleStatus::Enabled)
        .await;

    assert!(matches!(
        result,
        Err(StoreError::Api(ApiError::Application { code: 409, .. }))
    ));
    assert_eq!(console.store().state(), before);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(ClientConfig {
        base_url: format!("http://{}/api", addr),
        ..ClientConfig::default()
    })
    .unwrap();

    assert!(matches!(
        client.list_rules().await,
        Err(ApiError::Transport(_))
    ));
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and hold the connection without answering.
        if let Ok((stream, _)) = listener.accept().await {
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        }
    });

    let client = ApiClient::new(ClientConfig {
        base_url: format!("http://{}/api", addr),
        timeout: Duration::from_millis(200),
        ..ClientConfig::default()
    })
    .unwrap();

    assert_eq!(client.list_rules().await, Err(ApiError::Timeout));
}
