//! HTTP-level tests driving the router against an in-memory runtime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use serde_json::{json, Value};
use tempfile::TempDir;

use burrow_auth::{MockTokenValidator, StoredTokenValidator, TokenValidator};
use burrow_control::{FsConfigFileStore, TunnelService};
use burrow_gateway::{create_router, GatewayConfig, GatewayState};
use burrow_runtime::mock::{MockRuntime, RuntimeCall};
use burrow_runtime::{
    ContainerHandle, ContainerRuntime, ContainerSpec, ContainerStatus, LogLine,
};
use burrow_store::RocksStore;

struct Harness {
    server: TestServer,
    runtime: Arc<MockRuntime>,
    _dir: TempDir,
}

/// Build a server over a fresh store; `validator` may share that store.
fn serve<V, F>(
    runtime: Arc<dyn ContainerRuntime>,
    config: GatewayConfig,
    validator: F,
) -> (TestServer, TempDir)
where
    V: TokenValidator + 'static,
    F: FnOnce(Arc<RocksStore>) -> V,
{
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksStore::open(dir.path().join("db")).unwrap());
    let files = Arc::new(FsConfigFileStore::new(dir.path().join("yaml")).unwrap());
    let validator = Arc::new(validator(Arc::clone(&store)));
    let control = Arc::new(TunnelService::with_defaults(store, runtime, files));

    let state = GatewayState::new(control, validator, config);
    (TestServer::new(create_router(state)).unwrap(), dir)
}

fn setup() -> Harness {
    let runtime = Arc::new(MockRuntime::new());
    let (server, dir) = serve(runtime.clone(), GatewayConfig::default(), |_| {
        MockTokenValidator
    });

    Harness {
        server,
        runtime,
        _dir: dir,
    }
}

/// Engine whose `remove` takes longer than the request timeout.
struct SlowRemoveRuntime {
    inner: MockRuntime,
    delay: Duration,
}

#[async_trait]
impl ContainerRuntime for SlowRemoveRuntime {
    async fn find(&self, name: &str) -> burrow_runtime::Result<Option<ContainerHandle>> {
        self.inner.find(name).await
    }

    async fn create(&self, spec: &ContainerSpec) -> burrow_runtime::Result<ContainerHandle> {
        self.inner.create(spec).await
    }

    async fn start(&self, handle: &ContainerHandle) -> burrow_runtime::Result<()> {
        self.inner.start(handle).await
    }

    async fn stop(&self, handle: &ContainerHandle) -> burrow_runtime::Result<()> {
        self.inner.stop(handle).await
    }

    async fn remove(&self, handle: &ContainerHandle) -> burrow_runtime::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove(handle).await
    }

    async fn state(&self, handle: &ContainerHandle) -> burrow_runtime::Result<ContainerStatus> {
        self.inner.state(handle).await
    }

    async fn logs(
        &self,
        handle: &ContainerHandle,
        since: i64,
    ) -> burrow_runtime::Result<Vec<LogLine>> {
        self.inner.logs(handle, since).await
    }
}

fn auth(token: &str) -> (HeaderName, HeaderValue) {
    (
        axum::http::header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

fn web() -> Value {
    json!({"name": "web", "local_addr": "127.0.0.1:8080", "proto": "http"})
}

async fn create(h: &Harness, body: &Value) -> Value {
    create_on(&h.server, body).await
}

async fn create_on(server: &TestServer, body: &Value) -> Value {
    let (name, value) = auth("test-token");
    let response = server
        .post("/v1/tunnels")
        .add_header(name, value)
        .json(body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

#[tokio::test]
async fn health_is_public() {
    let h = setup();
    let response = h.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn info_requires_token() {
    let h = setup();
    h.server
        .get("/info")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = auth("test-token");
    let response = h.server.get("/info").add_header(name, value).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["name"], "burrow");
}

#[tokio::test]
async fn tunnels_require_token() {
    let h = setup();
    let response = h.server.get("/v1/tunnels").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "unauthorized");

    let (name, value) = auth("wrong");
    h.server
        .get("/v1/tunnels")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_get_list_delete() {
    let h = setup();
    let created = create(&h, &web()).await;
    assert_eq!(created["name"], "web");
    assert_eq!(created["state"], "running");
    assert_eq!(created["exists"], true);
    assert_eq!(created["container_name"], "burrow-tunnel-web");
    let id = created["id"].as_u64().unwrap();

    let (name, value) = auth("test-token");
    let fetched = h
        .server
        .get(&format!("/v1/tunnels/{id}"))
        .add_header(name, value)
        .await;
    fetched.assert_status_ok();
    assert_eq!(fetched.json::<Value>()["local_addr"], "127.0.0.1:8080");

    let (name, value) = auth("test-token");
    let list = h.server.get("/v1/tunnels").add_header(name, value).await;
    assert_eq!(list.json::<Value>()["tunnels"].as_array().unwrap().len(), 1);

    let (name, value) = auth("test-token");
    h.server
        .delete(&format!("/v1/tunnels/{id}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert_eq!(h.runtime.container_count(), 0);

    let (name, value) = auth("test-token");
    let missing = h
        .server
        .get(&format!("/v1/tunnels/{id}"))
        .add_header(name, value)
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(missing.json::<Value>()["error"]["code"], "not_found");
}

#[tokio::test]
async fn validation_and_conflicts() {
    let h = setup();

    let (name, value) = auth("test-token");
    h.server
        .post("/v1/tunnels")
        .add_header(name, value)
        .json(&json!({"name": "web", "proto": "http"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    create(&h, &web()).await;
    let (name, value) = auth("test-token");
    let dup = h
        .server
        .post("/v1/tunnels")
        .add_header(name, value)
        .json(&web())
        .await;
    dup.assert_status(StatusCode::CONFLICT);
    assert_eq!(dup.json::<Value>()["error"]["code"], "conflict");
}

#[tokio::test]
async fn bad_ids_are_rejected() {
    let h = setup();
    let (name, value) = auth("test-token");
    h.server
        .get("/v1/tunnels/abc")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_actions() {
    let h = setup();
    let id = create(&h, &web()).await["id"].as_u64().unwrap();
    let path = format!("/v1/tunnels/{id}");

    let (name, value) = auth("test-token");
    let stopped = h
        .server
        .patch(&path)
        .add_header(name, value)
        .json(&json!({"action": "stop"}))
        .await;
    stopped.assert_status_ok();
    assert_eq!(stopped.json::<Value>()["state"], "created");

    let (name, value) = auth("test-token");
    h.server
        .get(&format!("{path}/status"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::CONFLICT);

    let (name, value) = auth("test-token");
    let started = h
        .server
        .patch(&path)
        .add_header(name, value)
        .json(&json!({"action": "start"}))
        .await;
    assert_eq!(started.json::<Value>()["state"], "running");

    let (name, value) = auth("test-token");
    let rebuilt = h
        .server
        .patch(&path)
        .add_header(name, value)
        .json(&json!({"action": "rebuild"}))
        .await;
    assert_eq!(rebuilt.json::<Value>()["state"], "running");

    let (name, value) = auth("test-token");
    h.server
        .patch(&path)
        .add_header(name, value)
        .json(&json!({"action": "explode"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_without_action_replaces_spec() {
    let h = setup();
    let id = create(&h, &web()).await["id"].as_u64().unwrap();

    let (name, value) = auth("test-token");
    let updated = h
        .server
        .patch(&format!("/v1/tunnels/{id}"))
        .add_header(name, value)
        .json(&json!({
            "name": "ssh",
            "local_addr": "127.0.0.1:22",
            "proto": "tcp",
            "remote_port": 2222
        }))
        .await;
    updated.assert_status_ok();

    let body = updated.json::<Value>();
    assert_eq!(body["name"], "ssh");
    assert_eq!(body["remote_port"], 2222);
    assert_eq!(body["container_name"], "burrow-tunnel-ssh");
    assert!(h.runtime.get_spec("burrow-tunnel-web").is_none());
}

#[tokio::test]
async fn log_and_status() {
    let h = setup();
    let id = create(&h, &web()).await["id"].as_u64().unwrap();

    let (name, value) = auth("test-token");
    let status = h
        .server
        .get(&format!("/v1/tunnels/{id}/status"))
        .add_header(name, value)
        .await;
    status.assert_status_ok();
    assert_eq!(status.json::<Value>()["url"], "");

    h.runtime
        .push_log("burrow-tunnel-web", Utc::now(), "starting");
    h.runtime.push_log(
        "burrow-tunnel-web",
        Utc::now(),
        "Tunnel established at https://web.tunnel.example.com:443",
    );

    let (name, value) = auth("test-token");
    let status = h
        .server
        .get(&format!("/v1/tunnels/{id}/status"))
        .add_header(name, value)
        .await
        .json::<Value>();
    assert_eq!(status["proto"], "https");
    assert_eq!(status["addr"], "web.tunnel.example.com");
    assert_eq!(status["port"], "443");

    let (name, value) = auth("test-token");
    let log = h
        .server
        .get(&format!("/v1/tunnels/{id}/log"))
        .add_query_param("offset", 1)
        .add_query_param("limit", 5)
        .add_header(name, value)
        .await;
    log.assert_status_ok();
    let lines = log.json::<Value>()["lines"].as_array().unwrap().clone();
    assert_eq!(lines.len(), 1);
    assert!(lines[0]["message"]
        .as_str()
        .unwrap()
        .contains("Tunnel established"));
}

#[tokio::test]
async fn clear_removes_all() {
    let h = setup();
    create(&h, &web()).await;
    create(
        &h,
        &json!({"name": "ssh", "local_addr": "127.0.0.1:22", "proto": "tcp"}),
    )
    .await;

    let (name, value) = auth("test-token");
    h.server
        .delete("/v1/tunnels")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert_eq!(h.runtime.container_count(), 0);
}

#[tokio::test]
async fn token_rotation() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("auth");
    let store = Arc::new(RocksStore::open(&db).unwrap());
    let validator = StoredTokenValidator::open(store, "first").unwrap();
    let (server, _tunnels_dir) = serve(
        Arc::new(MockRuntime::new()),
        GatewayConfig::default(),
        move |_| validator,
    );

    let (name, value) = auth("first");
    server
        .patch("/v1/token")
        .add_header(name, value)
        .json(&json!({"old_token": "first", "new_token": ""}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (name, value) = auth("first");
    server
        .patch("/v1/token")
        .add_header(name, value)
        .json(&json!({"old_token": "first", "new_token": "second"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let (name, value) = auth("first");
    server
        .get("/v1/tunnels")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = auth("second");
    server
        .get("/v1/tunnels")
        .add_header(name, value)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn rotated_token_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("auth");

    {
        let store = Arc::new(RocksStore::open(&db).unwrap());
        let validator = StoredTokenValidator::open(store, "first").unwrap();
        let (server, _dir) = serve(
            Arc::new(MockRuntime::new()),
            GatewayConfig::default(),
            move |_| validator,
        );

        let (name, value) = auth("first");
        server
            .patch("/v1/token")
            .add_header(name, value)
            .json(&json!({"old_token": "first", "new_token": "second"}))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    // Restart with the original seed still configured.
    let store = Arc::new(RocksStore::open(&db).unwrap());
    let validator = StoredTokenValidator::open(store, "first").unwrap();
    let (server, _dir) = serve(
        Arc::new(MockRuntime::new()),
        GatewayConfig::default(),
        move |_| validator,
    );

    let (name, value) = auth("first");
    server
        .get("/v1/tunnels")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = auth("second");
    server
        .get("/v1/tunnels")
        .add_header(name, value)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn timed_out_rebuild_still_completes() {
    let runtime = Arc::new(SlowRemoveRuntime {
        inner: MockRuntime::new(),
        delay: Duration::from_millis(1500),
    });
    let config = GatewayConfig {
        request_timeout_seconds: 1,
        ..GatewayConfig::default()
    };
    let (server, _dir) = serve(runtime.clone(), config, |_| MockTokenValidator);

    let id = create_on(&server, &web()).await["id"].as_u64().unwrap();
    let path = format!("/v1/tunnels/{id}");
    runtime.inner.clear_calls();

    let (name, value) = auth("test-token");
    server
        .patch(&path)
        .add_header(name, value)
        .json(&json!({"action": "rebuild"}))
        .await
        .assert_status(StatusCode::REQUEST_TIMEOUT);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let (name, value) = auth("test-token");
    let view = server.get(&path).add_header(name, value).await;
    view.assert_status_ok();
    assert_eq!(view.json::<Value>()["state"], "running");

    let mutations: Vec<_> = runtime
        .inner
        .calls()
        .into_iter()
        .filter(RuntimeCall::is_mutation)
        .collect();
    assert_eq!(mutations.len(), 4);
    assert!(matches!(mutations[0], RuntimeCall::Stop(_)));
    assert!(matches!(mutations[1], RuntimeCall::Remove(_)));
    assert!(matches!(mutations[2], RuntimeCall::Create(_)));
    assert!(matches!(mutations[3], RuntimeCall::Start(_)));
}

#[tokio::test]
async fn blank_action_replaces_spec() {
    let h = setup();
    let id = create(&h, &web()).await["id"].as_u64().unwrap();

    let (name, value) = auth("test-token");
    let updated = h
        .server
        .patch(&format!("/v1/tunnels/{id}"))
        .add_header(name, value)
        .json(&json!({
            "action": "",
            "name": "web",
            "local_addr": "127.0.0.1:9090",
            "proto": "http"
        }))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["local_addr"], "127.0.0.1:9090");
}
