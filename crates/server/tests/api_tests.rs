//! HTTP API integration tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::fixtures::userscript;
use common::server::TestServer;
use scriptvault_core::config::StorageConfig;
use std::net::SocketAddr;
use std::time::Duration;

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

fn upload(token: Option<&str>, path: &str, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body.into()).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let response = server.send(get("/v1/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_upload_requires_token() {
    let server = TestServer::new().await;
    let script = userscript("Demo", None, "");

    let response = server.send(upload(None, "/v1/scripts", script.clone())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = server
        .send(upload(Some("not-a-real-token"), "/v1/scripts", script))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "unauthorized");
}

#[tokio::test]
async fn test_upload_creates_then_updates() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("Alice", None).await;

    let script = userscript("My Script", Some("tools"), "console.log(1);\n");
    let response = server
        .send(upload(Some(&token), "/v1/scripts", script.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["install_name"], "alice/tools/myscript.user.js");
    assert_eq!(json["created"], true);
    assert_eq!(json["blob_written"], true);

    let response = server
        .send(upload(Some(&token), "/v1/scripts", script))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["created"], false);
}

#[tokio::test]
async fn test_upload_rejections() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("alice", None).await;

    let nameless = "// ==UserScript==\n// @version 1.0\n// ==/UserScript==\n";
    let response = server
        .send(upload(Some(&token), "/v1/scripts", nameless))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "missing_name");

    let response = server
        .send(upload(Some(&token), "/v1/scripts", "alert(1);"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "malformed_header");

    let response = server
        .send(upload(
            Some(&token),
            "/v1/scripts?update=true",
            userscript("Never Uploaded", None, ""),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(
        server
            .metadata()
            .get_script("alice/neveruploaded.user.js")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_upload_cannot_overwrite_another_authors_script() {
    let server = TestServer::new().await;
    let (alice, alice_token) = server.create_user("alice", None).await;
    let (_, other_token) = server.create_user("Alice", None).await;

    let original = userscript("Shared", None, "mine();\n");
    let response = server
        .send(upload(Some(&alice_token), "/v1/scripts", original.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // both usernames canonicalize to the same install name
    let response = server
        .send(upload(
            Some(&other_token),
            "/v1/scripts",
            userscript("Shared", None, "theirs();\n"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "name_taken");

    let row = server
        .metadata()
        .get_script("alice/shared.user.js")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.author_id, alice.id);
    let response = server.send(get("/install/alice/shared.user.js")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, original);
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let server = TestServer::with_config(|config| config.server.max_script_bytes = 128).await;
    let (_, token) = server.create_user("alice", None).await;

    let script = userscript("Big", None, &"x".repeat(1024));
    let response = server
        .send(upload(Some(&token), "/v1/scripts", script))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        server
            .metadata()
            .get_script("alice/big.user.js")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_install_serves_script_and_counts() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("alice", None).await;
    let script = userscript("Counter", None, "let n = 0;\n");
    server
        .send(upload(Some(&token), "/v1/scripts", script.clone()))
        .await;

    // username segment is case-insensitive
    let response = server.send(get("/install/Alice/counter.user.js")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/javascript; charset=utf-8"
    );
    assert_eq!(body_string(response).await, script);

    let metadata = server.metadata();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let row = metadata
            .get_script("alice/counter.user.js")
            .await
            .unwrap()
            .unwrap();
        if row.installs == 1 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "install never counted");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_install_with_namespace_route() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("alice", None).await;
    server
        .send(upload(
            Some(&token),
            "/v1/scripts",
            userscript("Tool", Some("kit"), ""),
        ))
        .await;

    let response = server.send(get("/install/alice/kit/tool.user.js")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server.send(get("/install/alice/tool.user.js")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_meta_document_variants() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("alice", None).await;
    server
        .send(upload(
            Some(&token),
            "/v1/scripts",
            userscript("Meta Demo", None, "body();\n"),
        ))
        .await;

    let expected = "// ==UserScript==\n// @version    1.0\n// @name    Meta Demo\n// ==/UserScript==\n";

    let response = server.send(get("/install/alice/metademo.meta.js")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, expected);

    let request = Request::builder()
        .uri("/install/alice/metademo.user.js")
        .header(header::ACCEPT, "text/x-userscript-meta")
        .body(Body::empty())
        .unwrap();
    let response = server.send(request).await;
    assert_eq!(body_string(response).await, expected);

    let response = server.send(get("/meta/alice/metademo.user.js")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, expected);

    // meta requests do not count installs
    let row = server
        .metadata()
        .get_script("alice/metademo.user.js")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.installs, 0);
}

#[tokio::test]
async fn test_unknown_paths_fall_through() {
    let server = TestServer::new().await;

    for path in [
        "/install/nobody/missing.user.js",
        "/meta/nobody/missing.user.js",
        "/install/nobody/..",
        "/does/not/exist",
    ] {
        let response = server.send(get(path)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body_string(response).await, "Not Found", "{path}");
    }
}

#[tokio::test]
async fn test_record_without_blob_is_not_served() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("alice", None).await;
    server
        .send(upload(
            Some(&token),
            "/v1/scripts",
            userscript("Gone", None, ""),
        ))
        .await;

    let StorageConfig::Filesystem { path } = server.state.config.storage.clone() else {
        panic!("tests use filesystem storage");
    };
    tokio::fs::remove_file(path.join("alice/gone.user.js"))
        .await
        .unwrap();
    assert!(
        server
            .storage()
            .get("alice/gone.user.js")
            .await
            .unwrap_err()
            .is_not_found()
    );

    let response = server.send(get("/install/alice/gone.user.js")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_toggle() {
    let server = TestServer::new().await;
    let response = server.send(get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("scriptvault_"));

    let server = TestServer::with_config(|config| config.server.metrics_enabled = false).await;
    let response = server.send(get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_always_answers_ok() {
    let server = TestServer::new().await;
    let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();

    for body in ["", "payload=not-json", "unrelated=1"] {
        let request = Request::builder()
            .method("POST")
            .uri("/hooks/github")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        let response = server.send_from(peer, request).await;
        assert_eq!(response.status(), StatusCode::OK, "{body:?}");
        assert!(body_string(response).await.is_empty());
    }
}

#[tokio::test]
async fn test_webhook_route_can_be_disabled() {
    let server = TestServer::with_config(|config| config.webhook.enabled = false).await;
    let request = Request::builder()
        .method("POST")
        .uri("/hooks/github")
        .body(Body::empty())
        .unwrap();
    let response = server
        .send_from("192.30.252.41:443".parse().unwrap(), request)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
