//! The interactive client against a live server on an ephemeral port.

#![cfg(all(feature = "server", feature = "sqlite"))]

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;

use keystead::client::prompt::{execute, parse_command};
use keystead::client::LicenseApiClient;
use keystead::config::{ClientConfig, KeysteadConfig};
use keystead::models::{ApiResponse, Outcome};
use keystead::server::bootstrap::build_app;
use keystead::server::database::Database;

/// Spin up a temporary Keystead server using in-memory SQLite.
async fn spawn_test_server() -> String {
    let mut config = KeysteadConfig::default();
    config.crypto.secret = "5a".repeat(32);
    config
        .auth
        .accounts
        .insert("admin".to_string(), "hunter2".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("db connect failed");
    let db = Database::SQLite(pool);
    db.run_migrations().await.expect("migrations failed");

    let router = build_app(&config, Arc::new(db)).expect("failed to build app");

    // Bind to an ephemeral port
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("server failed");
    });

    format!("http://{}", addr)
}

fn client_for(base_url: &str, password: &str) -> LicenseApiClient {
    LicenseApiClient::new(&ClientConfig {
        base_url: base_url.to_string(),
        username: "admin".to_string(),
        password: password.to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn client_lifecycle() {
    let base_url = spawn_test_server().await;
    let client = client_for(&base_url, "hunter2");

    let key = match client.create_license("a@x.com", "acme").await.unwrap() {
        ApiResponse::Outcome(o) => {
            assert_eq!(o.outcome(), Some(Outcome::Created));
            o.license_key
        }
        other => panic!("unexpected response: {other:?}"),
    };

    assert!(client.check_validity(&key, "acme").await);
    assert!(!client.check_validity(&key, "other").await);

    match client.get_specific(&key).await.unwrap() {
        ApiResponse::Record(r) => {
            assert_eq!(r.key, key);
            assert_eq!(r.email, "a@x.com");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match client.get_all("acme").await.unwrap() {
        ApiResponse::RecordList(list) => assert_eq!(list.licenses.len(), 1),
        other => panic!("unexpected response: {other:?}"),
    }

    match client.invalidate_license(&key).await.unwrap() {
        ApiResponse::Outcome(o) => assert_eq!(o.outcome(), Some(Outcome::Invalidated)),
        other => panic!("unexpected response: {other:?}"),
    }
    assert!(!client.check_validity(&key, "acme").await);
}

#[tokio::test]
async fn products_with_url_metacharacters_are_listed() {
    let base_url = spawn_test_server().await;
    let client = client_for(&base_url, "hunter2");

    let product = "acme pro?x#y%z";
    client.create_license("a@x.com", product).await.unwrap();
    client.create_license("b@x.com", "acme pro").await.unwrap();

    match client.get_all(product).await.unwrap() {
        ApiResponse::RecordList(list) => {
            assert_eq!(list.licenses.len(), 1);
            assert_eq!(list.licenses[0].product, product);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn wrong_password_is_an_error_response() {
    let base_url = spawn_test_server().await;
    let client = client_for(&base_url, "wrong");

    match client.get_all("acme").await.unwrap() {
        ApiResponse::Error(e) => {
            assert_eq!(e.code, 401);
            assert_eq!(e.error, "UNAUTHORIZED");
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn prompt_commands_render_results() {
    let base_url = spawn_test_server().await;
    let client = client_for(&base_url, "hunter2");

    let out = execute(&client, parse_command("all acme")).await.unwrap();
    assert_eq!(out, "No valid licenses found for that product!");

    let out = execute(&client, parse_command("new a@x.com acme"))
        .await
        .unwrap();
    assert!(out.contains("Status: created"));
    assert!(out.contains("Code: 201"));

    let out = execute(&client, parse_command("get bm90LWEta2V5"))
        .await
        .unwrap();
    assert!(out.starts_with("An error occurred:"));

    let out = execute(&client, parse_command("check bm90LWEta2V5 acme"))
        .await
        .unwrap();
    assert!(out.ends_with("Valid: false"));

    assert_eq!(execute(&client, parse_command("exit")).await, None);
}
