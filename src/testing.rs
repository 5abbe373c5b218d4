use axum::Json;
use axum::Router;
use axum::http::HeaderMap;
use serde_json::{Value, json};

/// Serve `router` on an ephemeral local port and return its origin.
pub(crate) async fn spawn(router: Router) -> url::Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}").parse().unwrap()
}

/// Handler that reports the request headers the dispatcher sent.
pub(crate) async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    Json(json!({
        "authorization": header("authorization"),
        "contentType": header("content-type"),
        "requestId": header("x-request-id"),
    }))
}
