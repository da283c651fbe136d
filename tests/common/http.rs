use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

/// Sends a bodiless request through the router.
pub async fn call(app: &Router, method: Method, path: &str) -> Response {
    call_with_headers(app, method, path, &[]).await
}

pub async fn call_with_headers(
    app: &Router,
    method: Method,
    path: &str,
    headers: &[(&str, &str)],
) -> Response {
    let req = headers
        .iter()
        .fold(Request::builder().method(method).uri(path), |b, (k, v)| {
            b.header(*k, *v)
        })
        .body(Body::empty())
        .expect("request");
    app.clone().oneshot(req).await.expect("router response")
}

/// Status, headers and JSON body; an empty body reads as `{}`.
pub async fn read_json(resp: Response) -> (StatusCode, HeaderMap, Value) {
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, headers, json)
}

pub fn assert_error_code(body: &Value, code: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], code);
    assert!(body["message"].is_string());
}

pub fn assert_success(status: StatusCode, body: &Value) {
    assert!(status.is_success(), "unexpected status {status}");
    assert_eq!(body["success"], true);
    assert!(body.get("data").is_some());
}
