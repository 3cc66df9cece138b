use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use texa::middleware::{logger, middleware_fn};
use texa::{
    Addon, Application, BoxError, FsResolver, Next, Pair, Request, RequestErrorHandler, Response, Router, run_middleware,
};
use texa_http::connection::{ReplyReceiver, responder};
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex, split};

fn pair(method: &str, uri: &str) -> (Pair, ReplyReceiver) {
    let incoming = http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap();
    let (responder, receiver) = responder();
    (Pair::new(incoming, responder, Arc::new(FsResolver)), receiver)
}

async fn hello(_req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
    res.send("Hello World!").await?;
    Ok(())
}

async fn not_found(_req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
    res.set_status(StatusCode::NOT_FOUND)?;
    res.end().await?;
    Ok(())
}

async fn fail(_req: &mut Request, _res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
    Err("database unavailable".into())
}

/// Sends one request over an in-memory connection and returns the raw response.
async fn roundtrip(app: &Application, raw: &str) -> String {
    let (client, server) = duplex(16 * 1024);
    let (reader, writer) = split(server);
    let (mut client_reader, mut client_writer) = split(client);

    let talk = async move {
        client_writer.write_all(raw.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        client_reader.read_to_end(&mut response).await.unwrap();
        String::from_utf8(response).unwrap()
    };
    let ((), response) = tokio::join!(app.serve_connection(reader, writer, None), talk);
    response
}

fn get(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
}

#[tokio::test]
async fn logger_and_router_serve_hello() {
    let router = Router::builder().get("/hello", [middleware_fn(hello)]).build().unwrap();
    let chain = [Addon::from(logger()), Addon::from(router)];
    let (mut pair, receiver) = pair("GET", "/hello");

    let (diagnostics, sent) =
        tokio::join!(run_middleware(&chain, &mut pair.request, &mut pair.response), receiver.accept());

    assert_eq!(diagnostics.middleware(), 2);
    assert_eq!(diagnostics.ran(), 2);
    assert!(!diagnostics.failed());

    let sent = sent.unwrap();
    assert_eq!(sent.status(), StatusCode::OK);
    assert_eq!(sent.body().as_ref(), b"Hello World!");
}

#[tokio::test]
async fn missing_route_reaches_terminal_handler() {
    let router = Router::builder().get("/hello", [middleware_fn(hello)]).build().unwrap();
    let app = Application::builder().use_middleware(router).use_middleware(middleware_fn(not_found)).build().unwrap();

    let response = roundtrip(&app, &get("/missing")).await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
    assert!(response.ends_with("404 - Not Found"));

    let response = roundtrip(&app, &get("/hello")).await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.ends_with("Hello World!"));
}

#[tokio::test]
async fn missing_route_falls_through_router() {
    let users = Router::builder().get("/:id", [middleware_fn(hello)]).build().unwrap();
    let router = Router::builder()
        .get("/hello", [middleware_fn(hello)])
        .mount("/users", [users])
        .build()
        .unwrap();
    let chain = [Addon::from(router)];

    for path in ["/missing", "/users/7/posts"] {
        let (mut pair, _receiver) = pair("GET", path);
        let diagnostics = run_middleware(&chain, &mut pair.request, &mut pair.response).await;

        assert!(diagnostics.continued(), "{path}");
        assert!(!diagnostics.failed());
        assert_eq!(diagnostics.middleware(), 1);
        assert_eq!(diagnostics.ran(), 1);
        assert_eq!(pair.request.path(), path);
        assert!(pair.request.params().is_empty());
        assert!(pair.is_writable(), "no route handler should have answered {path}");
    }
}

#[tokio::test]
async fn nested_failure_stops_everything() {
    let v1 = Router::builder().mount("/v1", [middleware_fn(fail)]).build().unwrap();
    let api = Router::builder().mount("/api", [v1]).build().unwrap();
    let chain = [Addon::from(api), Addon::from(middleware_fn(not_found))];
    let (mut pair, _receiver) = pair("GET", "/api/v1/users");

    let diagnostics = run_middleware(&chain, &mut pair.request, &mut pair.response).await;

    assert!(diagnostics.failed());
    assert!(!diagnostics.continued());
    assert_eq!(diagnostics.ran(), 1);
    assert_eq!(pair.request.path(), "/users");
    assert!(pair.is_writable());
}

#[derive(Default, Clone)]
struct Recorder {
    errors: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RequestErrorHandler for Recorder {
    async fn handle(&self, _req: &mut Request, res: &mut Response, error: BoxError) {
        self.errors.lock().unwrap().push(error.to_string());
        let _ = res.set_status(StatusCode::SERVICE_UNAVAILABLE);
    }
}

#[tokio::test]
async fn failures_reach_request_error_handler() {
    let recorder = Recorder::default();
    let app = Application::builder()
        .use_middleware(middleware_fn(fail))
        .on_request_error(recorder.clone())
        .build()
        .unwrap();

    let response = roundtrip(&app, &get("/")).await;

    assert!(response.starts_with("HTTP/1.1 503 Service Unavailable\r\n"), "{response}");
    assert_eq!(*recorder.errors.lock().unwrap(), vec!["database unavailable".to_string()]);
}

#[tokio::test]
async fn keep_alive_serves_several_requests() {
    let app = Application::builder().use_middleware(middleware_fn(hello)).build().unwrap();
    let raw = "GET /a HTTP/1.1\r\nHost: localhost\r\n\r\nGET /b HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";

    let response = roundtrip(&app, raw).await;
    assert_eq!(response.matches("HTTP/1.1 200 OK\r\n").count(), 2, "{response}");
}

#[tokio::test]
async fn request_body_is_loaded() {
    async fn echo(req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
        let body = req.text()?.to_uppercase();
        res.send(body).await?;
        Ok(())
    }

    let app = Application::builder().use_middleware(middleware_fn(echo)).build().unwrap();
    let raw = "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello";

    let response = roundtrip(&app, raw).await;
    assert!(response.ends_with("HELLO"), "{response}");
}
