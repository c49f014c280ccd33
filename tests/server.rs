use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use taproom::middleware::{Errors, Logger, Metrics, Panics};
use taproom::shutdown::{self, ShutdownReceiver, Signal};
use taproom::{App, Context, Error, Request, Response, Server, ServerError, TRACE_ID_HEADER, health};

/// Knobs shared between a test and the handlers of its server.
#[derive(Clone, Default)]
struct Fixture {
    /// Readiness check result.
    database_up: Arc<AtomicBool>,
    /// Notified when a `/v1/hang` request is cancelled.
    cancelled: Arc<Notify>,
}

fn app(fixture: &Fixture) -> (App, ShutdownReceiver) {
    let (tx, rx) = shutdown::channel();
    let database_up = Arc::clone(&fixture.database_up);
    let cancelled = Arc::clone(&fixture.cancelled);

    let app = App::builder(tx)
        .wrap(Logger)
        .wrap(Errors)
        .wrap(Metrics)
        .wrap(Panics)
        .build()
        .get("v1", "/liveness", health::liveness)
        .get(
            "v1",
            "/readiness",
            health::readiness_with(move || {
                let up = database_up.load(Ordering::SeqCst);
                async move { if up { Ok(()) } else { Err("database unreachable") } }
            }),
        )
        .get("v1", "/slow", |_ctx: Context, _req: Request| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok::<_, Error>("done")
        })
        .get("v1", "/stuck", |ctx: Context, _req: Request| async move {
            ctx.cancelled().await;
            Ok::<_, Error>(StatusCode::SERVICE_UNAVAILABLE)
        })
        .get("v1", "/hang", move |ctx: Context, _req: Request| {
            let cancelled = Arc::clone(&cancelled);
            async move {
                let watched = ctx.clone();
                tokio::spawn(async move {
                    watched.cancelled().await;
                    cancelled.notify_one();
                });
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, Error>("too late")
            }
        })
        .get("v1", "/fatal", |_ctx: Context, _req: Request| async {
            Err::<Response, _>(Error::shutdown("integrity check failed"))
        });
    (app, rx)
}

async fn start_with(
    fixture: &Fixture,
    timeout: Duration,
) -> (SocketAddr, JoinHandle<Result<Signal, ServerError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (app, rx) = app(fixture);
    let server = Server::from_listener(listener).shutdown_timeout(timeout);
    (addr, tokio::spawn(server.serve(app, rx)))
}

async fn start(timeout: Duration) -> (SocketAddr, JoinHandle<Result<Signal, ServerError>>) {
    start_with(&Fixture::default(), timeout).await
}

async fn get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    String::from_utf8(raw).unwrap()
}

#[tokio::test]
async fn serves_over_tcp() {
    let (addr, server) = start(Duration::from_secs(1)).await;

    let res = get(addr, "/v1/liveness").await;
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");
    assert!(res.contains(TRACE_ID_HEADER), "{res}");
    assert!(res.ends_with(r#"{"status":"ok"}"#), "{res}");

    let res = get(addr, "/v1/missing").await;
    assert!(res.starts_with("HTTP/1.1 404"), "{res}");

    server.abort();
}

#[tokio::test]
async fn shutdown_error_stops_the_server_after_draining() {
    let (addr, server) = start(Duration::from_secs(5)).await;

    let slow = tokio::spawn(get(addr, "/v1/slow"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let res = get(addr, "/v1/fatal").await;
    assert!(res.starts_with("HTTP/1.1 503"), "{res}");

    let res = slow.await.unwrap();
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");
    assert!(res.ends_with("done"), "{res}");

    let signal = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(signal, Signal::Terminate);

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn grace_period_bounds_shutdown() {
    let (addr, server) = start(Duration::from_millis(100)).await;

    let stuck = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /v1/stuck HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        let _ = stream.read_to_end(&mut raw).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let res = get(addr, "/v1/fatal").await;
    assert!(res.starts_with("HTTP/1.1 503"), "{res}");

    let signal = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(signal, Signal::Terminate);

    tokio::time::timeout(Duration::from_secs(5), stuck).await.unwrap().unwrap();
}

#[tokio::test]
async fn readiness_reflects_the_check() {
    let fixture = Fixture::default();
    fixture.database_up.store(true, Ordering::SeqCst);
    let (addr, server) = start_with(&fixture, Duration::from_secs(1)).await;

    let res = get(addr, "/v1/readiness").await;
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");
    assert!(res.ends_with(r#"{"status":"ok"}"#), "{res}");

    fixture.database_up.store(false, Ordering::SeqCst);
    let res = get(addr, "/v1/readiness").await;
    assert!(res.starts_with("HTTP/1.1 503"), "{res}");
    assert!(res.ends_with(r#"{"status":"not ready"}"#), "{res}");

    server.abort();
}

#[tokio::test]
async fn client_disconnect_cancels_the_request() {
    let fixture = Fixture::default();
    let (addr, server) = start_with(&fixture, Duration::from_secs(1)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /v1/hang HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(stream);

    tokio::time::timeout(Duration::from_secs(5), fixture.cancelled.notified())
        .await
        .expect("request context was not cancelled");

    server.abort();
}
