//! # Transport Layer Tests: Site, watch-driven rebuild, HTTP server
//!
//! Validates multi-route dispatch, the subscription bookkeeping per
//! (route, extension), atomic rebuilds and the HTTP/1.1 surface.

use routex_core::{BuildEnv, EngineRegistry, Request, Result, RouteConfig};
use routex_transport::stream::{encode_response, read_request, MAX_HEAD};
use routex_transport::{OnChange, Site, SiteServer, Watch};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

fn tree(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (relative, content) in files {
        let path = dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

/// Records subscriptions so tests can fire them by hand.
#[derive(Default)]
struct ManualWatch {
    subscriptions: Mutex<Vec<(PathBuf, String, OnChange)>>,
}

impl ManualWatch {
    fn keys(&self) -> Vec<(PathBuf, String)> {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .map(|(p, e, _)| (p.clone(), e.clone()))
            .collect()
    }

    fn fire(&self, extension: &str) {
        let callbacks: Vec<OnChange> = self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e, _)| e == extension)
            .map(|(_, _, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb();
        }
    }
}

impl Watch for ManualWatch {
    fn subscribe(&self, path: &Path, extension: &str, on_change: OnChange) -> Result<()> {
        self.subscriptions
            .lock()
            .unwrap()
            .push((path.to_path_buf(), extension.to_string(), on_change));
        Ok(())
    }
}

async fn get(site: &Site, path: &str) -> routex_core::Response {
    let mut request = Request::new(path);
    site.dispatch(&mut request).await
}

/// Verifies that requests go to the route binding the path, and 404 otherwise.
#[tokio::test]
async fn test_site_dispatch_across_routes() {
    let t = Instant::now();

    let views = tree(&[("index.html", "home")]);
    let styles = tree(&[("main.css", "body{}")]);
    let site = Site::build(
        vec![
            RouteConfig::new("/", views.path(), "html"),
            RouteConfig::new("/css", styles.path(), "css"),
        ],
        BuildEnv::new(EngineRegistry::new()),
    )
    .unwrap();

    let home = get(&site, "/").await;
    assert_eq!(home.status, 200);
    assert_eq!(&home.body[..], b"home");

    let css = get(&site, "/css/main.css?v=3").await;
    assert_eq!(css.status, 200);
    assert_eq!(css.content_type.as_deref(), Some("text/css; charset=utf-8"));

    assert_eq!(get(&site, "/nope").await.status, 404);

    println!("test_site_dispatch_across_routes: Testing Overhead = {:?}", t.elapsed());
}

/// Verifies that encoded request paths reach files with spaces and
/// non-ASCII characters in their names.
#[tokio::test]
async fn test_site_dispatch_decodes_paths() {
    let views = tree(&[("my page.html", "spaced"), ("café.html", "accent")]);
    let site = Site::build(
        vec![RouteConfig::new("/", views.path(), "html")],
        BuildEnv::new(EngineRegistry::new()),
    )
    .unwrap();

    let spaced = get(&site, "/my%20page").await;
    assert_eq!(spaced.status, 200);
    assert_eq!(&spaced.body[..], b"spaced");

    let accent = get(&site, "/caf%C3%A9.html").await;
    assert_eq!(accent.status, 200);
    assert_eq!(&accent.body[..], b"accent");
}

/// Verifies one subscription per (route, extension), and that a change
/// rebuilds and swaps the route.
#[tokio::test]
async fn test_watch_rebuilds_route() {
    let t = Instant::now();

    let views = tree(&[("a.html", "a"), ("b.html", "b"), ("c.md", "c")]);
    let site = Site::build(
        vec![RouteConfig::new("/", views.path(), "html")],
        BuildEnv::new(EngineRegistry::new()),
    )
    .unwrap();
    let watch = Arc::new(ManualWatch::default());
    site.watch_with(watch.clone()).unwrap();

    let mut keys = watch.keys();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            (views.path().to_path_buf(), "html".to_string()),
            (views.path().to_path_buf(), "md".to_string()),
        ]
    );

    assert_eq!(get(&site, "/fresh").await.status, 404);
    fs::write(views.path().join("fresh.txt"), "new").unwrap();
    fs::write(views.path().join("a.html"), "changed").unwrap();
    watch.fire("html");

    assert_eq!(&get(&site, "/a").await.body[..], b"changed");
    assert_eq!(get(&site, "/fresh").await.status, 200);

    // The rebuild discovered `txt`, which now has its own subscription.
    let txt = watch.keys().into_iter().filter(|(_, e)| e == "txt").count();
    assert_eq!(txt, 1);
    watch.fire("txt");
    let txt = watch.keys().into_iter().filter(|(_, e)| e == "txt").count();
    assert_eq!(txt, 1, "rebuilds never subscribe twice");

    println!("test_watch_rebuilds_route: Testing Overhead = {:?}", t.elapsed());
}

/// Verifies that a failed rebuild keeps the previous router serving.
#[tokio::test]
async fn test_failed_rebuild_keeps_router() {
    let views = tree(&[("a.html", "a")]);
    let site = Site::build(
        vec![RouteConfig::new("/", views.path(), "html")],
        BuildEnv::new(EngineRegistry::new()),
    )
    .unwrap();

    fs::write(views.path().join("broken.html"), "<!---\n[cookies\n--->").unwrap();
    assert!(site.rebuild(0).is_err());
    assert_eq!(get(&site, "/a").await.status, 200);
    assert_eq!(get(&site, "/broken").await.status, 404);
}

/// Verifies the HTTP/1.1 framing of a full request over TCP.
#[tokio::test]
async fn test_http_round_trip() {
    let t = Instant::now();

    let views = tree(&[(
        "index.html",
        "<!---\n[cookies]\ntheme = \"dark\"\n--->\n<h1>Home</h1>",
    )]);
    let site = Site::build(
        vec![RouteConfig::new("/", views.path(), "html")],
        BuildEnv::new(EngineRegistry::new()),
    )
    .unwrap();

    let server = SiteServer::bind("127.0.0.1:0".parse().unwrap(), site).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
    assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
    assert!(text.contains("Set-Cookie: theme=dark; Path=/\r\n"));
    assert!(text.ends_with("<h1>Home</h1>"));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"POST / HTTP/1.1\r\n\r\n").await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    assert!(String::from_utf8(raw).unwrap().starts_with("HTTP/1.1 405"));

    println!("test_http_round_trip: Testing Overhead = {:?}", t.elapsed());
}

/// Verifies that a client shutting down its write side after the request
/// still receives the full response.
#[tokio::test]
async fn test_half_closed_client_gets_response() {
    let views = tree(&[("about.html", "about us")]);
    let site = Site::build(
        vec![RouteConfig::new("/", views.path(), "html")],
        BuildEnv::new(EngineRegistry::new()),
    )
    .unwrap();

    let server = SiteServer::bind("127.0.0.1:0".parse().unwrap(), site).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /about HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    stream.shutdown().await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
    assert!(text.ends_with("about us"));
}

/// Verifies request head parsing and response encoding.
#[tokio::test]
async fn test_stream_framing() {
    let raw: &[u8] = b"GET /a?b=1 HTTP/1.1\r\nHost: x\r\nAccept: text/html\r\n\r\n";
    let mut reader = BufReader::new(raw);
    let head = read_request(&mut reader).await.unwrap().unwrap();
    assert_eq!(head.method, "GET");
    assert_eq!(head.target, "/a?b=1");
    assert_eq!(head.header("accept"), Some("text/html"));

    let mut empty = BufReader::new(&b""[..]);
    assert!(read_request(&mut empty).await.unwrap().is_none());

    let mut bad = BufReader::new(&b"HELLO\r\n\r\n"[..]);
    assert!(read_request(&mut bad).await.is_err());

    let mut response = routex_core::Response::with_status(500);
    response.set_cookie("a", "1");
    let encoded = encode_response(&response, false);
    assert_eq!(
        &encoded[..],
        &b"HTTP/1.1 500 Internal Server Error\r\nSet-Cookie: a=1; Path=/\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"[..]
    );
}

/// Verifies that the head reader stops at its size bound, even on a request
/// line that never ends.
#[tokio::test]
async fn test_request_head_is_bounded() {
    let mut endless = BufReader::new(tokio::io::repeat(b'a'));
    let err = read_request(&mut endless).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    assert_eq!(err.to_string(), "request head too large");

    let mut headers = b"GET / HTTP/1.1\r\n".to_vec();
    while headers.len() <= MAX_HEAD {
        headers.extend_from_slice(b"X-Filler: 0123456789\r\n");
    }
    headers.extend_from_slice(b"\r\n");
    let mut reader = BufReader::new(&headers[..]);
    assert!(read_request(&mut reader).await.is_err());
}
