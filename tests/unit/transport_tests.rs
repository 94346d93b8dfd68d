use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use fast_webdav_rs::{
    ClientConfig, DavError, ErrorKind, HyperExecutor, ProxyConfig, TransportError, WebDavClient,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::support::BASE;

const STALLED_MULTISTATUS: &[u8] = b"HTTP/1.1 207 Multi-Status\r\n\
    Content-Type: text/xml\r\n\
    Content-Length: 5000\r\n\r\n\
    <d:multistatus xmlns:d=\"DAV:\"><d:response>";

const STALLED_FILE: &[u8] = b"HTTP/1.1 200 OK\r\n\
    Content-Type: text/plain\r\n\
    Content-Length: 5000\r\n\r\n\
    partial";

/// Reads one request head, up to and including the blank line.
async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Answers every connection with `response` and then keeps the socket open without writing.
async fn stalling_server(response: &'static [u8]) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut stream).await;
                stream.write_all(response).await.unwrap();
                stream.flush().await.unwrap();
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });
    (addr, handle)
}

fn client_for(addr: SocketAddr, read_timeout: Duration) -> WebDavClient {
    let config = ClientConfig::new(format!("http://{addr}/"))
        .with_request_timeout(Duration::from_secs(5))
        .with_read_timeout(read_timeout);
    WebDavClient::with_config(config).expect("client")
}

fn assert_body_timed_out(err: DavError) {
    assert_eq!(err.kind(), ErrorKind::Transport);
    match err {
        DavError::Transport {
            source: TransportError::Body(cause),
            ..
        } => assert_eq!(cause.kind(), io::ErrorKind::TimedOut),
        other => panic!("expected a timed out body read, got {other:?}"),
    }
}

#[tokio::test]
async fn stalled_multistatus_body_fails_after_read_timeout() {
    let (addr, server) = stalling_server(STALLED_MULTISTATUS).await;
    let client = client_for(addr, Duration::from_millis(300));

    let outcome =
        tokio::time::timeout(Duration::from_secs(5), client.list_contents("/t/", false)).await;
    let err = outcome.expect("listing gives up on its own").unwrap_err();
    assert_body_timed_out(err);

    let outcome = tokio::time::timeout(Duration::from_secs(5), client.resource_info("/t/")).await;
    assert_body_timed_out(outcome.expect("propfind gives up on its own").unwrap_err());

    server.abort();
}

#[tokio::test]
async fn stalled_download_fails_after_read_timeout() {
    let (addr, server) = stalling_server(STALLED_FILE).await;
    let client = client_for(addr, Duration::from_millis(300));

    let outcome = tokio::time::timeout(Duration::from_secs(5), client.get_bytes("/a.txt")).await;
    assert_body_timed_out(outcome.expect("download gives up on its own").unwrap_err());

    let outcome = tokio::time::timeout(Duration::from_secs(5), client.get_string("/a.txt")).await;
    assert_body_timed_out(outcome.expect("download gives up on its own").unwrap_err());

    server.abort();
}

#[tokio::test]
async fn slow_but_steady_body_is_not_cut_off() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_head(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 6\r\n\r\n")
            .await
            .unwrap();
        for chunk in [b"ab", b"cd", b"ef"] {
            tokio::time::sleep(Duration::from_millis(150)).await;
            stream.write_all(chunk).await.unwrap();
            stream.flush().await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    // each gap is under the read timeout, the whole body is not
    let client = client_for(addr, Duration::from_millis(300));
    let body = client.get_string("/slow.txt").await.expect("steady body");
    assert_eq!(body, "abcdef");

    server.abort();
}

#[tokio::test]
async fn requests_are_tunnelled_through_the_proxy() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    let proxy = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let connect = read_head(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .await
            .unwrap();
        let tunnelled = read_head(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")
            .await
            .unwrap();
        stream.flush().await.unwrap();
        (connect, tunnelled)
    });

    let config = ClientConfig::new("http://dav.test/")
        .with_request_timeout(Duration::from_secs(5))
        .with_read_timeout(Duration::from_secs(5))
        .with_proxy(
            ProxyConfig::new(format!("http://{proxy_addr}")).with_credentials("proxy", "secret"),
        );
    let client = WebDavClient::with_config(config).expect("client");

    let body = client.get_string("/t/a.txt").await.expect("tunnelled GET");
    assert_eq!(body, "hello");

    let (connect, tunnelled) = proxy.await.unwrap();
    assert!(connect.starts_with("CONNECT dav.test:"), "{connect}");
    assert!(
        connect
            .to_ascii_lowercase()
            .contains("proxy-authorization: basic chj2ehk6c2vjcmv0"),
        "{connect}"
    );
    assert!(tunnelled.starts_with("GET /t/a.txt HTTP/1.1"), "{tunnelled}");
    assert!(!tunnelled.to_ascii_lowercase().contains("proxy-authorization"));
}

#[test]
fn proxy_must_be_a_plain_http_url() {
    for url in ["socks5://127.0.0.1:1080", "not a url", "/relative"] {
        let config = ClientConfig::new(BASE).with_proxy(ProxyConfig::new(url));
        assert!(
            matches!(HyperExecutor::new(&config), Err(TransportError::InvalidProxy(_))),
            "proxy {url}"
        );
        let err = WebDavClient::with_config(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol, "proxy {url}");
    }
}

#[test]
fn read_timeout_and_proxy_are_configurable() {
    let config = ClientConfig::default();
    assert_eq!(config.read_timeout, Duration::from_secs(60));
    assert_eq!(config.proxy, None);

    let config = ClientConfig::new(BASE)
        .with_read_timeout(Duration::from_secs(3))
        .with_proxy(ProxyConfig::new("http://proxy.local:3128"));
    assert_eq!(config.read_timeout, Duration::from_secs(3));
    assert_eq!(
        config.proxy.map(|p| p.url),
        Some("http://proxy.local:3128".to_string())
    );
}
