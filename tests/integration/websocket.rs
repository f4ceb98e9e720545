//! WebSocket integration tests
//!
//! The mock server accepts the upgrade with tokio-tungstenite, records the
//! request line and headers, then speaks VLESS over the message stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_util::sync::CancellationToken;

use vless_outbound::outbound::{Metadata, VlessOutbound};
use vless_outbound::transport::{SessionCacheProvider, TransportError, WebSocketWrapper};
use vless_outbound::vless::VlessRequestHeader;
use vless_outbound::OutboundError;

use super::{bind_local, local_option, self_signed_acceptor, serve_vless_echo};

/// What the server saw in the upgrade request
#[derive(Debug)]
struct Upgrade {
    path: String,
    headers: Vec<(String, String)>,
}

async fn accept_upgrade<S>(
    stream: S,
    seen: oneshot::Sender<Upgrade>,
    requests: mpsc::UnboundedSender<VlessRequestHeader>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let headers = req
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let _ = seen.send(Upgrade {
            path: req.uri().path().to_string(),
            headers,
        });
        Ok(resp)
    };

    if let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await {
        serve_vless_echo(WebSocketWrapper::new(ws), requests).await;
    }
}

fn spawn_ws_server(
    listener: TcpListener,
    tls: bool,
) -> (
    oneshot::Receiver<Upgrade>,
    mpsc::UnboundedReceiver<VlessRequestHeader>,
) {
    let (seen_tx, seen_rx) = oneshot::channel();
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        if tls {
            if let Ok(stream) = self_signed_acceptor().accept(socket).await {
                accept_upgrade(stream, seen_tx, req_tx).await;
            }
        } else {
            accept_upgrade(socket, seen_tx, req_tx).await;
        }
    });
    (seen_rx, req_rx)
}

fn header<'a>(upgrade: &'a Upgrade, name: &str) -> Vec<&'a str> {
    upgrade
        .headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
        .collect()
}

#[tokio::test]
async fn test_websocket_session() {
    let (listener, port) = bind_local().await;
    let (seen, mut requests) = spawn_ws_server(listener, false);

    let option = local_option("ws", port).with_websocket("/ray");
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();
    let mut stream = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 80),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    stream.write_all(b"through websocket").await.unwrap();
    let mut buf = [0u8; 17];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"through websocket");

    let upgrade = seen.await.unwrap();
    assert_eq!(upgrade.path, "/ray");
    assert_eq!(header(&upgrade, "host"), [format!("127.0.0.1:{port}").as_str()]);
    assert_eq!(requests.recv().await.unwrap().port, 80);
}

#[tokio::test]
async fn test_websocket_custom_and_duplicate_headers() {
    let (listener, port) = bind_local().await;
    let (seen, _requests) = spawn_ws_server(listener, false);

    let option = local_option("ws", port)
        .with_websocket("ray")
        .with_ws_header("Host", "cdn.example.com")
        .with_ws_header("X-Forwarded-For", "10.0.0.1")
        .with_ws_header("X-Forwarded-For", "10.0.0.2");
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();
    let _stream = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 80),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let upgrade = seen.await.unwrap();
    assert_eq!(upgrade.path, "/ray");
    assert_eq!(header(&upgrade, "host"), ["cdn.example.com"]);
    assert_eq!(header(&upgrade, "x-forwarded-for"), ["10.0.0.1", "10.0.0.2"]);
}

#[tokio::test]
async fn test_websocket_over_tls() {
    let (listener, port) = bind_local().await;
    let (seen, mut requests) = spawn_ws_server(listener, true);

    // the flow addon is still sent, but TLS stays inside the WebSocket step
    let option = local_option("wss", port)
        .with_websocket("/secure")
        .with_tls()
        .with_flow("xtls-rprx-origin")
        .with_server_name("localhost")
        .insecure_skip_verify();
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();
    let mut stream = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 443),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    stream.write_all(b"wss").await.unwrap();
    let mut buf = [0u8; 3];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"wss");

    assert_eq!(seen.await.unwrap().path, "/secure");
    assert!(requests.recv().await.unwrap().addons.is_xtls_origin());
}

#[tokio::test]
async fn test_websocket_upgrade_rejected() {
    let (listener, port) = bind_local().await;
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let reject = |_req: &Request, _resp: Response| -> Result<Response, ErrorResponse> {
            let mut resp = ErrorResponse::new(Some("forbidden".into()));
            *resp.status_mut() = StatusCode::FORBIDDEN;
            Err(resp)
        };
        let _ = tokio_tungstenite::accept_hdr_async(socket, reject).await;
    });

    let option = local_option("ws", port).with_websocket("/ray");
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();
    let err = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 80),
            &CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        OutboundError::Transport(TransportError::WebSocketHandshakeFailed(_))
    ));
}

#[tokio::test]
async fn test_websocket_datagram_session() {
    let (listener, port) = bind_local().await;
    let (_seen, mut requests) = spawn_ws_server(listener, false);

    let option = local_option("ws", port).with_websocket("/udp").with_udp();
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();
    let ip = std::net::IpAddr::V4(std::net::Ipv4Addr::new(8, 8, 8, 8));
    let conn = outbound.dial_udp(&Metadata::udp_ip(ip, 53)).await.unwrap();

    conn.send_to(b"dns?", conn.peer_addr()).await.unwrap();
    let mut buf = [0u8; 16];
    let (n, _) = conn.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"dns?");

    let request = requests.recv().await.unwrap();
    assert_eq!(request.command, vless_outbound::vless::VlessCommand::Udp);
}
