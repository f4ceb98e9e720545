//! Stream session integration tests
//!
//! Plain TCP sessions through a mock VLESS echo server: header contents,
//! data relay, dial failures, cancellation and config-driven setup.

use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use vless_outbound::config::load_config;
use vless_outbound::outbound::{Metadata, ProxyAdapter, VlessOutbound};
use vless_outbound::transport::SessionCacheProvider;
use vless_outbound::vless::{VlessAddress, VlessCommand};
use vless_outbound::OutboundError;

use super::{bind_local, local_option, spawn_tcp_vless_server};

#[tokio::test]
async fn test_stream_session_echo() {
    let (listener, port) = bind_local().await;
    let mut requests = spawn_tcp_vless_server(listener);

    let outbound =
        VlessOutbound::new(local_option("plain", port), &SessionCacheProvider::new()).unwrap();
    let mut stream = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 80),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    let mut buf = [0u8; 18];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"GET / HTTP/1.1\r\n\r\n");

    let request = requests.recv().await.unwrap();
    assert_eq!(request.command, VlessCommand::Tcp);
    assert_eq!(request.address, VlessAddress::domain("example.com"));
    assert_eq!(request.port, 80);
    assert!(request.addons.is_empty());
}

#[tokio::test]
async fn test_stream_session_ip_destination() {
    let (listener, port) = bind_local().await;
    let mut requests = spawn_tcp_vless_server(listener);

    let outbound =
        VlessOutbound::new(local_option("plain", port), &SessionCacheProvider::new()).unwrap();
    let ip = IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34));
    let _stream = outbound
        .dial_stream(&Metadata::tcp_ip(ip, 443), &CancellationToken::new())
        .await
        .unwrap();

    let request = requests.recv().await.unwrap();
    assert_eq!(request.address, VlessAddress::Ipv4(Ipv4Addr::new(93, 184, 216, 34)));
    assert_eq!(request.port, 443);
}

#[tokio::test]
async fn test_flow_without_tls_sends_no_addon() {
    let (listener, port) = bind_local().await;
    let mut requests = spawn_tcp_vless_server(listener);

    let option = local_option("plain", port).with_flow("xtls-rprx-origin");
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();
    let _stream = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 80),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(requests.recv().await.unwrap().addons.is_empty());
}

#[tokio::test]
async fn test_dial_refused() {
    let (listener, port) = bind_local().await;
    drop(listener);

    let outbound =
        VlessOutbound::new(local_option("gone", port), &SessionCacheProvider::new()).unwrap();
    let err = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 80),
            &CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();

    assert!(matches!(err, OutboundError::Dial { .. }));
    assert!(err
        .to_string()
        .starts_with(&format!("127.0.0.1:{port} connect error:")));
}

#[tokio::test]
async fn test_cancelled_before_dial() {
    let (listener, port) = bind_local().await;
    let _requests = spawn_tcp_vless_server(listener);

    let outbound =
        VlessOutbound::new(local_option("plain", port), &SessionCacheProvider::new()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = outbound
        .dial_stream(&Metadata::tcp_domain("example.com", 80), &cancel)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, OutboundError::Cancelled { .. }));
}

#[tokio::test]
async fn test_server_closes_before_response() {
    let (listener, port) = bind_local().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 64];
        let _ = socket.read(&mut buf).await;
    });

    let outbound =
        VlessOutbound::new(local_option("plain", port), &SessionCacheProvider::new()).unwrap();
    let mut stream = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 80),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let mut buf = [0u8; 8];
    let err = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::ConnectionReset
    ));
}

#[tokio::test]
async fn test_outbound_from_config_file() {
    let (listener, port) = bind_local().await;
    let mut requests = spawn_tcp_vless_server(listener);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "log": {{ "level": "debug" }},
            "proxies": [
                {{
                    "name": "local",
                    "server": "127.0.0.1",
                    "port": {port},
                    "uuid": "{uuid}",
                    "udp": true
                }}
            ]
        }}"#,
        uuid = super::UUID
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    let option = config.proxy("local").unwrap().clone();
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();
    assert!(outbound.supports_udp());
    assert_eq!(outbound.addr(), format!("127.0.0.1:{port}"));

    let mut stream = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.org", 8080),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    stream.write_all(b"x").await.unwrap();
    let mut buf = [0u8; 1];
    stream.read_exact(&mut buf).await.unwrap();

    assert_eq!(requests.recv().await.unwrap().port, 8080);
}

#[tokio::test]
async fn test_concurrent_sessions_share_outbound() {
    let (listener, port) = bind_local().await;
    let _requests = spawn_tcp_vless_server(listener);

    let outbound = std::sync::Arc::new(
        VlessOutbound::new(local_option("plain", port), &SessionCacheProvider::new()).unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0u8..8 {
        let outbound = outbound.clone();
        handles.push(tokio::spawn(async move {
            let mut stream = outbound
                .dial_stream(
                    &Metadata::tcp_domain("example.com", 80),
                    &CancellationToken::new(),
                )
                .await
                .unwrap();
            stream.write_all(&[i; 32]).await.unwrap();
            let mut buf = [0u8; 32];
            stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, [i; 32]);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}
