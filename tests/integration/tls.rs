//! TLS integration tests
//!
//! Standard and enhanced TLS against a rustls server with a self-signed
//! certificate.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use vless_outbound::outbound::{Metadata, VlessOutbound};
use vless_outbound::transport::{SessionCacheProvider, TransportError};
use vless_outbound::OutboundError;

use super::{bind_local, local_option, spawn_tls_vless_server};

#[tokio::test]
async fn test_tls_stream_session() {
    let (listener, port) = bind_local().await;
    let mut requests = spawn_tls_vless_server(listener);

    let option = local_option("tls", port)
        .with_tls()
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
    stream.write_all(b"over tls").await.unwrap();
    let mut buf = [0u8; 8];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"over tls");

    assert!(requests.recv().await.unwrap().addons.is_empty());
}

#[tokio::test]
async fn test_enhanced_tls_sends_flow() {
    let (listener, port) = bind_local().await;
    let mut requests = spawn_tls_vless_server(listener);

    let option = local_option("xtls", port)
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
    stream.write_all(b"x").await.unwrap();
    let mut buf = [0u8; 1];
    stream.read_exact(&mut buf).await.unwrap();

    let request = requests.recv().await.unwrap();
    assert_eq!(request.addons.flow.as_deref(), Some("xtls-rprx-origin"));
}

#[tokio::test]
async fn test_certificate_verification_failure() {
    let (listener, port) = bind_local().await;
    let _requests = spawn_tls_vless_server(listener);

    // verification stays on, so the self-signed certificate is rejected
    let option = local_option("strict", port)
        .with_tls()
        .with_server_name("localhost");
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();

    let err = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 443),
            &CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();
    match err {
        OutboundError::Transport(TransportError::TlsHandshakeFailed { server_name, .. }) => {
            assert_eq!(server_name, "localhost");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_enhanced_failure_has_no_fallback() {
    let (listener, port) = bind_local().await;
    let _requests = spawn_tls_vless_server(listener);

    let option = local_option("xtls", port)
        .with_tls()
        .with_flow("xtls-rprx-origin")
        .with_server_name("localhost");
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();

    let err = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 443),
            &CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        OutboundError::Transport(TransportError::TlsHandshakeFailed { .. })
    ));
}

#[tokio::test]
async fn test_tls_against_plain_server_fails() {
    let (listener, port) = bind_local().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
    });

    let option = local_option("tls", port).with_tls().insecure_skip_verify();
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();

    let err = outbound
        .dial_stream(
            &Metadata::tcp_domain("example.com", 443),
            &CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();
    assert!(matches!(err, OutboundError::Transport(_)));
}

#[tokio::test]
async fn test_sessions_share_provider_caches() {
    let (listener, port) = bind_local().await;
    let mut requests = spawn_tls_vless_server(listener);

    let caches = SessionCacheProvider::new();
    let option = local_option("tls", port)
        .with_tls()
        .with_server_name("localhost")
        .insecure_skip_verify();
    let first = VlessOutbound::new(option.clone(), &caches).unwrap();
    let second = VlessOutbound::new(option, &caches.clone()).unwrap();

    for outbound in [&first, &second] {
        let mut stream = outbound
            .dial_stream(
                &Metadata::tcp_domain("example.com", 443),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        stream.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");
    }

    assert!(requests.recv().await.is_some());
    assert!(requests.recv().await.is_some());
}
