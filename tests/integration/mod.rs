//! Integration tests for vless-outbound
//!
//! Every test runs the real session builder against mock servers bound to
//! `127.0.0.1:0`; no external network access is needed.
//!
//! # Test Organization
//!
//! - `stream_session`: plain TCP stream sessions, config loading, cancellation
//! - `datagram_session`: UDP over stream, resolution and length framing
//! - `tls`: standard and enhanced TLS against a self-signed rustls server
//! - `websocket`: WebSocket upgrade, headers and WebSocket over TLS
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration_tests
//! cargo test --test integration_tests websocket
//! ```

pub mod datagram_session;
pub mod stream_session;
pub mod tls;
pub mod websocket;

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

use vless_outbound::config::VlessOption;
use vless_outbound::vless::{VlessRequestHeader, VlessResponseHeader};

pub const UUID: &str = "b831381d-6324-4d53-ad4f-8cda48b30811";

/// Bind a mock server on an ephemeral loopback port
pub async fn bind_local() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Option pointing at a mock server
pub fn local_option(name: &str, port: u16) -> VlessOption {
    VlessOption::new(name, "127.0.0.1", port, UUID)
}

/// Speak the server side of VLESS on `stream` and echo every byte back
///
/// The decoded request header is reported on `requests`.
pub async fn serve_vless_echo<S>(mut stream: S, requests: mpsc::UnboundedSender<VlessRequestHeader>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Ok(request) = VlessRequestHeader::read_from(&mut stream).await else {
        return;
    };
    let _ = requests.send(request);

    if VlessResponseHeader::minimal()
        .write_to(&mut stream)
        .await
        .is_err()
        || stream.flush().await.is_err()
    {
        return;
    }

    let mut buf = vec![0u8; 16 * 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if stream.write_all(&buf[..n]).await.is_err() || stream.flush().await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = stream.shutdown().await;
}

/// Accept plain TCP connections forever, serving each with the echo server
pub fn spawn_tcp_vless_server(
    listener: TcpListener,
) -> mpsc::UnboundedReceiver<VlessRequestHeader> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve_vless_echo(socket, tx.clone()));
        }
    });
    rx
}

/// TLS acceptor with a fresh self-signed certificate for `localhost`
pub fn self_signed_acceptor() -> TlsAcceptor {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der: CertificateDer<'static> = cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![cert_der], key_der)
    .unwrap();

    TlsAcceptor::from(Arc::new(config))
}

/// Accept TLS connections forever, serving each with the echo server
pub fn spawn_tls_vless_server(
    listener: TcpListener,
) -> mpsc::UnboundedReceiver<VlessRequestHeader> {
    let acceptor = self_signed_acceptor();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Ok(tls) = acceptor.accept(socket).await {
                    serve_vless_echo(tls, tx).await;
                }
            });
        }
    });
    rx
}
