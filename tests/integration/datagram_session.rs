//! Datagram session integration tests
//!
//! UDP over a VLESS stream: destination resolution, peer attribution and
//! the length-prefixed framing used by the `xtls-rprx-origin` flow.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use vless_outbound::outbound::{Metadata, VlessOutbound};
use vless_outbound::transport::SessionCacheProvider;
use vless_outbound::vless::{VlessAddress, VlessCommand, VlessRequestHeader, VlessResponseHeader};
use vless_outbound::OutboundError;

use super::{bind_local, local_option, spawn_tcp_vless_server, spawn_tls_vless_server};

#[tokio::test]
async fn test_unresolved_destination_is_resolved() {
    let (listener, port) = bind_local().await;
    let mut requests = spawn_tcp_vless_server(listener);

    let outbound =
        VlessOutbound::new(local_option("udp", port), &SessionCacheProvider::new()).unwrap();
    let conn = outbound
        .dial_udp(&Metadata::udp_domain("localhost", 53))
        .await
        .unwrap();

    // the resolved address becomes the peer, the domain stays in the header
    assert!(conn.peer_addr().ip().is_loopback());
    assert_eq!(conn.peer_addr().port(), 53);

    let request = requests.recv().await.unwrap();
    assert_eq!(request.command, VlessCommand::Udp);
    assert_eq!(request.address, VlessAddress::domain("localhost"));
}

#[tokio::test]
async fn test_raw_datagrams_echo() {
    let (listener, port) = bind_local().await;
    let _requests = spawn_tcp_vless_server(listener);

    let outbound =
        VlessOutbound::new(local_option("udp", port), &SessionCacheProvider::new()).unwrap();
    let dst = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));
    let conn = outbound.dial_udp(&Metadata::udp_ip(dst, 53)).await.unwrap();

    let unrelated: SocketAddr = "9.9.9.9:53".parse().unwrap();
    assert_eq!(conn.send_to(b"ping", unrelated).await.unwrap(), 4);

    let mut buf = [0u8; 64];
    let (n, from) = conn.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"ping");
    assert_eq!(from, SocketAddr::new(dst, 53));
}

#[tokio::test]
async fn test_resolution_failure() {
    let (listener, port) = bind_local().await;
    let mut requests = spawn_tcp_vless_server(listener);

    let outbound =
        VlessOutbound::new(local_option("udp", port), &SessionCacheProvider::new()).unwrap();
    let err = outbound
        .dial_udp(&Metadata::udp_domain("does-not-exist.invalid", 53))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, OutboundError::Resolution { .. }));
    assert!(err.to_string().contains("can't resolve ip"));
    assert!(requests.try_recv().is_err());
}

#[tokio::test]
async fn test_origin_flow_frames_over_enhanced_tls() {
    let (listener, port) = bind_local().await;
    let mut requests = spawn_tls_vless_server(listener);

    let option = local_option("xtls", port)
        .with_tls()
        .with_flow("xtls-rprx-origin")
        .with_server_name("localhost")
        .insecure_skip_verify()
        .with_udp();
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();

    let dst = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));
    let conn = outbound.dial_udp(&Metadata::udp_ip(dst, 53)).await.unwrap();

    let payloads: [&[u8]; 3] = [b"first", b"", b"third datagram"];
    for payload in payloads {
        assert_eq!(
            conn.send_to(payload, conn.peer_addr()).await.unwrap(),
            payload.len()
        );
    }

    let mut buf = [0u8; 1500];
    for payload in payloads {
        let (n, _) = conn.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], payload);
    }

    let request = requests.recv().await.unwrap();
    assert!(request.addons.is_xtls_origin());
    assert_eq!(request.command, VlessCommand::Udp);
}

#[tokio::test]
async fn test_origin_flow_framing_on_the_wire() {
    let (listener, port) = bind_local().await;
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = VlessRequestHeader::read_from(&mut socket).await.unwrap();
        VlessResponseHeader::minimal()
            .write_to(&mut socket)
            .await
            .unwrap();

        let mut frame = [0u8; 5];
        socket.read_exact(&mut frame).await.unwrap();
        socket.write_all(&[0, 2, b'o', b'k']).await.unwrap();
        (request, frame)
    });

    let option = local_option("origin", port).with_flow("xtls-rprx-origin");
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();
    let conn = outbound
        .dial_udp(&Metadata::udp_ip(IpAddr::V4(Ipv4Addr::LOCALHOST), 5353))
        .await
        .unwrap();

    conn.send_to(b"abc", conn.peer_addr()).await.unwrap();
    let mut buf = [0u8; 16];
    let (n, _) = conn.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"ok");

    let (request, frame) = server.await.unwrap();
    assert_eq!(frame, [0, 3, b'a', b'b', b'c']);
    // no TLS, so no flow addon, but the framing still applies
    assert!(request.addons.is_empty());
}

#[tokio::test]
async fn test_oversized_datagram_rejected() {
    let (listener, port) = bind_local().await;
    let _requests = spawn_tcp_vless_server(listener);

    let option = local_option("origin", port).with_flow("xtls-rprx-origin");
    let outbound = VlessOutbound::new(option, &SessionCacheProvider::new()).unwrap();
    let conn = outbound
        .dial_udp(&Metadata::udp_ip(IpAddr::V4(Ipv4Addr::LOCALHOST), 53))
        .await
        .unwrap();

    let err = conn
        .send_to(&vec![0u8; 70_000], conn.peer_addr())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}
