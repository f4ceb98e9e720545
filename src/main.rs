//! vless-outbound: open one session through a VLESS proxy
//!
//! # Usage
//!
//! ```bash
//! # Relay stdin/stdout over a stream session
//! vless-outbound -c config.json example.com:80
//!
//! # Send each stdin line as one datagram through a named proxy
//! vless-outbound -c config.json -p xtls --udp 1.1.1.1:53
//!
//! # Validate the configuration
//! vless-outbound -c config.json --check
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

use vless_outbound::config::{load_config_with_env, Config, VlessOption};
use vless_outbound::datagram::PacketConn;
use vless_outbound::outbound::{Metadata, ProxyAdapter, VlessOutbound};
use vless_outbound::transport::SessionCacheProvider;

/// How long to wait for late datagram replies after stdin closes
const UDP_LINGER: Duration = Duration::from_secs(2);

/// Command-line arguments
struct Args {
    /// Configuration file path
    config_path: PathBuf,
    /// Proxy to use; the first one when absent
    proxy: Option<String>,
    /// Open a datagram session instead of a stream session
    udp: bool,
    /// Check configuration only
    check_config: bool,
    /// Destination `host:port`
    target: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config_path = PathBuf::from("/etc/vless-outbound/config.json");
        let mut proxy = None;
        let mut udp = false;
        let mut check_config = false;
        let mut target = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    if let Some(path) = args.next() {
                        config_path = PathBuf::from(path);
                    }
                }
                "-p" | "--proxy" => {
                    proxy = args.next();
                }
                "--udp" => {
                    udp = true;
                }
                "--check" => {
                    check_config = true;
                }
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--version" => {
                    println!("vless-outbound v{}", vless_outbound::VERSION);
                    std::process::exit(0);
                }
                _ if !arg.starts_with('-') && target.is_none() => {
                    target = Some(arg);
                }
                _ => {
                    eprintln!("Unknown argument: {arg}");
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        Self {
            config_path,
            proxy,
            udp,
            check_config,
            target,
        }
    }
}

fn print_help() {
    println!(
        r"vless-outbound v{}

Open a stream or datagram session through a VLESS proxy.

USAGE:
    vless-outbound [OPTIONS] <HOST:PORT>

OPTIONS:
    -c, --config <PATH>     Configuration file path [default: /etc/vless-outbound/config.json]
    -p, --proxy <NAME>      Proxy to use [default: first configured proxy]
    --udp                   Send each stdin line as one datagram
    --check                 Check configuration and exit
    -h, --help              Print help information
    -v, --version           Print version information

ENVIRONMENT:
    VLESS_OUTBOUND_LOG_LEVEL     Override log level (trace, debug, info, warn, error)
    RUST_LOG                     Additional tracing directives
",
        vless_outbound::VERSION
    );
}

/// Initialize logging on stderr so stdout stays a clean relay
fn init_logging(config: &Config) -> Result<()> {
    let level = match config.log.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("tungstenite=warn".parse()?)
        .add_directive("rustls=warn".parse()?);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.log.target)
        .with_writer(std::io::stderr);

    if config.log.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    Ok(())
}

/// Parse `host:port`, accepting bracketed IPv6 literals
fn parse_target(target: &str, udp: bool) -> Result<Metadata> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("target must be host:port, got {target:?}"))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid port in {target:?}"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        bail!("target host is empty");
    }

    Ok(match (host.parse::<IpAddr>(), udp) {
        (Ok(ip), false) => Metadata::tcp_ip(ip, port),
        (Ok(ip), true) => Metadata::udp_ip(ip, port),
        (Err(_), false) => Metadata::tcp_domain(host, port),
        (Err(_), true) => Metadata::udp_domain(host, port),
    })
}

fn select_proxy<'a>(config: &'a Config, name: Option<&str>) -> Result<&'a VlessOption> {
    match name {
        Some(name) => config
            .proxy(name)
            .ok_or_else(|| anyhow!("no proxy named {name:?} in configuration")),
        None => config
            .proxies
            .first()
            .ok_or_else(|| anyhow!("configuration has no proxies")),
    }
}

async fn relay_stream(outbound: &VlessOutbound, metadata: &Metadata) -> Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let stream = outbound.dial_stream(metadata, &cancel).await?;
    info!(proxy = outbound.name(), destination = %metadata, "stream session open");

    let (mut reader, mut writer) = tokio::io::split(stream);
    let upload = async {
        let n = tokio::io::copy(&mut tokio::io::stdin(), &mut writer).await?;
        writer.shutdown().await?;
        Ok::<_, std::io::Error>(n)
    };
    let mut stdout = tokio::io::stdout();
    let download = tokio::io::copy(&mut reader, &mut stdout);

    tokio::select! {
        result = async { tokio::try_join!(upload, download) } => {
            let (up, down) = result?;
            debug!(up, down, "relay finished");
        }
        () = cancel.cancelled() => info!("interrupted"),
    }
    Ok(())
}

async fn relay_datagrams(outbound: &VlessOutbound, metadata: &Metadata) -> Result<()> {
    let conn: Arc<dyn PacketConn> = Arc::from(outbound.dial_udp(metadata).await?);
    let peer = conn.peer_addr();
    info!(proxy = outbound.name(), %peer, "datagram session open");

    let receiver = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 65_535];
            let mut stdout = tokio::io::stdout();
            while let Ok((n, from)) = conn.recv_from(&mut buf).await {
                debug!(len = n, %from, "datagram received");
                let mut line = buf[..n].to_vec();
                line.push(b'\n');
                if stdout.write_all(&line).await.is_err() || stdout.flush().await.is_err() {
                    break;
                }
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        conn.send_to(line.as_bytes(), peer).await?;
    }

    let _ = tokio::time::timeout(UDP_LINGER, receiver).await;
    conn.close().await?;
    Ok(())
}

/// Main application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config_with_env(&args.config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.config_path.display()
        )
    })?;

    if args.check_config {
        println!(
            "Configuration is valid ({} proxies)",
            config.proxies.len()
        );
        return Ok(());
    }

    init_logging(&config)?;

    let target = args
        .target
        .as_deref()
        .ok_or_else(|| anyhow!("missing target host:port (see --help)"))?;
    let metadata = parse_target(target, args.udp)?;
    let option = select_proxy(&config, args.proxy.as_deref())?;

    let caches = SessionCacheProvider::new();
    let outbound = VlessOutbound::new(option.clone(), &caches)?;
    info!(
        "vless-outbound v{} via {} ({})",
        vless_outbound::VERSION,
        outbound.name(),
        outbound.addr()
    );

    if args.udp {
        if !outbound.supports_udp() {
            bail!("proxy {:?} is not configured for udp", outbound.name());
        }
        relay_datagrams(&outbound, &metadata).await
    } else {
        relay_stream(&outbound, &metadata).await
    }
}
