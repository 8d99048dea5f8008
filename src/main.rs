use clap::{Parser, Subcommand};
use ppplink::config::{self, Config};
use ppplink::link::accounting::LogSink;
use ppplink::link::pap::StaticCredentials;
use ppplink::link::transport::{SessionCounters, Transport};
use ppplink::link::Link;
use ppplink::telemetry::{init_logging, LinkStats, MetricsRegistry};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "ppplinkd")]
#[command(about = "A PPP link engine speaking LCP, PAP and IPCP over UDP-framed payloads")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run the link daemon
    Run {
        /// Path to ppplink.toml
        #[arg(short, long, default_value = "ppplink.toml")]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate ppplink.toml without starting the daemon
    Validate {
        /// Path to ppplink.toml
        #[arg(short, long, default_value = "ppplink.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Config {
            action: ConfigAction::Validate { config },
        }) => {
            init_logging(None);
            cmd_validate(&config)
        }
        Some(Commands::Run { config }) => cmd_run(&config),
        None => cmd_run(Path::new("ppplink.toml")),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_validate(path: &Path) -> ppplink::Result<()> {
    let config = config::load(path)?;
    let result = config::validate(&config);
    result.print_diagnostics();
    if result.has_errors() {
        return Err(ppplink::Error::Config("validation failed".to_string()));
    }
    println!("{} OK", path.display());
    Ok(())
}

fn cmd_run(path: &Path) -> ppplink::Result<()> {
    let config = config::load(path)?;
    init_logging(Some(&config.log));

    let validation = config::validate(&config);
    validation.print_diagnostics();
    if validation.has_errors() {
        return Err(ppplink::Error::Config("validation failed".to_string()));
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_daemon(config))
}

/// One UDP datagram carries one PPP payload, Protocol field onward. Each
/// remote address gets its own link actor.
async fn run_daemon(config: Config) -> ppplink::Result<()> {
    let socket = Arc::new(UdpSocket::bind(&config.link.listen).await?);
    let metrics = Arc::new(MetricsRegistry::new());
    info!("ppplinkd listening on {}", config.link.listen);

    let mut links: HashMap<SocketAddr, mpsc::UnboundedSender<Vec<u8>>> = HashMap::new();
    let mut buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = received?;
                let mailbox = links.entry(peer).or_insert_with(|| {
                    spawn_link(config.clone(), Arc::clone(&socket), peer, Arc::clone(&metrics))
                });
                if mailbox.send(buf[..len].to_vec()).is_err() {
                    // Actor finished; a fresh datagram starts a fresh link.
                    let mailbox = spawn_link(
                        config.clone(),
                        Arc::clone(&socket),
                        peer,
                        Arc::clone(&metrics),
                    );
                    let _ = mailbox.send(buf[..len].to_vec());
                    links.insert(peer, mailbox);
                }
            }
        }
    }

    Ok(())
}

/// Per-link actor: FIFO mailbox, one event at a time, periodic clock ticks.
fn spawn_link(
    config: Config,
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    metrics: Arc<MetricsRegistry>,
) -> mpsc::UnboundedSender<Vec<u8>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let peer_name = peer.to_string();
    let stats = metrics.link(&peer_name);

    tokio::spawn(async move {
        info!("link {}: new session", peer_name);

        let transport = UdpTransport {
            socket,
            peer,
            stats: Arc::clone(&stats),
        };
        let creds = credentials_from(&config);
        let mut link = Link::new(config, transport, creds, LogSink, Arc::clone(&stats));
        link.start(Instant::now());

        let mut clock = tokio::time::interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(payload) => link.handle_packet(&payload, Instant::now()),
                    None => break,
                },
                _ = clock.tick() => link.tick(Instant::now()),
            }

            // No upward IP stack in the daemon; drop what Network phase
            // delivered after counting it.
            for payload in link.drain_ipv4() {
                debug!("link {}: {} bytes of IPv4 discarded", peer_name, payload.len());
            }

            if link.is_finished() {
                break;
            }
        }

        metrics.remove(&peer_name);
        info!("link {}: session over", peer_name);
    });

    tx
}

fn credentials_from(config: &Config) -> StaticCredentials {
    let mut creds = StaticCredentials::default();
    for (name, user) in &config.users {
        creds.insert(name, &user.password, user.overrides.clone());
    }
    creds
}

/// UDP carrier: one datagram per PPP payload.
struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    stats: Arc<LinkStats>,
}

impl Transport for UdpTransport {
    fn send(&mut self, frame: &[u8]) {
        if let Err(e) = self.socket.try_send_to(frame, self.peer) {
            warn!("link {}: send failed: {}", self.peer, e);
        }
    }

    fn counters(&self) -> SessionCounters {
        SessionCounters {
            in_octets: self.stats.rx_octets.get(),
            out_octets: self.stats.tx_octets.get(),
            in_packets: self.stats.rx_packets.get(),
            out_packets: self.stats.tx_packets.get(),
        }
    }

    fn terminate(&mut self) {
        // Datagram sockets hold no per-peer state to tear down.
        debug!("link {}: transport closed", self.peer);
    }
}
