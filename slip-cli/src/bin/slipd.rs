//! slipd - SLIP link daemon
//!
//! Attaches SLIP links to serial ports and answers pings on them.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use slip_cli::args::Args;
use slip_cli::echo::EchoStack;
use slip_net::config::{self, SlipConfig};
use slip_net::{LinkConfig, LinkId, Registry};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const EXAMPLE_CONFIG: &str = "\
[slip]
  # Microseconds between polls when nothing is queued
  poll_interval = 1000000

[logging]
  # 0-1 error, 2 warn, 3-4 info, 5-6 debug, 7 trace
  loglevel = 4

[interfaces]

  [[ttyS1]]
    port = /dev/ttyS1
    speed = 115200
    databits = 8
    parity = none
    stopbits = 1
    flow_control = no
    mtu = 296
";

fn main() {
    let args = Args::parse();

    if args.has("version") {
        println!("slipd {}", VERSION);
        return;
    }

    if args.has("help") || args.has("h") {
        print_usage();
        return;
    }

    if args.has("exampleconfig") {
        print!("{}", EXAMPLE_CONFIG);
        return;
    }

    let file = match args.config_path() {
        Some(path) => match config::parse_file(Path::new(path)) {
            Ok(c) => Some(c),
            Err(e) => {
                eprintln!("slipd: {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    // Set up logging: -v/-q win over the config file
    let log_level = args
        .log_level()
        .or_else(|| file.as_ref().map(|c| level_for(c.logging.loglevel)))
        .unwrap_or(log::LevelFilter::Info);

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_secs()
        .init();

    let links = match link_configs(&args, file.as_ref()) {
        Ok(links) if !links.is_empty() => links,
        Ok(_) => {
            log::error!("No serial links configured (use --config or --port)");
            std::process::exit(1);
        }
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Starting slipd {}", VERSION);

    let registry = Registry::new();
    for (id, link) in &links {
        match registry.initialize(*id, link, EchoStack::new()) {
            Ok(_) => {}
            Err(e) => log::error!(
                "[{}] failed to start on {}: {} (status {})",
                link.name,
                link.port,
                e,
                e.status()
            ),
        }
    }
    if registry.is_empty() {
        log::error!("No links could be started");
        std::process::exit(1);
    }

    // Set up signal handling
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as *const () as libc::sighandler_t);
    }
    if let Ok(mut guard) = STOP_TX.lock() {
        guard.replace(stop_tx);
    }

    log::info!("slipd started with {} link(s)", registry.len());

    // Block until signal
    loop {
        match stop_rx.recv_timeout(Duration::from_secs(1)) {
            Ok(()) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(_) => break,
        }
    }

    log::info!("Shutting down...");
    for id in registry.ids() {
        if let Some(link) = registry.get(id) {
            let s = link.stats().snapshot();
            log::info!(
                "[{}] rx {} packets / {} bytes (ipv4 {}, ipv6 {}, errors {}, \
                 violations {}, dropped {}), tx {} packets / {} bytes (errors {})",
                link.name(),
                s.rx_packets,
                s.rx_bytes,
                s.rx_ipv4,
                s.rx_ipv6,
                s.rx_errors,
                s.rx_violations,
                s.rx_dropped,
                s.tx_packets,
                s.tx_bytes,
                s.tx_errors,
            );
        }
    }
    log::info!("slipd stopped");
}

/// Links from the config file, or a single one from --port.
fn link_configs(
    args: &Args,
    file: Option<&SlipConfig>,
) -> Result<Vec<(LinkId, LinkConfig)>, String> {
    if let Some(port) = args.port() {
        let defaults = LinkConfig::default();
        let link = LinkConfig {
            name: port.rsplit('/').next().unwrap_or(port).to_string(),
            port: port.to_string(),
            speed: parse_flag(args, "speed")?.unwrap_or(defaults.speed),
            mtu: parse_flag(args, "mtu")?.unwrap_or(defaults.mtu),
            flow_control: args.has("flow-control"),
            poll_interval: parse_flag(args, "poll-interval")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            ..defaults
        };
        link.validate().map_err(|e| e.to_string())?;
        return Ok(vec![(LinkId(0), link)]);
    }
    match file {
        Some(c) => c.link_configs().map_err(|e| e.to_string()),
        None => Ok(Vec::new()),
    }
}

fn parse_flag<T: std::str::FromStr>(args: &Args, key: &str) -> Result<Option<T>, String> {
    match args.get(key) {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("invalid --{}: '{}'", key, v)),
        None => Ok(None),
    }
}

/// Map a config file loglevel (0-7) to a filter.
fn level_for(loglevel: u8) -> log::LevelFilter {
    match loglevel {
        0 | 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 | 4 => log::LevelFilter::Info,
        5 | 6 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

static STOP_TX: std::sync::Mutex<Option<mpsc::Sender<()>>> = std::sync::Mutex::new(None);

extern "C" fn signal_handler(_sig: libc::c_int) {
    if let Ok(guard) = STOP_TX.lock() {
        if let Some(ref tx) = *guard {
            let _ = tx.send(());
        }
    }
}

fn print_usage() {
    println!("Usage: slipd [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config PATH, -c PATH  Path to config file");
    println!("  --port DEV, -p DEV      Serial device for a single link");
    println!("  --speed BAUD            Baud rate (default 115200)");
    println!("  --mtu N                 Link MTU (default 296, minimum 296)");
    println!("  --poll-interval MS      Milliseconds between idle polls (default 1000)");
    println!("  --flow-control          Enable RTS/CTS flow control");
    println!("  --exampleconfig         Print an example config file and exit");
    println!("  -v                      Increase verbosity (can repeat)");
    println!("  -q                      Decrease verbosity (can repeat)");
    println!("  --version               Print version and exit");
    println!("  --help, -h              Print this help");
}
