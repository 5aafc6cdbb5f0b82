use std::sync::Arc;
use std::time::Duration;

use logging::Logger;
use network::codec::rtcp::is_rtcp;
use network::transport::UdpTransport;
use relay::{MediaStream, NoopTelemetry, RelayConfig, RouteSinks, SystemClock};

#[tokio::main]
async fn main() {
    println!("Relay - Starting...");

    // Load configuration
    let config = load_config();

    // Initialize logger
    let logger = initialize_logger(&config);

    logger.info("Relay starting...");

    if let Err(e) = run(config, &logger).await {
        logger.error(&format!("Relay stopped with error: {}", e));
        eprintln!("Relay stopped with error: {}", e);
        std::process::exit(1);
    }

    logger.info("Relay stopped");
}

/// Initializes the main logger from configuration
fn initialize_logger(config: &RelayConfig) -> Logger {
    let log_path = config.logging.log_file_path.clone().into();

    match Logger::with_component(
        log_path,
        config.logging.level(),
        "Main".to_string(),
        config.logging.enable_console,
    ) {
        Ok(logger) => {
            println!(
                "Logging initialized: {} (level: {})",
                config.logging.log_file_path, config.logging.log_level
            );
            logger
        }
        Err(e) => {
            eprintln!("Failed to create logger: {}", e);
            eprintln!("Cannot continue without logging system.");
            std::process::exit(1);
        }
    }
}

/// Loads configuration from file or returns default values
fn load_config() -> RelayConfig {
    // Determine the configuration file path in this order:
    // 1. First command-line argument
    // 2. relay.toml found in the working directory or its parents
    let config_path: std::path::PathBuf = match std::env::args().nth(1) {
        Some(path) => path.into(),
        None => match config_loader::find_config_file("relay.toml") {
            Ok(path) => path,
            Err(_) => {
                println!("No relay.toml found, using default values");
                return RelayConfig::default();
            }
        },
    };

    match RelayConfig::load(&config_path) {
        Ok(config) => {
            println!("Configuration loaded from: {}", config_path.display());
            config
        }
        Err(e) => {
            eprintln!(
                " Failed to load configuration from {}: {}",
                config_path.display(),
                e
            );
            eprintln!("Using default values...");
            RelayConfig::default()
        }
    }
}

/// Binds the transport, starts the stream and pumps datagrams until Ctrl-C
async fn run(config: RelayConfig, logger: &Logger) -> relay::Result<()> {
    let transport_logger = logger.for_component("Transport")?;
    let transport = Arc::new(UdpTransport::new(
        config.transport.bind_addr()?,
        transport_logger,
    )?);
    if let Some(remote) = config.transport.remote_addr()? {
        transport.set_remote(remote);
    }
    logger.info(&format!("Listening on {}", transport.local_addr()?));

    let idle_sleep = Duration::from_millis(config.send_queue.idle_sleep_ms.max(1));
    let stream = Arc::new(MediaStream::new(
        config,
        RouteSinks::single(transport.clone()),
        Arc::new(SystemClock::new()),
        Arc::new(NoopTelemetry),
        logger,
    )?);
    stream.start();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                logger.info("Shutdown requested");
                break;
            }
            _ = tokio::time::sleep(idle_sleep) => {
                pump_datagrams(&transport, &stream, logger);
            }
        }
    }

    stream.stop().await;
    let (sent, received) = transport.stats();
    logger.info(&format!(
        "Transport totals: {} sent, {} received, {} send errors",
        sent,
        received,
        transport.send_errors()
    ));
    Ok(())
}

/// Reads every pending datagram and hands it to the stream
fn pump_datagrams(transport: &UdpTransport, stream: &MediaStream, logger: &Logger) {
    loop {
        let (data, from) = match transport.receive() {
            Ok(Some(datagram)) => datagram,
            Ok(None) => return,
            Err(e) => {
                logger.warn(&format!("Receive failed: {}", e));
                return;
            }
        };

        if transport.remote_addr().is_none() {
            logger.info(&format!("Remote peer latched: {}", from));
            transport.set_remote(from);
        }

        // Errors are already logged by the stream
        if is_rtcp(&data) {
            let _ = stream.handle_rtcp(&data);
        } else {
            let _ = stream.handle_rtp(data);
        }
    }
}
