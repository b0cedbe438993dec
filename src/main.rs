//! gpsd-bridge daemon binary
//!
//! Startup sequence: authenticate with the platform (retrying forever),
//! load the remote adapter configuration, connect the message bus (fatal on
//! failure), then start forwarding fix reports and settle into a heartbeat
//! loop for the life of the process.

use std::process;
use std::time::Duration;

use clap::{CommandFactory, Parser, ValueEnum};
use tracing::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;

use gpsd_bridge::bus::{self, BusEvent};
use gpsd_bridge::platform::{Credentials, PlatformClient};
use gpsd_bridge::retry::{self, RetryPolicy};
use gpsd_bridge::{forwarder, loader};

/// Directory and file name the bridge logs to
const LOG_DIRECTORY: &str = "/var/log";
const LOG_FILE_NAME: &str = "gpsd-bridge.log";

/// Delay between platform authentication attempts
const AUTH_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Period of the idle heartbeat log line
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    /// Fatal conditions terminate the process; filtering-wise this is error
    Fatal,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Fatal => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "gpsd-bridge", version, about = "Bridges gpsd fix reports onto an IoT platform's message bus", long_about = None)]
struct Args {
    /// System key identifying the platform tenant (required)
    #[arg(long)]
    system_key: Option<String>,

    /// System secret paired with the system key (required)
    #[arg(long)]
    system_secret: Option<String>,

    /// Name of this device on the platform
    #[arg(long, default_value = "gpsd-bridge")]
    device_name: String,

    /// Active key for device authentication (required)
    #[arg(long)]
    active_key: Option<String>,

    /// Platform base URL
    #[arg(long, default_value = "http://localhost:9000")]
    platform_url: String,

    /// Message bus host:port
    #[arg(long, default_value = "localhost:1883")]
    messaging_url: String,

    /// Minimum severity written to the log file
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// ID of the data collection holding adapter configuration (required)
    #[arg(long)]
    config_collection: Option<String>,
}

/// Validates the mandatory flags, exiting with status 1 if any is missing
fn required_flags(args: &Args) -> (String, String, String, String) {
    match (
        args.system_key.clone(),
        args.system_secret.clone(),
        args.active_key.clone(),
        args.config_collection.clone(),
    ) {
        (Some(system_key), Some(system_secret), Some(active_key), Some(collection)) => {
            (system_key, system_secret, active_key, collection)
        }
        _ => {
            eprintln!("ERROR - Missing required flags\n");
            let _ = Args::command().print_help();
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (system_key, system_secret, active_key, config_collection) = required_flags(&args);

    let file_appender = tracing_appender::rolling::never(LOG_DIRECTORY, LOG_FILE_NAME);
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(args.log_level))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    info!("starting gpsd-bridge");

    let platform = PlatformClient::new(
        &args.platform_url,
        Credentials {
            system_key,
            system_secret,
            device_name: args.device_name.clone(),
            active_key,
        },
    );

    debug!("authenticating with the platform");
    let session = retry::forever(
        RetryPolicy::fixed(AUTH_RETRY_DELAY),
        "platform authentication",
        || platform.authenticate(),
    )
    .await;
    info!("platform authentication succeeded");

    let config = loader::load(&platform, &session, &config_collection, &args.device_name).await;

    let (bus, mut bus_events) = match bus::connect(&args.messaging_url, &session.client_id).await {
        Ok(connected) => connected,
        Err(err) => {
            error!("unable to connect to the message bus: {err}");
            process::exit(1);
        }
    };

    // The forwarder only starts once the broker has acknowledged the session.
    match bus_events.recv().await {
        Some(BusEvent::Connected) => info!("message bus connected"),
        _ => {
            error!("message bus closed before the session was established");
            process::exit(1);
        }
    }

    tokio::spawn(async move {
        while let Some(event) = bus_events.recv().await {
            match event {
                BusEvent::Connected => info!("message bus reconnected"),
                BusEvent::ConnectionLost(reason) => {
                    // Observational only; the bus client re-dials on its own.
                    error!("message bus connection lost: {reason}");
                }
            }
        }
    });

    tokio::spawn(async move {
        if let Err(err) = forwarder::start(config, bus).await {
            error!("gpsd forwarding stopped: {err}");
        }
        // Without a fix source the bridge has nothing left to do.
        process::exit(1);
    });

    debug!("starting heartbeat ticker");
    let mut heartbeat = tokio::time::interval(HEARTBEAT_PERIOD);
    heartbeat.tick().await;
    loop {
        heartbeat.tick().await;
        info!("reading gpsd data");
    }
}
