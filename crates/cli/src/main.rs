//! usb-watch
//!
//! USB storage discovery and change notification from the terminal.
//! Lists attached USB devices with identity and bus metadata merged from
//! the structured device interface and the diagnostic tool, and watches
//! the volume-change stream for insert/remove events.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{create_event_bridge, setup_logging};
use config::WatchConfig;
use discovery::provider::DeviceProvider;
use discovery::source::{DeviceQuery, DiagnosticSource, VolumeEventSource};
use discovery::watcher::DriveWatcher;
use discovery::volume;
use records::DeviceRecord;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "usb-watch")]
#[command(
    author,
    version,
    about = "Discover USB storage devices and watch for drive changes"
)]
#[command(long_about = "
Discovers removable USB storage devices attached to this host, enriched
with vendor/product identity, bus topology, and USB protocol version
merged from the device registry and the diagnostic tool output.

EXAMPLES:
    # List attached storage devices
    usb-watch list

    # Include non-storage USB devices, as JSON
    usb-watch list --all --json

    # Watch for drive insertions and removals
    usb-watch watch

    # Capacity of a mounted volume
    usb-watch space G:

CONFIGURATION:
    usb-watch reads an optional TOML config from the path given with
    --config, falling back to the user config directory. Use
    --save-config to write the defaults there.
")]
struct Args {
    /// Path to configuration file (supports ~ expansion)
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to the default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List attached USB devices
    List {
        /// Include non-storage USB devices
        #[arg(long)]
        all: bool,
        /// Print the device list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Watch for drive insertions and removals
    Watch,
    /// List mounted removable drives
    Drives,
    /// Show capacity of a mounted volume
    Space {
        /// Drive letter, e.g. G:
        drive: String,
    },
    /// Safely eject a mounted volume
    Eject {
        /// Drive letter, e.g. G:
        drive: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = WatchConfig::default();
        let path = WatchConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref raw) = args.config {
        let path = PathBuf::from(shellexpand::tilde(raw).as_ref());
        WatchConfig::load(Some(path)).context("Failed to load configuration")?
    } else {
        WatchConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.general.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usb-watch v{}", env!("CARGO_PKG_VERSION"));

    match args.command.unwrap_or(Command::List {
        all: false,
        json: false,
    }) {
        Command::List { all, json } => run_list(&config, all, json),
        Command::Watch => run_watch(&config).await,
        Command::Drives => run_drives(),
        Command::Space { drive } => run_space(&drive),
        Command::Eject { drive } => run_eject(&drive),
    }
}

#[cfg(windows)]
fn system_sources() -> Result<(
    Arc<dyn DeviceQuery>,
    Arc<dyn DiagnosticSource>,
    Arc<dyn VolumeEventSource>,
)> {
    let source = Arc::new(discovery::source::SystemSource::new());
    let query: Arc<dyn DeviceQuery> = source.clone();
    let diagnostics: Arc<dyn DiagnosticSource> = source.clone();
    let events: Arc<dyn VolumeEventSource> = source;
    Ok((query, diagnostics, events))
}

#[cfg(not(windows))]
fn system_sources() -> Result<(
    Arc<dyn DeviceQuery>,
    Arc<dyn DiagnosticSource>,
    Arc<dyn VolumeEventSource>,
)> {
    anyhow::bail!("usb-watch only supports Windows hosts")
}

fn run_list(config: &WatchConfig, all: bool, json: bool) -> Result<()> {
    let (query, diagnostics, _events) = system_sources()?;
    let provider =
        DeviceProvider::with_cache_ttl(query, diagnostics, config.discovery.cache_ttl());

    let only_storage = if all { false } else { config.discovery.only_storage };
    let devices = provider.list_devices(only_storage);

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in &devices {
        print_device(device);
    }
    Ok(())
}

fn print_device(device: &DeviceRecord) {
    println!(
        "  {} - {} {}",
        device.label(),
        device.manufacturer.as_deref().unwrap_or("Unknown Manufacturer"),
        device.product_name.as_deref().unwrap_or("Unknown Product")
    );
    match (device.bus_number, device.address) {
        (Some(bus), Some(address)) => println!("      Bus {:03} Address {:03}", bus, address),
        (Some(bus), None) => println!("      Bus {:03}", bus),
        _ => {}
    }
    if let Some(version) = &device.usb_version {
        println!("      USB version: {}", version);
    }
    if let Some(serial) = &device.serial_number {
        println!("      Serial: {}", serial);
    }
    println!();
}

async fn run_watch(config: &WatchConfig) -> Result<()> {
    let (query, diagnostics, events) = system_sources()?;
    let provider = Arc::new(DeviceProvider::with_cache_ttl(
        query.clone(),
        diagnostics,
        config.discovery.cache_ttl(),
    ));
    let only_storage = config.discovery.only_storage;

    let watcher = DriveWatcher::new(events, query, config.watcher.to_settings());
    let (stream, feed) = create_event_bridge();
    watcher.start(move |event| {
        if let Err(e) = feed.send_blocking(event) {
            warn!("Dropping drive event, consumer gone: {}", e);
        }
    });

    println!("Watching for drive changes. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping watcher...");
                break;
            }
            event = stream.recv() => {
                match event {
                    Ok(event) => {
                        println!("[{}] drive {}", event.action, event.drive_letter);
                        // A change invalidates whatever was cached.
                        provider.invalidate();
                        let provider = Arc::clone(&provider);
                        let devices = tokio::task::spawn_blocking(move || {
                            provider.list_devices(only_storage)
                        })
                        .await
                        .context("Device refresh task failed")?;
                        println!("  {} storage device(s) attached", devices.len());
                    }
                    Err(e) => {
                        error!("Event stream ended: {}", e);
                        break;
                    }
                }
            }
        }
    }

    watcher.stop();
    Ok(())
}

fn run_drives() -> Result<()> {
    let drives = volume::removable_drives().context("Failed to list removable drives")?;
    if drives.is_empty() {
        println!("No removable drives mounted.");
    } else {
        for drive in drives {
            println!("{}", drive);
        }
    }
    Ok(())
}

fn run_space(drive: &str) -> Result<()> {
    let space = volume::disk_space(drive)
        .with_context(|| format!("Failed to query capacity of {}", drive))?;
    println!(
        "{} total: {:.2} GiB, free: {:.2} GiB ({:.1}% used)",
        drive,
        space.total_gib(),
        space.free_gib(),
        space.percent_used()
    );
    Ok(())
}

fn run_eject(drive: &str) -> Result<()> {
    volume::eject_drive(drive).with_context(|| format!("Failed to eject {}", drive))?;
    println!("Eject requested for {}", drive);
    Ok(())
}
