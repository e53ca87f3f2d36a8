mod clock;
mod error;
mod geo;
mod model;
mod render;
mod settings;
mod storage;
mod store;
mod summary;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use inquire::{Confirm, InquireError, Select, Text};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::clock::{SystemClock, run_clock};
use crate::error::TrackerError;
use crate::geo::{DEFAULT_CENTER, DEFAULT_ZOOM, Geocoder, MarkerBoard, NominatimGeocoder, map_view_url, pin_address};
use crate::model::{WorkOrder, WorkStatus};
use crate::render::{markers_table, orders_table, summary_table};
use crate::settings::{GeocoderSettings, load_settings, setup_config_wizard};
use crate::storage::FileBlobStore;
use crate::store::{RecordStore, parse_amount};
use crate::summary::summarize;

const LOOKUP_SPACING: Duration = Duration::from_secs(1);

// ==========================================
// Structs & Enums
// ==========================================

#[derive(Parser)]
#[command(name = "work-tracker", version, about = "Log service jobs and track what has been paid")]
struct Cli {
    /// Use this data directory instead of the configured one
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a new work order
    Add {
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        extra_hours: Option<String>,
    },
    /// List all work orders
    List {
        #[arg(long)]
        json: bool,
    },
    /// Set the payment status of a work order
    Status {
        work_number: Option<u32>,
        #[arg(value_enum)]
        status: Option<WorkStatus>,
    },
    /// Mark a work order as PAID (offers only unpaid ones)
    Pay { work_number: Option<u32> },
    /// Delete a work order
    Delete {
        work_number: Option<u32>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Re-enter a work order; it is logged again as a new order
    Edit { work_number: Option<u32> },
    /// Show running totals
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Open directions to a work order's address
    Open { work_number: Option<u32> },
    /// Show pinned addresses
    Map {
        /// Look up every address that has no pin yet
        #[arg(long)]
        refresh: bool,
    },
    /// Show a ticking clock
    Clock {
        /// Stop after this many seconds
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Configure data directory
    Config,
}

struct OrderChoice(WorkOrder);

impl fmt::Display for OrderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(f, "#{} | {} | {} | ${:.2} | {}", o.work_number, o.date, o.address, o.total_price, o.status)
    }
}

/// Background map lookups started by this invocation.
struct MapPins {
    geocoder: Option<Arc<dyn Geocoder>>,
    board: Arc<MarkerBoard>,
    pending: Vec<JoinHandle<()>>,
}

impl MapPins {
    fn new(config: &GeocoderSettings, backend: FileBlobStore) -> Self {
        let geocoder: Option<Arc<dyn Geocoder>> = if config.enabled {
            match NominatimGeocoder::new(&config.endpoint, &config.user_agent) {
                Ok(g) => Some(Arc::new(g) as Arc<dyn Geocoder>),
                Err(e) => {
                    warn!("map lookups disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };
        MapPins { geocoder, board: Arc::new(MarkerBoard::open(backend)), pending: Vec::new() }
    }

    fn pin(&mut self, address: &str) {
        if let Some(geocoder) = &self.geocoder {
            if let Some(handle) = pin_address(Arc::clone(geocoder), Arc::clone(&self.board), address) {
                self.pending.push(handle);
            }
        }
    }

    fn finish(&mut self) {
        for handle in self.pending.drain(..) {
            if handle.join().is_err() {
                warn!("a map lookup thread panicked");
            }
        }
    }
}

// ==========================================
// Main Function
// ==========================================

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Config => {
            setup_config_wizard()?;
            return Ok(());
        }
        Commands::Clock { ticks } => {
            run_clock(ticks)?;
            return Ok(());
        }
        _ => {}
    }

    // 1. Initialize configuration
    let settings = match load_settings() {
        Some(s) => s,
        None => setup_config_wizard()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| settings.data_dir());
    let backend = FileBlobStore::new(&data_dir);

    let mut store = RecordStore::open(backend.clone(), SystemClock)
        .with_context(|| format!("opening work data in {}", data_dir.display()))?;
    store.subscribe(print_overview);

    let mut pins = MapPins::new(&settings.geocoder, backend);

    let outcome = run(command, &mut store, &mut pins);
    pins.finish();
    outcome
}

fn run(command: Commands, store: &mut RecordStore<FileBlobStore>, pins: &mut MapPins) -> anyhow::Result<()> {
    match command {
        Commands::Add { address, price, extra_hours } => {
            let address = match address {
                Some(a) => a,
                None => Text::new("Address:").prompt()?,
            };
            let price = match price {
                Some(p) => p,
                None => Text::new("Price ($):").prompt()?,
            };
            let extra_hours = match extra_hours {
                Some(h) => h,
                None => Text::new("Extra Hours:").with_default("0").prompt()?,
            };

            let order = store.create(
                &address,
                parse_amount("price", &price)?,
                parse_amount("extra hours", &extra_hours)?,
            )?;
            println!("✅ Logged work order #{} (${:.2})", order.work_number, order.total_price);
            pins.pin(&order.address);
        }
        Commands::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(store.load_all())?);
            } else if store.load_all().is_empty() {
                println!("(None found)");
            } else {
                print_overview(store.load_all());
            }
        }
        Commands::Status { work_number, status } => {
            let Some(n) = resolve_order(store, work_number, "Select Work Order:", |_| true)? else {
                return Ok(());
            };
            let status = match status {
                Some(s) => s,
                None => match cancellable(
                    Select::new("Status:", vec![WorkStatus::Unpaid, WorkStatus::Processing, WorkStatus::Paid]).prompt(),
                )? {
                    Some(s) => s,
                    None => return Ok(()),
                },
            };
            let order = store.set_status(n, status)?;
            println!("✅ Work order #{} is now {}", order.work_number, order.status);
        }
        Commands::Pay { work_number } => {
            let Some(n) = resolve_order(store, work_number, "Select Work Order to mark PAID:", |o| !o.is_paid())? else {
                return Ok(());
            };
            let order = store.set_status(n, WorkStatus::Paid)?;
            if let Some(paid_on) = order.payment_date {
                println!("✅ Work order #{} paid on {}", order.work_number, paid_on);
            }
        }
        Commands::Delete { work_number, yes } => {
            let Some(n) = resolve_order(store, work_number, "Select Work Order to DELETE:", |_| true)? else {
                return Ok(());
            };
            let confirmed = yes
                || cancellable(Confirm::new(&format!("Delete work order #{}?", n)).with_default(false).prompt())?
                    .unwrap_or(false);
            if !confirmed {
                println!("Cancelled");
                return Ok(());
            }
            match store.delete(n)? {
                Some(removed) => println!("🗑️  Deleted work order #{} ({})", removed.work_number, removed.address),
                None => println!("❌ Work order #{} not found.", n),
            }
        }
        Commands::Edit { work_number } => {
            let Some(n) = resolve_order(store, work_number, "Select Work Order to edit:", |_| true)? else {
                return Ok(());
            };
            let current = store.get(n).cloned().ok_or(TrackerError::NotFound(n))?;

            let address = Text::new("Address:").with_default(&current.address).prompt()?;
            let price = Text::new("Price ($):").with_default(&current.price.to_string()).prompt()?;
            let extra_hours = Text::new("Extra Hours:").with_default(&current.extra_hours.to_string()).prompt()?;

            let order = store.edit(
                n,
                &address,
                parse_amount("price", &price)?,
                parse_amount("extra hours", &extra_hours)?,
            )?;
            println!("♻️  Work order #{} re-logged as #{}", n, order.work_number);
            pins.pin(&order.address);
        }
        Commands::Summary { json } => {
            let summary = summarize(store.load_all());
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary_table(&summary));
            }
        }
        Commands::Open { work_number } => {
            let Some(n) = resolve_order(store, work_number, "Select Work Order to open:", |_| true)? else {
                return Ok(());
            };
            let order = store.get(n).ok_or(TrackerError::NotFound(n))?;
            let url = geo::directions_url(&order.address);
            println!("🚀 Opening: {}", url);
            open_url(&url);
        }
        Commands::Map { refresh } => {
            if refresh {
                let addresses: BTreeSet<String> = store.load_all().iter().map(|o| o.address.clone()).collect();
                println!("🔍 Looking up {} address(es)...", addresses.len());
                // public Nominatim allows one request per second
                for (i, address) in addresses.iter().enumerate() {
                    if i > 0 {
                        thread::sleep(LOOKUP_SPACING);
                    }
                    pins.pin(address);
                    pins.finish();
                }
            }
            let markers = pins.board.markers();
            if markers.is_empty() {
                println!("(No pins yet)");
            } else {
                println!("{}", markers_table(&markers));
            }
            println!("🗺️  Map view: {}", map_view_url(DEFAULT_CENTER, DEFAULT_ZOOM));
        }
        Commands::Config | Commands::Clock { .. } => {}
    }
    Ok(())
}

// ==========================================
// Helpers
// ==========================================

fn print_overview(orders: &[WorkOrder]) {
    println!("{}", orders_table(orders));
    println!("{}", summary_table(&summarize(orders)));
}

/// Escape and Ctrl-C end the command quietly instead of failing it.
fn cancellable<T>(answer: Result<T, InquireError>) -> anyhow::Result<Option<T>> {
    match answer {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
            println!("Cancelled");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Uses the given number, or lets the user pick among orders matching `wanted`.
fn resolve_order(
    store: &RecordStore<FileBlobStore>,
    work_number: Option<u32>,
    prompt: &str,
    wanted: impl Fn(&WorkOrder) -> bool,
) -> anyhow::Result<Option<u32>> {
    if let Some(n) = work_number {
        return Ok(Some(n));
    }

    let options: Vec<OrderChoice> =
        store.load_all().iter().filter(|o| wanted(o)).rev().cloned().map(OrderChoice).collect();
    if options.is_empty() {
        println!("❌ No matching work orders found.");
        return Ok(None);
    }

    let choice = cancellable(Select::new(prompt, options).with_page_size(10).prompt())?;
    Ok(choice.map(|c| c.0.work_number))
}

fn open_url(url: &str) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(url).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("cmd").args(["/C", "start", "", url]).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(url).spawn().ok();
}
