//! rigwatchd — the rigwatch gateway daemon.
//!
//! Single binary that assembles the gateway:
//! - State store (redb)
//! - Device prober + health poller + health registry
//! - Restart coordinator
//! - Tour orchestrator
//!
//! Tours are started, paused and retimed through the control API the
//! gateway serves (see `api`). Plans, outlet wiring and tour history can be
//! managed offline with the other subcommands while the gateway is stopped.
//!
//! # Usage
//!
//! ```text
//! rigwatchd gateway --config /etc/rigwatch.toml --data-dir /var/lib/rigwatch --api-port 8090
//! curl -X POST localhost:8090/api/v1/tours -H 'content-type: application/json' \
//!     -d '{"device_id":"rig-1","name":"north field","interval_minutes":30}'
//! rigwatchd plan --data-dir /var/lib/rigwatch --file north-rig.json
//! rigwatchd outlet --data-dir /var/lib/rigwatch --device rig-1 --on-code 1361 --off-code 1364
//! ```

mod admin;
mod api;
mod gateway;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rigwatchd", about = "rigwatch gateway daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway: discovery, health polling, restarts and tours.
    Gateway {
        /// Path to rigwatch.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/rigwatch")]
        data_dir: PathBuf,

        /// Port of the control API.
        #[arg(long, default_value = "8090")]
        api_port: u16,
    },

    /// Store a movement plan from a JSON file.
    Plan {
        #[arg(long, default_value = "/var/lib/rigwatch")]
        data_dir: PathBuf,

        #[arg(long)]
        file: PathBuf,
    },

    /// Associate a device with the radio outlet powering it.
    Outlet {
        #[arg(long, default_value = "/var/lib/rigwatch")]
        data_dir: PathBuf,

        #[arg(long)]
        device: String,

        #[arg(long)]
        on_code: i64,

        #[arg(long)]
        off_code: i64,
    },

    /// Forget the outlet wiring of a device.
    Unplug {
        #[arg(long, default_value = "/var/lib/rigwatch")]
        data_dir: PathBuf,

        #[arg(long)]
        device: String,
    },

    /// List outlet wiring.
    Outlets {
        #[arg(long, default_value = "/var/lib/rigwatch")]
        data_dir: PathBuf,
    },

    /// List tours.
    Tours {
        #[arg(long, default_value = "/var/lib/rigwatch")]
        data_dir: PathBuf,
    },

    /// Print the event log of a tour.
    Events {
        #[arg(long, default_value = "/var/lib/rigwatch")]
        data_dir: PathBuf,

        #[arg(long)]
        tour: u64,

        /// Include debug events.
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rigwatchd=debug,rigwatch=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Gateway {
            config,
            data_dir,
            api_port,
        } => gateway::run(config, data_dir, api_port).await,
        Command::Plan { data_dir, file } => {
            let store = admin::open_store(&data_dir)?;
            let plan = admin::import_plan(&store, &file)?;
            println!("stored plan '{}' for {} ({} points)", plan.name, plan.device_id, plan.points.len());
            Ok(())
        }
        Command::Outlet {
            data_dir,
            device,
            on_code,
            off_code,
        } => {
            let store = admin::open_store(&data_dir)?;
            admin::set_outlet(&store, &device, on_code, off_code)?;
            println!("{device}: on {on_code}, off {off_code}");
            Ok(())
        }
        Command::Unplug { data_dir, device } => {
            let store = admin::open_store(&data_dir)?;
            if store.delete_switch_association(&device)? {
                println!("{device}: outlet wiring removed");
            } else {
                println!("{device}: no outlet wiring");
            }
            Ok(())
        }
        Command::Outlets { data_dir } => {
            let store = admin::open_store(&data_dir)?;
            for line in admin::outlet_lines(&store)? {
                println!("{line}");
            }
            Ok(())
        }
        Command::Tours { data_dir } => {
            let store = admin::open_store(&data_dir)?;
            for line in admin::tour_lines(&store)? {
                println!("{line}");
            }
            Ok(())
        }
        Command::Events {
            data_dir,
            tour,
            all,
        } => {
            let store = admin::open_store(&data_dir)?;
            for line in admin::event_lines(&store, tour, all)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}
