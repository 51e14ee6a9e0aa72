use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use batchmon_core::monitor::batch_monitor::BatchMonitor;
use batchmon_core::monitor::config::MonitorConfig;
use batchmon_core::progress::snapshot::format_clock;
use batchmon_core::source::batch_registry::BatchRegistry;
use batchmon_core::source::http_client::HttpBatchClient;
use batchmon_core::types::types::{BatchId, BatchRun};

mod terminal_observer;
use terminal_observer::TerminalMonitorObserver;

#[derive(Parser)]
#[command(name = "batchmon", about = "Batch run monitor for the recipe backend")]
struct Args {
    /// Base URL of the batch backend
    #[arg(long, env = "BATCHMON_URL", default_value = "http://127.0.0.1:8080")]
    base_url: String,

    /// Poll interval in milliseconds
    #[arg(long, default_value = "2000")]
    interval_ms: u64,

    /// Nominal batch duration in seconds, used to flag overdue batches
    #[arg(long, default_value = "60")]
    nominal_secs: u64,

    /// Per-fetch timeout in milliseconds (defaults to 3/4 of the interval)
    #[arg(long)]
    fetch_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all batch runs
    List,
    /// Show one batch run
    Show { id: String },
    /// Start a batch run on the PLC
    Start {
        id: String,
        /// Keep monitoring the batch after starting it
        #[arg(long)]
        watch: bool,
    },
    /// Stop a batch run
    Stop { id: String },
    /// Monitor a running batch until it completes or fails
    Watch { id: String },
}

impl Args {
    fn monitor_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::new()
            .with_poll_interval(Duration::from_millis(self.interval_ms))
            .with_nominal_duration(Duration::from_secs(self.nominal_secs));
        if let Some(ms) = self.fetch_timeout_ms {
            config = config.with_fetch_timeout(Duration::from_millis(ms));
        }
        config
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    let client = Arc::new(HttpBatchClient::new(args.base_url.clone()).map_err(|e| e.to_string())?);
    let config = args.monitor_config();
    log::debug!("[batchmon] backend={} config={:?}", client.base_url(), config);

    match &args.command {
        Command::List => {
            let runs = client.list_batch_runs().await.map_err(|e| e.to_string())?;
            if runs.is_empty() {
                println!("No batch runs.");
            }
            for run in &runs {
                print_run(run);
            }
        }
        Command::Show { id } => {
            let run = client
                .get_batch_run(&BatchId::from(id.as_str()))
                .await
                .map_err(|e| e.to_string())?;
            print_run(&run);
        }
        Command::Start { id, watch } => {
            let batch_id = BatchId::from(id.as_str());
            let ack = client.start_batch(&batch_id).await.map_err(|e| e.to_string())?;
            println!("{}", ack.message);
            if *watch {
                watch_batch(&client, &batch_id, config).await?;
            }
        }
        Command::Stop { id } => {
            let ack = client
                .stop_batch(&BatchId::from(id.as_str()))
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", ack.message);
        }
        Command::Watch { id } => {
            watch_batch(&client, &BatchId::from(id.as_str()), config).await?;
        }
    }
    Ok(())
}

/// Monitor `batch_id` until it reaches a terminal status or Ctrl-C.
async fn watch_batch(
    client: &Arc<HttpBatchClient>,
    batch_id: &BatchId,
    config: MonitorConfig,
) -> Result<(), String> {
    let run = client.get_batch_run(batch_id).await.map_err(|e| e.to_string())?;

    let Some(builder) = BatchMonitor::for_run(client.clone(), &run) else {
        log::info!("[batchmon] batch {} is {}, not polling", run.id, run.status);
        println!(
            "Batch {} is {}, nothing to monitor.",
            run.batch_number, run.status
        );
        return Ok(());
    };

    let monitor = builder
        .with_config(config)
        .with_observer(Arc::new(TerminalMonitorObserver::new(&run)))
        .start()
        .map_err(|e| e.to_string())?;

    tokio::select! {
        _ = monitor.stopped() => {}
        _ = tokio::signal::ctrl_c() => {
            monitor.stop();
            println!("\nMonitoring interrupted.");
        }
    }

    let session = monitor.session();
    if let Some(metrics) = session.last_metrics {
        println!(
            "Batch {}: {}% after {}",
            run.batch_number,
            metrics.percentage,
            format_clock(metrics.elapsed_seconds)
        );
    }
    if let Some(err) = session.last_error {
        println!("Last error: {}", err);
    }
    Ok(())
}

fn print_run(run: &BatchRun) {
    let actual = run
        .actual_quantity
        .map(|q| format!("{:.1}", q))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:>6}  {:<16} {:<10} {:>10.1} {:>10}  {}",
        run.id,
        run.batch_number,
        run.status,
        run.target_quantity,
        actual,
        run.operator_name.as_deref().unwrap_or("-"),
    );
}
