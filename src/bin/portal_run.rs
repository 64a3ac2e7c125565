//! CLI: run one portal flow against an attached browser (or a replay script).
//!
//! Usage: `portal_run [OPTIONS] <ship|labels|print|invoice> [--date MM/DD/YYYY] [--input FILE]`
//! Example: portal_run --config portal.json ship --date 03/07/2025
//!
//! The run log is written once at the end of the run, also after Ctrl-C.
//!
//! Set RUST_LOG=portal_autopilot=trace for TRACE-level span enter/exit and events.

use std::env;
use std::path::PathBuf;
use std::process;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use portal_autopilot::config::{ENV_CDP_ENDPOINT, ENV_LOG_DIR};
use portal_autopilot::dates::parse_operator_date;
use portal_autopilot::extractor::{DateFilter, ExtractOptions};
use portal_autopilot::invoice_source::load_invoices;
use portal_autopilot::lookup::{LookupTable, MasterPack, TransitDays};
use portal_autopilot::run_log_io::progress_path;
use portal_autopilot::surface::Driver;
use portal_autopilot::surface::replay::{ReplayScript, ReplaySurface};
use portal_autopilot::types::RunLog;
use portal_autopilot::workflow::{InvoiceFlow, LabelPrepFlow, PrintFlow, ShipmentFlow};
use portal_autopilot::{
  PortalConfig, PortalError, RecordSet, RunOptions, SubmissionFlow, collect_records, finish_run,
  run_records,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Run one portal flow and write its run log.
#[derive(Parser, Debug)]
#[command(name = "portal_run")]
#[command(
  after_help = r#"Environment variables (override the config file when set):
  PORTAL_CDP_ENDPOINT   Remote-debugging endpoint of the browser (e.g. http://localhost:9222).
  PORTAL_LOG_DIR        Directory for run logs when --log is not given.

Examples:
  portal_run --config portal.json ship --date 03/07/2025
  portal_run --config portal.json --replay demos/replay.json labels
  portal_run --config portal.json invoice --input invoices.csv"#
)]
struct Args {
  /// JSON config file. Defaults apply to every missing field.
  #[arg(long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Run against a replay script instead of a browser (dry run).
  #[arg(long, value_name = "FILE")]
  replay: Option<PathBuf>,

  /// Run log path. Default: <log_dir>/<flow>_log_<timestamp>.csv
  #[arg(long, value_name = "FILE")]
  log: Option<PathBuf>,

  /// Also rewrite <log>.progress.json after every record.
  #[arg(long)]
  progress: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Confirm shipments picked up on a date.
  Ship {
    /// Pickup date, MM/DD/YYYY. Prompted for when absent.
    #[arg(long)]
    date: Option<String>,
  },
  /// Prepare carton labels for shipments picked up on a date.
  Labels {
    #[arg(long)]
    date: Option<String>,
  },
  /// Print labels for shipments picked up on a date.
  Print {
    #[arg(long)]
    date: Option<String>,
  },
  /// Create invoices from an input sheet.
  Invoice {
    /// Invoice sheet (CSV). Default: the config's invoice.input.
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,
  },
}

/// Where a run's records come from.
enum Source {
  Listing(NaiveDate),
  Sheet(RecordSet),
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .init();

  info!("portal_run starting");
  let args = Args::parse();
  if let Err(e) = run(args).await {
    error!(error = %e, "run failed");
    eprintln!("Error: {e}");
    process::exit(1);
  }
}

async fn run(args: Args) -> Result<(), PortalError> {
  let mut config = match &args.config {
    Some(path) => PortalConfig::load(path)?,
    None => PortalConfig::default(),
  };
  config.apply_env(|k| env::var(k).ok());
  info!(
    cdp_endpoint = %config.cdp_endpoint,
    log_dir = %config.log_dir.display(),
    "options ({ENV_CDP_ENDPOINT} / {ENV_LOG_DIR} or config)"
  );

  let (flow, source) = plan(&args.command, &config).await?;
  let log_path = args
    .log
    .clone()
    .unwrap_or_else(|| config.log_path(flow.name(), Local::now()));
  let progress = args.progress.then(|| progress_path(&log_path));

  let mut driver = open_driver(&args, &config).await?;
  let shutdown = shutdown_signal();
  tokio::pin!(shutdown);

  let outcome = async {
    let records = match source {
      Source::Sheet(records) => Some(records),
      Source::Listing(date) => {
        let start_url = config.require_start_url()?;
        let options = ExtractOptions {
          link_base: config.link_base.clone(),
        };
        let filter = DateFilter::for_date(date);
        info!(date = %filter.needle(), "collecting records");
        tokio::select! {
          biased;
          _ = &mut shutdown => None,
          r = collect_records(&mut driver, start_url, &config.pagination, &filter, &options) => {
            Some(r?)
          }
        }
      }
    };
    let log = match records {
      Some(records) => {
        let options = RunOptions {
          progress: progress.as_deref(),
        };
        run_records(flow.as_ref(), &mut driver, records, options, &mut shutdown).await
      }
      None => {
        let mut log = RunLog::new(flow.name(), flow.log_columns());
        log.interrupted = true;
        log
      }
    };
    Ok::<_, PortalError>(log)
  }
  .await;

  match outcome {
    Ok(log) => {
      let interrupted = log.interrupted;
      let rows = finish_run(driver, log, &log_path).await?;
      println!("Run {}.", if interrupted { "interrupted" } else { "completed" });
      println!("  Flow: {}", flow.name());
      println!("  Records logged: {rows}");
      println!("  Log: {}", log_path.display());
      Ok(())
    }
    Err(e) => {
      if let Err(release) = driver.release().await {
        warn!(error = %release, "surface release failed");
      }
      Err(e)
    }
  }
}

/// Builds the flow for `command` and says where its records come from.
async fn plan(
  command: &Command,
  config: &PortalConfig,
) -> Result<(Box<dyn SubmissionFlow>, Source), PortalError> {
  Ok(match command {
    Command::Ship { date } => {
      let date = pickup_date(date.as_deref()).await?;
      let transit = LookupTable::<TransitDays>::load(&config.shipment.transit_days)?;
      let flow = ShipmentFlow::new(config.shipment.clone(), transit, date);
      (Box::new(flow), Source::Listing(date))
    }
    Command::Labels { date } => {
      let date = pickup_date(date.as_deref()).await?;
      let packs = LookupTable::<MasterPack>::load(&config.labels.master_pack)?;
      let home = config.require_start_url().ok().map(String::from);
      let flow = LabelPrepFlow::new(config.labels.clone(), packs, home);
      (Box::new(flow), Source::Listing(date))
    }
    Command::Print { date } => {
      let date = pickup_date(date.as_deref()).await?;
      (Box::new(PrintFlow::new(config.print.clone())), Source::Listing(date))
    }
    Command::Invoice { input } => {
      if config.invoice.search_url.trim().is_empty() {
        return Err(PortalError::Config("invoice.search_url is not set".to_string()));
      }
      let path = input.clone().unwrap_or_else(|| config.invoice.input.clone());
      let records = load_invoices(&path)?;
      (
        Box::new(InvoiceFlow::new(config.invoice.clone())),
        Source::Sheet(records),
      )
    }
  })
}

/// The `--date` value, or one line typed by the operator.
async fn pickup_date(flag: Option<&str>) -> Result<NaiveDate, PortalError> {
  if let Some(date) = flag {
    return parse_operator_date(date);
  }
  let mut stdout = tokio::io::stdout();
  let prompt = b"Enter a date (MM/DD/YYYY): ";
  stdout
    .write_all(prompt)
    .await
    .map_err(|e| PortalError::io("<stdout>", e))?;
  stdout.flush().await.map_err(|e| PortalError::io("<stdout>", e))?;
  let mut line = String::new();
  BufReader::new(tokio::io::stdin())
    .read_line(&mut line)
    .await
    .map_err(|e| PortalError::io("<stdin>", e))?;
  parse_operator_date(&line)
}

async fn open_driver(args: &Args, config: &PortalConfig) -> Result<Driver, PortalError> {
  if let Some(path) = &args.replay {
    let script = ReplayScript::load(path)?;
    info!(script = %path.display(), "replay surface (dry run)");
    return Ok(Driver::new(Box::new(ReplaySurface::new(script)), config.timeouts));
  }
  attach_browser(config).await
}

#[cfg(feature = "browser")]
async fn attach_browser(config: &PortalConfig) -> Result<Driver, PortalError> {
  use portal_autopilot::surface::cdp::CdpSurface;

  let surface = CdpSurface::attach(
    &config.cdp_endpoint,
    &config.start_url,
    config.selectors.clone(),
  )
  .await?;
  Ok(Driver::new(Box::new(surface), config.timeouts))
}

#[cfg(not(feature = "browser"))]
async fn attach_browser(_config: &PortalConfig) -> Result<Driver, PortalError> {
  Err(PortalError::Connect(
    "built without the `browser` feature; rebuild with --features browser or pass --replay"
      .to_string(),
  ))
}

/// Resolves on Ctrl-C. Never resolves when the signal cannot be installed.
async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(error = %e, "cannot listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  warn!("interrupt received, finishing up");
}
