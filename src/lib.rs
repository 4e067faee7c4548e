pub mod capture;
pub mod cli;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod render;
pub mod serial;
pub mod settings;
pub mod storage;
pub mod utils;

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use capture::{CaptureController, SessionReport};
use cli::{Cli, Command};
use dashboard::Dashboard;
use settings::Settings;
use storage::SupabaseStore;

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    log::info!("Vitals capture starting up...");

    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.command.apply_to(&mut settings);

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(dispatch(cli.command, settings))
}

async fn dispatch(command: Command, settings: Settings) -> Result<()> {
    match command {
        Command::Capture {
            patient_id,
            patient_name,
            ..
        } => run_capture(settings, patient_id, patient_name).await,
        Command::Dashboard { .. } => run_dashboard(settings).await,
        Command::Record { output, .. } => run_record(settings, output).await,
        Command::Ports => list_ports(),
    }
}

async fn run_capture(
    settings: Settings,
    patient_id: Option<String>,
    patient_name: Option<String>,
) -> Result<()> {
    let controller = CaptureController::from_settings(settings)?;
    let patient_id = match patient_id {
        Some(id) => id,
        None => prompt("Enter Patient ID: ")?,
    };
    let patient_name = match patient_name {
        Some(name) => name,
        None => prompt("Enter Patient Name: ")?,
    };

    let report = controller.run(patient_id, patient_name).await?;
    print_report(&report);
    if report.outcome.success {
        Ok(())
    } else {
        Err(anyhow!(report.outcome.message))
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn print_report(report: &SessionReport) {
    let vitals = &report.vitals;
    let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    let elapsed = report.finished_at - report.started_at;
    println!("Session {} ({})", report.session_id, report.end.as_str());
    println!(
        "  Patient:     {} ({})",
        report.patient.name, report.patient.id
    );
    println!(
        "  Captured:    {} to {} ({:.1}s)",
        report.started_at.format("%H:%M:%S"),
        report.finished_at.format("%H:%M:%S"),
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    println!("  Weight:      {}", show(vitals.weight.map(|v| format!("{v:?}"))));
    println!("  SpO2:        {}", show(vitals.spo2.map(|v| format!("{v:?}"))));
    println!("  Pulse:       {}", show(vitals.pulse.map(|v| v.to_string())));
    println!(
        "  Temperature: {}",
        show(vitals.temperature.map(|v| format!("{v:?}")))
    );
    println!("  ECG samples: {}", report.samples);
    if report.rejected_lines + report.dropped_lines > 0 {
        println!(
            "  Skipped:     {} malformed vitals, {} unrecognized lines",
            report.rejected_lines, report.dropped_lines
        );
    }
    if let Some(url) = &report.outcome.image_url {
        println!("  ECG image:   {url}");
    }
    println!("  Upload:      {}", report.outcome.message);
}

async fn run_dashboard(settings: Settings) -> Result<()> {
    let store = SupabaseStore::new(&settings.storage)?;
    let view = Dashboard::new(store.clone(), store);
    let server = tiny_http::Server::http(settings.dashboard.bind.as_str())
        .map_err(|err| anyhow!("failed to bind {}: {err}", settings.dashboard.bind))?;
    let server = Arc::new(server);
    log::info!("Dashboard listening on http://{}", settings.dashboard.bind);

    let worker = {
        let server = Arc::clone(&server);
        tokio::task::spawn_blocking(move || dashboard::serve(&server, &view))
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    log::info!("Shutting down dashboard");
    server.unblock();
    worker.await.context("dashboard worker join failed")
}

async fn run_record(settings: Settings, output: PathBuf) -> Result<()> {
    let cancel = CancellationToken::new();
    let mut worker = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || -> Result<capture::RecordSummary> {
            let mut link = serial::open(&settings.serial)?;
            let file = File::create(&output)
                .with_context(|| format!("failed to create {}", output.display()))?;
            let mut out = BufWriter::new(file);
            let summary = capture::record(&mut link, &mut out, &cancel)?;
            log::info!("Data saved to {}", output.display());
            Ok(summary)
        })
    };

    let summary = tokio::select! {
        joined = &mut worker => joined.context("recorder worker join failed")??,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            log::info!("Recording stopped by user");
            cancel.cancel();
            worker.await.context("recorder worker join failed")??
        }
    };

    match summary.stream_error {
        Some(err) if !cancel.is_cancelled() => Err(anyhow!(
            "recording stopped after {} lines: {err}",
            summary.lines
        )),
        _ => Ok(()),
    }
}

fn list_ports() -> Result<()> {
    let ports = serial::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}\t{}", port.name, port.description);
    }
    Ok(())
}
