use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::settings::Settings;

#[derive(Debug, Parser)]
#[command(author, version, about = "Capture patient vitals and ECG data from a bedside device")]
pub struct Cli {
    /// Settings file (defaults to ./vitals-capture.json when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one capture session and publish the results.
    Capture {
        #[arg(long)]
        patient_id: Option<String>,
        #[arg(long)]
        patient_name: Option<String>,
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
    },
    /// Serve the patient data dashboard.
    Dashboard {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Log every raw line from the device to a CSV file until interrupted.
    Record {
        #[arg(short, long, default_value = "ecg_data.csv")]
        output: PathBuf,
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
    },
    /// List serial ports.
    Ports,
}

impl Command {
    /// Flags win over the settings file and the environment.
    pub fn apply_to(&self, settings: &mut Settings) {
        let (port, baud) = match self {
            Command::Capture { port, baud, .. } | Command::Record { port, baud, .. } => {
                (port.clone(), *baud)
            }
            Command::Dashboard { bind } => {
                if let Some(bind) = bind {
                    settings.dashboard.bind = bind.clone();
                }
                (None, None)
            }
            Command::Ports => (None, None),
        };
        if let Some(port) = port {
            settings.serial.port = port;
        }
        if let Some(baud) = baud {
            settings.serial.baud_rate = baud;
        }
    }
}
