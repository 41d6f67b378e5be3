use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Soil-moisture forecasting and anomaly detection.
///
/// Reads sensor CSV exports, prepares normalized training windows, scores
/// anomalies and forecasts when the soil will become dry.
#[derive(Parser, Debug)]
#[command(name = "soilcast", version, about)]
pub struct CliArgs {
    /// TOML config file. Without it, settings come from the environment.
    #[arg(long, global = true, env = "SOILCAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Environment profile prefix (e.g. GREENHOUSE reads GREENHOUSE_HORIZON).
    #[arg(long, global = true, env = "SOILCAST_PROFILE")]
    pub profile: Option<String>,

    /// Linear model JSON file. Without it, the persistence baseline is used.
    #[arg(long, global = true, env = "SOILCAST_MODEL")]
    pub model: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Align raw CSV exports, build train/validation windows and save them.
    Process,

    /// Calibrate an error threshold and flag anomalous validation windows.
    Detect {
        /// Standard deviations above the mean training error.
        #[arg(long)]
        k: Option<f64>,

        /// Number of top anomalies to report.
        #[arg(long)]
        top: Option<usize>,
    },

    /// Forecast moisture and the first step below the dry threshold.
    Forecast {
        /// Steps to forecast.
        #[arg(long)]
        horizon: Option<usize>,

        /// Dry threshold in percent moisture.
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// MAE and RMSE of the predictor on the validation windows.
    Evaluate,

    /// Print the saved forecast and anomaly reports as JSON.
    Report,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands_and_globals() {
        let args = CliArgs::try_parse_from([
            "soilcast",
            "forecast",
            "--horizon",
            "12",
            "--model",
            "models/linear.json",
        ])
        .unwrap();
        assert_eq!(args.model, Some(PathBuf::from("models/linear.json")));
        match args.command {
            Command::Forecast { horizon, threshold } => {
                assert_eq!(horizon, Some(12));
                assert_eq!(threshold, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn detect_k_override() {
        let args = CliArgs::try_parse_from(["soilcast", "detect", "--k", "2.5"]).unwrap();
        assert!(matches!(args.command, Command::Detect { k: Some(k), .. } if k == 2.5));
    }
}
