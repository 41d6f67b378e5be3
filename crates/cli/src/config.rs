use anyhow::{Context, Result};
use tracing::debug;

use soilcast_core::Config;

use crate::cli::{CliArgs, Command};

/// Resolve the effective config: TOML file if given, otherwise the
/// environment (optionally profiled), then subcommand overrides.
pub fn load(args: &CliArgs) -> Result<Config> {
    let mut config = match (&args.config, &args.profile) {
        (Some(path), _) => {
            debug!(path = %path.display(), "Loading config file");
            Config::from_toml_file(path)
                .with_context(|| format!("failed to load config: {}", path.display()))?
        }
        (None, Some(profile)) => Config::for_profile(profile),
        (None, None) => Config::from_env(),
    };

    apply_overrides(&mut config, &args.command);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn apply_overrides(config: &mut Config, command: &Command) {
    match *command {
        Command::Detect { k, top } => {
            if let Some(k) = k {
                config.anomaly.k = k;
            }
            if let Some(top) = top {
                config.anomaly.top_n = top;
            }
        }
        Command::Forecast { horizon, threshold } => {
            if let Some(h) = horizon {
                config.forecast.horizon = h;
            }
            if let Some(t) = threshold {
                config.forecast.dry_threshold = t;
            }
        }
        Command::Process | Command::Evaluate | Command::Report => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn toml_file_with_forecast_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soilcast.toml");
        std::fs::write(&path, "[forecast]\nhorizon = 8\ndry_threshold = 25.0\n").unwrap();

        let args = CliArgs::try_parse_from([
            "soilcast",
            "--config",
            path.to_str().unwrap(),
            "forecast",
            "--threshold",
            "28",
        ])
        .unwrap();
        let config = load(&args).unwrap();
        assert_eq!(config.forecast.horizon, 8);
        assert_eq!(config.forecast.dry_threshold, 28.0);
    }

    #[test]
    fn invalid_override_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soilcast.toml");
        std::fs::write(&path, "").unwrap();
        let args = CliArgs::try_parse_from([
            "soilcast",
            "--config",
            path.to_str().unwrap(),
            "forecast",
            "--horizon",
            "0",
        ])
        .unwrap();
        assert!(load(&args).is_err());
    }
}
