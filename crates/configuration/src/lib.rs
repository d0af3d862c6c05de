use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    BarSourceSettings, Config, DetectorSettings, HistorySettings, LoggingSettings, SchedulerSettings,
    StorageSettings,
};

/// Prefix of environment variables that override file values,
/// e.g. `RETEST__SCHEDULER__INTERVAL_SECS=30`.
pub const ENV_PREFIX: &str = "RETEST";

/// Loads the application configuration.
///
/// Values are read from the TOML file at `path` (optional; every section has defaults)
/// and then overridden by `RETEST__SECTION__KEY` environment variables. The result is
/// validated before it is returned.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("detector.tickers"),
        )
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.detector.window, 50);
        assert_eq!(config.scheduler.interval_secs, 60);
        assert_eq!(config.bar_source.max_attempts, 2);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[detector]
tickers = ["SBER", "GAZP"]
window = 30
retest_tolerance = 0.003

[scheduler]
interval_secs = 15
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.detector.tickers, vec!["SBER".to_string(), "GAZP".to_string()]);
        assert_eq!(config.detector.window, 30);
        assert_eq!(config.detector.retest_tolerance, dec!(0.003));
        assert_eq!(config.detector.min_bars, 20);
        assert_eq!(config.scheduler.interval_secs, 15);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[detector]\nwindow = 0").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn out_of_range_spans_are_rejected() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.scheduler.fallback_lookback_secs = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
        config.scheduler.fallback_lookback_secs = -1;
        assert!(config.validate().is_err());
        config.scheduler = SchedulerSettings::default();

        config.history.max_days = i64::MAX / 2;
        assert!(config.validate().is_err());
        config.history = HistorySettings::default();

        config.detector.min_bars = i64::MAX;
        assert!(config.validate().is_err());
        config.detector = DetectorSettings::default();
        assert!(config.validate().is_ok());
    }
}
