//! Application abstraction for reducing main.rs boilerplate.
//!
//! This module provides the `StageConfig` trait and `Application` struct
//! to standardize startup logic across the bronze, silver and gold binaries.

use std::fmt::Display;
use std::future::Future;
use std::process::ExitCode;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::{ConfigPath, MetricsConfig, load_from_paths};
use crate::error::ConfigError;
use crate::metrics;
use crate::outcome::RunOutcome;
use crate::tracing::init_tracing;

/// Trait for stage configurations that can be loaded and run.
///
/// A stage config is deserialized from the merged YAML document. It picks
/// the sections it needs and ignores the others.
pub trait StageConfig: DeserializeOwned + Sized {
    /// Stage name used in log and error messages (e.g., "silver").
    const STAGE: &'static str;

    /// Check the loaded values before anything touches storage.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Metrics export settings.
    fn metrics(&self) -> &MetricsConfig;

    /// Log startup info (what the stage is about to do).
    fn log_startup_info(&self);
}

/// A finished run that can summarize itself.
pub trait Reportable {
    fn outcome(&self) -> RunOutcome;
}

/// Application runner that handles the full startup lifecycle.
pub struct Application<C: StageConfig> {
    config: C,
}

impl<C: StageConfig> Application<C> {
    /// Full application lifecycle: load config, run the stage, export metrics.
    ///
    /// This is the main entry point for the binaries. It handles:
    /// 1. Initialize tracing
    /// 2. Validate config paths
    /// 3. Load and validate configuration
    /// 4. Run the stage on a tokio runtime
    /// 5. Map the run outcome to the process exit code
    pub fn run<F, Fut, R, E>(paths: &[ConfigPath], stage: F) -> ExitCode
    where
        F: FnOnce(C) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: Reportable,
        E: Display,
    {
        init_tracing();

        if paths.is_empty() {
            eprintln!("Error: no config files or directories specified");
            return ExitCode::FAILURE;
        }

        let source_count = paths.len();
        info!("Loading config from {source_count} source(s)");

        match Self::from_paths(paths) {
            Ok(app) => app.execute(stage),
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                ExitCode::FAILURE
            }
        }
    }

    /// Load and validate config from paths (useful for testing).
    pub fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let config: C = load_from_paths(paths)?;
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Execute the stage (after config is loaded).
    pub fn execute<F, Fut, R, E>(self, stage: F) -> ExitCode
    where
        F: FnOnce(C) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: Reportable,
        E: Display,
    {
        self.config.log_startup_info();

        let metrics_config = self.config.metrics().clone();
        if let Err(e) = metrics::init(&metrics_config) {
            eprintln!("Failed to initialize metrics: {e}");
            return ExitCode::FAILURE;
        }

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                eprintln!("Failed to start runtime: {e}");
                return ExitCode::FAILURE;
            }
        };
        let result = runtime.block_on(stage(self.config));

        if let Err(e) = metrics::flush(&metrics_config) {
            warn!(error = %e, "Failed to export metrics");
        }

        match result {
            Ok(report) => {
                let outcome = report.outcome();
                info!(stage = C::STAGE, %outcome, "Run finished");
                if outcome.is_failure() {
                    eprintln!("{} finished with {outcome}", C::STAGE);
                }
                outcome.exit_code()
            }
            Err(e) => {
                eprintln!("{} failed: {e}", C::STAGE);
                ExitCode::FAILURE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    use crate::config::StorageConfig;

    #[derive(Debug, Deserialize)]
    struct DemoConfig {
        storage: StorageConfig,
        #[serde(default)]
        metrics: MetricsConfig,
    }

    impl StageConfig for DemoConfig {
        const STAGE: &'static str = "demo";

        fn validate(&self) -> Result<(), ConfigError> {
            self.storage.validate()
        }

        fn metrics(&self) -> &MetricsConfig {
            &self.metrics
        }

        fn log_startup_info(&self) {}
    }

    struct Fixed(RunOutcome);

    impl Reportable for Fixed {
        fn outcome(&self) -> RunOutcome {
            self.0
        }
    }

    fn write_config(contents: &str) -> (tempfile::TempDir, ConfigPath) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enem.yaml");
        std::fs::write(&path, contents).unwrap();
        (dir, ConfigPath::file(path))
    }

    #[test]
    fn test_other_sections_ignored() {
        let (_dir, path) = write_config("storage: {bucket: b}\nsilver: {anything: 1}\n");
        let app = Application::<DemoConfig>::from_paths(&[path]).unwrap();
        assert_eq!(app.config().storage.bucket, "b");
    }

    #[test]
    fn test_validation_runs_on_load() {
        let (_dir, path) = write_config("storage: {bucket: ''}\n");
        assert!(matches!(
            Application::<DemoConfig>::from_paths(&[path]),
            Err(ConfigError::EmptyBucket)
        ));
    }

    #[test]
    fn test_exit_code_follows_outcome() {
        let (_dir, path) = write_config("storage: {bucket: b}\n");

        let app = Application::<DemoConfig>::from_paths(std::slice::from_ref(&path)).unwrap();
        let code = app.execute(|_| async { Ok::<_, ConfigError>(Fixed(RunOutcome::Completed)) });
        assert_eq!(code, ExitCode::SUCCESS);

        let app = Application::<DemoConfig>::from_paths(std::slice::from_ref(&path)).unwrap();
        let code =
            app.execute(|_| async { Ok::<_, ConfigError>(Fixed(RunOutcome::PartialFailure)) });
        assert_eq!(code, ExitCode::FAILURE);

        let app = Application::<DemoConfig>::from_paths(&[path]).unwrap();
        let code = app.execute(|_| async { Err::<Fixed, _>(ConfigError::NoConfigPaths) });
        assert_eq!(code, ExitCode::FAILURE);
    }
}
