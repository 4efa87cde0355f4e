use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use fractal_core::EngineConfig;

use crate::error::AppError;

/// Prefix of environment variables that override engine settings.
pub const ENV_PREFIX: &str = "FRACTAL_";

/// Represents the global log level for the application.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlobalLogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// Command-line front end of the fractal compute engine.
#[derive(Parser, Debug)]
#[command(name = "fractal-forge", author, version, about, long_about = None)]
pub struct AppConfig {
    /// TOML file with engine settings (grid, viewport, budget, zoom).
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, value_enum, default_value_t = GlobalLogLevel::Info, global = true)]
    pub log_level: GlobalLogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Discover the accelerator and print its status as JSON.
    Info,
    /// Compute one iteration array and print the response as JSON.
    Generate(GenerateArgs),
    /// Time generate requests across zoom levels.
    Benchmark(BenchmarkArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct GenerateArgs {
    /// Real part of the view center. Defaults to the configured view.
    #[arg(long, allow_negative_numbers = true)]
    pub center_real: Option<f64>,

    /// Imaginary part of the view center.
    #[arg(long, allow_negative_numbers = true)]
    pub center_imag: Option<f64>,

    /// Zoom factor; clamped to the configured range.
    #[arg(long)]
    pub zoom: Option<f64>,

    /// Write the response here instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON response.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct BenchmarkArgs {
    /// Comma separated zoom levels to measure.
    #[arg(long, value_delimiter = ',', default_value = "1,16,256,4096")]
    pub zooms: Vec<f64>,

    /// Rounds per zoom level.
    #[arg(long, default_value_t = 3)]
    pub runs: usize,

    /// Overlapping requests issued per round.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Stop scheduling new rounds after this long (e.g., "30s", "2m").
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub max_duration: Option<Duration>,

    /// Optional: Path to save per-request records as a CSV file.
    #[arg(long, value_name = "CSV_FILE")]
    pub csv_output: Option<PathBuf>,
}

/// Loads the engine configuration: built-in defaults, then the optional TOML
/// file, then `FRACTAL_*` environment variables (`__` separates nested keys,
/// e.g. `FRACTAL_GRID__WIDTH`). The result is validated.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig, AppError> {
    let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
    if let Some(path) = path {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        log::debug!("Loading engine config from {:?}", path);
        figment = figment.merge(Toml::file(path));
    }
    let figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: EngineConfig = figment.extract()?;
    config.validate()?;
    log::debug!("Engine config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_generate_args() {
        let args = vec![
            "fractal-forge",
            "generate",
            "--center-real",
            "-0.75",
            "--center-imag",
            "0.1",
            "--zoom",
            "16",
            "--pretty",
        ];
        let config = AppConfig::try_parse_from(args).unwrap();
        let Command::Generate(generate) = config.command else {
            panic!("expected generate");
        };
        assert_eq!(generate.center_real, Some(-0.75));
        assert_eq!(generate.center_imag, Some(0.1));
        assert_eq!(generate.zoom, Some(16.0));
        assert!(generate.pretty);
        assert_eq!(generate.output, None);
        assert_eq!(config.log_level, GlobalLogLevel::Info); // Default
    }

    #[test]
    fn test_benchmark_defaults() {
        let config = AppConfig::try_parse_from(["fractal-forge", "benchmark"]).unwrap();
        let Command::Benchmark(bench) = config.command else {
            panic!("expected benchmark");
        };
        assert_eq!(bench.zooms, vec![1.0, 16.0, 256.0, 4096.0]);
        assert_eq!(bench.runs, 3);
        assert_eq!(bench.concurrency, 1);
        assert_eq!(bench.max_duration, None);
        assert_eq!(bench.csv_output, None);
    }

    #[test]
    fn test_benchmark_flags() {
        let args = vec![
            "fractal-forge",
            "--log-level",
            "debug",
            "benchmark",
            "--zooms",
            "2,8",
            "--concurrency",
            "4",
            "--max-duration",
            "1m 30s",
            "--csv-output",
            "bench.csv",
        ];
        let config = AppConfig::try_parse_from(args).unwrap();
        assert_eq!(config.log_level, GlobalLogLevel::Debug);
        let Command::Benchmark(bench) = config.command else {
            panic!("expected benchmark");
        };
        assert_eq!(bench.zooms, vec![2.0, 8.0]);
        assert_eq!(bench.concurrency, 4);
        assert_eq!(bench.max_duration, Some(Duration::from_secs(90)));
        assert_eq!(bench.csv_output, Some(PathBuf::from("bench.csv")));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(AppConfig::try_parse_from(["fractal-forge"]).is_err());
        assert!(AppConfig::try_parse_from(["fractal-forge", "--log-level", "loud", "info"]).is_err());
    }

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let config = load_engine_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config, EngineConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "fractal.toml",
                r"
                [grid]
                width = 320
                height = 200

                [budget]
                base_iterations = 500
                ",
            )?;
            jail.set_env("FRACTAL_GRID__WIDTH", 640);

            let config = load_engine_config(Some(Path::new("fractal.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.grid.width, 640);
            assert_eq!(config.grid.height, 200);
            assert_eq!(config.budget.base_iterations, 500);
            assert_eq!(
                config.budget.max_iterations,
                EngineConfig::default().budget.max_iterations
            );
            Ok(())
        });
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("FRACTAL_GRID__HEIGHT", 0);
            let err = load_engine_config(None).unwrap_err();
            assert!(matches!(err, AppError::InvalidConfig(_)));
            Ok(())
        });
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_engine_config(Some(Path::new("definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
