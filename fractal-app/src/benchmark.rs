//! Timing of generate requests across zoom levels.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;
use fractal_gpu::{ComputeBackend, ComputeEngine, GenerateOutcome};

use crate::error::AppError;

/// Benchmark plan derived from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkPlan {
    pub zooms: Vec<f64>,
    pub runs: usize,
    pub concurrency: usize,
    pub max_duration: Option<Duration>,
}

/// One timed generate request.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRecord {
    pub zoom: f64,
    pub round: usize,
    pub slot: usize,
    pub budget: u32,
    /// Wall-clock time including the wait for the device lock.
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl BenchmarkRecord {
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated results for one zoom level.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomSummary {
    pub zoom: f64,
    pub budget: u32,
    pub requests: usize,
    pub successful: usize,
    pub failed: usize,
    pub avg_time_ms: Option<f64>,
    pub median_time_ms: Option<f64>,
    pub stddev_time_ms: Option<f64>,
}

/// Runs the plan against `engine`, centered on the configured default view.
///
/// Each round issues `concurrency` overlapping requests on blocking worker
/// threads and waits for all of them. Once `max_duration` has elapsed no new
/// round is started.
pub async fn run_benchmark<B: ComputeBackend>(
    engine: Arc<ComputeEngine<B>>,
    plan: &BenchmarkPlan,
) -> Result<Vec<BenchmarkRecord>, AppError> {
    let center = engine.config().default_view;
    let concurrency = plan.concurrency.max(1);
    let started = Instant::now();
    let mut records = Vec::with_capacity(plan.zooms.len() * plan.runs * concurrency);

    'zooms: for &zoom in &plan.zooms {
        for round in 0..plan.runs {
            if let Some(limit) = plan.max_duration {
                if started.elapsed() >= limit {
                    log::warn!(
                        "Benchmark time limit of {} reached, stopping early",
                        humantime::format_duration(limit)
                    );
                    break 'zooms;
                }
            }

            let tasks: Vec<_> = (0..concurrency)
                .map(|slot| {
                    let engine = Arc::clone(&engine);
                    tokio::task::spawn_blocking(move || {
                        let start = Instant::now();
                        let outcome = engine.generate(center.center_real, center.center_imag, zoom);
                        let elapsed = start.elapsed();
                        let budget = outcome.budget();
                        let error = match outcome {
                            GenerateOutcome::Success(_) => None,
                            GenerateOutcome::Failure(f) => Some(f.error.to_string()),
                        };
                        BenchmarkRecord {
                            zoom,
                            round,
                            slot,
                            budget,
                            elapsed,
                            error,
                        }
                    })
                })
                .collect();

            for task in tasks {
                let record = task.await?;
                log::debug!(
                    "zoom {} round {} slot {}: {:?}",
                    record.zoom,
                    record.round,
                    record.slot,
                    record.elapsed
                );
                records.push(record);
            }
        }
    }

    log::info!(
        "Benchmark finished: {} requests in {:?}",
        records.len(),
        started.elapsed()
    );
    Ok(records)
}

/// Groups records by zoom level, in the order the levels were first seen.
pub fn summarize(records: &[BenchmarkRecord]) -> Vec<ZoomSummary> {
    let mut zooms: Vec<f64> = Vec::new();
    for record in records {
        if !zooms.iter().any(|z| z.to_bits() == record.zoom.to_bits()) {
            zooms.push(record.zoom);
        }
    }

    zooms
        .into_iter()
        .map(|zoom| {
            let group: Vec<&BenchmarkRecord> = records
                .iter()
                .filter(|r| r.zoom.to_bits() == zoom.to_bits())
                .collect();
            let mut times: Vec<f64> = group
                .iter()
                .filter(|r| r.is_success())
                .map(|r| r.elapsed.as_secs_f64() * 1000.0)
                .collect();
            times.sort_by(f64::total_cmp);
            let successful = times.len();
            ZoomSummary {
                zoom,
                budget: group.first().map_or(0, |r| r.budget),
                requests: group.len(),
                successful,
                failed: group.len() - successful,
                avg_time_ms: mean(&times),
                median_time_ms: median(&times),
                stddev_time_ms: stddev(&times),
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Expects `sorted` in ascending order.
fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 0 {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    } else {
        Some(sorted[n / 2])
    }
}

/// Population standard deviation.
fn stddev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

fn format_ms(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |t| format!("{t:.3}"))
}

/// Prints the per-zoom summary table to stdout.
pub fn print_summary(summaries: &[ZoomSummary]) {
    println!("{}", "--- Benchmark Summary ---".bold());
    println!(
        "{:>14} {:>10} {:>8} {:>8} {:>8} {:>12} {:>12} {:>12}",
        "Zoom", "Budget", "Reqs", "OK", "Failed", "Avg (ms)", "Median (ms)", "StdDev (ms)"
    );
    for s in summaries {
        let failed = if s.failed > 0 {
            s.failed.to_string().red().to_string()
        } else {
            s.failed.to_string().green().to_string()
        };
        println!(
            "{:>14} {:>10} {:>8} {:>8} {:>8} {:>12} {:>12} {:>12}",
            format!("{:.4e}", s.zoom),
            s.budget,
            s.requests,
            s.successful,
            failed,
            format_ms(s.avg_time_ms),
            format_ms(s.median_time_ms),
            format_ms(s.stddev_time_ms),
        );
    }
    let failures: usize = summaries.iter().map(|s| s.failed).sum();
    if failures > 0 {
        println!("{}", format!("{failures} request(s) failed").yellow());
    }
}

/// Writes one CSV row per request.
pub fn write_records_to_csv(records: &[BenchmarkRecord], path: &Path) -> Result<(), AppError> {
    let file = File::create(path)?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record([
        "Zoom",
        "Round",
        "Slot",
        "Budget",
        "Time (ms)",
        "Success",
        "Error",
    ])?;

    for record in records {
        wtr.write_record([
            record.zoom.to_string(),
            record.round.to_string(),
            record.slot.to_string(),
            record.budget.to_string(),
            format!("{:.6}", record.elapsed.as_secs_f64() * 1000.0),
            record.is_success().to_string(),
            record.error.clone().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
