//! hitview: rank the hits of a screening export and print what the dashboard would show

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use egui::{pos2, vec2, Rect};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hv_core::{DashboardSettings, LibraryFilter};
use hv_data::schema::SCORE_PREFIX;
use hv_data::CsvRowSource;
use hv_views::{Collaborators, Dashboard};

mod report;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Screening export (.tsv or .csv)
    file: PathBuf,

    /// Rank metric, drawn on x (`zscore_PSA` or `PSA`)
    #[arg(long)]
    x: Option<String>,

    /// Metric drawn on y
    #[arg(long)]
    y: Option<String>,

    /// Show one library instead of every library
    #[arg(short, long)]
    library: Option<String>,

    /// Top entries kept per library
    #[arg(short, long)]
    top: Option<usize>,

    /// Tri-axis inclusion threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Settings JSON
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Accept a bare metric name for a `zscore_*` column
fn score_column(dashboard: &Dashboard, name: &str) -> String {
    let known = dashboard
        .store()
        .map_or(false, |store| store.layout().has_score(name));
    if known || name.starts_with(SCORE_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", SCORE_PREFIX, name)
    }
}

/// Settings file (or defaults) with the command-line overrides applied,
/// validated after the overrides
fn settings_for(cli: &Cli) -> Result<DashboardSettings> {
    let mut settings = match &cli.config {
        Some(path) => DashboardSettings::from_path(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?,
        None => DashboardSettings::default(),
    };
    if let Some(top) = cli.top {
        settings.n_top_hits = top;
    }
    if let Some(threshold) = cli.threshold {
        settings.inclusion_threshold = threshold;
    }
    settings.validate().context("Invalid command-line settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let settings = settings_for(&cli)?;

    let panel = Rect::from_min_size(pos2(0.0, 0.0), vec2(1200.0, 800.0));
    let mut dashboard = Dashboard::new(settings, Collaborators::headless(panel));

    let source = CsvRowSource::new(&cli.file);
    let requests = dashboard
        .load(&source)
        .await
        .with_context(|| format!("Failed to load {}", cli.file.display()))?;
    dashboard.settle(requests).await;

    if let Some(x) = &cli.x {
        let metric = score_column(&dashboard, x);
        let requests = dashboard.set_rank_metric(&metric)?;
        dashboard.settle(requests).await;
    }
    if let Some(y) = &cli.y {
        let metric = score_column(&dashboard, y);
        let requests = dashboard.set_y_metric(&metric)?;
        dashboard.settle(requests).await;
    }
    if let Some(library) = &cli.library {
        let requests = dashboard.set_library_filter(LibraryFilter::parse(library))?;
        dashboard.settle(requests).await;
    }

    info!("Report for {} at {}", cli.file.display(), dashboard.generation());

    report::print_summary(&dashboard);
    report::print_tops(&dashboard);
    report::print_duplicates(&dashboard);
    if dashboard.filter().library().is_some() {
        report::print_cards(&dashboard);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_override_is_validated() {
        for threshold in ["--threshold=NaN", "--threshold=-0.5", "--threshold=inf"] {
            let cli = Cli::try_parse_from(["hitview", "hits.tsv", threshold]).unwrap();
            assert!(settings_for(&cli).is_err(), "{} accepted", threshold);
        }

        let cli = Cli::try_parse_from(["hitview", "hits.tsv", "--threshold", "1.5", "--top", "3"]).unwrap();
        let settings = settings_for(&cli).unwrap();
        assert_eq!(settings.inclusion_threshold, 1.5);
        assert_eq!(settings.n_top_hits, 3);
    }
}
