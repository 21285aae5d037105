use std::path::{Path, PathBuf};

use stockpipe_warehouse::WarehouseConfig;

use crate::source::SourceFormat;

/// Fixture model label written into every snapshot entry.
pub const DEFAULT_FIXTURE_MODEL: &str = "stockpipe.stockobservation";

pub const DEFAULT_PROGRESS_INTERVAL: usize = 1_000;

const DATASET_STEM: &str = "stock_market_data";

/// Runtime settings shared by the pipeline operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub stockpipe_home: PathBuf,
    /// Snapshot written by fixture generation and read by reset-and-reload.
    pub fixture_path: PathBuf,
    pub fixture_model: String,
    /// Rows between ingestion progress log lines.
    pub progress_interval: usize,
    /// Load existing keys for the batch's trade codes up front instead of
    /// querying the store once per record.
    pub preload_existing_keys: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_home(WarehouseConfig::default().stockpipe_home)
    }
}

impl PipelineConfig {
    pub fn with_home(stockpipe_home: impl Into<PathBuf>) -> Self {
        let stockpipe_home = stockpipe_home.into();
        Self {
            fixture_path: stockpipe_home.join("fixtures").join("initial_data.json"),
            fixture_model: String::from(DEFAULT_FIXTURE_MODEL),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            preload_existing_keys: false,
            stockpipe_home,
        }
    }

    /// Default dataset locations, searched in order.
    pub fn source_candidates(&self, format: Option<SourceFormat>) -> Vec<PathBuf> {
        let extensions: &[SourceFormat] = match format {
            Some(SourceFormat::Csv) => &[SourceFormat::Csv],
            Some(SourceFormat::Json) => &[SourceFormat::Json],
            None => &[SourceFormat::Csv, SourceFormat::Json],
        };

        let roots = [
            self.stockpipe_home.join("dataset"),
            PathBuf::from("dataset"),
            Path::new("..").join("dataset"),
        ];

        roots
            .iter()
            .flat_map(|root| {
                extensions
                    .iter()
                    .map(move |format| root.join(format!("{DATASET_STEM}.{}", format.extension())))
            })
            .collect()
    }
}
