use clap::Parser;
use cspace_report::report::{RecordSelector, ReportMode, SummaryGroupBy};
use std::path::PathBuf;

/// Get the default config file location for cspace-report
/// Uses platform-specific config directories:
/// - Linux: ~/.config/cspace-report/config.toml
/// - macOS: ~/Library/Application Support/cspace-report/config.toml
/// - Windows: %APPDATA%/cspace-report/config.toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cspace-report").join("config.toml"))
}

#[derive(Parser, Debug, Clone)]
#[command(name = "cspace-report")]
#[command(about = "Render confined-space work orders into a PDF report")]
#[command(version)]
pub struct CliArgs {
    /// JSON file with work-order records (array or REST envelope)
    #[arg(long, short = 'i', value_name = "FILE")]
    pub input: PathBuf,

    /// Report mode
    #[arg(long, short = 'm', value_enum, default_value = "consolidated")]
    pub mode: ReportMode,

    /// Grouping field for summary reports
    #[arg(long, value_enum, default_value = "building")]
    pub group_by: SummaryGroupBy,

    /// Zero-based record index for single mode
    #[arg(long, value_name = "INDEX", conflicts_with = "work_order_id")]
    pub record: Option<usize>,

    /// Work order ID (or unique ID) for single mode
    #[arg(long, value_name = "ID")]
    pub work_order_id: Option<String>,

    /// Report title
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// Directory for the generated PDF
    /// Default: current directory, or [report].output_dir from the config file
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Explicit output filename (relative paths land in --output-dir)
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Image proxy endpoint; the target URL is passed as ?url=
    #[arg(long, value_name = "URL")]
    pub proxy_url: Option<String>,

    /// Base URL for relative image references
    #[arg(long, value_name = "URL")]
    pub asset_base_url: Option<String>,

    /// Bearer token for the image proxy (falls back to $CSPACE_REPORT_TOKEN)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Per-image time budget in milliseconds (default: 8000)
    #[arg(long, value_name = "MS")]
    pub image_timeout_ms: Option<u64>,

    /// Images fetched in parallel per entry (default: 4)
    #[arg(long, value_name = "N")]
    pub image_concurrency: Option<usize>,

    /// Overall budget for image loading; images still pending become placeholders
    #[arg(long, value_name = "SECS")]
    pub report_timeout_secs: Option<u64>,

    /// Skip image loading entirely
    #[arg(long)]
    pub no_images: bool,

    /// Also write a JSON manifest next to the PDF
    #[arg(long)]
    pub json: bool,

    /// Config file (falls back to $CSPACE_REPORT_CONFIG, then the user config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override console width for testing (default: auto-detect)
    #[arg(long, value_name = "COLUMNS")]
    pub console_width: Option<usize>,
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        let mut args = CliArgs::parse();

        // Treat blank strings the same as absent flags
        args.proxy_url = args.proxy_url.take().filter(|s| !s.trim().is_empty());
        args.asset_base_url = args.asset_base_url.take().filter(|s| !s.trim().is_empty());
        args.token = args.token.take().filter(|s| !s.trim().is_empty());

        args
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if self.mode != ReportMode::Single && (self.record.is_some() || self.work_order_id.is_some()) {
            return Err("--record and --work-order-id only apply to --mode single".to_string());
        }

        if self.image_concurrency == Some(0) {
            return Err("--image-concurrency must be at least 1".to_string());
        }

        if self.image_timeout_ms == Some(0) {
            return Err("--image-timeout-ms must be greater than zero".to_string());
        }

        if self.report_timeout_secs == Some(0) {
            return Err("--report-timeout-secs must be greater than zero".to_string());
        }

        if !self.input.exists() {
            return Err(format!("Input file not found: {}", self.input.display()));
        }

        Ok(())
    }

    /// Record selector for single mode
    pub fn selector(&self) -> Option<RecordSelector> {
        if let Some(ref id) = self.work_order_id {
            Some(RecordSelector::WorkOrderId(id.clone()))
        } else {
            self.record.map(RecordSelector::Index)
        }
    }
}

#[cfg(test)]
pub(crate) fn args_for(input: PathBuf) -> CliArgs {
    CliArgs {
        input,
        mode: ReportMode::Consolidated,
        group_by: SummaryGroupBy::Building,
        record: None,
        work_order_id: None,
        title: None,
        output_dir: None,
        output: None,
        proxy_url: None,
        asset_base_url: None,
        token: None,
        image_timeout_ms: None,
        image_concurrency: None,
        report_timeout_secs: None,
        no_images: false,
        json: false,
        config: None,
        console_width: None,
    }
}
