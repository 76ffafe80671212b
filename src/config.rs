/// Configuration resolution module
///
/// This module handles:
/// - Loading the optional TOML config file
/// - Merging CLI flags, environment and file settings (CLI wins)
/// - Building an immutable ReportPlan for the orchestrator
use crate::cli::{self, CliArgs};
use cspace_report::images::{DEFAULT_CONCURRENCY, DEFAULT_MAX_DIMENSION, DEFAULT_TIMEOUT, ImagePipelineConfig};
use cspace_report::report::{ReportOptions, DEFAULT_TITLE};
use log::debug;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const TOKEN_ENV: &str = "CSPACE_REPORT_TOKEN";
pub const CONFIG_ENV: &str = "CSPACE_REPORT_CONFIG";

/// Settings read from `config.toml`
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub images: ImageSection,
    #[serde(default)]
    pub report: ReportSection,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ImageSection {
    pub proxy_url: Option<String>,
    pub asset_base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub max_dimension: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReportSection {
    pub title: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("Failed to parse config: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path).map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        Self::parse(&text).map_err(|e| format!("{} ({})", e, path.display()))
    }
}

/// Everything the binary needs to produce one report
#[derive(Debug, Clone)]
pub struct ReportPlan {
    pub input: PathBuf,
    pub options: ReportOptions,
    pub images: ImagePipelineConfig,
    pub output_dir: PathBuf,
    pub output: Option<PathBuf>,
    pub write_manifest: bool,
}

/// Build a complete ReportPlan from CLI arguments
///
/// Environment variables are read here; everything downstream works from
/// the returned plan.
pub fn build_report_plan(args: &CliArgs) -> Result<ReportPlan, String> {
    let file = match locate_config(args.config.as_deref(), env::var_os(CONFIG_ENV).map(PathBuf::from)) {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            FileConfig::load(&path)?
        }
        None => FileConfig::default(),
    };

    plan_from(args, &file, env::var(TOKEN_ENV).ok())
}

/// Which config file to read, if any
///
/// An explicit path (flag or environment) is always returned so a typo
/// surfaces as a read error; the per-user default only when it exists.
fn locate_config(flag: Option<&Path>, env_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = flag {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path.filter(|p| !p.as_os_str().is_empty()) {
        return Some(path);
    }
    cli::default_config_path().filter(|p| p.is_file())
}

/// Merge CLI, file and environment into a plan (CLI > file > default)
pub fn plan_from(args: &CliArgs, file: &FileConfig, env_token: Option<String>) -> Result<ReportPlan, String> {
    let timeout_ms = args.image_timeout_ms.or(file.images.timeout_ms);
    let concurrency = args.image_concurrency.or(file.images.concurrency).unwrap_or(DEFAULT_CONCURRENCY);
    if concurrency == 0 {
        return Err("Image concurrency must be at least 1".to_string());
    }
    if timeout_ms == Some(0) {
        return Err("Image timeout must be greater than zero".to_string());
    }

    let mut images = ImagePipelineConfig::new()
        .with_timeout(timeout_ms.map(Duration::from_millis).unwrap_or(DEFAULT_TIMEOUT))
        .with_concurrency(concurrency)
        .with_max_dimension(file.images.max_dimension.unwrap_or(DEFAULT_MAX_DIMENSION))
        .with_auth_token(args.token.clone().or(env_token).filter(|t| !t.trim().is_empty()));

    if let Some(proxy) = args.proxy_url.as_ref().or(file.images.proxy_url.as_ref()) {
        images = images.with_proxy(proxy);
    }
    if let Some(base) = args.asset_base_url.as_ref().or(file.images.asset_base_url.as_ref()) {
        images = images.with_asset_base_url(base);
    }

    let title = args.title.clone().or_else(|| file.report.title.clone()).unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let mut options = ReportOptions::new(args.mode)
        .with_title(&title)
        .with_group_by(args.group_by)
        .with_images(!args.no_images)
        .with_deadline(args.report_timeout_secs.map(Duration::from_secs));
    if let Some(selector) = args.selector() {
        options = options.with_selector(selector);
    }

    let output_dir =
        args.output_dir.clone().or_else(|| file.report.output_dir.clone()).unwrap_or_else(|| PathBuf::from("."));

    debug!(
        "Plan: mode={} proxy={:?} timeout={:?} concurrency={} output_dir={}",
        options.mode,
        images.proxy_url,
        images.timeout,
        images.concurrency,
        output_dir.display()
    );

    Ok(ReportPlan {
        input: args.input.clone(),
        options,
        images,
        output_dir,
        output: args.output.clone(),
        write_manifest: args.json,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
