//! Client configuration: environment defaults, then command-line overrides.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use crate::export::DEFAULT_EXPORT_FILE;
use crate::session::rows::{is_supported_page_size, DEFAULT_PAGE_SIZE};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

pub const ENV_API_BASE: &str = "DATABUDDY_API_BASE";
pub const ENV_PAGE_SIZE: &str = "DATABUDDY_PAGE_SIZE";
pub const ENV_EXPORT_PATH: &str = "DATABUDDY_EXPORT_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base: String,
    pub page_size: u64,
    pub export_path: PathBuf,
    /// File to upload before the interpreter starts.
    pub upload: Option<PathBuf>,
}

/// What the binary should do after argument parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    Run,
    Help,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            export_path: PathBuf::from(DEFAULT_EXPORT_FILE),
            upload: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset or blank variables keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();
        if let Some(base) = get(ENV_API_BASE) {
            cfg.api_base = base;
        }
        if let Some(size) = get(ENV_PAGE_SIZE) {
            cfg.page_size = parse_page_size(&size).with_context(|| format!("invalid {}", ENV_PAGE_SIZE))?;
        }
        if let Some(path) = get(ENV_EXPORT_PATH) {
            cfg.export_path = PathBuf::from(path);
        }
        Ok(cfg)
    }

    /// Apply command-line flags (program name already removed).
    pub fn apply_args(&mut self, args: &[String]) -> Result<Launch> {
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "-h" | "--help" => return Ok(Launch::Help),
                "--api" | "--page-size" | "--export-path" | "--upload" => {
                    let value = args.get(i + 1).ok_or_else(|| anyhow!("{} requires a value", flag))?;
                    match flag {
                        "--api" => self.api_base = value.clone(),
                        "--page-size" => self.page_size = parse_page_size(value)?,
                        "--export-path" => self.export_path = PathBuf::from(value),
                        _ => self.upload = Some(PathBuf::from(value)),
                    }
                    i += 2;
                }
                other => bail!("unrecognized argument: {}", other),
            }
        }
        Ok(Launch::Run)
    }
}

fn parse_page_size(raw: &str) -> Result<u64> {
    let size: u64 = raw.trim().parse().with_context(|| format!("page size '{}' is not a number", raw))?;
    if !is_supported_page_size(size) {
        bail!("page size {} is not one of 5, 10, 20, 50", size);
    }
    Ok(size)
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage:\n  {program} [--api <url>] [--page-size <n>] [--export-path <file>] [--upload <file>]\n\nFlags:\n  --api <url>            Job service base URL (env {ENV_API_BASE}, default {DEFAULT_API_BASE})\n  --page-size <n>        Rows per page: 5, 10, 20 or 50 (env {ENV_PAGE_SIZE}, default {DEFAULT_PAGE_SIZE})\n  --export-path <file>   Where `export` saves the cleaned file (env {ENV_EXPORT_PATH}, default {DEFAULT_EXPORT_FILE})\n  --upload <file>        Upload this file before the interpreter starts\n  -h, --help             Show this help\n\nLogging is controlled with RUST_LOG (default info)."
    )
}
