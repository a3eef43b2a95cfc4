use std::path::PathBuf;
use std::time::Duration;

use md2docx_ingest::{DEFAULT_SOURCE_EXTENSION, ExtractLimits};

use crate::config_file::{self, ConfigFile};
use crate::converter::Converter;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 100;

pub const ENV_BIND: &str = "MD2DOCX_BIND";
pub const ENV_SCRATCH_ROOT: &str = "MD2DOCX_SCRATCH_ROOT";
pub const ENV_CONVERTER: &str = "MD2DOCX_CONVERTER";

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub scratch_root: PathBuf,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    pub converter: Converter,
    pub limits: ExtractLimits,
    pub source_extension: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&ConfigFile::default())
    }
}

impl Settings {
    /// Config file cascade followed by environment overrides.
    pub fn load() -> Self {
        Self::from_config(&config_file::load_config()).with_env(|key| std::env::var(key).ok())
    }

    /// Resolve a config file against the built-in defaults.
    pub fn from_config(config: &ConfigFile) -> Self {
        let server = config.server.clone().unwrap_or_default();
        let converter = config.converter.clone().unwrap_or_default();
        let limits = config.limits.clone().unwrap_or_default();
        let source = config.source.clone().unwrap_or_default();
        let default_converter = Converter::default();
        let default_limits = ExtractLimits::default();

        Self {
            bind: server.bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
            scratch_root: server
                .scratch_root
                .map(PathBuf::from)
                .unwrap_or_else(default_scratch_root),
            max_upload_bytes: usize::try_from(mib(
                server.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB),
            ))
            .unwrap_or(usize::MAX),
            cors_origins: server
                .cors_origins
                .unwrap_or_else(|| vec!["*".to_string()]),
            converter: Converter {
                program: converter
                    .program
                    .map(PathBuf::from)
                    .unwrap_or(default_converter.program),
                input_format: converter
                    .input_format
                    .unwrap_or(default_converter.input_format),
                output_format: converter
                    .output_format
                    .unwrap_or(default_converter.output_format),
                extract_media: match converter.extract_media {
                    Some(dir) if dir.is_empty() => None,
                    Some(dir) => Some(dir),
                    None => default_converter.extract_media,
                },
                timeout: converter
                    .timeout_secs
                    .filter(|&secs| secs > 0)
                    .map(Duration::from_secs),
            },
            limits: ExtractLimits {
                max_entries: limits.max_entries.unwrap_or(default_limits.max_entries),
                max_total_bytes: limits
                    .max_extracted_mb
                    .map(mib)
                    .unwrap_or(default_limits.max_total_bytes),
            },
            source_extension: source
                .extension
                .unwrap_or_else(|| DEFAULT_SOURCE_EXTENSION.to_string()),
        }
    }

    /// Apply `MD2DOCX_*` overrides from `lookup` (normally the process environment).
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.is_empty()) {
            self.bind = bind;
        }
        if let Some(root) = lookup(ENV_SCRATCH_ROOT).filter(|v| !v.is_empty()) {
            self.scratch_root = PathBuf::from(root);
        }
        if let Some(program) = lookup(ENV_CONVERTER).filter(|v| !v.is_empty()) {
            self.converter.program = PathBuf::from(program);
        }
        self
    }
}

/// Megabytes to bytes, saturating.
fn mib(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("md2docx-uploads")
}
