use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: Option<ServerConfig>,
    pub converter: Option<ConverterConfig>,
    pub limits: Option<LimitsConfig>,
    pub source: Option<SourceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub scratch_root: Option<String>,
    pub max_upload_mb: Option<u64>,
    pub cors_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConverterConfig {
    pub program: Option<String>,
    pub input_format: Option<String>,
    pub output_format: Option<String>,
    /// Directory passed to `--extract-media`; an empty string drops the flag.
    pub extract_media: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_entries: Option<usize>,
    pub max_extracted_mb: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub extension: Option<String>,
}

/// Platform config directory path: `<config_dir>/md2docx/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("md2docx").join("config.toml"))
}

/// Load config by cascading CWD `.md2docx.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".md2docx.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        server: Some(ServerConfig {
            bind: overlay
                .server
                .as_ref()
                .and_then(|s| s.bind.clone())
                .or_else(|| base.server.as_ref().and_then(|s| s.bind.clone())),
            scratch_root: overlay
                .server
                .as_ref()
                .and_then(|s| s.scratch_root.clone())
                .or_else(|| base.server.as_ref().and_then(|s| s.scratch_root.clone())),
            max_upload_mb: overlay
                .server
                .as_ref()
                .and_then(|s| s.max_upload_mb)
                .or_else(|| base.server.as_ref().and_then(|s| s.max_upload_mb)),
            cors_origins: overlay
                .server
                .as_ref()
                .and_then(|s| s.cors_origins.clone())
                .or_else(|| base.server.as_ref().and_then(|s| s.cors_origins.clone())),
        }),
        converter: Some(ConverterConfig {
            program: overlay
                .converter
                .as_ref()
                .and_then(|c| c.program.clone())
                .or_else(|| base.converter.as_ref().and_then(|c| c.program.clone())),
            input_format: overlay
                .converter
                .as_ref()
                .and_then(|c| c.input_format.clone())
                .or_else(|| base.converter.as_ref().and_then(|c| c.input_format.clone())),
            output_format: overlay
                .converter
                .as_ref()
                .and_then(|c| c.output_format.clone())
                .or_else(|| {
                    base.converter
                        .as_ref()
                        .and_then(|c| c.output_format.clone())
                }),
            extract_media: overlay
                .converter
                .as_ref()
                .and_then(|c| c.extract_media.clone())
                .or_else(|| {
                    base.converter
                        .as_ref()
                        .and_then(|c| c.extract_media.clone())
                }),
            timeout_secs: overlay
                .converter
                .as_ref()
                .and_then(|c| c.timeout_secs)
                .or_else(|| base.converter.as_ref().and_then(|c| c.timeout_secs)),
        }),
        limits: Some(LimitsConfig {
            max_entries: overlay
                .limits
                .as_ref()
                .and_then(|l| l.max_entries)
                .or_else(|| base.limits.as_ref().and_then(|l| l.max_entries)),
            max_extracted_mb: overlay
                .limits
                .as_ref()
                .and_then(|l| l.max_extracted_mb)
                .or_else(|| base.limits.as_ref().and_then(|l| l.max_extracted_mb)),
        }),
        source: Some(SourceConfig {
            extension: overlay
                .source
                .as_ref()
                .and_then(|s| s.extension.clone())
                .or_else(|| base.source.as_ref().and_then(|s| s.extension.clone())),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_parses() {
        let toml_str = "[converter]\nprogram = \"/usr/local/bin/pandoc\"\ntimeout_secs = 30\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        let converter = parsed.converter.unwrap();
        assert_eq!(converter.program.as_deref(), Some("/usr/local/bin/pandoc"));
        assert_eq!(converter.timeout_secs, Some(30));
        assert!(converter.input_format.is_none());
        assert!(parsed.server.is_none());
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            server: Some(ServerConfig {
                bind: Some("127.0.0.1:9000".to_string()),
                scratch_root: Some("/base/scratch".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            server: Some(ServerConfig {
                scratch_root: Some("/overlay/scratch".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let server = merged.server.unwrap();
        assert_eq!(server.scratch_root.as_deref(), Some("/overlay/scratch"));
        assert_eq!(server.bind.as_deref(), Some("127.0.0.1:9000"));
    }

    #[test]
    fn merge_base_preserved_when_overlay_absent() {
        let base = ConfigFile {
            limits: Some(LimitsConfig {
                max_entries: Some(12),
                max_extracted_mb: Some(3),
            }),
            ..Default::default()
        };
        let merged = merge(base, ConfigFile::default());
        let limits = merged.limits.unwrap();
        assert_eq!(limits.max_entries, Some(12));
        assert_eq!(limits.max_extracted_mb, Some(3));
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[source]\nextension = \"markdown\"\n").unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(
            config.source.unwrap().extension.as_deref(),
            Some("markdown")
        );
        assert!(load_from_path(&dir.path().join("missing.toml")).is_none());
    }

    #[test]
    fn load_from_path_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nbind = ").unwrap();
        assert!(load_from_path(&path).is_none());
    }
}
