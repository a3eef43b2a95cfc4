use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use md2docx_core::config_file::{self, ConfigFile};
use md2docx_core::{Settings, Upload};

mod output;

use output::ColorMode;

/// md2docx - Convert an archived Markdown project into a Word document
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Load settings from this TOML file instead of the usual config locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a .zip or .tar.gz archive containing a Markdown document
    Convert {
        /// Path to the archive
        archive: PathBuf,

        /// Where to write the converted document (default: converted.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify that the document converter is installed
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(cli.config.as_deref())?;
    let color = ColorMode(!cli.no_color);

    match cli.command {
        Command::Convert { archive, output } => convert(&settings, &archive, output, color).await,
        Command::Check => check(&settings, color).await,
    }
}

fn load_settings(explicit: Option<&Path>) -> anyhow::Result<Settings> {
    let config = match explicit {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found at {}", path.display());
            }
            config_file::load_from_path(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?
        }
        None => config_file::load_config(),
    };
    Ok(settings_from(&config))
}

fn settings_from(config: &ConfigFile) -> Settings {
    Settings::from_config(config).with_env(|key| std::env::var(key).ok())
}

async fn convert(
    settings: &Settings,
    archive: &Path,
    output: Option<PathBuf>,
    color: ColorMode,
) -> anyhow::Result<()> {
    let data = tokio::fs::read(archive)
        .await
        .with_context(|| format!("failed to read {}", archive.display()))?;
    let filename = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let output = output.unwrap_or_else(|| default_output(settings));
    let mut out = std::io::stdout();
    output::print_start(&mut out, &filename, color)?;

    let artifact = match md2docx_core::convert_archive(settings, Upload { filename, data }).await {
        Ok(artifact) => artifact,
        Err(e) => {
            output::print_failure(&mut std::io::stderr(), &e.to_string(), color)?;
            anyhow::bail!("conversion of {} failed", archive.display());
        }
    };

    tokio::fs::write(&output, &artifact.data)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    output::print_converted(&mut out, &artifact.source, &output, artifact.data.len(), color)?;
    out.flush()?;
    Ok(())
}

async fn check(settings: &Settings, color: ColorMode) -> anyhow::Result<()> {
    let mut out = std::io::stdout();
    match settings.converter.version().await {
        Ok(version) => {
            output::print_converter_ok(&mut out, &settings.converter.program, &version, color)?;
            Ok(())
        }
        Err(e) => {
            output::print_failure(&mut std::io::stderr(), &e.to_string(), color)?;
            anyhow::bail!("converter check failed");
        }
    }
}

fn default_output(settings: &Settings) -> PathBuf {
    PathBuf::from(format!("converted.{}", settings.converter.output_format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_convert_with_output() {
        let cli = Cli::try_parse_from([
            "md2docx",
            "--config",
            "custom.toml",
            "convert",
            "project.zip",
            "-o",
            "out.docx",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Command::Convert { archive, output } => {
                assert_eq!(archive, PathBuf::from("project.zip"));
                assert_eq!(output, Some(PathBuf::from("out.docx")));
            }
            other => panic!("expected convert, got {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["md2docx", "check", "--no-color"]).unwrap();
        assert!(cli.no_color);
        assert!(matches!(cli.command, Command::Check));
    }

    #[test]
    fn default_output_follows_output_format() {
        let settings = Settings::default();
        assert_eq!(default_output(&settings), PathBuf::from("converted.docx"));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn explicit_config_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("md2docx.toml");
        std::fs::write(&path, "[converter]\noutput_format = \"odt\"\n").unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.converter.output_format, "odt");
        assert_eq!(default_output(&settings), PathBuf::from("converted.odt"));
    }
}
