//! External document converter, run as a subprocess.
//!
//! The converter is invoked as
//! `<program> -f <input> -t <output> <source> -o <artifact> --extract-media=<dir>`
//! with its working directory set to the artifact's directory, so extracted
//! media lands inside the request's scratch tree. Exit status 0 is success;
//! anything else is a failure whose combined output is kept for diagnostics.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::ConversionError;

pub const DEFAULT_PROGRAM: &str = "pandoc";
pub const DEFAULT_INPUT_FORMAT: &str = "markdown";
pub const DEFAULT_OUTPUT_FORMAT: &str = "docx";
pub const DEFAULT_EXTRACT_MEDIA: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converter {
    pub program: PathBuf,
    pub input_format: String,
    pub output_format: String,
    /// `--extract-media` target relative to the artifact directory; `None` omits the flag.
    pub extract_media: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for Converter {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            input_format: DEFAULT_INPUT_FORMAT.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            extract_media: Some(DEFAULT_EXTRACT_MEDIA.to_string()),
            timeout: None,
        }
    }
}

impl Converter {
    /// Command-line arguments for converting `source` into `output`.
    pub fn args(&self, source: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            self.input_format.clone().into(),
            "-t".into(),
            self.output_format.clone().into(),
            source.into(),
            "-o".into(),
            output.into(),
        ];
        if let Some(media) = &self.extract_media {
            args.push(format!("--extract-media={}", media).into());
        }
        args
    }

    /// Ask the converter for its version string (first line of `--version`).
    ///
    /// Used as the startup precondition: an error here means no request can
    /// ever be served.
    pub async fn version(&self) -> Result<String, ConversionError> {
        let unavailable = |reason: String| ConversionError::Unavailable {
            program: self.program.display().to_string(),
            reason,
        };

        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(unavailable(format!(
                "{}: {}",
                describe_status(output.status),
                combine_output(&output.stdout, &output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let version = text.lines().next().unwrap_or_default().trim().to_string();
        info!(program = %self.program.display(), %version, "Converter available");
        Ok(version)
    }

    /// Convert `source` into `output`, waiting for the subprocess to finish.
    ///
    /// With a timeout configured, a run that overstays it is killed and
    /// reported as [`ConversionError::TimedOut`].
    pub async fn convert(&self, source: &Path, output: &Path) -> Result<(), ConversionError> {
        let source = resolve(source)?;
        let output = resolve(output)?;
        let launch = |source: std::io::Error| ConversionError::Launch {
            program: self.program.display().to_string(),
            source,
        };

        let mut command = Command::new(&self.program);
        command
            .args(self.args(&source, &output))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = output.parent() {
            command.current_dir(dir);
        }

        debug!(
            program = %self.program.display(),
            source = %source.display(),
            output = %output.display(),
            "Running converter"
        );

        let run = command.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| ConversionError::TimedOut {
                    secs: limit.as_secs_f64(),
                })?,
            None => run.await,
        };
        let result = result.map_err(launch)?;

        let combined = combine_output(&result.stdout, &result.stderr);
        if !result.status.success() {
            let status = describe_status(result.status);
            warn!(%status, output = %combined.trim(), "Converter failed");
            return Err(ConversionError::ToolFailed {
                status,
                output: combined,
            });
        }

        if !tokio::fs::metadata(&output)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Err(ConversionError::MissingOutput { path: output });
        }

        info!(output = %output.display(), "Conversion finished");
        Ok(())
    }
}

fn resolve(path: &Path) -> Result<PathBuf, ConversionError> {
    std::path::absolute(path).map_err(|source| ConversionError::ResolvePath {
        path: path.to_path_buf(),
        source,
    })
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(stderr));
    text
}

fn describe_status(status: ExitStatus) -> String {
    status
        .code()
        .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {}", c))
}
