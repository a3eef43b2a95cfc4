use std::io::Write;
use std::path::Path;

use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

pub fn print_start(w: &mut dyn Write, archive_name: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "Converting {}...", archive_name.bold())
    } else {
        writeln!(w, "Converting {}...", archive_name)
    }
}

/// Report a finished conversion: which document was picked and where it went.
pub fn print_converted(
    w: &mut dyn Write,
    source: &Path,
    output: &Path,
    bytes: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    let size = format!("({})", human_size(bytes));
    if color.enabled() {
        writeln!(w, "  source: {}", source.display().dimmed())?;
        writeln!(
            w,
            "{} {} {}",
            "Wrote".green().bold(),
            output.display(),
            size.dimmed()
        )
    } else {
        writeln!(w, "  source: {}", source.display())?;
        writeln!(w, "Wrote {} {}", output.display(), size)
    }
}

pub fn print_converter_ok(
    w: &mut dyn Write,
    program: &Path,
    version: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {} ({})", "OK".green().bold(), version, program.display().dimmed())
    } else {
        writeln!(w, "OK {} ({})", version, program.display())
    }
}

pub fn print_failure(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "error:".red().bold(), message)
    } else {
        writeln!(w, "error: {}", message)
    }
}

fn human_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(f: impl FnOnce(&mut Vec<u8>) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn converted_report_without_color() {
        let text = plain(|w| {
            print_converted(
                w,
                Path::new("doc/readme.md"),
                Path::new("converted.docx"),
                2048,
                ColorMode(false),
            )
        });
        assert_eq!(text, "  source: doc/readme.md\nWrote converted.docx (2.0 KB)\n");
    }

    #[test]
    fn failure_without_color() {
        let text = plain(|w| print_failure(w, "no .md file found in archive", ColorMode(false)));
        assert_eq!(text, "error: no .md file found in archive\n");
    }

    #[test]
    fn sizes() {
        assert_eq!(human_size(12), "12 bytes");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
