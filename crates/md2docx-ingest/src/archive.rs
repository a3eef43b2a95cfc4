use flate2::read::GzDecoder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, info, warn};

use crate::ExtractionError;

const DEFAULT_MAX_ENTRIES: usize = 10_000;
const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512MB

/// Container formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Detect the container type from magic bytes, falling back to the file name.
    pub fn detect(name: &str, data: &[u8]) -> Option<Self> {
        if data.starts_with(b"PK") {
            return Some(Self::Zip);
        }
        if data.starts_with(&[0x1f, 0x8b]) {
            return Some(Self::TarGz);
        }

        let lower = name.to_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }

    /// File extension used when persisting an upload of this type.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

/// Caps on what a single archive may expand to. Zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    pub max_entries: usize,
    pub max_total_bytes: u64,
}

impl ExtractLimits {
    pub const UNLIMITED: Self = Self {
        max_entries: 0,
        max_total_bytes: 0,
    };
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

/// What an extraction run materialized.
#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
    /// Entries that were deliberately not materialized (links, devices).
    pub warnings: Vec<String>,
}

/// Extract every entry of the archive at `archive_path` into `target_dir`.
///
/// The target is created (with parents) before the first entry is written.
/// Each entry's destination is validated by [`resolve_entry_path`] before any
/// filesystem write for it; the first failing entry aborts the run. Entries
/// written before the failure are left in place for the caller to clean up.
pub fn extract(
    archive_path: &Path,
    target_dir: &Path,
    limits: &ExtractLimits,
) -> Result<ExtractionSummary, ExtractionError> {
    // The reason is shown to clients; the archive path is logged only.
    let unreadable = |e: io::Error| {
        warn!(archive = %archive_path.display(), error = %e, "Failed to read archive");
        ExtractionError::Unreadable {
            reason: format!("Failed to read archive: {}", e.kind()),
        }
    };

    let mut file = File::open(archive_path).map_err(unreadable)?;
    let mut magic = Vec::with_capacity(2);
    (&mut file)
        .take(2)
        .read_to_end(&mut magic)
        .map_err(unreadable)?;
    file.seek(SeekFrom::Start(0)).map_err(unreadable)?;

    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let format =
        ArchiveFormat::detect(&name, &magic).ok_or_else(|| ExtractionError::Unreadable {
            reason: "Unsupported archive format".to_string(),
        })?;

    fs::create_dir_all(target_dir).map_err(|source| ExtractionError::CreateTarget {
        path: target_dir.to_path_buf(),
        source,
    })?;
    let root = fs::canonicalize(target_dir).map_err(|source| ExtractionError::CreateTarget {
        path: target_dir.to_path_buf(),
        source,
    })?;

    info!(
        archive = %archive_path.display(),
        target = %root.display(),
        ?format,
        "Extracting archive"
    );

    let mut sink = EntrySink::new(root, *limits);
    match format {
        ArchiveFormat::Zip => extract_zip(file, &mut sink)?,
        ArchiveFormat::TarGz => extract_tar_gz(file, &mut sink)?,
    }

    let summary = sink.summary;
    info!(
        files = summary.files,
        directories = summary.directories,
        bytes = summary.bytes,
        skipped = summary.warnings.len(),
        "Extraction complete"
    );
    Ok(summary)
}

/// Resolve an entry name to its destination under `root`.
///
/// `root` must already be canonical. Returns `Ok(None)` when the entry names
/// `root` itself. Absolute paths, drive prefixes and `..` segments that climb
/// above `root` are rejected, as is any destination whose deepest existing
/// ancestor resolves (through a link) outside `root`.
pub fn resolve_entry_path(root: &Path, entry: &str) -> Result<Option<PathBuf>, ExtractionError> {
    let traversal = || ExtractionError::PathTraversal {
        entry: entry.to_string(),
    };

    let mut relative = PathBuf::new();
    for component in Path::new(entry).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(traversal());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    if relative.as_os_str().is_empty() {
        return Ok(None);
    }

    let candidate = root.join(&relative);

    let mut probe = candidate.as_path();
    loop {
        if fs::symlink_metadata(probe).is_ok() {
            let real = fs::canonicalize(probe).map_err(|_| traversal())?;
            if !real.starts_with(root) {
                return Err(traversal());
            }
            break;
        }
        match probe.parent() {
            Some(parent) => probe = parent,
            None => break,
        }
    }

    Ok(Some(candidate))
}

/// Writes validated entries under a canonical root and enforces the limits.
struct EntrySink {
    root: PathBuf,
    limits: ExtractLimits,
    entries: usize,
    summary: ExtractionSummary,
}

impl EntrySink {
    fn new(root: PathBuf, limits: ExtractLimits) -> Self {
        Self {
            root,
            limits,
            entries: 0,
            summary: ExtractionSummary::default(),
        }
    }

    fn count_entry(&mut self) -> Result<(), ExtractionError> {
        self.entries += 1;
        if self.limits.max_entries > 0 && self.entries > self.limits.max_entries {
            return Err(ExtractionError::LimitExceeded {
                limit: format!("more than {} entries", self.limits.max_entries),
            });
        }
        Ok(())
    }

    fn skip(&mut self, name: &str, kind: &str) {
        warn!(entry = name, kind, "Skipping archive entry");
        self.summary
            .warnings
            .push(format!("Skipped {} entry {}", kind, name));
    }

    fn directory(&mut self, name: &str, mode: Option<u32>) -> Result<(), ExtractionError> {
        let Some(path) = resolve_entry_path(&self.root, name)? else {
            debug!(entry = name, "Directory entry names the extraction root");
            return Ok(());
        };

        debug!(entry = name, "Creating directory");
        fs::create_dir_all(&path).map_err(|source| ExtractionError::WriteFailed {
            entry: name.to_string(),
            source,
        })?;
        if let Err(e) = set_dir_mode(&path, mode) {
            debug!(entry = name, error = %e, "Could not apply directory mode");
        }

        self.summary.directories += 1;
        Ok(())
    }

    fn file(
        &mut self,
        name: &str,
        mode: Option<u32>,
        reader: &mut dyn Read,
    ) -> Result<(), ExtractionError> {
        let path = resolve_entry_path(&self.root, name)?.ok_or_else(|| {
            ExtractionError::PathTraversal {
                entry: name.to_string(),
            }
        })?;
        let write_failed = |source: io::Error| ExtractionError::WriteFailed {
            entry: name.to_string(),
            source,
        };

        debug!(entry = name, "Extracting file");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }
        let mut out = create_file(&path, mode).map_err(write_failed)?;

        let budget = if self.limits.max_total_bytes > 0 {
            Some(self.limits.max_total_bytes.saturating_sub(self.summary.bytes))
        } else {
            None
        };
        let cap = budget.map_or(u64::MAX, |b| b.saturating_add(1));
        let written = io::copy(&mut reader.take(cap), &mut out).map_err(write_failed)?;

        if budget.is_some_and(|b| written > b) {
            return Err(ExtractionError::LimitExceeded {
                limit: format!(
                    "more than {}MB extracted",
                    self.limits.max_total_bytes / 1024 / 1024
                ),
            });
        }

        self.summary.bytes += written;
        self.summary.files += 1;
        Ok(())
    }
}

fn extract_zip(file: File, sink: &mut EntrySink) -> Result<(), ExtractionError> {
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| ExtractionError::Unreadable {
            reason: format!("Failed to open ZIP: {}", e),
        })?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractionError::Unreadable {
                reason: format!("Failed to read ZIP entry: {}", e),
            })?;
        let name = entry.name().to_string();
        sink.count_entry()?;

        let mode = entry.unix_mode();
        if mode.is_some_and(is_symlink_mode) {
            sink.skip(&name, "symbolic link");
        } else if entry.is_dir() {
            sink.directory(&name, mode)?;
        } else {
            sink.file(&name, mode, &mut entry)?;
        }
    }

    Ok(())
}

fn extract_tar_gz(file: File, sink: &mut EntrySink) -> Result<(), ExtractionError> {
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

    let entries = archive
        .entries()
        .map_err(|e| ExtractionError::Unreadable {
            reason: format!("Failed to read tar.gz: {}", e),
        })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| ExtractionError::Unreadable {
            reason: format!("Failed to read tar entry: {}", e),
        })?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).to_string();
        sink.count_entry()?;

        let mode = entry.header().mode().ok();
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            sink.directory(&name, mode)?;
        } else if kind.is_file() {
            sink.file(&name, mode, &mut entry)?;
        } else if kind.is_pax_global_extensions() {
            debug!(entry = %name, "Ignoring global pax header");
        } else if kind.is_symlink() {
            sink.skip(&name, "symbolic link");
        } else if kind.is_hard_link() {
            sink.skip(&name, "hard link");
        } else {
            sink.skip(&name, "special file");
        }
    }

    Ok(())
}

fn is_symlink_mode(mode: u32) -> bool {
    mode & 0o170000 == 0o120000
}

#[cfg(unix)]
fn create_file(path: &Path, mode: Option<u32>) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    // Owner-read stays on so the converter can open the file.
    let mode = mode.map_or(0o644, |m| (m & 0o777) | 0o400);
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn create_file(path: &Path, _mode: Option<u32>) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(unix)]
fn set_dir_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode else {
        return Ok(());
    };
    // Owner rwx is forced so the scratch tree stays removable.
    fs::set_permissions(path, fs::Permissions::from_mode((mode & 0o777) | 0o700))
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}
