use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::LocatorError;

/// Extension of the document source inside an uploaded archive.
pub const DEFAULT_SOURCE_EXTENSION: &str = "md";

/// Find the first regular file under `root` whose extension is `extension`.
///
/// Directories are walked depth-first with entries sorted by file name, so a
/// subdirectory's contents are visited at the subdirectory's lexical position.
/// The extension comparison ignores ASCII case and a leading dot. A visible
/// match wins over one that is hidden (a dot-file or anything below a dot
/// directory); hidden matches are only returned when nothing visible
/// qualifies. `__MACOSX` folders and AppleDouble `._*` files are never
/// considered, and symbolic links are not followed.
pub fn locate(root: &Path, extension: &str) -> Result<PathBuf, LocatorError> {
    let extension = extension.trim_start_matches('.');

    let mut hidden_match = None;
    let found = walk(root, extension, false, &mut hidden_match)?;
    match found.or(hidden_match) {
        Some(path) => {
            info!(source = %path.display(), "Located source document");
            Ok(path)
        }
        None => Err(LocatorError::NotFound {
            extension: extension.to_string(),
        }),
    }
}

/// Returns the first visible match; the first hidden match is parked in
/// `hidden_match` instead.
fn walk(
    dir: &Path,
    extension: &str,
    under_hidden: bool,
    hidden_match: &mut Option<PathBuf>,
) -> Result<Option<PathBuf>, LocatorError> {
    let io_error = |source| LocatorError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir)
        .map_err(io_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == "__MACOSX" || name.starts_with("._") {
            debug!(entry = %name, "Skipping resource fork entry");
            continue;
        }
        let hidden = under_hidden || name.starts_with('.');

        let file_type = entry.file_type().map_err(io_error)?;
        let path = entry.path();
        if file_type.is_dir() {
            if let Some(found) = walk(&path, extension, hidden, hidden_match)? {
                return Ok(Some(found));
            }
        } else if file_type.is_file() && has_extension(&path, extension) {
            if !hidden {
                return Ok(Some(path));
            }
            if hidden_match.is_none() {
                debug!(candidate = %path.display(), "Holding hidden candidate");
                *hidden_match = Some(path);
            }
        }
    }

    Ok(None)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn finds_single_file_at_depth() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/b/c/notes.md");
        touch(dir.path(), "a/b/image.png");

        let found = locate(dir.path(), "md").unwrap();
        assert_eq!(found, dir.path().join("a/b/c/notes.md"));
    }

    #[test]
    fn empty_tree_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "readme.txt");

        match locate(dir.path(), "md") {
            Err(LocatorError::NotFound { extension }) => assert_eq!(extension, "md"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn lexical_depth_first_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.md");
        touch(dir.path(), "a/z.md");
        touch(dir.path(), "c/a.md");

        let found = locate(dir.path(), "md").unwrap();
        assert_eq!(found, dir.path().join("a/z.md"));
    }

    #[test]
    fn repeated_runs_agree() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zeta.md", "alpha/two.md", "alpha/one.md", "mid.md"] {
            touch(dir.path(), name);
        }

        let first = locate(dir.path(), "md").unwrap();
        for _ in 0..5 {
            assert_eq!(locate(dir.path(), "md").unwrap(), first);
        }
        assert_eq!(first, dir.path().join("alpha/one.md"));
    }

    #[test]
    fn directories_named_like_sources_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a.md")).unwrap();
        touch(dir.path(), "b.md");

        let found = locate(dir.path(), "md").unwrap();
        assert_eq!(found, dir.path().join("b.md"));
    }

    #[test]
    fn visible_source_wins_over_hidden_and_resource_forks() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "__MACOSX/doc/._readme.md");
        touch(dir.path(), ".hidden.md");
        touch(dir.path(), ".docs/guide.md");
        touch(dir.path(), "doc/._readme.md");
        touch(dir.path(), "doc/readme.md");

        let found = locate(dir.path(), "md").unwrap();
        assert_eq!(found, dir.path().join("doc/readme.md"));
    }

    #[test]
    fn source_inside_hidden_directory_is_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".docs/readme.md");
        touch(dir.path(), "assets/logo.png");

        let found = locate(dir.path(), "md").unwrap();
        assert_eq!(found, dir.path().join(".docs/readme.md"));
    }

    #[test]
    fn hidden_source_file_is_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes/.draft.md");
        touch(dir.path(), ".notes.md");

        let found = locate(dir.path(), "md").unwrap();
        assert_eq!(found, dir.path().join(".notes.md"));
    }

    #[test]
    fn resource_forks_alone_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "__MACOSX/readme.md");
        touch(dir.path(), "._readme.md");

        assert!(matches!(
            locate(dir.path(), "md"),
            Err(LocatorError::NotFound { .. })
        ));
    }

    #[test]
    fn extension_match_ignores_case_and_dot() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "README.MD");

        assert!(locate(dir.path(), ".md").is_ok());
        assert!(locate(dir.path(), "markdown").is_err());
    }

    #[test]
    fn missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate(&dir.path().join("missing"), "md").unwrap_err();
        assert!(matches!(err, LocatorError::Io { .. }));
    }
}
