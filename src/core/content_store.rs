use crate::core::game_config::SearchPathSection;
use crate::models::addon::ScanIssue;
use crate::models::error::SError;
use crate::models::paths::{ARCHIVE_EXT, CANONICAL_ARCHIVE_NAME, DISABLED_SUFFIX};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use std::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Read-only views of the addon directories plus the two mutators the
/// reconciler drives. Enumeration never fails on a single bad entry; the entry
/// is logged, recorded in `issues` and skipped.
pub struct ContentStore;

pub fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// A pirate-mode file stem that names a file directly inside the addons dir.
pub fn is_plain_stem(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s.contains(|c: char| matches!(c, '/' | '\\' | ':'))
}

fn ensure_numeric(id: &str) -> Result<(), SError> {
    if is_numeric_id(id) {
        Ok(())
    } else {
        Err(SError::InvalidId(id.to_string()))
    }
}

impl ContentStore {
    /// Ids of `<id>.vpk` files directly inside `dir`.
    pub fn list_archives(dir: &Utf8Path, issues: &mut Vec<ScanIssue>) -> BTreeSet<String> {
        Self::entries(dir, issues)
            .filter(|(_, is_dir)| !is_dir)
            .filter_map(|(path, _)| {
                let ext = path.extension()?;
                if !ext.eq_ignore_ascii_case(ARCHIVE_EXT) {
                    return None;
                }
                let stem = path.file_stem()?;
                is_numeric_id(stem).then(|| stem.to_string())
            })
            .collect()
    }

    /// Ids of `<id>/` subdirectories directly inside `dir`.
    pub fn list_directories(dir: &Utf8Path, issues: &mut Vec<ScanIssue>) -> BTreeSet<String> {
        Self::entries(dir, issues)
            .filter(|(_, is_dir)| *is_dir)
            .filter_map(|(path, _)| {
                let name = path.file_name()?;
                is_numeric_id(name).then(|| name.to_string())
            })
            .collect()
    }

    /// Archive names in a flat pirate-mode addons dir, split into (enabled, disabled) stems.
    pub fn list_loose_archives(
        dir: &Utf8Path,
        issues: &mut Vec<ScanIssue>,
    ) -> (BTreeSet<String>, BTreeSet<String>) {
        let enabled_suffix = format!(".{ARCHIVE_EXT}");
        let disabled_suffix = format!(".{ARCHIVE_EXT}{DISABLED_SUFFIX}");
        let mut enabled = BTreeSet::new();
        let mut disabled = BTreeSet::new();

        for (path, is_dir) in Self::entries(dir, issues) {
            if is_dir {
                continue;
            }
            let Some(name) = path.file_name() else {
                continue;
            };
            if let Some(stem) = strip_suffix_ci(name, &disabled_suffix) {
                disabled.insert(stem.to_string());
            } else if let Some(stem) = strip_suffix_ci(name, &enabled_suffix) {
                enabled.insert(stem.to_string());
            }
        }
        (enabled, disabled)
    }

    /// Ids referenced by active `Game <prefix>\<id>` lines in the search-path
    /// section. A missing file or section yields an empty set. Bytes that are
    /// not UTF-8 are replaced for parsing; only the editor writes the file.
    pub fn read_active_ids(config_path: &Utf8Path, prefix: &str) -> Result<BTreeSet<String>, SError> {
        if !config_path.exists() {
            return Ok(BTreeSet::new());
        }
        let bytes = fs::read(config_path)?;
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = text.lines().collect();
        let Ok(section) = SearchPathSection::locate(&lines) else {
            debug!("no search path section in {config_path}");
            return Ok(BTreeSet::new());
        };
        section.active_ids(&lines, prefix)
    }

    /// Materialises `<source>/<id>.vpk` as `<content>/<id>/pak01_dir.vpk`.
    /// The source archive stays in place; the workshop client keeps tracking it.
    /// A directory created here is removed again if the copy fails.
    pub fn move_archive_into_content_dir(
        source_dir: &Utf8Path,
        content_dir: &Utf8Path,
        id: &str,
    ) -> Result<Utf8PathBuf, SError> {
        ensure_numeric(id)?;
        let archive = source_dir.join(format!("{id}.{ARCHIVE_EXT}"));
        if !archive.is_file() {
            return Err(SError::FileOrDirectoryNotFound(archive.to_string()));
        }

        let target_dir = content_dir.join(id);
        let created = !target_dir.exists();
        fs::create_dir_all(&target_dir)?;

        let target = target_dir.join(CANONICAL_ARCHIVE_NAME);
        if let Err(e) = fs::copy(&archive, &target) {
            if created {
                let _ = fs::remove_dir_all(&target_dir);
            }
            return Err(e.into());
        }
        Ok(target)
    }

    pub fn remove_content_dir(content_dir: &Utf8Path, id: &str) -> Result<bool, SError> {
        ensure_numeric(id)?;
        let target_dir = content_dir.join(id);
        if !target_dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&target_dir)?;
        Ok(true)
    }

    fn entries<'a>(
        dir: &Utf8Path,
        issues: &'a mut Vec<ScanIssue>,
    ) -> impl Iterator<Item = (Utf8PathBuf, bool)> + 'a {
        let exists = dir.is_dir();
        let walker = WalkDir::new(dir).min_depth(1).max_depth(1);
        walker
            .into_iter()
            .take_while(move |_| exists)
            .filter_map(move |entry| match entry {
                Ok(e) => match Utf8PathBuf::from_path_buf(e.path().to_path_buf()) {
                    Ok(path) => Some((path, e.file_type().is_dir())),
                    Err(p) => {
                        warn!("skipping non UTF-8 entry {}", p.display());
                        issues.push(ScanIssue::Unreadable {
                            path: Utf8PathBuf::from(p.to_string_lossy().as_ref()),
                            reason: "path is not valid UTF-8".to_string(),
                        });
                        None
                    }
                },
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| Utf8PathBuf::from(p.to_string_lossy().as_ref()))
                        .unwrap_or_default();
                    warn!("skipping unreadable entry {path}: {e}");
                    issues.push(ScanIssue::Unreadable {
                        path,
                        reason: e.to_string(),
                    });
                    None
                }
            })
    }
}

fn strip_suffix_ci<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(split) {
        return None;
    }
    let (stem, tail) = name.split_at(split);
    (tail.eq_ignore_ascii_case(suffix) && !stem.is_empty()).then_some(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_id() {
        assert!(is_numeric_id("123456"));
        assert!(!is_numeric_id(""));
        assert!(!is_numeric_id("12a"));
        assert!(!is_numeric_id("my_map"));
        assert!(!is_numeric_id(".."));
    }

    #[test]
    fn test_plain_stem() {
        assert!(is_plain_stem("Tank Skin"));
        assert!(is_plain_stem("v1..2"));
        assert!(!is_plain_stem(""));
        assert!(!is_plain_stem(".."));
        assert!(!is_plain_stem("../x"));
        assert!(!is_plain_stem("a\\b"));
        assert!(!is_plain_stem("C:evil"));
    }

    #[test]
    fn test_strip_suffix_case_insensitive() {
        assert_eq!(strip_suffix_ci("Map.VPK", ".vpk"), Some("Map"));
        assert_eq!(strip_suffix_ci(".vpk", ".vpk"), None);
        assert_eq!(strip_suffix_ci("Map.vpk.disabled", ".vpk.disabled"), Some("Map"));
    }
}
