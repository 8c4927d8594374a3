use crate::models::error::SError;
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;
use walkdir::WalkDir;

const MAX_NAME_LEN: usize = 120;

pub struct FileUtils;

impl FileUtils {
    /// Total size in bytes of every file below `root`. Missing roots count as zero.
    pub fn dir_size(root: &Utf8Path) -> u64 {
        if !root.exists() {
            return 0;
        }
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    }

    /// Non-empty files below `root` whose extension is in `extensions`, sorted for stable naming.
    pub fn find_content_files(root: &Utf8Path, extensions: &[String]) -> Vec<Utf8PathBuf> {
        let mut found: Vec<Utf8PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.metadata().map(|m| m.len() > 0).unwrap_or(false))
            .filter_map(|e| Utf8PathBuf::from_path_buf(e.into_path()).ok())
            .filter(|p| {
                p.extension()
                    .map(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
                    .unwrap_or(false)
            })
            .collect();
        found.sort();
        found
    }

    /// Replaces characters that are not valid in file names on any platform.
    pub fn sanitize_name(name: &str, fallback: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| match c {
                '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();

        let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == ' ');
        let truncated: String = trimmed.chars().take(MAX_NAME_LEN).collect();
        let truncated = truncated.trim_end_matches(|c: char| c == '.' || c == ' ');

        if truncated.is_empty() {
            fallback.to_string()
        } else {
            truncated.to_string()
        }
    }

    /// First free `dir/stem.ext`, then `dir/stem_2.ext`, `dir/stem_3.ext`, ...
    /// A name also counts as taken when the name plus one of `shadows` exists.
    pub fn unique_destination(
        dir: &Utf8Path,
        stem: &str,
        ext: &str,
        shadows: &[&str],
    ) -> Utf8PathBuf {
        let taken = |p: &Utf8PathBuf| {
            p.exists()
                || shadows
                    .iter()
                    .any(|suffix| Utf8PathBuf::from(format!("{p}{suffix}")).exists())
        };
        let first = dir.join(format!("{stem}.{ext}"));
        if !taken(&first) {
            return first;
        }
        (2..)
            .map(|n| dir.join(format!("{stem}_{n}.{ext}")))
            .find(|p| !taken(p))
            .unwrap_or(first)
    }

    /// Replaces `path` with `contents` through a temp file in the same directory.
    pub fn write_atomic(path: &Utf8Path, contents: impl AsRef<[u8]>) -> Result<(), SError> {
        let parent = path
            .parent()
            .ok_or_else(|| SError::FileOrDirectoryNotFound(path.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(contents.as_ref())?;
        tmp.flush()?;
        tmp.persist(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_reserved_characters() {
        assert_eq!(FileUtils::sanitize_name("Tank: Reborn?", "1"), "Tank_ Reborn_");
        assert_eq!(FileUtils::sanitize_name("a/b\\c", "1"), "a_b_c");
    }

    #[test]
    fn test_sanitize_falls_back_on_empty() {
        assert_eq!(FileUtils::sanitize_name("  ...  ", "42"), "42");
        assert_eq!(FileUtils::sanitize_name("", "42"), "42");
    }

    #[test]
    fn test_sanitize_collapses_whitespace_and_truncates() {
        assert_eq!(FileUtils::sanitize_name("a   b\tc", "1"), "a b_c");
        let long = "x".repeat(300);
        assert_eq!(FileUtils::sanitize_name(&long, "1").len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_unique_destination_appends_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();

        let first = FileUtils::unique_destination(dir, "Map", "vpk", &[]);
        assert_eq!(first, dir.join("Map.vpk"));
        std::fs::write(&first, "a").unwrap();

        let second = FileUtils::unique_destination(dir, "Map", "vpk", &[]);
        assert_eq!(second, dir.join("Map_2.vpk"));
        std::fs::write(&second, "b").unwrap();

        assert_eq!(
            FileUtils::unique_destination(dir, "Map", "vpk", &[]),
            dir.join("Map_3.vpk")
        );
    }

    #[test]
    fn test_unique_destination_respects_shadows() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        std::fs::write(dir.join("Tank.vpk.disabled"), "a").unwrap();

        assert_eq!(
            FileUtils::unique_destination(dir, "Tank", "vpk", &[".disabled"]),
            dir.join("Tank_2.vpk")
        );
        assert_eq!(
            FileUtils::unique_destination(dir, "Tank", "vpk", &[]),
            dir.join("Tank.vpk")
        );
    }

    #[test]
    fn test_find_content_files_filters_extension_and_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        std::fs::write(dir.join("a_legacy.bin"), "data").unwrap();
        std::fs::write(dir.join("empty.vpk"), "").unwrap();
        std::fs::write(dir.join("notes.txt"), "data").unwrap();

        let found = FileUtils::find_content_files(dir, &["vpk".into(), "bin".into()]);
        assert_eq!(found, vec![dir.join("a_legacy.bin")]);
        assert_eq!(FileUtils::dir_size(dir), 8);
    }
}
