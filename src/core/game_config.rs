use crate::models::error::SError;
use crate::models::paths::{backup_path, SEARCH_PATHS_ANCHOR};
use crate::utils::file::FileUtils;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use tracing::{debug, info};

/// Line span of the `SearchPaths { ... }` block, by index into the file's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPathSection {
    pub anchor: usize,
    pub open: usize,
    pub close: usize,
}

impl SearchPathSection {
    pub fn locate(lines: &[&str]) -> Result<Self, SError> {
        let not_found = || SError::ConfigSectionNotFound(SEARCH_PATHS_ANCHOR.to_string());

        let anchor = lines
            .iter()
            .position(|l| strip_comment(l).trim().eq_ignore_ascii_case(SEARCH_PATHS_ANCHOR))
            .ok_or_else(not_found)?;

        let open = (anchor + 1..lines.len())
            .find(|&i| !strip_comment(lines[i]).trim().is_empty())
            .filter(|&i| strip_comment(lines[i]).trim_start().starts_with('{'))
            .ok_or_else(not_found)?;

        let mut depth = 0usize;
        for (i, line) in lines.iter().enumerate().skip(open) {
            for c in strip_comment(line).chars() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            return Ok(Self {
                                anchor,
                                open,
                                close: i,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        Err(not_found())
    }

    fn body(&self) -> std::ops::Range<usize> {
        self.open + 1..self.close
    }

    /// Index of the last `Game` line in the section, if any.
    pub fn last_game_line(&self, lines: &[&str]) -> Option<usize> {
        self.body().rev().find(|&i| is_game_line(lines[i]))
    }

    /// Indices of lines that reference `<prefix>\<id>`.
    pub fn entry_lines(&self, lines: &[&str], prefix: &str, id: &str) -> Result<Vec<usize>, SError> {
        let re = entry_regex(prefix)?;
        Ok(self
            .body()
            .filter(|&i| {
                re.captures(lines[i])
                    .and_then(|c| c.get(1))
                    .is_some_and(|m| m.as_str() == id)
            })
            .collect())
    }

    pub fn active_ids(&self, lines: &[&str], prefix: &str) -> Result<BTreeSet<String>, SError> {
        let re = entry_regex(prefix)?;
        Ok(self
            .body()
            .filter_map(|i| re.captures(lines[i]))
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect())
    }
}

fn strip_comment(line: &str) -> &str {
    line.split("//").next().unwrap_or("")
}

fn is_game_line(line: &str) -> bool {
    strip_comment(line)
        .split_whitespace()
        .next()
        .is_some_and(|key| key.eq_ignore_ascii_case("game"))
}

/// `Game <prefix>\<id>`, optionally quoted, trailing comment allowed.
fn entry_regex(prefix: &str) -> Result<Regex, SError> {
    let prefix = regex::escape(prefix.trim_end_matches('\\'));
    let pattern = format!(r#"(?i)^\s*"?game"?\s+"?{prefix}\\(\d+)"?\s*(?://.*)?$"#);
    Regex::new(&pattern).map_err(|e| SError::ParseError(e.to_string()))
}

/// The file's line ending, so rewrites do not churn the whole file.
fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Whole-file read-modify-write editor for the game config's search paths.
/// The first mutation in a session copies the pristine file to its backup
/// sibling unless a backup already exists.
pub struct GameConfigEditor {
    path: Utf8PathBuf,
    prefix: String,
    backed_up: bool,
}

impl GameConfigEditor {
    pub fn new(path: impl Into<Utf8PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.into(),
            backed_up: false,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn backup_path(&self) -> Utf8PathBuf {
        backup_path(&self.path)
    }

    pub fn entry_line(&self, id: &str) -> String {
        format!("Game\t{}\\{id}", self.prefix.trim_end_matches('\\'))
    }

    pub fn active_ids(&self) -> Result<BTreeSet<String>, SError> {
        let text = self.read()?;
        let lines: Vec<&str> = text.lines().collect();
        let section = SearchPathSection::locate(&lines)?;
        section.active_ids(&lines, &self.prefix)
    }

    /// Returns true if the file changed.
    pub fn add_entry(&mut self, id: &str) -> Result<bool, SError> {
        let text = self.read()?;
        let lines: Vec<&str> = text.lines().collect();
        let section = SearchPathSection::locate(&lines)?;

        if !section.entry_lines(&lines, &self.prefix, id)?.is_empty() {
            debug!("entry for {id} already present");
            return Ok(false);
        }

        let (insert_at, indent) = match section.last_game_line(&lines) {
            Some(i) => (i + 1, leading_whitespace(lines[i]).to_string()),
            None => (
                section.open + 1,
                format!("{}\t", leading_whitespace(lines[section.open])),
            ),
        };

        let new_line = format!("{indent}{}", self.entry_line(id));
        let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 1);
        out.extend_from_slice(&lines[..insert_at]);
        out.push(&new_line);
        out.extend_from_slice(&lines[insert_at..]);

        self.write(&text, &out)?;
        info!("added search path entry for {id}");
        Ok(true)
    }

    /// Returns true if the file changed.
    pub fn remove_entry(&mut self, id: &str) -> Result<bool, SError> {
        let text = self.read()?;
        let lines: Vec<&str> = text.lines().collect();
        let section = SearchPathSection::locate(&lines)?;

        let doomed = section.entry_lines(&lines, &self.prefix, id)?;
        if doomed.is_empty() {
            return Ok(false);
        }

        let out: Vec<&str> = lines
            .iter()
            .enumerate()
            .filter(|(i, _)| !doomed.contains(i))
            .map(|(_, l)| *l)
            .collect();

        self.write(&text, &out)?;
        info!("removed search path entry for {id}");
        Ok(true)
    }

    pub fn restore_backup(&mut self) -> Result<(), SError> {
        let backup = self.backup_path();
        if !backup.exists() {
            return Err(SError::FileOrDirectoryNotFound(backup.to_string()));
        }
        let pristine = fs::read(&backup)?;
        FileUtils::write_atomic(&self.path, pristine)?;
        info!("restored {} from {backup}", self.path);
        Ok(())
    }

    /// The file as text. A file that is not valid UTF-8 is refused rather
    /// than rewritten with replacement characters.
    fn read(&self) -> Result<String, SError> {
        if !self.path.exists() {
            return Err(SError::FileOrDirectoryNotFound(self.path.to_string()));
        }
        String::from_utf8(fs::read(&self.path)?).map_err(|e| {
            SError::ParseError(format!(
                "{} is not valid UTF-8 (byte {}), refusing to edit it",
                self.path,
                e.utf8_error().valid_up_to()
            ))
        })
    }

    fn ensure_backup(&mut self) -> Result<(), SError> {
        if self.backed_up {
            return Ok(());
        }
        let backup = self.backup_path();
        if !backup.exists() {
            fs::copy(&self.path, &backup)?;
            info!("backed up {} to {backup}", self.path);
        }
        self.backed_up = true;
        Ok(())
    }

    fn write(&mut self, original: &str, lines: &[&str]) -> Result<(), SError> {
        self.ensure_backup()?;
        let eol = line_ending(original);
        let mut text = lines.join(eol);
        if original.ends_with('\n') {
            text.push_str(eol);
        }
        FileUtils::write_atomic(&self.path, &text)
    }
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}
