use crate::models::error::SError;
use crate::models::task::FatalKind;
use regex::Regex;

/// What one line of downloader output means to the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Progress { percent: f32, done: u64, total: u64 },
    Fatal(FatalKind),
    Succeeded,
    Other,
}

const DISK_SPACE_PATTERNS: [&str; 4] = [
    "no space left on device",
    "not enough disk space",
    "disk write failure",
    "insufficient disk space",
];

const LOGIN_FAILURE_PATTERNS: [&str; 3] = ["failed login", "login failure", "invalid password"];

/// Pattern matcher for steamcmd's line output.
pub struct OutputParser {
    progress: Regex,
    item_failed: Regex,
    item_ok: Regex,
}

impl OutputParser {
    pub fn new() -> Result<Self, SError> {
        let build = |p: &str| {
            Regex::new(p).map_err(|e| SError::ParseError(format!("Failed to create regex: {}", e)))
        };
        Ok(Self {
            progress: build(r"(?i)progress:\s*([\d.]+)\s*\((\d+)\s*/\s*(\d+)\)")?,
            item_failed: build(r"(?i)ERROR!\s*Download item \d+ failed")?,
            item_ok: build(r"(?i)Success\.\s*Downloaded item \d+")?,
        })
    }

    pub fn parse(&self, line: &str) -> OutputEvent {
        let lower = line.to_lowercase();
        if DISK_SPACE_PATTERNS.iter().any(|p| lower.contains(p)) {
            return OutputEvent::Fatal(FatalKind::DiskSpace);
        }
        if self.item_failed.is_match(line) {
            return OutputEvent::Fatal(FatalKind::ItemRejected);
        }
        if LOGIN_FAILURE_PATTERNS.iter().any(|p| lower.contains(p)) {
            return OutputEvent::Fatal(FatalKind::LoginFailure);
        }
        if self.item_ok.is_match(line) {
            return OutputEvent::Succeeded;
        }
        if let Some(caps) = self.progress.captures(line) {
            let percent = caps[1].parse::<f32>().unwrap_or(0.0).clamp(0.0, 100.0);
            let done = caps[2].parse().unwrap_or(0);
            let total = caps[3].parse().unwrap_or(0);
            return OutputEvent::Progress {
                percent,
                done,
                total,
            };
        }
        OutputEvent::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line() {
        let parser = OutputParser::new().unwrap();
        let event = parser.parse(
            " Update state (0x61) downloading, progress: 45.23 (12345678 / 27294130)",
        );
        assert_eq!(
            event,
            OutputEvent::Progress {
                percent: 45.23,
                done: 12345678,
                total: 27294130
            }
        );
    }

    #[test]
    fn test_fatal_patterns() {
        let parser = OutputParser::new().unwrap();
        assert_eq!(
            parser.parse("Error: No space left on device"),
            OutputEvent::Fatal(FatalKind::DiskSpace)
        );
        assert_eq!(
            parser.parse("ERROR! Download item 2984731 failed (File Not Found)."),
            OutputEvent::Fatal(FatalKind::ItemRejected)
        );
        assert_eq!(
            parser.parse("FAILED login with result code Rate Limit Exceeded"),
            OutputEvent::Fatal(FatalKind::LoginFailure)
        );
    }

    #[test]
    fn test_success_and_noise() {
        let parser = OutputParser::new().unwrap();
        assert_eq!(
            parser.parse(r#"Success. Downloaded item 123 to "/tmp/steamapps/workshop/content/550/123" (1024 bytes)"#),
            OutputEvent::Succeeded
        );
        assert_eq!(parser.parse("Loading Steam API...OK"), OutputEvent::Other);
        assert_eq!(parser.parse(""), OutputEvent::Other);
    }
}
