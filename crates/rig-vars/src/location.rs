//! Call-site capture for variable assignments

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

/// Where a variable was assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// Capture the caller of the outermost `#[track_caller]` function.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }

    /// Whether this location lies in a file containing any ignored fragment.
    pub fn is_ignored(&self, ignored: &[String]) -> bool {
        ignored.iter().any(|fragment| self.file.contains(fragment.as_str()))
    }

    /// The nearest call site outside the ignored files, walking outward from
    /// this one.
    ///
    /// Frames past an ignored location are read from a captured backtrace, so
    /// they are only found when the binary carries debug info. Toolchain
    /// frames are never returned.
    pub fn first_unignored(&self, ignored: &[String]) -> Option<SourceLocation> {
        if !self.is_ignored(ignored) {
            return Some(self.clone());
        }

        let trace = format!("{:#}", Backtrace::force_capture());
        let frames: Vec<SourceLocation> = trace.lines().filter_map(parse_frame).collect();
        let start = frames
            .iter()
            .position(|frame| frame.line == self.line && same_file(&frame.file, &self.file))
            .or_else(|| frames.iter().position(|frame| same_file(&frame.file, &self.file)))?;

        frames[start..]
            .iter()
            .find(|frame| !frame.is_ignored(ignored) && !is_toolchain(&frame.file))
            .cloned()
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Parse a backtrace source line of the form `at path/to/file.rs:12:5`.
fn parse_frame(line: &str) -> Option<SourceLocation> {
    let location = line.trim().strip_prefix("at ")?;
    let mut parts = location.rsplitn(3, ':');
    let column = parts.next()?.parse().ok()?;
    let line = parts.next()?.parse().ok()?;
    let file = parts.next()?;
    Some(SourceLocation {
        file: file.strip_prefix("./").unwrap_or(file).to_string(),
        line,
        column,
    })
}

/// Backtraces may print absolute paths where `Location` has relative ones.
fn same_file(a: &str, b: &str) -> bool {
    let a = a.strip_prefix("./").unwrap_or(a);
    let b = b.strip_prefix("./").unwrap_or(b);
    a.ends_with(b) || b.ends_with(a)
}

fn is_toolchain(file: &str) -> bool {
    file.starts_with("/rustc/") || file.contains("/rustlib/") || file.contains("/.rustup/")
}
