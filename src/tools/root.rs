//! Command Root Extraction
//!
//! Derives the "command root" of a shell command line: the leading program
//! name, used as the unit of trust by the confirmation gate.
//!
//! # Precision
//!
//! The extraction is a string heuristic, not a shell parser. Only the first
//! segment is inspected, so `ls; rm -rf /` yields `ls`. Trust decisions made
//! on the root therefore do not cover chained or backgrounded commands.

/// Grouping characters removed before splitting
const GROUPING_CHARS: [char; 4] = ['{', '}', '(', ')'];

/// Returns true for characters that separate command segments
fn is_segment_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ';' | '&' | '|')
}

/// Extract the command root from a raw command string
///
/// Returns `None` when the command is empty or yields no usable segment.
///
/// # Example
///
/// ```
/// use shellgate::tools::command_root;
///
/// assert_eq!(command_root("ls -la | grep foo").as_deref(), Some("ls"));
/// assert_eq!(command_root(r"C:\tools\git.exe status").as_deref(), Some("git.exe"));
/// assert_eq!(command_root("   "), None);
/// ```
pub fn command_root(command: &str) -> Option<String> {
    let cleaned: String = command
        .trim()
        .chars()
        .filter(|c| !GROUPING_CHARS.contains(c))
        .collect();

    let first = cleaned
        .split(is_segment_separator)
        .find(|segment| !segment.is_empty())?;

    let program = first.rsplit(['/', '\\']).next()?;
    if program.is_empty() {
        None
    } else {
        Some(program.to_string())
    }
}
