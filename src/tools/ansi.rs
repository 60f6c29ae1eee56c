//! ANSI Escape Stripping
//!
//! Removes terminal control sequences from command output so that the
//! machine-facing report carries plain text. The stripper is a small state
//! machine that keeps its state between calls, which lets it run over a
//! stream of chunks where a sequence may be split across two reads.

/// Escape character
const ESC: char = '\x1b';

/// Bell, terminates OSC strings
const BEL: char = '\x07';

/// 8-bit Control Sequence Introducer
const CSI_8BIT: char = '\u{9b}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Ground,
    /// Saw ESC, waiting for the sequence type
    Escape,
    /// Inside `ESC [` parameters, ends on a final byte in `@`..=`~`
    Csi,
    /// Inside an OSC/DCS/SOS/PM/APC string, ends on BEL or `ESC \`
    Str,
    /// Saw ESC inside a string
    StrEscape,
    /// Charset designator, one more character to swallow
    Charset,
}

/// Streaming ANSI escape sequence stripper
#[derive(Debug, Clone, Default)]
pub struct AnsiStripper {
    state: State,
}

impl AnsiStripper {
    /// Create a stripper in the ground state
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed `input` through the stripper, appending visible text to `out`
    pub fn feed(&mut self, input: &str, out: &mut String) {
        for c in input.chars() {
            self.state = match self.state {
                State::Ground => match c {
                    ESC => State::Escape,
                    CSI_8BIT => State::Csi,
                    _ => {
                        out.push(c);
                        State::Ground
                    }
                },
                State::Escape => match c {
                    '[' => State::Csi,
                    ']' | 'P' | 'X' | '^' | '_' => State::Str,
                    '(' | ')' | '*' | '+' | '-' | '.' | '/' | '#' | '%' => State::Charset,
                    _ => State::Ground,
                },
                State::Csi => {
                    if ('\x40'..='\x7e').contains(&c) {
                        State::Ground
                    } else {
                        State::Csi
                    }
                }
                State::Str => match c {
                    BEL => State::Ground,
                    ESC => State::StrEscape,
                    _ => State::Str,
                },
                State::StrEscape => match c {
                    '\\' => State::Ground,
                    ESC => State::StrEscape,
                    _ => State::Str,
                },
                State::Charset => State::Ground,
            };
        }
    }

    /// Whether the stripper is in the middle of a sequence
    pub fn is_mid_sequence(&self) -> bool {
        self.state != State::Ground
    }
}

/// Strip all ANSI escape sequences from a complete string
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    AnsiStripper::new().feed(input, &mut out);
    out
}
