//! Generic line-oriented state machine with indentation-aware block
//! extraction (spec §4.2).
//!
//! The source implementation models state transitions via Python
//! exceptions (`EOFError`, `TransitionCorrection`, `StateCorrection`).
//! Here transition handlers return an explicit sum type and the driver
//! loop interprets it — no control-flow-via-panic.

use crate::diagnostic::{Diagnostic, DiagnosticKind};

/// One input line plus its original source attribution, preserved
/// across nested nested-nested (embedded) parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub text: String,
    pub source_line: u32,
}

impl SourceLine {
    pub fn new(text: impl Into<String>, source_line: u32) -> Self {
        SourceLine {
            text: text.into(),
            source_line,
        }
    }
}

/// Tab-expand, strip trailing whitespace, normalize vertical-tab/form-feed.
pub fn normalize_lines(text: &str) -> Vec<SourceLine> {
    text.lines()
        .enumerate()
        .map(|(i, raw)| {
            let expanded = expand_tabs(raw);
            let cleaned = expanded
                .trim_end()
                .replace('\u{000B}', " ")
                .replace('\u{000C}', " ");
            SourceLine::new(cleaned, (i + 1) as u32)
        })
        .collect()
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut col = 0usize;
    for ch in line.chars() {
        if ch == '\t' {
            let spaces = 8 - (col % 8);
            for _ in 0..spaces {
                out.push(' ');
            }
            col += spaces;
        } else {
            out.push(ch);
            col += 1;
        }
    }
    out
}

/// The result of extracting an indented block.
pub struct IndentedBlock {
    pub lines: Vec<SourceLine>,
    pub indent: usize,
    pub blank_finish: bool,
}

/// A cursor over a [`SourceLine`] view. Slicing a view preserves
/// per-line source attribution so nested parses can report diagnostics
/// against the original file.
pub struct Cursor<'a> {
    lines: &'a [SourceLine],
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Ok,
    Eof,
}

impl<'a> Cursor<'a> {
    pub fn new(lines: &'a [SourceLine]) -> Self {
        Cursor { lines, offset: 0 }
    }

    pub fn current(&self) -> Option<&'a SourceLine> {
        self.lines.get(self.offset)
    }

    pub fn at_eof(&self) -> bool {
        self.offset >= self.lines.len()
    }

    pub fn next_line(&mut self) -> Advance {
        self.offset += 1;
        if self.at_eof() {
            Advance::Eof
        } else {
            Advance::Ok
        }
    }

    pub fn previous_line(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    pub fn goto_line(&mut self, abs: usize) {
        self.offset = abs;
    }

    /// Extract a contiguous indented block with uniform minimum indent
    /// stripped. `first_indent` overrides the minimum indent expected
    /// on the first line only (e.g. content following a directive
    /// marker on the same physical line group).
    pub fn get_indented(
        &mut self,
        block_indent: Option<usize>,
        until_blank: bool,
        strip_indent: bool,
    ) -> IndentedBlock {
        let mut collected = Vec::new();
        let mut min_indent: Option<usize> = block_indent;
        let mut blank_finish = true;

        while let Some(line) = self.current() {
            if line.text.trim().is_empty() {
                if until_blank {
                    self.next_line();
                    break;
                }
                collected.push(line.clone());
                self.next_line();
                continue;
            }
            let indent = leading_spaces(&line.text);
            if let Some(min) = min_indent {
                if indent < min {
                    blank_finish = false;
                    break;
                }
            } else {
                if indent == 0 {
                    blank_finish = false;
                    break;
                }
                min_indent = Some(indent);
            }
            collected.push(line.clone());
            self.next_line();
        }

        let indent = min_indent.unwrap_or(0);
        let lines = if strip_indent {
            collected
                .into_iter()
                .map(|l| {
                    let stripped = if l.text.len() >= indent {
                        l.text[indent.min(l.text.len())..].to_string()
                    } else {
                        String::new()
                    };
                    SourceLine::new(stripped, l.source_line)
                })
                .collect()
        } else {
            collected
        };

        IndentedBlock {
            lines,
            indent,
            blank_finish,
        }
    }

    /// Accumulate lines until a blank line. If `flush_left` is set and
    /// an indented line is encountered, fails with `UnexpectedIndentation`.
    pub fn get_text_block(&mut self, flush_left: bool) -> Result<Vec<SourceLine>, Diagnostic> {
        let mut collected = Vec::new();
        while let Some(line) = self.current() {
            if line.text.trim().is_empty() {
                break;
            }
            if flush_left && leading_spaces(&line.text) > 0 && !collected.is_empty() {
                return Err(Diagnostic::new(
                    DiagnosticKind::UnexpectedIndentation,
                    line.source_line,
                ));
            }
            collected.push(line.clone());
            self.next_line();
        }
        Ok(collected)
    }
}

pub fn leading_spaces(s: &str) -> usize {
    s.chars().take_while(|c| *c == ' ').count()
}

/// Special signals a transition method may return instead of a normal
/// state/output pair.
pub enum TransitionResult<C, S> {
    Normal { context: C, next_state: S },
    TransitionCorrection { name: &'static str },
    StateCorrection { state: S, name: Option<&'static str> },
    Eof,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_tabs_to_next_stop_of_eight() {
        assert_eq!(expand_tabs("a\tb"), "a       b");
    }

    #[test]
    fn get_indented_strips_uniform_indent() {
        let text = "  foo\n  bar\n";
        let lines = normalize_lines(text);
        let mut cursor = Cursor::new(&lines);
        let block = cursor.get_indented(None, false, true);
        assert_eq!(block.indent, 2);
        assert_eq!(block.lines[0].text, "foo");
        assert_eq!(block.lines[1].text, "bar");
    }

    #[test]
    fn get_text_block_stops_at_blank() {
        let text = "foo\nbar\n\nbaz\n";
        let lines = normalize_lines(text);
        let mut cursor = Cursor::new(&lines);
        let block = cursor.get_text_block(false).unwrap();
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn get_text_block_flush_left_rejects_indentation() {
        let text = "foo\n  bar\n";
        let lines = normalize_lines(text);
        let mut cursor = Cursor::new(&lines);
        let err = cursor.get_text_block(true).unwrap_err();
        assert!(matches!(err.kind, DiagnosticKind::UnexpectedIndentation));
    }
}
