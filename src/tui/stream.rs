//! Line reassembly for chunked output
//!
//! Log bodies and exec output arrive in arbitrary chunks that can end in the
//! middle of a line, a UTF-8 character or an escape sequence. A [`LineSplicer`]
//! remembers which row is still open so the next chunk continues it instead of
//! starting a new one; a [`TextFeed`] also holds back the undecoded bytes and
//! unfinished control sequences, so the rows never depend on where a chunk
//! boundary fell.

use crate::formatting::{strip_terminal_controls, take_utf8, unterminated_escape_start};
use crate::tui::app::Row;

/// Per-stream splice state
#[derive(Debug, Clone, Default)]
pub struct LineSplicer {
    /// Index of the row the previous chunk left unfinished
    open_row: Option<usize>,
}

impl LineSplicer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last chunk ended on a newline
    #[must_use]
    pub fn last_line_finished(&self) -> bool {
        self.open_row.is_none()
    }

    /// Append `chunk` to `rows`, continuing the open row if there is one
    ///
    /// Returns the number of rows added.
    pub fn splice(&mut self, rows: &mut Vec<Row>, chunk: &str) -> usize {
        if chunk.is_empty() {
            return 0;
        }

        let finished = chunk.ends_with('\n');
        let body = if finished { &chunk[..chunk.len() - 1] } else { chunk };
        let mut fragments = body.split('\n');
        let before = rows.len();

        let first = fragments.next().unwrap_or("");
        match self.open_row.and_then(|i| rows.get_mut(i)) {
            Some(row) => row.text.push_str(first),
            None => rows.push(Row::plain(first)),
        }
        let mut last = self.open_row.filter(|&i| i < before).unwrap_or(rows.len() - 1);

        for fragment in fragments {
            rows.push(Row::plain(fragment));
            last = rows.len() - 1;
        }

        self.open_row = (!finished).then_some(last);
        rows.len() - before
    }
}

/// Strips terminal controls from a chunked stream
#[derive(Debug, Clone, Default)]
struct ControlFilter {
    /// Unfinished escape sequence or possible bell line, for the next chunk
    carry: String,
    drop_bell_lines: bool,
    /// The emitted text so far ends inside a line
    line_open: bool,
}

impl ControlFilter {
    fn filter(&mut self, chunk: &str) -> String {
        let mut text = std::mem::take(&mut self.carry);
        text.push_str(chunk);
        let hold = self.held_from(&text);
        self.carry = text.split_off(hold);

        let mut out = String::with_capacity(text.len());
        for line in text.split_inclusive('\n') {
            let continues = self.line_open;
            self.line_open = !line.ends_with('\n');
            if self.drop_bell_lines && !continues && is_bell_line(line) {
                continue;
            }
            out.push_str(&strip_terminal_controls(line));
        }
        out
    }

    /// Where the part of `text` that cannot be cleaned yet begins
    fn held_from(&self, text: &str) -> usize {
        let mut hold = unterminated_escape_start(text).unwrap_or(text.len());
        if self.drop_bell_lines {
            let tail_start = text.rfind('\n').map_or(0, |i| i + 1);
            let at_line_start = tail_start > 0 || !self.line_open;
            let tail = &text[tail_start..];
            if at_line_start
                && let Some(rest) = tail.strip_prefix('\x07')
                && rest.chars().all(|c| c == '\r')
            {
                hold = hold.min(tail_start);
            }
        }
        hold
    }
}

fn is_bell_line(line: &str) -> bool {
    line.ends_with('\n') && line.trim_end_matches(['\r', '\n']) == "\x07"
}

/// Everything one chunked text stream carries from one chunk to the next
#[derive(Debug, Clone, Default)]
pub struct TextFeed {
    undecoded: Vec<u8>,
    filter: ControlFilter,
    splicer: LineSplicer,
}

impl TextFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A feed that also drops lines consisting only of a bell
    #[must_use]
    pub fn dropping_bell_lines() -> Self {
        Self {
            filter: ControlFilter {
                drop_bell_lines: true,
                ..ControlFilter::default()
            },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn last_line_finished(&self) -> bool {
        self.splicer.last_line_finished()
    }

    /// Append raw bytes; an incomplete trailing character waits for the next chunk
    pub fn push_bytes(&mut self, rows: &mut Vec<Row>, bytes: &[u8]) -> usize {
        self.undecoded.extend_from_slice(bytes);
        let text = take_utf8(&mut self.undecoded);
        self.push_str(rows, &text)
    }

    /// Append decoded text, returning the number of rows added
    pub fn push_str(&mut self, rows: &mut Vec<Row>, chunk: &str) -> usize {
        let clean = self.filter.filter(chunk);
        self.splicer.splice(rows, &clean)
    }
}
