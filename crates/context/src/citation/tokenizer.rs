//! Streaming citation tokenizer
//!
//! The answer model emits markers like `{{citation:0,2}}` inline with its
//! text, and the provider splits its output at arbitrary points. The
//! tokenizer sits between the two: it forwards text as soon as it is known
//! not to be part of a marker, holds back the shortest tail that could still
//! become one, and rewrites every complete marker in canonical form with
//! out-of-range indices removed.
//!
//! Grammar, matched leftmost-first with greedy optional braces:
//!
//! ```text
//! marker := '{' '{'? "citation:" DIGITS (',' DIGITS)* '}' '}'?
//! ```
//!
//! Only markers opened with `{{` are held across fragments. A single `{`
//! followed by anything else is literal text and passes straight through;
//! a lone `{` as the very last byte is held until the next byte decides.
//! A complete marker is validated whatever its length; only an unfinished
//! one is bounded, by how much of it may be held.

const KEYWORD: &[u8] = b"citation:";

/// Longest unfinished marker held back, in bytes. A longer prefix is
/// released as literal text.
pub const MAX_MARKER_LEN: usize = 256;

/// Tokenizer state between fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerState {
    /// Nothing held back
    Scanning,
    /// The buffer holds a possible marker start
    HoldingPrefix,
}

enum Scan<'a> {
    /// A complete marker of `len` bytes with its raw index digits
    Match { len: usize, indices: Vec<&'a [u8]> },
    /// More input could still complete a marker here
    Incomplete,
    /// Not a marker
    NoMatch,
}

/// Match a marker at the start of `input`, which begins with `{`.
fn scan(input: &[u8], at_eof: bool) -> Scan<'_> {
    let double = input.get(1) == Some(&b'{');

    if input.len() == 1 {
        return if at_eof { Scan::NoMatch } else { Scan::Incomplete };
    }

    // Running out of input: only `{{` candidates are worth waiting for
    let starved = || {
        if double && !at_eof {
            Scan::Incomplete
        } else {
            Scan::NoMatch
        }
    };

    let mut i = if double { 2 } else { 1 };

    for &expected in KEYWORD {
        match input.get(i) {
            None => return starved(),
            Some(&b) if b == expected => i += 1,
            Some(_) => return Scan::NoMatch,
        }
    }

    let mut indices = Vec::new();
    loop {
        let start = i;
        while input.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        if i == start {
            return match input.get(i) {
                None => starved(),
                Some(_) => Scan::NoMatch,
            };
        }
        indices.push(&input[start..i]);

        match input.get(i) {
            None => return starved(),
            Some(b',') => i += 1,
            Some(b'}') => {
                i += 1;
                break;
            }
            Some(_) => return Scan::NoMatch,
        }
    }

    match input.get(i) {
        Some(b'}') => i += 1,
        // A second `}` may still arrive and belongs to this marker
        None if double && !at_eof => return Scan::Incomplete,
        _ => {}
    }

    Scan::Match { len: i, indices }
}

/// Incremental marker validator for one answer stream.
#[derive(Debug)]
pub struct CitationTokenizer {
    buffer: String,
    num_references: usize,
    state: TokenizerState,
    dropped: Vec<String>,
}

impl CitationTokenizer {
    /// Create a tokenizer accepting indices in `0..num_references`.
    pub fn new(num_references: usize) -> Self {
        Self {
            buffer: String::new(),
            num_references,
            state: TokenizerState::Scanning,
            dropped: Vec::new(),
        }
    }

    pub fn state(&self) -> TokenizerState {
        self.state
    }

    /// Raw indices removed so far, in order of appearance.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Feed one fragment and return the text that is safe to emit now.
    pub fn push(&mut self, fragment: &str) -> String {
        self.buffer.push_str(fragment);
        self.drain(false)
    }

    /// Flush whatever is held at end of stream. An unfinished marker is
    /// emitted as literal text.
    pub fn finish(&mut self) -> String {
        self.drain(true)
    }

    /// Validate a complete text in one pass.
    pub fn clean(text: &str, num_references: usize) -> String {
        let mut tokenizer = Self::new(num_references);
        let mut out = tokenizer.push(text);
        out.push_str(&tokenizer.finish());
        out
    }

    fn drain(&mut self, at_eof: bool) -> String {
        let buffer = std::mem::take(&mut self.buffer);
        let bytes = buffer.as_bytes();
        let mut out = String::with_capacity(buffer.len());
        let mut pos = 0;
        let mut held = false;

        // Every `{` and every marker end sits on an ASCII byte, so all
        // slicing below lands on char boundaries.
        while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'{') {
            let start = pos + offset;
            match scan(&bytes[start..], at_eof) {
                Scan::Match { len, indices } => {
                    out.push_str(&buffer[pos..start]);
                    self.render(&indices, &mut out);
                    pos = start + len;
                }
                Scan::NoMatch => {
                    out.push_str(&buffer[pos..=start]);
                    pos = start + 1;
                }
                Scan::Incomplete if bytes.len() - start > MAX_MARKER_LEN => {
                    out.push_str(&buffer[pos..=start]);
                    pos = start + 1;
                }
                Scan::Incomplete => {
                    out.push_str(&buffer[pos..start]);
                    pos = start;
                    held = true;
                    break;
                }
            }
        }

        if held {
            self.buffer = buffer[pos..].to_string();
            self.state = TokenizerState::HoldingPrefix;
        } else {
            out.push_str(&buffer[pos..]);
            self.state = TokenizerState::Scanning;
        }
        out
    }

    fn render(&mut self, indices: &[&[u8]], out: &mut String) {
        let mut valid: Vec<usize> = Vec::with_capacity(indices.len());

        for raw in indices {
            let raw = String::from_utf8_lossy(raw);
            match raw.parse::<usize>() {
                Ok(index) if index < self.num_references => valid.push(index),
                _ => {
                    tracing::warn!(
                        index = %raw,
                        num_references = self.num_references,
                        "Dropping out-of-range citation index"
                    );
                    self.dropped.push(raw.into_owned());
                }
            }
        }

        if valid.is_empty() {
            return;
        }

        out.push_str("{{citation:");
        for (position, index) in valid.iter().enumerate() {
            if position > 0 {
                out.push(',');
            }
            out.push_str(&index.to_string());
        }
        out.push_str("}}");
    }
}
