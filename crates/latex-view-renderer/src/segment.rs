//! Splitting prose into text and `$…$` / `$$…$$` math segments.
//!
//! A `$` only opens (or closes) inline math when it is not a currency sign,
//! so `$500` and `$1000.` stay in the surrounding text while `$x^2$` becomes
//! math. Malformed notation never fails: unterminated runs fall back to text
//! in small chunks, so every input is consumed in bounded time.

use std::borrow::Cow;

use serde::Serialize;

const DOLLAR: u8 = b'$';
const BLOCK_DELIM: &str = "$$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SegmentKind {
    Text,
    InlineMath,
    BlockMath,
}

impl SegmentKind {
    pub fn is_math(self) -> bool {
        !matches!(self, SegmentKind::Text)
    }
}

/// A typed slice of the input.
///
/// For math kinds `content` is the notation with its delimiters stripped and
/// surrounding whitespace trimmed; text is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment<'a> {
    pub kind: SegmentKind,
    pub content: Cow<'a, str>,
}

impl<'a> Segment<'a> {
    pub fn text(content: impl Into<Cow<'a, str>>) -> Self {
        Self {
            kind: SegmentKind::Text,
            content: content.into(),
        }
    }

    pub fn inline(content: impl Into<Cow<'a, str>>) -> Self {
        Self {
            kind: SegmentKind::InlineMath,
            content: content.into(),
        }
    }

    pub fn block(content: impl Into<Cow<'a, str>>) -> Self {
        Self {
            kind: SegmentKind::BlockMath,
            content: content.into(),
        }
    }

    pub fn is_math(&self) -> bool {
        self.kind.is_math()
    }

    pub fn into_static(self) -> Segment<'static> {
        Segment {
            kind: self.kind,
            content: Cow::Owned(self.content.into_owned()),
        }
    }

    /// The segment written back out with its delimiters.
    pub fn to_source(&self) -> String {
        match self.kind {
            SegmentKind::Text => self.content.to_string(),
            SegmentKind::InlineMath => format!("${}$", self.content),
            SegmentKind::BlockMath => format!("$${}$$", self.content),
        }
    }
}

/// Split `input` into text and math segments.
///
/// Never fails. Blank input gives an empty vec, and adjacent text pieces are
/// merged so no two `Text` segments are ever neighbours.
pub fn segment(input: &str) -> Vec<Segment<'_>> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    let segments = merge_text(Scanner::new(input));
    tracing::trace!(
        target: "latex_view::segment",
        input_len = input.len(),
        segments = segments.len(),
        "segmented input"
    );
    segments
}

/// Whether `input` contains any math that [`segment`] would extract.
///
/// Stops at the first math segment found, and skips scanning entirely when
/// there is no `$` at all.
pub fn has_latex(input: &str) -> bool {
    input.as_bytes().contains(&DOLLAR) && Scanner::new(input).any(|s| s.is_math())
}

/// Whether the `$` at byte offset `at` is a currency sign.
///
/// That is a `$` followed by digits, an optional fraction, and then
/// whitespace, end of input, a comma, or a period not followed by a digit.
pub fn is_currency_dollar(input: &str, at: usize) -> bool {
    let bytes = input.as_bytes();
    if bytes.get(at) != Some(&DOLLAR) {
        return false;
    }

    let mut i = at + 1;
    let whole = count_digits(&bytes[i..]);
    if whole == 0 {
        return false;
    }
    i += whole;

    if bytes.get(i) == Some(&b'.') {
        let fraction = count_digits(&bytes[i + 1..]);
        if fraction > 0 {
            i += 1 + fraction;
        }
    }

    match bytes.get(i) {
        None | Some(b',') => true,
        Some(b'.') => !bytes.get(i + 1).is_some_and(u8::is_ascii_digit),
        // `i` sits right after ASCII digits, so it is a char boundary.
        Some(_) => input[i..].chars().next().is_some_and(char::is_whitespace),
    }
}

/// Whether the byte at `at` is a `$` that may open math.
pub fn is_math_dollar(input: &str, at: usize) -> bool {
    input.as_bytes().get(at) == Some(&DOLLAR) && !is_currency_dollar(input, at)
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Left to right scanner producing unmerged segments.
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Next `$` at or after `from` that could open math.
    fn next_math_dollar(&self, from: usize) -> Option<usize> {
        self.input.as_bytes()[from..]
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == DOLLAR)
            .map(|(offset, _)| from + offset)
            .find(|&at| !is_currency_dollar(self.input, at))
    }

    /// Closing `$` for an inline run opened at `open`.
    ///
    /// Currency dollars are skipped, and a run with nothing between the
    /// delimiters does not count.
    fn inline_close(&self, open: usize) -> Option<usize> {
        self.next_math_dollar(open + 1)
            .filter(|&close| close > open + 1)
    }

    /// Consume one piece of input starting at `self.pos`.
    ///
    /// Returns the segment produced, if any, and how many bytes were used.
    /// Always consumes at least one byte.
    fn step(&self) -> (Option<Segment<'a>>, usize) {
        let input = self.input;
        let pos = self.pos;
        let rest = &input[pos..];

        if let Some(body) = rest.strip_prefix(BLOCK_DELIM) {
            if let Some(close) = body.find(BLOCK_DELIM) {
                let consumed = close + 2 * BLOCK_DELIM.len();
                return (math(SegmentKind::BlockMath, &body[..close]), consumed);
            }
        }

        if is_math_dollar(input, pos) {
            if let Some(close) = self.inline_close(pos) {
                let consumed = close + 1 - pos;
                return (
                    math(SegmentKind::InlineMath, &input[pos + 1..close]),
                    consumed,
                );
            }
        }

        match self.next_math_dollar(pos) {
            None => {
                let text = (!rest.trim().is_empty()).then(|| Segment::text(rest));
                (text, rest.len())
            }
            Some(at) if at == pos => {
                // Unterminated run. Take the `$` and the word after it as text
                // so the same position is never retried.
                let end = rest[1..]
                    .char_indices()
                    .find(|(_, c)| c.is_whitespace())
                    .map_or(1, |(i, c)| 1 + i + c.len_utf8());
                tracing::trace!(
                    target: "latex_view::segment",
                    offset = pos,
                    chunk_len = end,
                    "unterminated math delimiter kept as text"
                );
                (Some(Segment::text(&rest[..end])), end)
            }
            Some(at) => (Some(Segment::text(&input[pos..at])), at - pos),
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.input.len() {
            let (segment, consumed) = self.step();
            self.pos += consumed;
            if segment.is_some() {
                return segment;
            }
        }
        None
    }
}

fn math(kind: SegmentKind, raw: &str) -> Option<Segment<'_>> {
    let notation = raw.trim();
    (!notation.is_empty()).then(|| Segment {
        kind,
        content: Cow::Borrowed(notation),
    })
}

fn merge_text<'a>(segments: impl Iterator<Item = Segment<'a>>) -> Vec<Segment<'a>> {
    let mut merged: Vec<Segment<'a>> = Vec::new();
    for segment in segments {
        match merged.last_mut() {
            Some(last) if last.kind == SegmentKind::Text && segment.kind == SegmentKind::Text => {
                last.content.to_mut().push_str(&segment.content);
            }
            _ => merged.push(segment),
        }
    }
    merged
}
