//! Pure parse attempts, one per recovery tier.
//!
//! Every attempt returns `Some(value)` only when it produced a JSON object or
//! array. Scalars (`42`, `"text"`, `null`) are not structured data and fall
//! through to the next tier.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The tier that produced a recovered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Content of a fenced ```json block
    CodeBlock,
    /// The whole input parsed as-is
    Direct,
    /// First `{...}` or `[...]` span found in the input
    Fragment,
    /// Output of the repair capability
    Repaired,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::CodeBlock => "code-block",
            Tier::Direct => "direct",
            Tier::Fragment => "fragment",
            Tier::Repaired => "repaired",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markers beyond this many are ignored when pairing fences.
const MAX_FENCE_MARKERS: usize = 16;

/// Raw text plus the fence markers found in it.
#[derive(Debug, Clone)]
pub(crate) struct Input<'a> {
    pub raw: &'a str,
    markers: Vec<(usize, usize)>,
}

impl<'a> Input<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            markers: fence_markers(raw),
        }
    }

    pub fn has_fence(&self) -> bool {
        !self.markers.is_empty()
    }

    /// Every opener/closer pairing, shortest first for each opener.
    ///
    /// A fence whose content itself contains ``` only parses once the pairing
    /// reaches the real closing marker.
    fn fenced_blocks(&self) -> impl Iterator<Item = &'a str> + '_ {
        let raw = self.raw;
        let markers = &self.markers;
        (0..markers.len()).flat_map(move |i| {
            (i + 1..markers.len()).map(move |j| raw[markers[i].1..markers[j].0].trim())
        })
    }

    /// The first fence whose content starts like JSON, taken up to the last
    /// marker after it (or end of input when unterminated).
    pub fn structured_fence(&self) -> Option<&'a str> {
        let raw = self.raw;
        let markers = &self.markers;
        (0..markers.len()).find_map(|i| {
            let next = markers.get(i + 1).map_or(raw.len(), |m| m.0);
            let head = raw[markers[i].1..next].trim_start();
            if !head.starts_with(['{', '[']) {
                return None;
            }
            let end = if i + 1 < markers.len() {
                markers[markers.len() - 1].0
            } else {
                raw.len()
            };
            Some(raw[markers[i].1..end].trim())
        })
    }

    /// Text handed to the repair tier: the structured fence when there is
    /// one, otherwise the whole input.
    pub fn repair_target(&self) -> &'a str {
        self.structured_fence().unwrap_or(self.raw)
    }
}

/// A single tier's attempt. Pure: no logging, no side effects.
pub(crate) type Attempt = fn(&Input<'_>) -> Option<Value>;

/// Structural tiers in strict priority order. Repair runs after these.
pub(crate) const STRUCTURAL_TIERS: [(Tier, Attempt); 3] = [
    (Tier::CodeBlock, code_block),
    (Tier::Direct, direct),
    (Tier::Fragment, fragment),
];

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```[\w+-]*").expect("static fence pattern compiles"))
}

/// `(start, end)` of each ``` marker, the end skipping a language tag.
fn fence_markers(text: &str) -> Vec<(usize, usize)> {
    if !text.contains("```") {
        return Vec::new();
    }
    fence_pattern()
        .find_iter(text)
        .take(MAX_FENCE_MARKERS)
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Content of the first complete fenced block, trimmed.
pub fn extract_fenced(text: &str) -> Option<&str> {
    Input::new(text).fenced_blocks().next()
}

/// Parse `text` and keep the result only if it is an object or array.
pub(crate) fn parse_structured(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

fn code_block(input: &Input<'_>) -> Option<Value> {
    input.fenced_blocks().find_map(parse_structured)
}

fn direct(input: &Input<'_>) -> Option<Value> {
    parse_structured(input.raw)
}

/// Fragments of the structured fence first, then of the whole input.
fn fragment(input: &Input<'_>) -> Option<Value> {
    input
        .structured_fence()
        .into_iter()
        .chain(std::iter::once(input.raw))
        .flat_map(fragment_candidates)
        .find_map(parse_structured)
}

/// Candidate spans, object forms first: greedy first-open..last-close, then a
/// string-aware balanced span from the first opener.
pub(crate) fn fragment_candidates(text: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::with_capacity(4);
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(span) = greedy_span(text, open, close) {
            out.push(span);
        }
        if let Some(span) = balanced_span(text, open, close) {
            if !out.contains(&span) {
                out.push(span);
            }
        }
    }
    out
}

fn greedy_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Outermost balanced span starting at the first `open`, ignoring delimiters
/// inside double-quoted strings.
fn balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}
