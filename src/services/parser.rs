use std::sync::OnceLock;

use regex::Regex;

/// Language tag the assistant uses on its code fences.
pub const CODE_LANGUAGE: &str = "lua";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Code(String),
}

impl Segment {
    pub fn content(&self) -> &str {
        match self {
            Segment::Text(s) | Segment::Code(s) => s,
        }
    }
}

fn code_fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```lua\s*(.*?)\s*```").expect("code fence pattern is valid")
    })
}

/// Wrap code in a fence the parser recognises.
pub fn fence_code(code: &str) -> String {
    format!("```{}\n{}\n```", CODE_LANGUAGE, code)
}

/// Split a raw completion into ordered prose and code segments.
///
/// Fenced blocks are matched non-greedily, so two adjacent fences stay two
/// segments. Whitespace-only prose between or around fences is dropped.
pub fn parse_response(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for caps in code_fence_regex().captures_iter(input) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        push_text(&mut segments, &input[cursor..whole.start()]);
        segments.push(Segment::Code(inner.as_str().trim().to_string()));
        cursor = whole.end();
    }

    push_text(&mut segments, &input[cursor..]);
    segments
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        segments.push(Segment::Text(trimmed.to_string()));
    }
}
