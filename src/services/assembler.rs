use super::parser::{fence_code, Segment};
use crate::models::Message;

/// Text and code collapsed out of a segment sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledContent {
    pub text: Option<String>,
    pub code: Option<String>,
}

impl AssembledContent {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.code.is_none()
    }
}

/// Collapse segments into one text blob plus at most one dedicated code block.
///
/// Prose segments are joined with a blank line in their original order. The
/// first code segment becomes `code`; later code segments are fenced again and
/// kept in the text blob at their original position.
pub fn collapse_segments(segments: &[Segment]) -> AssembledContent {
    let mut parts: Vec<String> = Vec::new();
    let mut code: Option<String> = None;

    for segment in segments {
        match segment {
            Segment::Text(text) if !text.is_empty() => parts.push(text.clone()),
            Segment::Code(c) if !c.is_empty() => {
                if code.is_none() {
                    code = Some(c.clone());
                } else {
                    parts.push(fence_code(c));
                }
            }
            _ => {}
        }
    }

    let text = if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    };

    AssembledContent { text, code }
}

/// Build the single assistant message for a parsed completion, or `None` when
/// nothing usable was produced.
pub fn assemble_message(segments: &[Segment], id: String, timestamp: i64) -> Option<Message> {
    let content = collapse_segments(segments);
    if content.is_empty() {
        return None;
    }
    Some(Message::ai(id, content.text, content.code, timestamp))
}
