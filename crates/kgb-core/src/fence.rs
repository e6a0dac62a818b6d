//! Code block recovery from model replies

use crate::{KgbError, Result};

/// Opening and closing fence marker
pub const FENCE: &str = "```";

/// Extract the first fenced code block from a model reply.
///
/// An info string on the opening line (for example `cypher`) is dropped, as
/// is the line break before the closing fence. A fence that opens and closes
/// on the same line yields exactly the text between the markers.
pub fn extract_fenced_block(reply: &str) -> Result<String> {
    let open = reply
        .find(FENCE)
        .ok_or_else(|| KgbError::ResponseFormat("no fenced code block in model reply".to_string()))?;
    let after_open = &reply[open + FENCE.len()..];

    let close = after_open
        .find(FENCE)
        .ok_or_else(|| KgbError::ResponseFormat("code block is not closed".to_string()))?;
    let inner = &after_open[..close];

    let body = match inner.split_once('\n') {
        Some((first_line, rest)) if is_info_string(first_line) => rest,
        _ => inner,
    };
    let body = body
        .strip_suffix('\n')
        .map(|b| b.strip_suffix('\r').unwrap_or(b))
        .unwrap_or(body);

    if body.trim().is_empty() {
        return Err(KgbError::ResponseFormat("code block is empty".to_string()));
    }

    Ok(body.to_string())
}

/// Language tags models put after the opening fence
const INFO_STRINGS: &[&str] = &[
    "cypher", "cql", "neo4j", "sql", "graphql", "text", "txt", "plaintext",
];

/// Known language tag, or nothing at all
fn is_info_string(line: &str) -> bool {
    let tag = line.trim();
    tag.is_empty() || INFO_STRINGS.iter().any(|t| tag.eq_ignore_ascii_case(t))
}
