//! Marker classification for message content.
//!
//! The priority filter needs to know whether a message carries
//! operational content worth keeping. The grammar is fixed and small:
//! - fenced code blocks (```` ``` ````)
//! - embedded command tags: `<run-command>`, `<terminal>`
//! - file-operation tags: `<create-file>`, `<write-file>`, `<debug>`
//!
//! All marker knowledge lives here; nothing else in the crate matches on
//! message text.

use regex::Regex;
use std::sync::LazyLock;

static COMMAND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:run-command|terminal)(?:\s[^>]*)?>").unwrap());

static FILE_OP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:create-file|write-file|debug)(?:\s[^>]*)?>").unwrap());

/// Whether the content contains a fenced code block.
pub fn contains_code(content: &str) -> bool {
    content.contains("```")
}

/// Whether the content contains an embedded command tag.
pub fn contains_command(content: &str) -> bool {
    COMMAND_REGEX.is_match(content)
}

/// Whether the content contains a file-operation tag.
pub fn contains_file_op(content: &str) -> bool {
    FILE_OP_REGEX.is_match(content)
}

/// Whether the content carries any marker the optimizer treats as
/// essential.
pub fn has_operational_marker(content: &str) -> bool {
    contains_code(content) || contains_command(content) || contains_file_op(content)
}
