//! Output formatting for CLI commands: plain text, markdown, and JSON.

pub(crate) mod json;
pub(crate) mod markdown;
pub(crate) mod text;
