//! Error values raised inside the analysis pipeline.
//!
//! The tokenizer and checks abandon the current configuration by returning
//! an [`InternalError`]; the driver converts it into a diagnostic instead of
//! unwinding. Driver-level I/O failures travel as `anyhow::Error` and are
//! mapped to the `internalError` advisory at the TU boundary.

use std::fmt;

use crate::tokens::TokenId;

/// Abandons the current configuration with a diagnostic id and message.
///
/// `token` localizes the problem when one is known; without it the driver
/// falls back to the TU path with line 0.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalError {
    pub token: Option<TokenId>,
    pub message: String,
    pub id: String,
}

impl InternalError {
    pub fn new(token: Option<TokenId>, message: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            token,
            message: message.into(),
            id: id.into(),
        }
    }

    /// Shorthand for the most common case.
    pub fn syntax(token: Option<TokenId>, message: impl Into<String>) -> Self {
        Self::new(token, message, "syntaxError")
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.id)
    }
}

impl std::error::Error for InternalError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_carries_id() {
        let err = InternalError::syntax(None, "unmatched '{'");
        assert_eq!(err.id, "syntaxError");
        assert_eq!(err.to_string(), "unmatched '{' [syntaxError]");
    }
}
