//! Inline suppression extraction from comments.
//!
//! `// ccheck-suppress <id>` (the legacy `cppcheck-suppress` spelling is
//! accepted) silences the diagnostic on the next code line, or on the same
//! line when the comment trails code.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diagnostics::suppressions::{Suppression, Suppressions};
use crate::preprocessor::lexer::{RawKind, RawToken};

static SUPPRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:ccheck|cppcheck)-suppress\s+([A-Za-z_][A-Za-z0-9_]*|\*)")
        .expect("suppress pattern is valid")
});

/// Scan comment tokens and record inline suppressions.
pub fn inline_suppressions(tokens: &[RawToken], files: &[String], out: &mut Suppressions) {
    for (idx, tok) in tokens.iter().enumerate() {
        if tok.kind != RawKind::Comment {
            continue;
        }
        let Some(caps) = SUPPRESS_PATTERN.captures(&tok.text) else {
            continue;
        };
        let id = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let file = files
            .get(tok.file_index as usize)
            .cloned()
            .unwrap_or_default();

        // A trailing comment applies to its own line; a standalone comment
        // applies to the next code line in the same file.
        let trailing = idx > 0
            && tokens[idx - 1].kind != RawKind::Comment
            && tokens[idx - 1].line == tok.line
            && tokens[idx - 1].file_index == tok.file_index;
        let line = if trailing {
            Some(tok.line)
        } else {
            tokens[idx + 1..]
                .iter()
                .find(|t| t.kind != RawKind::Comment && t.file_index == tok.file_index)
                .map(|t| t.line)
        };
        let Some(line) = line else { continue };

        out.add(Suppression {
            id,
            file,
            line: Some(line),
            inline: true,
            matched: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::suppressions::MessageKey;
    use crate::preprocessor::lexer::lex;

    fn key(id: &str, line: u32) -> MessageKey {
        MessageKey {
            id: id.to_string(),
            file: "t.c".to_string(),
            line: Some(line),
        }
    }

    #[test]
    fn standalone_comment_targets_next_line() {
        let toks = lex("// ccheck-suppress uninitvar\nint y = x;\n", 0).unwrap();
        let mut supps = Suppressions::default();
        inline_suppressions(&toks, &["t.c".to_string()], &mut supps);
        assert!(supps.is_suppressed_local(&key("uninitvar", 2)));
        assert!(!supps.is_suppressed_local(&key("nullPointer", 2)));
    }

    #[test]
    fn trailing_comment_targets_its_own_line() {
        let toks = lex("int y = x; // cppcheck-suppress uninitvar\n", 0).unwrap();
        let mut supps = Suppressions::default();
        inline_suppressions(&toks, &["t.c".to_string()], &mut supps);
        assert!(supps.is_suppressed_local(&key("uninitvar", 1)));
    }

    #[test]
    fn comment_without_marker_adds_nothing() {
        let toks = lex("// plain note\nint x;\n", 0).unwrap();
        let mut supps = Suppressions::default();
        inline_suppressions(&toks, &["t.c".to_string()], &mut supps);
        assert!(supps.is_empty());
    }

    #[test]
    fn block_comment_skips_to_next_code_line() {
        let toks = lex("/* ccheck-suppress uninitvar\n   spanning */\nint y = x;\n", 0).unwrap();
        let mut supps = Suppressions::default();
        inline_suppressions(&toks, &["t.c".to_string()], &mut supps);
        assert!(supps.is_suppressed_local(&key("uninitvar", 3)));
    }
}
