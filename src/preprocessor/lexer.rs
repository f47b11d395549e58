//! Raw lexer: source bytes to raw tokens, before any preprocessing.

use crate::preprocessor::{PreprocError, PreprocErrorKind};

/// Lexical class of a raw token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawKind {
    Name,
    Number,
    Str,
    Char,
    Op,
    Comment,
}

/// A token of the raw (pre-preprocessing) stream.
#[derive(Clone, Debug, PartialEq)]
pub struct RawToken {
    pub text: String,
    pub kind: RawKind,
    pub file_index: u32,
    pub line: u32,
    pub col: u32,
}

impl RawToken {
    pub fn new(text: impl Into<String>, kind: RawKind, file_index: u32, line: u32, col: u32) -> RawToken {
        RawToken {
            text: text.into(),
            kind,
            file_index,
            line,
            col,
        }
    }
}

/// Multi-character operators, longest first so maximal munch works.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "...", "->*", "::", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "++", "--",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "->", "##",
];

/// Tokenize one file's content. Backslash-newline splices are honored;
/// an unrecognized byte yields the fatal `UnhandledChar` output.
pub fn lex(source: &str, file_index: u32) -> Result<Vec<RawToken>, PreprocError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line: u32 = 1;
    let mut col: u32 = 1;

    macro_rules! advance {
        () => {{
            if chars[i] == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
            i += 1;
        }};
    }

    while i < chars.len() {
        let c = chars[i];
        // Line splice: the next physical line continues this logical line,
        // so the line counter is not advanced. Directives are grouped by
        // line, which is what makes multi-line defines hold together.
        if c == '\\' && i + 1 < chars.len() && chars[i + 1] == '\n' {
            i += 2;
            col += 1;
            continue;
        }
        if c.is_whitespace() {
            advance!();
            continue;
        }
        let (start_line, start_col) = (line, col);
        if c == '/' && i + 1 < chars.len() && chars[i + 1] == '/' {
            let mut text = String::new();
            while i < chars.len() && chars[i] != '\n' {
                text.push(chars[i]);
                advance!();
            }
            tokens.push(RawToken::new(text, RawKind::Comment, file_index, start_line, start_col));
            continue;
        }
        if c == '/' && i + 1 < chars.len() && chars[i + 1] == '*' {
            let mut text = String::new();
            text.push(chars[i]);
            advance!();
            text.push(chars[i]);
            advance!();
            while i < chars.len() {
                if chars[i] == '*' && i + 1 < chars.len() && chars[i + 1] == '/' {
                    text.push('*');
                    advance!();
                    text.push('/');
                    advance!();
                    break;
                }
                text.push(chars[i]);
                advance!();
            }
            tokens.push(RawToken::new(text, RawKind::Comment, file_index, start_line, start_col));
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            let mut text = String::new();
            text.push(quote);
            advance!();
            while i < chars.len() && chars[i] != quote {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    text.push(chars[i]);
                    advance!();
                }
                if i < chars.len() {
                    text.push(chars[i]);
                    advance!();
                }
            }
            if i >= chars.len() {
                return Err(PreprocError {
                    kind: PreprocErrorKind::SyntaxError,
                    message: format!("unterminated {} literal", if quote == '"' { "string" } else { "character" }),
                    file_index,
                    line: start_line,
                    col: start_col,
                });
            }
            text.push(quote);
            advance!();
            let kind = if quote == '"' { RawKind::Str } else { RawKind::Char };
            tokens.push(RawToken::new(text, kind, file_index, start_line, start_col));
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit()) {
            let mut text = String::new();
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric()
                    || chars[i] == '.'
                    || chars[i] == '_'
                    || ((chars[i] == '+' || chars[i] == '-')
                        && text
                            .chars()
                            .last()
                            .map(|l| l == 'e' || l == 'E' || l == 'p' || l == 'P')
                            .unwrap_or(false)))
            {
                text.push(chars[i]);
                advance!();
            }
            tokens.push(RawToken::new(text, RawKind::Number, file_index, start_line, start_col));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let mut text = String::new();
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                text.push(chars[i]);
                advance!();
            }
            tokens.push(RawToken::new(text, RawKind::Name, file_index, start_line, start_col));
            continue;
        }
        // Operators and punctuation, maximal munch.
        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            for _ in 0..op.len() {
                advance!();
            }
            tokens.push(RawToken::new(*op, RawKind::Op, file_index, start_line, start_col));
            continue;
        }
        if "+-*/%<>=!&|^~?:;,.(){}[]#\\".contains(c) {
            let mut text = String::new();
            text.push(c);
            advance!();
            tokens.push(RawToken::new(text, RawKind::Op, file_index, start_line, start_col));
            continue;
        }
        return Err(PreprocError {
            kind: PreprocErrorKind::UnhandledChar,
            message: format!("The code contains unhandled character '{c}'"),
            file_index,
            line: start_line,
            col: start_col,
        });
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<String> {
        lex(src, 0).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn lexes_simple_statement() {
        assert_eq!(texts("int x = 42;"), vec!["int", "x", "=", "42", ";"]);
    }

    #[test]
    fn maximal_munch_on_operators() {
        assert_eq!(texts("a<<=b>>c"), vec!["a", "<<=", "b", ">>", "c"]);
        assert_eq!(texts("p->q"), vec!["p", "->", "q"]);
    }

    #[test]
    fn comments_are_kept_as_tokens() {
        let toks = lex("x; // ccheck-suppress uninitvar\ny;", 0).unwrap();
        assert_eq!(toks[2].kind, RawKind::Comment);
        assert!(toks[2].text.contains("ccheck-suppress"));
        assert_eq!(toks[3].line, 2);
    }

    #[test]
    fn block_comment_spans_lines() {
        let toks = lex("/* a\nb */ x", 0).unwrap();
        assert_eq!(toks[0].kind, RawKind::Comment);
        assert_eq!(toks[1].text, "x");
        assert_eq!(toks[1].line, 2);
    }

    #[test]
    fn string_escapes_do_not_terminate() {
        let toks = lex(r#"s = "a\"b";"#, 0).unwrap();
        assert_eq!(toks[2].text, r#""a\"b""#);
        assert_eq!(toks[2].kind, RawKind::Str);
    }

    #[test]
    fn line_splice_continues_the_logical_line() {
        let toks = lex("#define A \\\n 1\nx", 0).unwrap();
        let a = toks.iter().find(|t| t.text == "1").unwrap();
        assert_eq!(a.line, 1);
        let x = toks.iter().find(|t| t.text == "x").unwrap();
        assert_eq!(x.line, 2);
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let err = lex("\"abc", 0).unwrap_err();
        assert_eq!(err.kind, PreprocErrorKind::SyntaxError);
    }

    #[test]
    fn unhandled_character_is_fatal() {
        let err = lex("int x = $;", 0).unwrap_err();
        assert_eq!(err.kind, PreprocErrorKind::UnhandledChar);
        assert!(err.kind.is_fatal());
    }
}
