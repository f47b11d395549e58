//! The token arena: an append-only `Vec<Token>` threaded into a doubly
//! linked sequence, plus the file-path table token locations refer to.

use sha2::{Digest, Sha256};

use crate::diagnostics::FileLocation;
use crate::errors::InternalError;
use crate::tokens::{Token, TokenId, TokenKind};

#[derive(Clone, Debug, Default)]
pub struct TokenList {
    tokens: Vec<Token>,
    /// File paths referenced by token `file_index`es; entry 0 is the TU.
    pub files: Vec<String>,
    front: Option<TokenId>,
    back: Option<TokenId>,
}

impl TokenList {
    pub fn new(files: Vec<String>) -> TokenList {
        TokenList {
            tokens: Vec::new(),
            files,
            front: None,
            back: None,
        }
    }

    pub fn source_path(&self) -> &str {
        self.files.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_none()
    }

    pub fn front(&self) -> Option<TokenId> {
        self.front
    }

    pub fn back(&self) -> Option<TokenId> {
        self.back
    }

    pub fn tok(&self, id: TokenId) -> &Token {
        &self.tokens[id.index()]
    }

    pub fn tok_mut(&mut self, id: TokenId) -> &mut Token {
        &mut self.tokens[id.index()]
    }

    pub fn text(&self, id: TokenId) -> &str {
        &self.tokens[id.index()].text
    }

    pub fn next(&self, id: TokenId) -> Option<TokenId> {
        self.tokens[id.index()].next
    }

    pub fn prev(&self, id: TokenId) -> Option<TokenId> {
        self.tokens[id.index()].prev
    }

    pub fn link(&self, id: TokenId) -> Option<TokenId> {
        self.tokens[id.index()].link
    }

    /// Append a token at the back of the sequence.
    pub fn push(
        &mut self,
        text: impl Into<String>,
        kind: TokenKind,
        file_index: u32,
        line: u32,
        column: u32,
    ) -> TokenId {
        let id = TokenId(self.tokens.len() as u32);
        let mut token = Token::new(text.into(), kind, file_index, line, column);
        token.prev = self.back;
        self.tokens.push(token);
        match self.back {
            Some(back) => self.tokens[back.index()].next = Some(id),
            None => self.front = Some(id),
        }
        self.back = Some(id);
        id
    }

    /// Remove a token from the sequence. The arena slot stays allocated;
    /// only the links are rewired.
    pub fn unlink(&mut self, id: TokenId) {
        let (prev, next) = {
            let tok = &self.tokens[id.index()];
            (tok.prev, tok.next)
        };
        match prev {
            Some(p) => self.tokens[p.index()].next = next,
            None => self.front = next,
        }
        match next {
            Some(n) => self.tokens[n.index()].prev = prev,
            None => self.back = prev,
        }
        let tok = &mut self.tokens[id.index()];
        tok.prev = None;
        tok.next = None;
    }

    /// Iterate the live sequence front to back.
    pub fn iter(&self) -> TokenIter<'_> {
        TokenIter {
            list: self,
            cursor: self.front,
        }
    }

    /// Tokens in the sequence, counted by walking the links.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn location(&self, id: TokenId) -> FileLocation {
        let tok = self.tok(id);
        FileLocation::new(self.file_of(id), tok.line, tok.column)
    }

    pub fn file_of(&self, id: TokenId) -> &str {
        let idx = self.tok(id).file_index as usize;
        self.files.get(idx).map(String::as_str).unwrap_or("")
    }

    /// Pair up `( ) [ ] { }`. Fails on mismatched or unbalanced brackets.
    pub fn link_brackets(&mut self) -> Result<(), InternalError> {
        let mut stack: Vec<TokenId> = Vec::new();
        let mut cursor = self.front;
        while let Some(id) = cursor {
            let text = self.tokens[id.index()].text.as_str();
            match text {
                "(" | "[" | "{" => stack.push(id),
                ")" | "]" | "}" => {
                    let open = stack.pop().ok_or_else(|| {
                        InternalError::syntax(Some(id), format!("unmatched '{text}'"))
                    })?;
                    let open_text = self.tokens[open.index()].text.as_str();
                    let expected = match open_text {
                        "(" => ")",
                        "[" => "]",
                        _ => "}",
                    };
                    if text != expected {
                        return Err(InternalError::syntax(
                            Some(id),
                            format!("mismatched '{open_text}' and '{text}'"),
                        ));
                    }
                    self.tokens[open.index()].link = Some(id);
                    self.tokens[id.index()].link = Some(open);
                }
                _ => {}
            }
            cursor = self.tokens[id.index()].next;
        }
        if let Some(open) = stack.pop() {
            let text = self.tokens[open.index()].text.clone();
            return Err(InternalError::syntax(Some(open), format!("unmatched '{text}'")));
        }
        Ok(())
    }

    /// Deterministic checksum over token text and normalized locations,
    /// used to purge equivalent configurations.
    pub fn calculate_checksum(&self) -> u64 {
        let mut hasher = Sha256::new();
        for id in self.iter() {
            let tok = self.tok(id);
            hasher.update(tok.text.as_bytes());
            hasher.update(tok.file_index.to_le_bytes());
            hasher.update(tok.line.to_le_bytes());
            hasher.update([0xff]);
        }
        let digest = hasher.finalize();
        u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
    }

    /// Source text of the AST subtree rooted at `id`, re-spaced.
    pub fn expression_string(&self, id: TokenId) -> String {
        let mut ids = Vec::new();
        self.collect_subtree(id, &mut ids, 0);
        ids.sort();
        let mut out = String::new();
        for (i, tid) in ids.iter().enumerate() {
            let text = self.text(*tid);
            if i > 0 && needs_space(self.text(ids[i - 1]), text) {
                out.push(' ');
            }
            out.push_str(text);
        }
        out
    }

    fn collect_subtree(&self, id: TokenId, out: &mut Vec<TokenId>, depth: usize) {
        if depth > 100 {
            return;
        }
        out.push(id);
        let tok = self.tok(id);
        // A call or index expression also shows its closing bracket.
        if (tok.text == "(" || tok.text == "[") && tok.link.is_some() {
            out.push(tok.link.unwrap());
        }
        if let Some(op1) = tok.ast_op1 {
            self.collect_subtree(op1, out, depth + 1);
        }
        if let Some(op2) = tok.ast_op2 {
            self.collect_subtree(op2, out, depth + 1);
        }
    }
}

fn needs_space(prev: &str, next: &str) -> bool {
    let tight_after = matches!(prev, "(" | "[" | "." | "->" | "!" | "~" | "::");
    let tight_before = matches!(next, ")" | "]" | "," | ";" | "." | "->" | "(" | "[" | "::");
    !(tight_after || tight_before)
}

pub struct TokenIter<'a> {
    list: &'a TokenList,
    cursor: Option<TokenId>,
}

impl Iterator for TokenIter<'_> {
    type Item = TokenId;

    fn next(&mut self) -> Option<TokenId> {
        let id = self.cursor?;
        self.cursor = self.list.next(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(texts: &[&str]) -> TokenList {
        let mut list = TokenList::new(vec!["test.c".to_string()]);
        for (i, text) in texts.iter().enumerate() {
            let kind = if text.chars().next().unwrap().is_ascii_alphabetic() {
                TokenKind::Name
            } else if text.chars().next().unwrap().is_ascii_digit() {
                TokenKind::Number
            } else {
                TokenKind::Punct
            };
            list.push(*text, kind, 0, 1, i as u32 + 1);
        }
        list
    }

    #[test]
    fn push_threads_the_sequence() {
        let list = list_of(&["a", "=", "1", ";"]);
        let texts: Vec<&str> = list.iter().map(|id| list.text(id)).collect();
        assert_eq!(texts, vec!["a", "=", "1", ";"]);
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn unlink_rewires_neighbours() {
        let mut list = list_of(&["a", ";", ";"]);
        let extra = list.iter().nth(2).unwrap();
        list.unlink(extra);
        let texts: Vec<&str> = list.iter().map(|id| list.text(id)).collect();
        assert_eq!(texts, vec!["a", ";"]);
    }

    #[test]
    fn link_brackets_is_symmetric() {
        let mut list = list_of(&["f", "(", "a", "[", "1", "]", ")", "{", "}"]);
        list.link_brackets().unwrap();
        for id in list.iter() {
            if let Some(link) = list.link(id) {
                assert_eq!(list.link(link), Some(id));
                let open = list.tok(id).line <= list.tok(link).line;
                if open && id < link {
                    assert!(matches!(list.text(id), "(" | "[" | "{"));
                    assert!(matches!(list.text(link), ")" | "]" | "}"));
                }
            }
        }
    }

    #[test]
    fn link_brackets_rejects_mismatch() {
        let mut list = list_of(&["(", "]"]);
        assert_eq!(list.link_brackets().unwrap_err().id, "syntaxError");
        let mut list = list_of(&["{", "(", "}"]);
        assert!(list.link_brackets().is_err());
        let mut list = list_of(&["("]);
        assert!(list.link_brackets().is_err());
    }

    #[test]
    fn checksum_ignores_nothing_semantic() {
        let a = list_of(&["x", "=", "1", ";"]);
        let b = list_of(&["x", "=", "2", ";"]);
        assert_ne!(a.calculate_checksum(), b.calculate_checksum());
        let c = list_of(&["x", "=", "1", ";"]);
        assert_eq!(a.calculate_checksum(), c.calculate_checksum());
    }
}
