//! Token arena and the three views over it: the doubly-linked token
//! sequence, the matched-bracket pairing (`link`), and the AST overlay
//! (`ast_op1`/`ast_op2`/`ast_parent`).
//!
//! All cross-references are [`TokenId`] indices into the owning
//! [`TokenList`]; the arena is dropped wholesale when the configuration
//! ends, so nothing can dangle.

pub mod ast;
pub mod list;

pub use ast::{build_ast, get_arguments, AstHints};
pub use list::TokenList;

use crate::tokenizer::valuetype::ValueType;
use crate::valueflow::value::Value;

/// Index of a token inside its owning [`TokenList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u32);

impl TokenId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lexical class of a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    Str,
    Char,
    Op,
    Punct,
}

/// One token. Owned by exactly one [`TokenList`].
#[derive(Clone, Debug)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub file_index: u32,
    pub line: u32,
    pub column: u32,
    pub prev: Option<TokenId>,
    pub next: Option<TokenId>,
    /// Matched bracket partner for `( ) [ ] { }`.
    pub link: Option<TokenId>,
    pub ast_parent: Option<TokenId>,
    pub ast_op1: Option<TokenId>,
    pub ast_op2: Option<TokenId>,
    /// Declaration id of the variable this name refers to; 0 = none.
    pub var_id: u32,
    /// Expression id; 0 = none.
    pub expr_id: u32,
    /// Index into the symbol database's variable table.
    pub variable: Option<usize>,
    /// Index into the symbol database's function table (set on the callee
    /// name token of resolvable calls and on definition tokens).
    pub function: Option<usize>,
    pub value_type: Option<ValueType>,
    /// Value-flow facts attached to this token, in insertion order.
    pub values: Vec<Value>,
}

impl Token {
    pub fn new(text: String, kind: TokenKind, file_index: u32, line: u32, column: u32) -> Token {
        Token {
            text,
            kind,
            file_index,
            line,
            column,
            prev: None,
            next: None,
            link: None,
            ast_parent: None,
            ast_op1: None,
            ast_op2: None,
            var_id: 0,
            expr_id: 0,
            variable: None,
            function: None,
            value_type: None,
            values: Vec::new(),
        }
    }

    pub fn is_name(&self) -> bool {
        self.kind == TokenKind::Name
    }

    pub fn is_number(&self) -> bool {
        self.kind == TokenKind::Number
    }

    pub fn is_string(&self) -> bool {
        self.kind == TokenKind::Str
    }

    pub fn is_op(&self) -> bool {
        self.kind == TokenKind::Op
    }

    /// First value that is not impossible, if any.
    pub fn first_reportable_value(&self) -> Option<&Value> {
        self.values.iter().find(|v| !v.is_impossible())
    }

    /// Known or possible integer payload, excluding impossible values.
    pub fn int_value(&self) -> Option<i64> {
        self.values
            .iter()
            .filter(|v| !v.is_impossible() && !v.is_inconclusive())
            .find_map(|v| v.int_payload())
    }
}
