//! AST overlay construction.
//!
//! Projects expression trees over the linear token sequence by setting
//! `ast_op1`/`ast_op2`/`ast_parent` on the tokens themselves. Statement
//! structure (branches, loops, declarations) is not part of the overlay;
//! every expression root has no AST parent and is therefore the
//! statement-level anchor.

use std::collections::HashSet;

use crate::tokens::{TokenId, TokenKind, TokenList};

/// Guidance from the symbol pass: tokens that belong to declaration
/// prefixes or function signatures and must not be parsed as expressions.
#[derive(Debug, Default, Clone)]
pub struct AstHints {
    pub skip: HashSet<TokenId>,
}

/// Build the AST overlay for the whole list.
pub fn build_ast(list: &mut TokenList, hints: &AstHints) {
    let mut cursor = list.front();
    while let Some(id) = cursor {
        if hints.skip.contains(&id) {
            cursor = list.next(id);
            continue;
        }
        let text = list.text(id).to_string();
        cursor = match text.as_str() {
            "if" | "while" | "switch" => parse_condition(list, hints, id),
            "for" => parse_for(list, hints, id),
            "return" => {
                let start = list.next(id);
                parse_statement(list, hints, start)
            }
            "do" | "else" | "break" | "continue" | "{" | "}" | ";" | "case" | "default" | ":"
            | "goto" => list.next(id),
            _ if starts_expression(list, id) => parse_statement(list, hints, Some(id)),
            _ => list.next(id),
        };
    }
}

/// Parse the parenthesized condition of `if`/`while`/`switch`; returns the
/// continuation point (after the closing parenthesis).
fn parse_condition(list: &mut TokenList, hints: &AstHints, keyword: TokenId) -> Option<TokenId> {
    let lpar = list.next(keyword)?;
    if list.text(lpar) != "(" {
        return Some(lpar);
    }
    let rpar = list.link(lpar)?;
    let start = skip_hints(list, hints, list.next(lpar), Some(rpar));
    let mut parser = Parser {
        list: &mut *list,
        hints,
        cursor: start,
        end: Some(rpar),
    };
    parser.expression(0);
    list.next(rpar)
}

/// Parse `for (init; cond; step)` as three independent expressions.
fn parse_for(list: &mut TokenList, hints: &AstHints, keyword: TokenId) -> Option<TokenId> {
    let lpar = list.next(keyword)?;
    if list.text(lpar) != "(" {
        return Some(lpar);
    }
    let rpar = list.link(lpar)?;
    let mut segment = list.next(lpar);
    while let Some(start) = segment {
        if start == rpar {
            break;
        }
        let end = find_in_range(list, start, rpar, ";").unwrap_or(rpar);
        let begin = skip_hints(list, hints, Some(start), Some(end));
        let mut parser = Parser {
            list: &mut *list,
            hints,
            cursor: begin,
            end: Some(end),
        };
        parser.expression(0);
        segment = if end == rpar { None } else { list.next(end) };
    }
    list.next(rpar)
}

/// Parse one expression statement starting at `start`; returns the token
/// after the expression.
fn parse_statement(
    list: &mut TokenList,
    hints: &AstHints,
    start: Option<TokenId>,
) -> Option<TokenId> {
    let start = skip_hints(list, hints, start, None)?;
    if !starts_expression(list, start) {
        return list.next(start);
    }
    let mut parser = Parser {
        list: &mut *list,
        hints,
        cursor: Some(start),
        end: None,
    };
    parser.expression(0);
    let stop = parser.cursor;
    match stop {
        Some(id) if id == start => list.next(start),
        other => other,
    }
}

fn skip_hints(
    list: &TokenList,
    hints: &AstHints,
    mut cursor: Option<TokenId>,
    end: Option<TokenId>,
) -> Option<TokenId> {
    while let Some(id) = cursor {
        if Some(id) == end || !hints.skip.contains(&id) {
            break;
        }
        cursor = list.next(id);
    }
    cursor.filter(|&id| Some(id) != end)
}

fn find_in_range(list: &TokenList, from: TokenId, until: TokenId, text: &str) -> Option<TokenId> {
    let mut cursor = Some(from);
    while let Some(id) = cursor {
        if id == until {
            return None;
        }
        if list.text(id) == text {
            return Some(id);
        }
        // Jump over nested brackets.
        cursor = match list.text(id) {
            "(" | "[" | "{" => list.link(id).and_then(|l| list.next(l)),
            _ => list.next(id),
        };
    }
    None
}

fn starts_expression(list: &TokenList, id: TokenId) -> bool {
    let tok = list.tok(id);
    match tok.kind {
        TokenKind::Name => !is_keyword(&tok.text),
        TokenKind::Number | TokenKind::Str | TokenKind::Char => true,
        _ => matches!(
            tok.text.as_str(),
            "(" | "!" | "~" | "-" | "+" | "*" | "&" | "++" | "--" | "sizeof"
        ),
    }
}

fn is_keyword(text: &str) -> bool {
    matches!(
        text,
        "if" | "else"
            | "while"
            | "for"
            | "do"
            | "switch"
            | "case"
            | "default"
            | "return"
            | "break"
            | "continue"
            | "goto"
            | "struct"
            | "class"
            | "union"
            | "enum"
            | "typedef"
            | "static"
            | "extern"
            | "const"
            | "volatile"
            | "void"
            | "bool"
            | "char"
            | "short"
            | "int"
            | "long"
            | "float"
            | "double"
            | "signed"
            | "unsigned"
            | "namespace"
            | "using"
            | "new"
            | "delete"
            | "throw"
            | "try"
            | "catch"
    )
}

/// Binding powers for binary operators: `(left, right)`; right < left
/// means right-associative.
fn binary_binding(text: &str) -> Option<(u8, u8)> {
    Some(match text {
        "," => (1, 2),
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => (4, 3),
        "||" => (7, 8),
        "&&" => (9, 10),
        "|" => (11, 12),
        "^" => (13, 14),
        "&" => (15, 16),
        "==" | "!=" => (17, 18),
        "<" | "<=" | ">" | ">=" => (19, 20),
        "<<" | ">>" => (21, 22),
        "+" | "-" => (23, 24),
        "*" | "/" | "%" => (25, 26),
        "." | "->" | "::" => (31, 32),
        _ => return None,
    })
}

const TERNARY_BP: u8 = 6;
const UNARY_BP: u8 = 27;

struct Parser<'a> {
    list: &'a mut TokenList,
    hints: &'a AstHints,
    cursor: Option<TokenId>,
    /// Exclusive end token (a closing bracket or statement terminator).
    end: Option<TokenId>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<TokenId> {
        let id = self.cursor?;
        if Some(id) == self.end {
            return None;
        }
        if matches!(self.list.text(id), ";" | "}" | ")" | "]") {
            return None;
        }
        Some(id)
    }

    fn bump(&mut self) {
        if let Some(id) = self.cursor {
            self.cursor = self.list.next(id);
        }
    }

    fn set_unary(&mut self, node: TokenId, op1: TokenId) {
        self.list.tok_mut(node).ast_op1 = Some(op1);
        self.list.tok_mut(op1).ast_parent = Some(node);
    }

    fn set_binary(&mut self, node: TokenId, op1: TokenId, op2: TokenId) {
        self.set_unary(node, op1);
        self.list.tok_mut(node).ast_op2 = Some(op2);
        self.list.tok_mut(op2).ast_parent = Some(node);
    }

    fn expression(&mut self, min_bp: u8) -> Option<TokenId> {
        let mut lhs = self.prefix()?;
        loop {
            let Some(op) = self.peek() else { break };
            let text = self.list.text(op).to_string();
            match text.as_str() {
                "(" => {
                    // Call expression: `(` is the root, op1 the callee,
                    // op2 the comma chain of arguments.
                    let rpar = self.list.link(op)?;
                    let inner_start = self.list.next(op).filter(|&i| i != rpar);
                    let args = inner_start.and_then(|start| {
                        let mut inner = Parser {
                            list: &mut *self.list,
                            hints: self.hints,
                            cursor: Some(start),
                            end: Some(rpar),
                        };
                        inner.expression(0)
                    });
                    self.set_unary(op, lhs);
                    if let Some(args) = args {
                        self.list.tok_mut(op).ast_op2 = Some(args);
                        self.list.tok_mut(args).ast_parent = Some(op);
                    }
                    lhs = op;
                    self.cursor = self.list.next(rpar);
                }
                "[" => {
                    let rbr = self.list.link(op)?;
                    let inner_start = self.list.next(op).filter(|&i| i != rbr);
                    let index = inner_start.and_then(|start| {
                        let mut inner = Parser {
                            list: &mut *self.list,
                            hints: self.hints,
                            cursor: Some(start),
                            end: Some(rbr),
                        };
                        inner.expression(0)
                    });
                    self.set_unary(op, lhs);
                    if let Some(index) = index {
                        self.list.tok_mut(op).ast_op2 = Some(index);
                        self.list.tok_mut(index).ast_parent = Some(op);
                    }
                    lhs = op;
                    self.cursor = self.list.next(rbr);
                }
                "++" | "--" => {
                    // Postfix increment/decrement.
                    self.bump();
                    self.set_unary(op, lhs);
                    lhs = op;
                }
                "?" => {
                    if TERNARY_BP < min_bp {
                        break;
                    }
                    self.bump();
                    let then_root = self.expression(0)?;
                    let colon = self.peek().filter(|&c| self.list.text(c) == ":")?;
                    self.bump();
                    let else_root = self.expression(TERNARY_BP - 1)?;
                    self.set_binary(colon, then_root, else_root);
                    self.set_binary(op, lhs, colon);
                    lhs = op;
                }
                ":" => break,
                _ => {
                    let Some((l_bp, r_bp)) = binary_binding(&text) else {
                        break;
                    };
                    if l_bp < min_bp {
                        break;
                    }
                    self.bump();
                    let rhs = self.expression(r_bp)?;
                    self.set_binary(op, lhs, rhs);
                    lhs = op;
                }
            }
        }
        Some(lhs)
    }

    fn prefix(&mut self) -> Option<TokenId> {
        let id = self.peek()?;
        let text = self.list.text(id).to_string();
        match text.as_str() {
            "!" | "~" | "-" | "+" | "*" | "&" | "++" | "--" => {
                self.bump();
                let operand = self.expression(UNARY_BP)?;
                self.set_unary(id, operand);
                Some(id)
            }
            "sizeof" => {
                self.bump();
                if let Some(lpar) = self.peek().filter(|&p| self.list.text(p) == "(") {
                    let rpar = self.list.link(lpar)?;
                    if let Some(first) = self.list.next(lpar).filter(|&f| f != rpar) {
                        self.set_unary(id, first);
                    }
                    self.cursor = self.list.next(rpar);
                } else {
                    let operand = self.expression(UNARY_BP)?;
                    self.set_unary(id, operand);
                }
                Some(id)
            }
            "(" => {
                let rpar = self.list.link(id)?;
                if self.is_cast(id, rpar) {
                    // Cast: the `(` is the AST node, the casted expression
                    // its single operand.
                    self.cursor = self.list.next(rpar);
                    let operand = self.expression(UNARY_BP)?;
                    self.set_unary(id, operand);
                    return Some(id);
                }
                // Grouping parentheses are transparent in the overlay.
                let inner_start = self.list.next(id).filter(|&i| i != rpar)?;
                let mut inner = Parser {
                    list: &mut *self.list,
                    hints: self.hints,
                    cursor: Some(inner_start),
                    end: Some(rpar),
                };
                let root = inner.expression(0)?;
                self.cursor = self.list.next(rpar);
                Some(root)
            }
            _ => {
                let tok = self.list.tok(id);
                match tok.kind {
                    TokenKind::Name if !is_type_keyword(&text) && !is_keyword(&text) => {
                        self.bump();
                        Some(id)
                    }
                    TokenKind::Name if is_type_keyword(&text) => {
                        self.bump();
                        Some(id)
                    }
                    TokenKind::Number | TokenKind::Str | TokenKind::Char => {
                        self.bump();
                        Some(id)
                    }
                    _ => None,
                }
            }
        }
    }

    /// `( type-tokens )` followed by something that starts an expression.
    fn is_cast(&self, lpar: TokenId, rpar: TokenId) -> bool {
        let mut cursor = self.list.next(lpar);
        let mut saw_type = false;
        while let Some(id) = cursor {
            if id == rpar {
                break;
            }
            let text = self.list.text(id);
            if is_type_keyword(text) {
                saw_type = true;
            } else if text != "*" && text != "const" {
                return false;
            }
            cursor = self.list.next(id);
        }
        if !saw_type {
            return false;
        }
        match self.list.next(rpar) {
            Some(next) => starts_expression(self.list, next),
            None => false,
        }
    }
}

pub fn is_type_keyword(text: &str) -> bool {
    matches!(
        text,
        "void" | "bool" | "char" | "short" | "int" | "long" | "float" | "double" | "signed"
            | "unsigned"
    )
}

/// Arguments of a call expression, in source order. `paren` is the `(`
/// token rooting the call.
pub fn get_arguments(list: &TokenList, paren: TokenId) -> Vec<TokenId> {
    let mut args = Vec::new();
    let Some(root) = list.tok(paren).ast_op2 else {
        return args;
    };
    flatten_commas(list, root, &mut args);
    args
}

fn flatten_commas(list: &TokenList, id: TokenId, out: &mut Vec<TokenId>) {
    if list.text(id) == "," {
        let tok = list.tok(id);
        if let (Some(op1), Some(op2)) = (tok.ast_op1, tok.ast_op2) {
            flatten_commas(list, op1, out);
            flatten_commas(list, op2, out);
            return;
        }
    }
    out.push(id);
}

/// Walk `ast_parent` links to the statement-level root.
pub fn ast_top_parent(list: &TokenList, mut id: TokenId) -> TokenId {
    while let Some(parent) = list.tok(id).ast_parent {
        id = parent;
    }
    id
}

/// True when `id` is the operand of a prefix `op` (e.g. unary `*` or `&`).
pub fn is_unary_op(list: &TokenList, id: TokenId, op: &str) -> bool {
    let tok = list.tok(id);
    tok.text == op && tok.ast_op1.is_some() && tok.ast_op2.is_none()
}
