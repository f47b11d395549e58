//! Value-flow engine: attaches [`Value`] facts to expression tokens.
//!
//! The engine is a fixed sequence of monotone passes; each either attaches
//! a value to a new token or strengthens an existing one, so it converges.
//! It never raises a visible error: contradictions become `Impossible`
//! values and unresolved operands yield nothing. A per-TU deadline and the
//! cooperative termination flag are polled from every long loop.

pub mod condition;
pub mod lifetime;
pub mod value;

use std::time::Instant;

use tracing::trace;

use crate::config::{Project, Settings};
use crate::preprocessor::parse_int;
use crate::symbols::SymbolDatabase;
use crate::tokens::{TokenId, TokenKind, TokenList};
use crate::tokenizer::valuetype::ValueType;
use value::{Bound, MoveKind, Value, ValueKind, ValuePayload};

/// Cap on values per token; further insertions are dropped.
const MAX_VALUES_PER_TOKEN: usize = 32;

/// How a token occurrence touches its variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
    AddressOf,
}

/// Classify how the expression around `id` uses it.
pub fn access_of(list: &TokenList, id: TokenId) -> Access {
    let Some(parent) = list.tok(id).ast_parent else {
        return Access::Read;
    };
    let p = list.tok(parent);
    match p.text.as_str() {
        "=" if p.ast_op1 == Some(id) => Access::Write,
        "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>="
            if p.ast_op1 == Some(id) =>
        {
            Access::ReadWrite
        }
        "++" | "--" => Access::ReadWrite,
        "&" if p.ast_op2.is_none() => Access::AddressOf,
        _ => Access::Read,
    }
}

/// Walk to the statement terminator (`;`, or the closing brace).
pub fn statement_end(list: &TokenList, from: TokenId) -> Option<TokenId> {
    let mut cursor = Some(from);
    while let Some(id) = cursor {
        match list.text(id) {
            ";" | "}" => return Some(id),
            "(" | "[" | "{" => {
                cursor = list.link(id).and_then(|l| list.next(l));
            }
            _ => cursor = list.next(id),
        }
    }
    None
}

/// Perform value-flow analysis over the whole token list.
pub fn set_values(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    project: &Project,
    _settings: &Settings,
    deadline: Option<Instant>,
) {
    let expired = || {
        crate::config::Settings::terminated()
            || deadline.map(|d| Instant::now() > d).unwrap_or(false)
    };

    seed_literals(list);
    if expired() {
        return;
    }
    seed_sizeof(list, symbols, project);
    if expired() {
        return;
    }
    seed_uninit(list, symbols);
    if expired() {
        return;
    }
    forward_assignments(list, symbols, deadline);
    if expired() {
        return;
    }
    condition::apply_conditions(list, symbols, deadline);
    if expired() {
        return;
    }
    lifetime::set_lifetime_values(list, symbols);
    apply_move_semantics(list, symbols);
    trace!("value-flow complete");
}

/// Attach `value` to the token and fold it upward through the AST while
/// parent operations can be computed.
pub fn set_token_value(list: &mut TokenList, id: TokenId, value: Value) {
    set_token_value_depth(list, id, value, 0);
}

fn set_token_value_depth(list: &mut TokenList, id: TokenId, value: Value, depth: usize) {
    {
        let tok = list.tok(id);
        if tok.values.len() >= MAX_VALUES_PER_TOKEN {
            return;
        }
        if tok
            .values
            .iter()
            .any(|v| v.equal_value(&value) && v.kind == value.kind)
        {
            return;
        }
    }
    list.tok_mut(id).values.push(value.clone());
    if depth > 16 || value.is_impossible() {
        return;
    }
    let Some(parent) = list.tok(id).ast_parent else {
        return;
    };
    let ptok = list.tok(parent);
    let ptext = ptok.text.clone();
    let (op1, op2) = (ptok.ast_op1, ptok.ast_op2);

    // Cast: `(` node whose operand comes after the closing parenthesis.
    let is_cast = ptext == "("
        && op2.is_none()
        && ptok
            .link
            .map(|l| op1.map(|o| o > l).unwrap_or(false))
            .unwrap_or(false);
    if is_cast {
        if value.is_int() || value.is_float() {
            let mut v = value;
            v.error_path.push((parent, "Cast".to_string()));
            set_token_value_depth(list, parent, v, depth + 1);
        }
        return;
    }

    // Unary computations.
    if op1 == Some(id) && op2.is_none() && matches!(ptext.as_str(), "-" | "!" | "~") {
        if let (Some(v), Bound::Point) = (value.int_payload(), value.bound) {
            let result = match ptext.as_str() {
                "-" => v.checked_neg(),
                "!" => Some((v == 0) as i64),
                _ => Some(!v),
            };
            if let Some(result) = result {
                let mut out = Value::int(result).with_kind(value.kind);
                out.condition = value.condition;
                out.error_path = value.error_path;
                set_token_value_depth(list, parent, out, depth + 1);
            }
        }
        return;
    }

    // Binary arithmetic and comparisons over both operands' values.
    let (Some(op1), Some(op2)) = (op1, op2) else {
        return;
    };
    if apply_arith(&ptext, 1, 1).is_none() {
        return;
    }
    let left_vals = list.tok(op1).values.clone();
    let right_vals = list.tok(op2).values.clone();
    for a in &left_vals {
        for b in &right_vals {
            let usable = |v: &Value| {
                v.is_int() && v.bound == Bound::Point && !v.is_impossible() && !v.is_inconclusive()
            };
            if !usable(a) || !usable(b) {
                continue;
            }
            let (Some(x), Some(y)) = (a.int_payload(), b.int_payload()) else {
                continue;
            };
            let Some(result) = apply_arith(&ptext, x, y) else {
                continue;
            };
            let kind = if a.is_known() && b.is_known() {
                ValueKind::Known
            } else {
                ValueKind::Possible
            };
            let mut out = Value::int(result).with_kind(kind);
            out.condition = a.condition.or(b.condition);
            out.error_path = a
                .error_path
                .iter()
                .chain(b.error_path.iter())
                .cloned()
                .collect();
            set_token_value_depth(list, parent, out, depth + 1);
        }
    }
}

fn apply_arith(op: &str, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        "+" => a.checked_add(b)?,
        "-" => a.checked_sub(b)?,
        "*" => a.checked_mul(b)?,
        "/" => a.checked_div(b)?,
        "%" => a.checked_rem(b)?,
        "<<" => a.checked_shl(u32::try_from(b).ok()?)?,
        ">>" => a.checked_shr(u32::try_from(b).ok()?)?,
        "&" => a & b,
        "|" => a | b,
        "^" => a ^ b,
        "==" => (a == b) as i64,
        "!=" => (a != b) as i64,
        "<" => (a < b) as i64,
        "<=" => (a <= b) as i64,
        ">" => (a > b) as i64,
        ">=" => (a >= b) as i64,
        "&&" => ((a != 0) && (b != 0)) as i64,
        "||" => ((a != 0) || (b != 0)) as i64,
        _ => return None,
    })
}

/// Attach known values to literals.
fn seed_literals(list: &mut TokenList) {
    let ids: Vec<TokenId> = list.iter().collect();
    for id in ids {
        let tok = list.tok(id);
        match tok.kind {
            TokenKind::Number => {
                let text = tok.text.clone();
                if looks_float(&text) {
                    if let Ok(f) = text.trim_end_matches(['f', 'F', 'l', 'L']).parse::<f64>() {
                        let mut v = Value::new(ValuePayload::Float(f));
                        v.kind = ValueKind::Known;
                        set_token_value(list, id, v);
                    }
                } else if let Some(n) = parse_int(&text) {
                    set_token_value(list, id, Value::known_int(n));
                }
            }
            TokenKind::Str => {
                let mut v = Value::new(ValuePayload::Tok(id));
                v.kind = ValueKind::Known;
                set_token_value(list, id, v);
            }
            TokenKind::Char => {
                let n = char_literal_value(&tok.text.clone());
                set_token_value(list, id, Value::known_int(n));
            }
            _ => {}
        }
    }
}

fn looks_float(text: &str) -> bool {
    !text.starts_with("0x")
        && !text.starts_with("0X")
        && (text.contains('.') || text.contains('e') || text.contains('E'))
}

fn char_literal_value(text: &str) -> i64 {
    let inner = text.trim_matches('\'');
    let mut chars = inner.chars();
    match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => 10,
            Some('t') => 9,
            Some('r') => 13,
            Some('0') => 0,
            Some(c) => c as i64,
            None => 0,
        },
        Some(c) => c as i64,
        None => 0,
    }
}

/// Evaluate `sizeof` expressions against the platform.
fn seed_sizeof(list: &mut TokenList, _symbols: &SymbolDatabase, project: &Project) {
    let ids: Vec<TokenId> = list
        .iter()
        .filter(|&id| list.text(id) == "sizeof")
        .collect();
    for id in ids {
        let Some(op1) = list.tok(id).ast_op1 else { continue };
        // Either a type inside parentheses or an expression with a type.
        let size = match &list.tok(op1).value_type {
            Some(vt) => vt.type_size(&project.platform),
            None => {
                let mut texts = Vec::new();
                let mut cursor = Some(op1);
                while let Some(t) = cursor {
                    let text = list.text(t);
                    if text == ")" {
                        break;
                    }
                    texts.push(text.to_string());
                    cursor = list.next(t);
                }
                ValueType::from_decl_tokens(texts.iter().map(String::as_str))
                    .type_size(&project.platform)
            }
        };
        if size > 0 {
            set_token_value(list, id, Value::known_int(size as i64));
        }
    }
}

/// Attach `Uninit` values to reads of uninitialised locals, up to the
/// first write.
fn seed_uninit(list: &mut TokenList, symbols: &SymbolDatabase) {
    for var in &symbols.variables {
        if var.is_argument || var.is_static || var.is_array || var.has_init || !var.is_local {
            continue;
        }
        if var.value_type.base == crate::tokenizer::valuetype::BaseType::Record
            && !var.value_type.is_pointer()
        {
            continue;
        }
        let body_end = symbols.scopes[var.scope].body_end;
        let mut cursor = list.next(var.decl_token);
        while let Some(id) = cursor {
            if Some(id) == body_end {
                break;
            }
            if list.tok(id).var_id == var.decl_id {
                match access_of(list, id) {
                    Access::Write => break,
                    Access::AddressOf => {
                        set_token_value(list, id, Value::uninit().with_kind(ValueKind::Known));
                        break;
                    }
                    Access::Read | Access::ReadWrite => {
                        let mut v = Value::uninit().with_kind(ValueKind::Known);
                        v.error_path
                            .push((var.decl_token, format!("Variable '{}' is declared here", var.name)));
                        set_token_value(list, id, v);
                    }
                }
            }
            cursor = list.next(id);
        }
    }
}

/// Forward flow: propagate known assigned constants to later reads of the
/// variable, stopping where provenance would be lost.
fn forward_assignments(list: &mut TokenList, symbols: &SymbolDatabase, deadline: Option<Instant>) {
    let assigns: Vec<TokenId> = list
        .iter()
        .filter(|&id| {
            let tok = list.tok(id);
            tok.text == "="
                && tok.ast_op2.is_some()
                && tok
                    .ast_op1
                    .map(|o| list.tok(o).var_id != 0)
                    .unwrap_or(false)
        })
        .collect();
    for eq in assigns {
        if crate::config::Settings::terminated()
            || deadline.map(|d| Instant::now() > d).unwrap_or(false)
        {
            return;
        }
        let lhs = list.tok(eq).ast_op1.unwrap();
        let rhs = list.tok(eq).ast_op2.unwrap();
        let var_id = list.tok(lhs).var_id;
        let Some(var_idx) = list.tok(lhs).variable else { continue };
        let var = &symbols.variables[var_idx];
        if !symbols.scopes[var.scope].is_executable() && !var.is_argument {
            continue;
        }
        let scope_end = enclosing_body_end(symbols, var.scope);
        let Some(rhs_value) = list
            .tok(rhs)
            .values
            .iter()
            .find(|v| v.is_int() && !v.is_impossible() && !v.is_inconclusive())
            .cloned()
        else {
            continue;
        };
        let assigned = rhs_value.int_payload().unwrap_or(0);
        let mut flowed = rhs_value.clone();
        flowed.var_id = var_id;
        flowed.var_value = assigned;
        flowed.error_path.push((
            eq,
            format!(
                "Assignment '{}', assigned value is {}",
                list.expression_string(eq),
                assigned
            ),
        ));

        let start = statement_end(list, eq);
        let mut cursor = start.and_then(|s| list.next(s));
        let mut stop_after: Option<TokenId> = None;
        let mut depth = 0usize;
        while let Some(id) = cursor {
            if Some(id) == scope_end {
                break;
            }
            if let Some(stop) = stop_after {
                if id == stop {
                    break;
                }
            }
            // The value is valid inside the block the assignment happened
            // in; leaving that block would merge with other paths.
            match list.text(id) {
                "{" => depth += 1,
                "}" => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            if list.tok(id).var_id == var_id {
                match access_of(list, id) {
                    Access::Read => set_token_value(list, id, flowed.clone()),
                    Access::Write | Access::ReadWrite => {
                        if stop_after.is_none() {
                            // The value still feeds reads inside this very
                            // statement (`a = a * 2`), then dies.
                            stop_after = statement_end(list, id);
                        }
                    }
                    Access::AddressOf => break,
                }
            }
            cursor = list.next(id);
        }
    }
}

fn enclosing_body_end(symbols: &SymbolDatabase, scope: usize) -> Option<TokenId> {
    symbols.scopes[scope].body_end
}

/// `std::move(x)` marks `x` moved for the rest of the scope.
fn apply_move_semantics(list: &mut TokenList, symbols: &SymbolDatabase) {
    let calls: Vec<TokenId> = list
        .iter()
        .filter(|&id| list.text(id) == "(" && list.tok(id).ast_op1.is_some())
        .collect();
    for paren in calls {
        let callee = list.tok(paren).ast_op1.unwrap();
        let callee_tok = list.tok(callee);
        let is_move = callee_tok.text == "move"
            || (callee_tok.text == "::"
                && callee_tok
                    .ast_op2
                    .map(|o| list.text(o) == "move")
                    .unwrap_or(false));
        if !is_move {
            continue;
        }
        let args = crate::tokens::ast::get_arguments(list, paren);
        let [arg] = args.as_slice() else { continue };
        let var_id = list.tok(*arg).var_id;
        if var_id == 0 {
            continue;
        }
        let Some(var_idx) = list.tok(*arg).variable else { continue };
        let scope_end = symbols.scopes[symbols.variables[var_idx].scope].body_end;
        let mut cursor = statement_end(list, paren).and_then(|s| list.next(s));
        let mut depth = 0usize;
        while let Some(id) = cursor {
            if Some(id) == scope_end {
                break;
            }
            match list.text(id) {
                "{" => depth += 1,
                "}" => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            if list.tok(id).var_id == var_id {
                match access_of(list, id) {
                    Access::Write => break,
                    _ => {
                        let mut v = Value::new(ValuePayload::Moved(MoveKind::MovedVariable));
                        v.kind = ValueKind::Known;
                        v.error_path
                            .push((paren, "Calling std::move here".to_string()));
                        set_token_value(list, id, v);
                    }
                }
            }
            cursor = list.next(id);
        }
    }
}

/// Constant folding over a literal AST subtree, usable before the symbol
/// database exists.
pub fn constant_fold_ast(list: &TokenList, root: TokenId) -> Option<i64> {
    let tok = list.tok(root);
    if tok.kind == TokenKind::Number {
        return parse_int(&tok.text);
    }
    match (tok.ast_op1, tok.ast_op2) {
        (Some(op1), Some(op2)) => {
            let a = constant_fold_ast(list, op1)?;
            let b = constant_fold_ast(list, op2)?;
            apply_arith(&tok.text, a, b)
        }
        (Some(op1), None) => {
            let a = constant_fold_ast(list, op1)?;
            match tok.text.as_str() {
                "-" => a.checked_neg(),
                "+" => Some(a),
                "!" => Some((a == 0) as i64),
                "~" => Some(!a),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Byte size of a value type on the project platform.
pub fn size_of_type(vt: &ValueType, project: &Project) -> u32 {
    vt.type_size(&project.platform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Language;
    use crate::tokens::ast::{build_ast, AstHints};

    fn analyze(texts: &[&str]) -> (TokenList, SymbolDatabase) {
        let mut list = TokenList::new(vec!["test.c".to_string()]);
        for (i, text) in texts.iter().enumerate() {
            let first = text.chars().next().unwrap();
            let kind = if first.is_ascii_alphabetic() || first == '_' {
                TokenKind::Name
            } else if first.is_ascii_digit() {
                TokenKind::Number
            } else if first == '"' {
                TokenKind::Str
            } else if first == '\'' {
                TokenKind::Char
            } else {
                TokenKind::Op
            };
            list.push(*text, kind, 0, 1, i as u32 + 1);
        }
        list.link_brackets().unwrap();
        let symbols = crate::symbols::build(&mut list, Language::C);
        let hints = AstHints {
            skip: symbols.ast_hints.skip.clone(),
        };
        build_ast(&mut list, &hints);
        let project = Project::new();
        let settings = Settings::default();
        set_values(&mut list, &symbols, &project, &settings, None);
        (list, symbols)
    }

    fn values_at<'l>(list: &'l TokenList, text: &str, nth: usize) -> &'l [Value] {
        let id = list
            .iter()
            .filter(|&id| list.text(id) == text)
            .nth(nth)
            .unwrap();
        &list.tok(id).values
    }

    #[test]
    fn literals_get_known_values() {
        let (list, _) = analyze(&["void", "f", "(", ")", "{", "int", "x", "=", "42", ";", "}"]);
        let vals = values_at(&list, "42", 0);
        assert!(vals.iter().any(|v| v.is_known() && v.int_payload() == Some(42)));
    }

    #[test]
    fn assigned_value_flows_forward_and_folds() {
        // int a = 3; if (a < 5) { a = a * 2; }
        let (list, _) = analyze(&[
            "void", "f", "(", ")", "{", "int", "a", "=", "3", ";", "if", "(", "a", "<", "5", ")",
            "{", "a", "=", "a", "*", "2", ";", "}", "}",
        ]);
        // `a` inside the condition carries known 3.
        let cond_a = values_at(&list, "a", 1);
        assert!(cond_a.iter().any(|v| v.is_known() && v.int_payload() == Some(3)));
        // The RHS `a` of `a = a * 2` still carries known 3.
        let rhs_a = values_at(&list, "a", 3);
        assert!(rhs_a.iter().any(|v| v.is_known() && v.int_payload() == Some(3)));
        // The multiplication token carries known 6.
        let mul = values_at(&list, "*", 0);
        assert!(mul.iter().any(|v| v.is_known() && v.int_payload() == Some(6)));
    }

    #[test]
    fn uninit_reads_are_marked_until_first_write() {
        let (list, _) = analyze(&[
            "void", "f", "(", ")", "{", "int", "x", ";", "int", "y", "=", "x", ";", "x", "=", "1",
            ";", "int", "z", "=", "x", ";", "}",
        ]);
        // y = x: x is uninitialized.
        let first_read = values_at(&list, "x", 1);
        assert!(first_read.iter().any(|v| v.is_uninit()));
        // z = x after the write: no uninit value.
        let after_write = values_at(&list, "x", 3);
        assert!(!after_write.iter().any(|v| v.is_uninit()));
    }

    #[test]
    fn null_assignment_flows_into_call_argument() {
        let (list, _) = analyze(&[
            "void", "g", "(", "int", "*", "p", ")", ";", "void", "f", "(", ")", "{", "int", "*",
            "p", "=", "0", ";", "g", "(", "p", ")", ";", "}",
        ]);
        let arg = values_at(&list, "p", 2);
        assert!(arg
            .iter()
            .any(|v| v.is_known() && v.int_payload() == Some(0)));
    }

    #[test]
    fn constant_folding_handles_nested_arithmetic() {
        let (list, _) = analyze(&["void", "f", "(", ")", "{", "int", "x", "=", "2", "+", "3", "*",
            "4", ";", "}"]);
        let plus = values_at(&list, "+", 0);
        assert!(plus.iter().any(|v| v.is_known() && v.int_payload() == Some(14)));
    }

    #[test]
    fn standalone_fold_works_without_symbols() {
        let mut list = TokenList::new(vec!["t.c".to_string()]);
        for (i, t) in ["x", "=", "1", "+", "2", ";"].iter().enumerate() {
            let kind = if t.chars().next().unwrap().is_ascii_digit() {
                TokenKind::Number
            } else if t.chars().next().unwrap().is_ascii_alphabetic() {
                TokenKind::Name
            } else {
                TokenKind::Op
            };
            list.push(*t, kind, 0, 1, i as u32 + 1);
        }
        list.link_brackets().unwrap();
        build_ast(&mut list, &AstHints::default());
        let plus = list.iter().find(|&id| list.text(id) == "+").unwrap();
        assert_eq!(constant_fold_ast(&list, plus), Some(3));
    }

    #[test]
    fn sizeof_uses_platform_width() {
        let (list, _) = analyze(&[
            "void", "f", "(", ")", "{", "int", "n", "=", "sizeof", "(", "int", ")", ";", "}",
        ]);
        let vals = values_at(&list, "sizeof", 0);
        assert!(vals.iter().any(|v| v.int_payload() == Some(4)));
    }

    #[test]
    fn address_of_uninit_is_visible_to_callers() {
        let (list, _) = analyze(&[
            "void", "init", "(", "int", "*", "p", ")", ";", "void", "f", "(", ")", "{", "int",
            "x", ";", "init", "(", "&", "x", ")", ";", "}",
        ]);
        let x_arg = values_at(&list, "x", 1);
        assert!(x_arg.iter().any(|v| v.is_uninit()));
    }
}
