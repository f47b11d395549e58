//! Condition-driven (backward) value flow.
//!
//! At `if (x == 42)` the true branch learns `x` is 42 and the false branch
//! learns 42 is impossible. Relational operators produce interval bounds
//! instead of points.

use std::time::Instant;

use crate::symbols::SymbolDatabase;
use crate::tokens::{TokenId, TokenList};
use crate::valueflow::value::{Bound, Value, ValueKind};
use crate::valueflow::{access_of, set_token_value, statement_end, Access};

/// The value pair a comparison splits into.
#[derive(Debug, Clone)]
pub struct CompareValues {
    /// The variable-side token of the comparison.
    pub var_tok: TokenId,
    /// Holds on the true branch.
    pub true_value: Value,
    /// Holds on the false branch.
    pub false_value: Value,
}

/// Extract `(true, false)` values from a comparison of a variable against
/// a known integer. Returns `None` for anything else.
pub fn parse_compare_int(list: &TokenList, root: TokenId) -> Option<CompareValues> {
    let tok = list.tok(root);
    let op = tok.text.as_str();
    if !matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=") {
        return None;
    }
    let (op1, op2) = (tok.ast_op1?, tok.ast_op2?);
    // One side a variable, the other a known integer.
    let (var_tok, int_tok, var_on_left) = if list.tok(op1).var_id != 0 {
        (op1, op2, true)
    } else if list.tok(op2).var_id != 0 {
        (op2, op1, false)
    } else {
        return None;
    };
    let int_value = list
        .tok(int_tok)
        .values
        .iter()
        .find(|v| v.is_known() && v.is_int() && v.bound == Bound::Point)?
        .int_payload()?;

    // Normalize so the variable is conceptually on the left.
    let op = if var_on_left {
        op.to_string()
    } else {
        match op {
            "<" => ">".to_string(),
            "<=" => ">=".to_string(),
            ">" => "<".to_string(),
            ">=" => "<=".to_string(),
            other => other.to_string(),
        }
    };

    let point = |v: i64, kind: ValueKind| -> Value {
        let mut value = Value::int(v).with_kind(kind);
        value.condition = Some(root);
        value
    };
    let bounded = |v: i64, bound: Bound, shrink: bool| -> Value {
        let mut value = Value::int(v).with_kind(ValueKind::Known);
        value.bound = bound;
        value.condition = Some(root);
        if shrink {
            value.decrease_range();
        }
        value
    };

    let (true_value, false_value) = match op.as_str() {
        "==" => (
            point(int_value, ValueKind::Known),
            point(int_value, ValueKind::Impossible),
        ),
        "!=" => (
            point(int_value, ValueKind::Impossible),
            point(int_value, ValueKind::Known),
        ),
        // x < v: true means at most v-1, false means at least v.
        "<" => (
            bounded(int_value, Bound::Upper, true),
            bounded(int_value, Bound::Lower, false),
        ),
        "<=" => (
            bounded(int_value, Bound::Upper, false),
            bounded(int_value, Bound::Lower, true),
        ),
        ">" => (
            bounded(int_value, Bound::Lower, true),
            bounded(int_value, Bound::Upper, false),
        ),
        ">=" => (
            bounded(int_value, Bound::Lower, false),
            bounded(int_value, Bound::Upper, true),
        ),
        _ => return None,
    };

    Some(CompareValues {
        var_tok,
        true_value,
        false_value,
    })
}

/// Walk every `if`/`while` condition and inject branch values.
pub fn apply_conditions(list: &mut TokenList, symbols: &SymbolDatabase, deadline: Option<Instant>) {
    let keywords: Vec<TokenId> = list
        .iter()
        .filter(|&id| matches!(list.text(id), "if" | "while"))
        .collect();
    for keyword in keywords {
        if crate::config::Settings::terminated()
            || deadline.map(|d| Instant::now() > d).unwrap_or(false)
        {
            return;
        }
        let Some(lpar) = list.next(keyword).filter(|&p| list.text(p) == "(") else {
            continue;
        };
        let Some(rpar) = list.link(lpar) else { continue };
        let Some(root) = condition_root(list, lpar, rpar) else {
            continue;
        };
        let Some(compare) = parse_compare_int(list, root) else {
            continue;
        };
        let var_id = list.tok(compare.var_tok).var_id;
        if var_id == 0 {
            continue;
        }
        let cond_text = list.expression_string(root);

        // True branch: the body.
        if let Some(body_open) = list.next(rpar) {
            let mut value = compare.true_value.clone();
            value
                .error_path
                .push((root, format!("Assuming condition '{cond_text}' is true")));
            let (start, end) = branch_range(list, body_open);
            inject(list, symbols, var_id, value, start, end);

            // False branch: an `else` body, when present.
            if list.text(body_open) == "{" {
                if let Some(after) = list.link(body_open).and_then(|c| list.next(c)) {
                    if list.text(after) == "else" {
                        if let Some(else_open) = list.next(after) {
                            let mut value = compare.false_value.clone();
                            value.error_path.push((
                                root,
                                format!("Assuming condition '{cond_text}' is false"),
                            ));
                            let (start, end) = branch_range(list, else_open);
                            inject(list, symbols, var_id, value, start, end);
                        }
                    }
                }
            }
        }
    }
}

/// The AST root of the expression between `(` and `)`.
pub fn condition_root(list: &TokenList, lpar: TokenId, rpar: TokenId) -> Option<TokenId> {
    let mut cursor = list.next(lpar);
    while let Some(id) = cursor {
        if id == rpar {
            return None;
        }
        let tok = list.tok(id);
        if tok.ast_parent.is_none() && (tok.ast_op1.is_some() || tok.var_id != 0) {
            return Some(id);
        }
        cursor = list.next(id);
    }
    None
}

/// `(first, last)` token bounds of a branch body: a brace block or a
/// single statement.
fn branch_range(list: &TokenList, open: TokenId) -> (Option<TokenId>, Option<TokenId>) {
    if list.text(open) == "{" {
        (list.next(open), list.link(open))
    } else {
        (Some(open), statement_end(list, open))
    }
}

fn inject(
    list: &mut TokenList,
    _symbols: &SymbolDatabase,
    var_id: u32,
    value: Value,
    start: Option<TokenId>,
    end: Option<TokenId>,
) {
    let mut cursor = start;
    let mut stop_after: Option<TokenId> = None;
    while let Some(id) = cursor {
        if Some(id) == end {
            break;
        }
        if let Some(stop) = stop_after {
            if id == stop {
                break;
            }
        }
        if list.tok(id).var_id == var_id {
            match access_of(list, id) {
                Access::Read => set_token_value(list, id, value.clone()),
                Access::Write | Access::ReadWrite => {
                    if stop_after.is_none() {
                        stop_after = statement_end(list, id);
                    }
                }
                Access::AddressOf => break,
            }
        }
        cursor = list.next(id);
    }
}
