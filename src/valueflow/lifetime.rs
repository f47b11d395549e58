//! Lifetime values: which storage bounds a pointer's validity.

use crate::symbols::SymbolDatabase;
use crate::tokens::{TokenId, TokenList};
use crate::valueflow::value::{LifetimeKind, LifetimeScope, Value, ValueKind, ValuePayload};
use crate::valueflow::{access_of, set_token_value, statement_end, Access};

/// A lifetime-carrying token with the trail showing why.
#[derive(Debug, Clone)]
pub struct LifetimeToken {
    pub token: TokenId,
    pub error_path: crate::valueflow::value::ErrorPath,
    pub address_of: bool,
    pub inconclusive: bool,
}

/// Attach `Lifetime` values for `p = &x` where `x` has bounded storage.
pub fn set_lifetime_values(list: &mut TokenList, symbols: &SymbolDatabase) {
    let assigns: Vec<TokenId> = list
        .iter()
        .filter(|&id| list.text(id) == "=")
        .collect();
    for eq in assigns {
        let tok = list.tok(eq);
        let (Some(lhs), Some(rhs)) = (tok.ast_op1, tok.ast_op2) else {
            continue;
        };
        let lhs_var = list.tok(lhs).var_id;
        if lhs_var == 0 {
            continue;
        }
        // rhs must be unary & of a variable with known storage.
        if list.text(rhs) != "&" || list.tok(rhs).ast_op2.is_some() {
            continue;
        }
        let Some(target) = list.tok(rhs).ast_op1 else { continue };
        let Some(target_var_idx) = list.tok(target).variable else {
            continue;
        };
        let target_var = &symbols.variables[target_var_idx];
        if !target_var.is_local && !target_var.is_argument {
            continue;
        }
        let scope = if target_var.is_argument {
            LifetimeScope::Argument
        } else {
            LifetimeScope::Local
        };
        let mut value = Value::new(ValuePayload::Lifetime {
            token: target,
            kind: LifetimeKind::Address,
            scope,
        });
        value.kind = ValueKind::Known;
        value.error_path.push((
            rhs,
            format!("Address of variable '{}' taken here", target_var.name),
        ));

        // Flow to later reads of the pointer until it is reassigned.
        let Some(lhs_var_idx) = list.tok(lhs).variable else { continue };
        let scope_end = symbols.scopes[symbols.variables[lhs_var_idx].scope].body_end;
        let mut cursor = statement_end(list, eq).and_then(|s| list.next(s));
        // The pointer itself carries the value from the assignment on.
        set_token_value(list, lhs, value.clone());
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
            if list.tok(id).var_id == lhs_var {
                match access_of(list, id) {
                    Access::Write => break,
                    Access::AddressOf => break,
                    _ => set_token_value(list, id, value.clone()),
                }
            }
            cursor = list.next(id);
        }
    }
}

/// Lifetime sources of a token, shallow variant of the full walk.
pub fn get_lifetime_tokens(list: &TokenList, tok: TokenId) -> Vec<LifetimeToken> {
    list.tok(tok)
        .values
        .iter()
        .filter_map(|v| match &v.payload {
            ValuePayload::Lifetime { token, kind, .. } => Some(LifetimeToken {
                token: *token,
                error_path: v.error_path.clone(),
                address_of: *kind == LifetimeKind::Address,
                inconclusive: v.is_inconclusive(),
            }),
            _ => None,
        })
        .collect()
}

/// The variable whose storage bounds `tok`'s validity, if one is known.
pub fn get_lifetime_variable(
    list: &TokenList,
    symbols: &SymbolDatabase,
    tok: TokenId,
) -> Option<usize> {
    get_lifetime_tokens(list, tok)
        .first()
        .and_then(|lt| list.tok(lt.token).variable)
        .map(|idx| {
            let _ = &symbols.variables[idx];
            idx
        })
}

/// True when the token's value is borrowed from storage with a bounded
/// lifetime (a local or an argument).
pub fn is_lifetime_borrowed(list: &TokenList, tok: TokenId) -> bool {
    list.tok(tok).values.iter().any(|v| v.is_local_lifetime())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Language, Project, Settings};
    use crate::tokens::ast::{build_ast, AstHints};
    use crate::tokens::TokenKind;
    use crate::valueflow::set_values;

    fn analyze(texts: &[&str]) -> (TokenList, SymbolDatabase) {
        let mut list = TokenList::new(vec!["test.c".to_string()]);
        for (i, text) in texts.iter().enumerate() {
            let first = text.chars().next().unwrap();
            let kind = if first.is_ascii_alphabetic() || first == '_' {
                TokenKind::Name
            } else if first.is_ascii_digit() {
                TokenKind::Number
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

    #[test]
    fn address_of_local_creates_lifetime_value() {
        let (list, _) = analyze(&[
            "void", "f", "(", ")", "{", "int", "x", ";", "int", "*", "p", ";", "p", "=", "&", "x",
            ";", "g", "(", "p", ")", ";", "}",
        ]);
        let arg_p = list
            .iter()
            .filter(|&id| list.text(id) == "p")
            .nth(2)
            .unwrap();
        assert!(is_lifetime_borrowed(&list, arg_p));
        let lts = get_lifetime_tokens(&list, arg_p);
        assert_eq!(lts.len(), 1);
        assert_eq!(list.text(lts[0].token), "x");
        assert!(lts[0].address_of);
    }

    #[test]
    fn argument_storage_is_not_a_local_borrow() {
        let (list, _) = analyze(&[
            "void", "f", "(", "int", "a", ")", "{", "int", "*", "p", ";", "p", "=", "&", "a", ";",
            "g", "(", "p", ")", ";", "}",
        ]);
        let arg_p = list
            .iter()
            .filter(|&id| list.text(id) == "p")
            .nth(2)
            .unwrap();
        // Borrowed from an argument, not from local storage.
        assert!(!is_lifetime_borrowed(&list, arg_p));
        assert_eq!(get_lifetime_tokens(&list, arg_p).len(), 1);
    }

    #[test]
    fn reassignment_ends_the_borrow() {
        let (list, _) = analyze(&[
            "void", "f", "(", ")", "{", "int", "x", ";", "int", "*", "p", ";", "p", "=", "&", "x",
            ";", "p", "=", "0", ";", "g", "(", "p", ")", ";", "}",
        ]);
        let arg_p = list
            .iter()
            .filter(|&id| list.text(id) == "p")
            .nth(3)
            .unwrap();
        assert!(!is_lifetime_borrowed(&list, arg_p));
    }
}
