//! Configuration enumeration: which macro combinations the conditional
//! directives of a TU can reach.
//!
//! Each configuration is a `;`-joined, sorted, duplicate-free set of
//! `MACRO` or `MACRO=VAL` elements. The empty configuration is always
//! present. Branches union rather than cross-product, so independent
//! `#ifdef`s each contribute one configuration and nesting contributes
//! their combination.

use std::collections::BTreeSet;

use crate::preprocessor::lexer::{RawKind, RawToken};
use crate::preprocessor::{directive_lines, Directive};

/// Enumerate configurations from the raw token stream. Directives from
/// files matching a `--config-exclude` prefix are followed for structure
/// but add no configurations.
pub fn get_configs(
    tokens: &[RawToken],
    user_undefs: &BTreeSet<String>,
    files: &[String],
    excludes: &[String],
) -> BTreeSet<String> {
    let mut configs: BTreeSet<String> = BTreeSet::new();
    configs.insert(String::new());

    // Stack of enclosing positive macro sets.
    let mut stack: Vec<Vec<String>> = Vec::new();

    let excluded = |dir: &Directive| -> bool {
        if excludes.is_empty() {
            return false;
        }
        files
            .get(dir.file_index as usize)
            .map(|file| excludes.iter().any(|prefix| file.starts_with(prefix)))
            .unwrap_or(false)
    };

    for dir in directive_lines(tokens) {
        if excluded(&dir) {
            // Keep the nesting structure balanced.
            match dir.name.as_str() {
                "ifdef" | "ifndef" | "if" => stack.push(Vec::new()),
                "endif" => {
                    stack.pop();
                }
                _ => {}
            }
            continue;
        }
        match dir.name.as_str() {
            "ifdef" | "if" => {
                let macros = condition_macros(&dir);
                push_config(&mut configs, &stack, &macros, user_undefs);
                stack.push(macros);
            }
            "ifndef" => {
                // The negative branch is the default configuration; the
                // positive macro still yields a configuration so the other
                // branch gets analyzed.
                let macros = condition_macros(&dir);
                push_config(&mut configs, &stack, &macros, user_undefs);
                stack.push(Vec::new());
            }
            "elif" => {
                let macros = condition_macros(&dir);
                if let Some(top) = stack.last_mut() {
                    *top = macros.clone();
                } else {
                    stack.push(macros.clone());
                }
                let enclosing = stack[..stack.len() - 1].to_vec();
                push_config(&mut configs, &enclosing, &macros, user_undefs);
            }
            "else" => {
                if let Some(top) = stack.last_mut() {
                    top.clear();
                }
            }
            "endif" => {
                stack.pop();
            }
            _ => {}
        }
    }

    configs
}

fn push_config(
    configs: &mut BTreeSet<String>,
    stack: &[Vec<String>],
    macros: &[String],
    user_undefs: &BTreeSet<String>,
) {
    let mut set: BTreeSet<String> = BTreeSet::new();
    for frame in stack {
        set.extend(frame.iter().cloned());
    }
    set.extend(macros.iter().cloned());
    // A configuration requiring an undefined macro is unreachable.
    if set
        .iter()
        .any(|m| user_undefs.contains(macro_name(m)))
    {
        return;
    }
    if set.is_empty() {
        return;
    }
    let cfg: Vec<String> = set.into_iter().collect();
    configs.insert(cfg.join(";"));
}

fn macro_name(element: &str) -> &str {
    element.split('=').next().unwrap_or(element)
}

/// Extract the macros a condition depends on: `defined(M)`, `defined M`,
/// bare identifiers, and `M == N` comparisons as `M=N`.
fn condition_macros(dir: &Directive) -> Vec<String> {
    let toks = &dir.tokens;
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    while i < toks.len() {
        let tok = &toks[i];
        if tok.kind != RawKind::Name {
            i += 1;
            continue;
        }
        if tok.text == "defined" {
            // defined(M) or defined M
            let mut j = i + 1;
            if j < toks.len() && toks[j].text == "(" {
                j += 1;
            }
            if j < toks.len() && toks[j].kind == RawKind::Name {
                out.push(toks[j].text.clone());
            }
            i = j + 1;
            continue;
        }
        if is_builtin(&tok.text) {
            i += 1;
            continue;
        }
        // `M == N` produces a valued element.
        if i + 2 < toks.len() && toks[i + 1].text == "==" && toks[i + 2].kind == RawKind::Number {
            out.push(format!("{}={}", tok.text, toks[i + 2].text));
            i += 3;
            continue;
        }
        out.push(tok.text.clone());
        i += 1;
    }
    out.sort();
    out.dedup();
    out
}

fn is_builtin(name: &str) -> bool {
    matches!(name, "defined" | "__STDC__" | "__cplusplus" | "__LINE__" | "__FILE__")
}
