//! Two-phase token normalization.
//!
//! `simplify_tokens0` is purely syntactic: token creation, bracket
//! linking, redundant-punctuation removal, literal normalization.
//! `simplify_tokens1` is semantic: symbol database, variable ids, the AST
//! overlay, expression ids, value types, and finally value flow.

pub mod valuetype;

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::{Language, Project, Settings};
use crate::errors::InternalError;
use crate::preprocessor::{RawKind, RawToken};
use crate::symbols::{self, SymbolDatabase};
use crate::tokens::ast::{build_ast, AstHints};
use crate::tokens::{TokenId, TokenKind, TokenList};
use crate::valueflow;
use valuetype::{BaseType, Sign, ValueType};

pub struct Tokenizer<'cfg> {
    pub list: TokenList,
    pub project: &'cfg Project,
    pub settings: &'cfg Settings,
    symbols: Option<SymbolDatabase>,
    pub lang: Language,
    start: Instant,
}

impl<'cfg> Tokenizer<'cfg> {
    pub fn new(project: &'cfg Project, settings: &'cfg Settings, lang: Language) -> Tokenizer<'cfg> {
        Tokenizer {
            list: TokenList::default(),
            project,
            settings,
            symbols: None,
            lang,
            start: Instant::now(),
        }
    }

    /// Convert the preprocessed raw stream into the analyzable list.
    pub fn create_tokens(&mut self, raw: &[RawToken], files: Vec<String>) {
        self.start = Instant::now();
        let mut list = TokenList::new(files);
        for tok in raw {
            let kind = match tok.kind {
                RawKind::Name => TokenKind::Name,
                RawKind::Number => TokenKind::Number,
                RawKind::Str => TokenKind::Str,
                RawKind::Char => TokenKind::Char,
                RawKind::Op => classify_op(&tok.text),
                RawKind::Comment => continue,
            };
            list.push(tok.text.clone(), kind, tok.file_index, tok.line, tok.col);
        }
        self.list = list;
    }

    pub fn tokens(&self) -> Option<TokenId> {
        self.list.front()
    }

    /// The per-TU time budget is spent.
    pub fn is_max_time(&self) -> bool {
        match self.project.max_time_secs {
            Some(secs) => self.start.elapsed() > Duration::from_secs(secs),
            None => false,
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.project
            .max_time_secs
            .map(|secs| self.start + Duration::from_secs(secs))
    }

    pub fn symbol_database(&self) -> Option<&SymbolDatabase> {
        self.symbols.as_ref()
    }

    /// Syntactic normalization. Returns `Ok(false)` when there is nothing
    /// to analyze for this configuration.
    pub fn simplify_tokens0(&mut self, _cfg: &str) -> Result<bool, InternalError> {
        if self.list.is_empty() {
            return Ok(false);
        }
        self.remove_redundant_semicolons();
        self.normalize_literals();
        self.list.link_brackets()?;
        Ok(true)
    }

    /// Semantic normalization plus value flow.
    pub fn simplify_tokens1(&mut self) -> Result<bool, InternalError> {
        if self.list.is_empty() {
            return Ok(false);
        }
        let symbols = symbols::build(&mut self.list, self.lang);
        let hints = AstHints {
            skip: symbols.ast_hints.skip.clone(),
        };
        build_ast(&mut self.list, &hints);
        self.assign_expression_ids(&symbols);
        self.infer_value_types();
        let deadline = self.deadline();
        valueflow::set_values(&mut self.list, &symbols, self.project, self.settings, deadline);
        debug!(
            functions = symbols.functions.len(),
            variables = symbols.variables.len(),
            "semantic normalization done"
        );
        self.symbols = Some(symbols);
        Ok(true)
    }

    fn remove_redundant_semicolons(&mut self) {
        let mut doomed = Vec::new();
        let mut prev_semi = false;
        for id in self.list.iter() {
            let is_semi = self.list.text(id) == ";";
            if is_semi && prev_semi {
                doomed.push(id);
            }
            prev_semi = is_semi;
        }
        for id in doomed {
            self.list.unlink(id);
        }
    }

    fn normalize_literals(&mut self) {
        let ids: Vec<TokenId> = self.list.iter().collect();
        for id in ids {
            let tok = self.list.tok_mut(id);
            if tok.kind != TokenKind::Number {
                continue;
            }
            // Uppercase hex prefix and suffixes are written one way.
            if tok.text.starts_with("0X") {
                tok.text = format!("0x{}", &tok.text[2..]);
            }
        }
    }

    /// Expression ids: variables share their declaration id, every other
    /// expression token gets a fresh dense id.
    fn assign_expression_ids(&mut self, symbols: &SymbolDatabase) {
        let mut next = symbols.variables.len() as u32 + 1;
        let ids: Vec<TokenId> = self.list.iter().collect();
        for id in ids {
            let tok = self.list.tok_mut(id);
            if tok.var_id != 0 {
                tok.expr_id = tok.var_id;
            } else if tok.ast_op1.is_some() || tok.ast_parent.is_some() {
                tok.expr_id = next;
                next += 1;
            }
        }
    }

    /// Bottom-up `ValueType` inference over the AST. Literals and variable
    /// references were typed earlier; operators combine their operands.
    fn infer_value_types(&mut self) {
        // Literals first.
        let ids: Vec<TokenId> = self.list.iter().collect();
        for &id in &ids {
            let tok = self.list.tok(id);
            if tok.value_type.is_some() {
                continue;
            }
            let vt = match tok.kind {
                TokenKind::Number => Some(number_literal_type(&tok.text)),
                TokenKind::Str => {
                    let mut vt = ValueType::new(Sign::Unknown, BaseType::Char, 1);
                    vt.constness = 1;
                    Some(vt)
                }
                TokenKind::Char => Some(ValueType::new(Sign::Unknown, BaseType::Char, 0)),
                _ => None,
            };
            if let Some(vt) = vt {
                self.list.tok_mut(id).value_type = Some(vt);
            }
        }

        // Operators, repeated until no more types resolve.
        for _ in 0..8 {
            let mut changed = false;
            for &id in &ids {
                if self.list.tok(id).value_type.is_some() {
                    continue;
                }
                if let Some(vt) = self.operator_type(id) {
                    self.list.tok_mut(id).value_type = Some(vt);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn operator_type(&self, id: TokenId) -> Option<ValueType> {
        let tok = self.list.tok(id);
        let text = tok.text.as_str();
        match (tok.ast_op1, tok.ast_op2) {
            (Some(op1), None) => {
                let operand = self.list.tok(op1).value_type.clone();
                match text {
                    "*" => operand.map(|mut vt| {
                        vt.pointer = vt.pointer.saturating_sub(1);
                        vt
                    }),
                    "&" => operand.map(|mut vt| {
                        vt.pointer = vt.pointer.saturating_add(1);
                        vt
                    }),
                    "!" => Some(ValueType::new(Sign::Signed, BaseType::Bool, 0)),
                    "-" | "+" | "~" | "++" | "--" => operand,
                    "(" => {
                        // Cast: parse the type tokens between the parens.
                        let link = tok.link?;
                        if op1 <= link {
                            return None;
                        }
                        let mut texts = Vec::new();
                        let mut cursor = self.list.next(id);
                        while let Some(t) = cursor {
                            if t == link {
                                break;
                            }
                            texts.push(self.list.text(t).to_string());
                            cursor = self.list.next(t);
                        }
                        Some(ValueType::from_decl_tokens(texts.iter().map(String::as_str)))
                    }
                    "sizeof" => Some(ValueType::new(Sign::Unsigned, BaseType::Long, 0)),
                    _ => None,
                }
            }
            (Some(op1), Some(op2)) => {
                let left = self.list.tok(op1).value_type.clone();
                let right = self.list.tok(op2).value_type.clone();
                match text {
                    "+" | "-" | "*" | "/" | "%" | "&" | "|" | "^" | "<<" | ">>" => {
                        match (left, right) {
                            (Some(l), Some(r)) => Some(ValueType::combine(&l, &r)),
                            _ => None,
                        }
                    }
                    "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||" => {
                        Some(ValueType::new(Sign::Signed, BaseType::Bool, 0))
                    }
                    "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => {
                        left
                    }
                    "[" => left.map(|mut vt| {
                        vt.pointer = vt.pointer.saturating_sub(1);
                        vt
                    }),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

fn classify_op(text: &str) -> TokenKind {
    match text {
        ";" | "," | "{" | "}" | "(" | ")" | "[" | "]" => TokenKind::Punct,
        _ => TokenKind::Op,
    }
}

fn number_literal_type(text: &str) -> ValueType {
    let unsigned = text.contains('u') || text.contains('U');
    let sign = if unsigned { Sign::Unsigned } else { Sign::Signed };
    if !text.starts_with("0x")
        && !text.starts_with("0X")
        && (text.contains('.') || text.contains('e') || text.contains('E'))
    {
        let base = if text.ends_with('f') || text.ends_with('F') {
            BaseType::Float
        } else {
            BaseType::Double
        };
        return ValueType::new(Sign::Unknown, base, 0);
    }
    let longs = text.chars().filter(|c| *c == 'l' || *c == 'L').count();
    let base = match longs {
        0 => BaseType::Int,
        1 => BaseType::Long,
        _ => BaseType::LongLong,
    };
    ValueType::new(sign, base, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::lex;

    fn tokenizer_for<'a>(
        project: &'a Project,
        settings: &'a Settings,
        src: &str,
    ) -> Tokenizer<'a> {
        let raw = lex(src, 0).unwrap();
        let mut tokenizer = Tokenizer::new(project, settings, Language::C);
        tokenizer.create_tokens(&raw, vec!["test.c".to_string()]);
        tokenizer
    }

    #[test]
    fn two_phase_simplification_builds_everything() {
        let project = Project::new();
        let settings = Settings::default();
        let mut t = tokenizer_for(&project, &settings, "void f(int *p) { *p = 1; }");
        assert!(t.simplify_tokens0("").unwrap());
        assert!(t.simplify_tokens1().unwrap());
        let db = t.symbol_database().unwrap();
        assert_eq!(db.functions.len(), 1);
        // Every open bracket is linked symmetrically.
        for id in t.list.iter() {
            if let Some(link) = t.list.link(id) {
                assert_eq!(t.list.link(link), Some(id));
            }
        }
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        let project = Project::new();
        let settings = Settings::default();
        let mut t = tokenizer_for(&project, &settings, "");
        assert!(!t.simplify_tokens0("").unwrap());
    }

    #[test]
    fn mismatched_brackets_are_a_syntax_error() {
        let project = Project::new();
        let settings = Settings::default();
        let mut t = tokenizer_for(&project, &settings, "void f() { (] }");
        let err = t.simplify_tokens0("").unwrap_err();
        assert_eq!(err.id, "syntaxError");
    }

    #[test]
    fn redundant_semicolons_are_removed() {
        let project = Project::new();
        let settings = Settings::default();
        let mut t = tokenizer_for(&project, &settings, "int x;;;");
        t.simplify_tokens0("").unwrap();
        let semis = t.list.iter().filter(|&id| t.list.text(id) == ";").count();
        assert_eq!(semis, 1);
    }

    #[test]
    fn value_types_flow_through_expressions() {
        let project = Project::new();
        let settings = Settings::default();
        let mut t = tokenizer_for(&project, &settings, "void f(int *p, int n) { *p = n + 1; }");
        t.simplify_tokens0("").unwrap();
        t.simplify_tokens1().unwrap();
        let deref = t
            .list
            .iter()
            .find(|&id| t.list.text(id) == "*" && t.list.tok(id).ast_op2.is_none())
            .unwrap();
        let vt = t.list.tok(deref).value_type.as_ref().unwrap();
        assert_eq!(vt.pointer, 0);
        assert_eq!(vt.base, BaseType::Int);
        let plus = t.list.iter().find(|&id| t.list.text(id) == "+").unwrap();
        assert_eq!(t.list.tok(plus).value_type.as_ref().unwrap().base, BaseType::Int);
    }

    #[test]
    fn expression_ids_are_dense_and_variable_stable() {
        let project = Project::new();
        let settings = Settings::default();
        let mut t = tokenizer_for(&project, &settings, "void f() { int a = 1; a = a + 2; }");
        t.simplify_tokens0("").unwrap();
        t.simplify_tokens1().unwrap();
        let a_ids: Vec<u32> = t
            .list
            .iter()
            .filter(|&id| t.list.text(id) == "a")
            .map(|id| t.list.tok(id).expr_id)
            .collect();
        assert!(a_ids.iter().all(|&e| e == a_ids[0] && e != 0));
        let max_time = t.is_max_time();
        assert!(!max_time);
    }
}
