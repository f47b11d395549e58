//! Symbol database: scopes, functions and variables, built by a single
//! scan over the normalized token list.
//!
//! The database hangs off the tokenizer. Construction also assigns
//! variable ids on the tokens and resolves call names against known
//! functions, so later passes can navigate purely through indices.

use std::collections::HashMap;

use crate::config::Language;
use crate::tokens::ast::{is_type_keyword, AstHints};
use crate::tokens::{TokenId, TokenKind, TokenList};
use crate::tokenizer::valuetype::ValueType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Class,
    Function,
    Block,
}

/// A region of code holding declarations.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<usize>,
    /// The `{` token opening the body, when the scope has one.
    pub body_start: Option<TokenId>,
    /// The matching `}`.
    pub body_end: Option<TokenId>,
    /// Owning function for function scopes.
    pub function: Option<usize>,
    pub variables: Vec<usize>,
    pub class_name: Option<String>,
}

impl Scope {
    pub fn is_executable(&self) -> bool {
        matches!(self.kind, ScopeKind::Function | ScopeKind::Block)
    }
}

/// A function: its definition (or first declaration) token plus arguments.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// First declaration token; stable across the TUs that share the
    /// declaring header, which is what makes the id usable cross-TU.
    pub token_def: TokenId,
    /// Argument variable indices, declaration order. Empty for bodyless
    /// declarations.
    pub args: Vec<usize>,
    /// Body scope, once seen.
    pub scope: Option<usize>,
    /// Stable cross-TU identifier: `file:line:column` of `token_def`.
    pub id: String,
    pub has_body: bool,
}

impl Function {
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn argument_var(&self, nr: usize) -> Option<usize> {
        self.args.get(nr).copied()
    }
}

/// A declared variable.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub decl_token: TokenId,
    pub scope: usize,
    /// Dense per-TU declaration id; equals the tokens' `var_id`.
    pub decl_id: u32,
    pub value_type: ValueType,
    pub is_array: bool,
    pub dimensions: Vec<i64>,
    pub is_argument: bool,
    pub is_static: bool,
    pub is_local: bool,
    pub has_init: bool,
}

impl Variable {
    pub fn is_pointer(&self) -> bool {
        self.value_type.pointer > 0
    }

    pub fn is_array_or_pointer(&self) -> bool {
        self.is_array || self.is_pointer()
    }

    pub fn dimension(&self, nr: usize) -> i64 {
        self.dimensions.get(nr).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct SymbolDatabase {
    pub scopes: Vec<Scope>,
    pub functions: Vec<Function>,
    pub variables: Vec<Variable>,
    /// Tokens the AST overlay must not parse (declaration prefixes,
    /// signatures, scope headers).
    pub ast_hints: AstHints,
}

impl SymbolDatabase {
    /// Indices of function scopes that have a body and an owning function.
    pub fn function_scopes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.scopes.len()).filter(|&i| {
            let s = &self.scopes[i];
            s.kind == ScopeKind::Function && s.function.is_some() && s.body_start.is_some()
        })
    }

    pub fn function_of_scope(&self, scope: usize) -> Option<&Function> {
        self.scopes[scope].function.map(|f| &self.functions[f])
    }
}

struct PendingFunction {
    func_idx: usize,
    scope_idx: usize,
    args: Vec<usize>,
}

struct Builder<'a> {
    list: &'a mut TokenList,
    db: SymbolDatabase,
    scope_stack: Vec<usize>,
    name_stack: Vec<HashMap<String, usize>>,
    functions_by_name: HashMap<String, usize>,
    next_var_id: u32,
    pending_function: Option<PendingFunction>,
    pending_class: Option<String>,
}

/// Build the database and annotate the tokens. `_lang` is carried for the
/// C++-only constructs the scanner recognizes but does not elaborate.
pub fn build(list: &mut TokenList, _lang: Language) -> SymbolDatabase {
    let mut builder = Builder {
        list,
        db: SymbolDatabase::default(),
        scope_stack: vec![0],
        name_stack: vec![HashMap::new()],
        functions_by_name: HashMap::new(),
        next_var_id: 1,
        pending_function: None,
        pending_class: None,
    };
    builder.db.scopes.push(Scope {
        kind: ScopeKind::Global,
        parent: None,
        body_start: None,
        body_end: None,
        function: None,
        variables: Vec::new(),
        class_name: None,
    });
    builder.run();
    builder.db
}

impl Builder<'_> {
    fn current_scope(&self) -> usize {
        *self.scope_stack.last().unwrap_or(&0)
    }

    fn skip(&mut self, id: TokenId) {
        self.db.ast_hints.skip.insert(id);
    }

    fn run(&mut self) {
        let mut cursor = self.list.front();
        while let Some(id) = cursor {
            let text = self.list.text(id).to_string();
            cursor = match text.as_str() {
                "{" => self.open_scope(id),
                "}" => self.close_scope(id),
                "namespace" => self.namespace_header(id),
                "struct" | "class" | "union" => self.record_header(id),
                _ if is_decl_start(&text) => self.try_declaration(id),
                _ if self.list.tok(id).kind == TokenKind::Name => self.resolve_name(id),
                _ => self.list.next(id),
            };
        }
    }

    fn open_scope(&mut self, brace: TokenId) -> Option<TokenId> {
        let (kind, function, class_name, arg_map) = if let Some(pending) = self.pending_function.take() {
            // Attach the body to the scope created at signature time.
            let scope_idx = pending.scope_idx;
            self.db.scopes[scope_idx].body_start = Some(brace);
            self.db.functions[pending.func_idx].scope = Some(scope_idx);
            self.scope_stack.push(scope_idx);
            let mut names = HashMap::new();
            for &var_idx in &pending.args {
                names.insert(self.db.variables[var_idx].name.clone(), var_idx);
            }
            self.name_stack.push(names);
            return self.list.next(brace);
        } else if let Some(name) = self.pending_class.take() {
            (ScopeKind::Class, None, Some(name), HashMap::new())
        } else {
            (ScopeKind::Block, None, None, HashMap::new())
        };
        let parent = self.current_scope();
        let idx = self.db.scopes.len();
        self.db.scopes.push(Scope {
            kind,
            parent: Some(parent),
            body_start: Some(brace),
            body_end: self.list.link(brace),
            function,
            variables: Vec::new(),
            class_name,
        });
        self.scope_stack.push(idx);
        self.name_stack.push(arg_map);
        self.list.next(brace)
    }

    fn close_scope(&mut self, brace: TokenId) -> Option<TokenId> {
        if self.scope_stack.len() > 1 {
            let idx = self.scope_stack.pop().unwrap();
            self.name_stack.pop();
            self.db.scopes[idx].body_end = Some(brace);
        }
        self.list.next(brace)
    }

    fn namespace_header(&mut self, keyword: TokenId) -> Option<TokenId> {
        self.skip(keyword);
        let mut cursor = self.list.next(keyword);
        while let Some(id) = cursor {
            if self.list.text(id) == "{" {
                // Namespaces share their parent's name resolution here.
                let parent = self.current_scope();
                let idx = self.db.scopes.len();
                self.db.scopes.push(Scope {
                    kind: ScopeKind::Namespace,
                    parent: Some(parent),
                    body_start: Some(id),
                    body_end: self.list.link(id),
                    function: None,
                    variables: Vec::new(),
                    class_name: None,
                });
                self.scope_stack.push(idx);
                self.name_stack.push(HashMap::new());
                return self.list.next(id);
            }
            self.skip(id);
            cursor = self.list.next(id);
        }
        cursor
    }

    fn record_header(&mut self, keyword: TokenId) -> Option<TokenId> {
        // `struct X {` opens a class scope; `struct X x;` is a declaration.
        let name = self.list.next(keyword)?;
        if self.list.tok(name).kind == TokenKind::Name {
            if let Some(brace) = self.list.next(name) {
                if self.list.text(brace) == "{" {
                    self.skip(keyword);
                    self.skip(name);
                    self.pending_class = Some(self.list.text(name).to_string());
                    return Some(brace);
                }
            }
            return self.try_declaration(keyword);
        }
        self.list.next(keyword)
    }

    /// Attempt to parse a declaration starting at `start`. Returns the
    /// continuation point; when `start` does not begin a declaration the
    /// token is left for the expression machinery.
    fn try_declaration(&mut self, start: TokenId) -> Option<TokenId> {
        // Collect the type prefix run.
        let mut type_tokens: Vec<TokenId> = Vec::new();
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let text = self.list.text(id);
            if is_decl_prefix(text) || (text == "*" && !type_tokens.is_empty()) {
                type_tokens.push(id);
                cursor = self.list.next(id);
                continue;
            }
            if self.list.tok(id).kind == TokenKind::Name
                && !type_tokens.is_empty()
                && self
                    .list
                    .prev(id)
                    .map(|p| matches!(self.list.text(p), "struct" | "class" | "union"))
                    .unwrap_or(false)
            {
                // Record tag name.
                type_tokens.push(id);
                cursor = self.list.next(id);
                continue;
            }
            break;
        }
        let name = cursor?;
        if type_tokens.is_empty()
            || self.list.tok(name).kind != TokenKind::Name
            || is_decl_prefix(self.list.text(name))
        {
            // Not a declaration after all (e.g. `sizeof (int)` interior).
            return self.list.next(start);
        }

        let after_name = self.list.next(name);
        if let Some(paren) = after_name.filter(|&p| self.list.text(p) == "(") {
            return self.function_signature(&type_tokens, name, paren);
        }

        self.variable_declarators(&type_tokens, name)
    }

    fn function_signature(
        &mut self,
        type_tokens: &[TokenId],
        name: TokenId,
        lparen: TokenId,
    ) -> Option<TokenId> {
        let rparen = self.list.link(lparen)?;
        let after = self.list.next(rparen);
        let is_definition = after.map(|a| self.list.text(a) == "{").unwrap_or(false);
        let is_prototype = after.map(|a| self.list.text(a) == ";").unwrap_or(false);
        if !is_definition && !is_prototype {
            // Call expression or something else; leave it alone.
            return self.list.next(name);
        }

        let func_name = self.list.text(name).to_string();
        let func_idx = match self.functions_by_name.get(&func_name) {
            // A definition after a prototype keeps the prototype's token,
            // so the id is the one every includer of the header sees.
            Some(&idx) => idx,
            None => {
                let idx = self.db.functions.len();
                let id = function_id(self.list, name);
                self.db.functions.push(Function {
                    name: func_name.clone(),
                    token_def: name,
                    args: Vec::new(),
                    scope: None,
                    id,
                    has_body: false,
                });
                self.functions_by_name.insert(func_name, idx);
                idx
            }
        };
        self.list.tok_mut(name).function = Some(func_idx);

        // The whole signature is invisible to the AST overlay.
        for &id in type_tokens {
            self.skip(id);
        }
        let mut sig = Some(name);
        while let Some(id) = sig {
            self.skip(id);
            if id == rparen {
                break;
            }
            sig = self.list.next(id);
        }

        if is_definition {
            let scope_idx = self.db.scopes.len();
            self.db.scopes.push(Scope {
                kind: ScopeKind::Function,
                parent: Some(self.current_scope()),
                body_start: None,
                body_end: None,
                function: Some(func_idx),
                variables: Vec::new(),
                class_name: None,
            });
            let args = self.parse_parameters(lparen, rparen, scope_idx);
            self.db.scopes[scope_idx].variables = args.clone();
            self.db.functions[func_idx].args = args.clone();
            self.db.functions[func_idx].has_body = true;
            self.pending_function = Some(PendingFunction {
                func_idx,
                scope_idx,
                args,
            });
        }
        self.list.next(rparen)
    }

    /// Parse `( type name , type name , ... )` of a definition, creating
    /// argument variables.
    fn parse_parameters(&mut self, lparen: TokenId, rparen: TokenId, scope_idx: usize) -> Vec<usize> {
        let mut args = Vec::new();
        let mut cursor = self.list.next(lparen);
        let mut param_type: Vec<TokenId> = Vec::new();
        let mut param_name: Option<TokenId> = None;
        let mut dims: Vec<i64> = Vec::new();
        loop {
            let Some(id) = cursor else { break };
            let end_of_param = id == rparen || self.list.text(id) == ",";
            if end_of_param {
                if let Some(name) = param_name.take() {
                    let texts: Vec<String> = param_type
                        .iter()
                        .map(|&t| self.list.text(t).to_string())
                        .collect();
                    let vt = ValueType::from_decl_tokens(texts.iter().map(String::as_str));
                    let var_idx = self.new_variable(name, scope_idx, vt, dims.clone(), true);
                    args.push(var_idx);
                }
                param_type.clear();
                dims.clear();
                if id == rparen {
                    break;
                }
                cursor = self.list.next(id);
                continue;
            }
            let text = self.list.text(id).to_string();
            if text == "[" {
                // Array parameter; dimension when given.
                let close = self.list.link(id);
                if let Some(close) = close {
                    if let Some(dim_tok) = self.list.next(id).filter(|&d| d != close) {
                        if let Ok(n) = self.list.text(dim_tok).parse::<i64>() {
                            dims.push(n);
                        }
                    } else {
                        dims.push(0);
                    }
                    cursor = self.list.next(close);
                    continue;
                }
            }
            if self.list.tok(id).kind == TokenKind::Name && !is_decl_prefix(&text) {
                param_name = Some(id);
            } else {
                param_type.push(id);
            }
            cursor = self.list.next(id);
        }
        args
    }

    fn variable_declarators(&mut self, type_tokens: &[TokenId], first_name: TokenId) -> Option<TokenId> {
        for &id in type_tokens {
            self.skip(id);
        }
        let base_type: Vec<String> = type_tokens
            .iter()
            .map(|&t| self.list.text(t).to_string())
            .collect();
        let is_static = base_type.iter().any(|t| t == "static");

        let mut name = Some(first_name);
        while let Some(name_tok) = name {
            let vt = ValueType::from_decl_tokens(base_type.iter().map(String::as_str));
            // Array dimensions.
            let mut dims = Vec::new();
            let mut cursor = self.list.next(name_tok);
            while let Some(br) = cursor.filter(|&b| self.list.text(b) == "[") {
                let Some(close) = self.list.link(br) else { break };
                match self.list.next(br).filter(|&d| d != close) {
                    Some(dim_tok) => {
                        dims.push(self.list.text(dim_tok).parse::<i64>().unwrap_or(0))
                    }
                    None => dims.push(0),
                }
                // Dimension tokens are not expressions of interest.
                let mut t = Some(br);
                while let Some(id) = t {
                    self.skip(id);
                    if id == close {
                        break;
                    }
                    t = self.list.next(id);
                }
                cursor = self.list.next(close);
            }

            let scope_idx = self.current_scope();
            let has_init = cursor.map(|c| self.list.text(c) == "=").unwrap_or(false);
            let var_idx = self.new_variable(name_tok, scope_idx, vt, dims, false);
            self.db.variables[var_idx].is_static = is_static;
            self.db.variables[var_idx].has_init = has_init;
            self.name_stack
                .last_mut()
                .unwrap()
                .insert(self.list.text(name_tok).to_string(), var_idx);
            self.db.scopes[scope_idx].variables.push(var_idx);

            // Walk the initializer, resolving the names it reads, until
            // the declarator list continues or the statement ends.
            name = None;
            let mut depth = 0usize;
            while let Some(id) = cursor {
                let text = self.list.text(id).to_string();
                match text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    ";" if depth == 0 => {
                        return self.list.next(id);
                    }
                    "," if depth == 0 => {
                        // Skip any `*`s of the next declarator.
                        let mut next = self.list.next(id);
                        while let Some(star) = next.filter(|&s| self.list.text(s) == "*") {
                            self.skip(star);
                            next = self.list.next(star);
                        }
                        name = next.filter(|&n| self.list.tok(n).kind == TokenKind::Name);
                        break;
                    }
                    _ => {
                        if self.list.tok(id).kind == TokenKind::Name {
                            self.resolve_name_token(id);
                        }
                    }
                }
                cursor = self.list.next(id);
            }
            if name.is_none() {
                break;
            }
        }
        // Unterminated declaration; resume after the first name.
        self.list.next(first_name)
    }

    fn new_variable(
        &mut self,
        name_tok: TokenId,
        scope: usize,
        mut value_type: ValueType,
        dims: Vec<i64>,
        is_argument: bool,
    ) -> usize {
        // `int a[3]` without a `*` still indexes like a pointer, but the
        // variable itself stays non-pointer; dimensions carry the size.
        let is_array = !dims.is_empty();
        if value_type.base == crate::tokenizer::valuetype::BaseType::Unknown {
            value_type = ValueType::int();
        }
        let var_id = self.next_var_id;
        self.next_var_id += 1;
        let idx = self.db.variables.len();
        let is_local = self.db.scopes[scope].is_executable() || is_argument;
        self.db.variables.push(Variable {
            name: self.list.text(name_tok).to_string(),
            decl_token: name_tok,
            scope,
            decl_id: var_id,
            value_type: value_type.clone(),
            is_array,
            dimensions: dims,
            is_argument,
            is_static: false,
            is_local,
            has_init: is_argument,
        });
        {
            let tok = self.list.tok_mut(name_tok);
            tok.var_id = var_id;
            tok.variable = Some(idx);
            tok.value_type = Some(value_type);
        }
        idx
    }

    fn resolve_name(&mut self, id: TokenId) -> Option<TokenId> {
        self.resolve_name_token(id);
        self.list.next(id)
    }

    /// Resolve one name token against the visible scopes, or against the
    /// known functions when it is a call.
    fn resolve_name_token(&mut self, id: TokenId) {
        if self.list.tok(id).var_id != 0 {
            return;
        }
        let text = self.list.text(id).to_string();
        for map in self.name_stack.iter().rev() {
            if let Some(&var_idx) = map.get(&text) {
                let var = &self.db.variables[var_idx];
                let decl_id = var.decl_id;
                let vt = var.value_type.clone();
                let tok = self.list.tok_mut(id);
                tok.var_id = decl_id;
                tok.variable = Some(var_idx);
                tok.value_type = Some(vt);
                return;
            }
        }
        let is_call = self
            .list
            .next(id)
            .map(|n| self.list.text(n) == "(")
            .unwrap_or(false);
        if is_call {
            if let Some(&func_idx) = self.functions_by_name.get(&text) {
                self.list.tok_mut(id).function = Some(func_idx);
            }
        }
    }
}

/// Stable `file:line:column` identifier of a definition token.
pub fn function_id(list: &TokenList, tok: TokenId) -> String {
    let t = list.tok(tok);
    format!("{}:{}:{}", list.file_of(tok), t.line, t.column)
}

fn is_decl_start(text: &str) -> bool {
    is_type_keyword(text) || matches!(text, "const" | "static" | "extern" | "volatile" | "inline" | "register")
}

fn is_decl_prefix(text: &str) -> bool {
    is_decl_start(text) || matches!(text, "struct" | "class" | "union")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TokenKind;

    fn lists(texts: &[&str]) -> TokenList {
        let mut list = TokenList::new(vec!["test.c".to_string()]);
        let mut line = 1;
        for (i, text) in texts.iter().enumerate() {
            if *text == "\n" {
                line += 1;
                continue;
            }
            let first = text.chars().next().unwrap();
            let kind = if first.is_ascii_alphabetic() || first == '_' {
                TokenKind::Name
            } else if first.is_ascii_digit() {
                TokenKind::Number
            } else {
                TokenKind::Op
            };
            list.push(*text, kind, 0, line, i as u32 + 1);
        }
        list.link_brackets().unwrap();
        list
    }

    #[test]
    fn local_variable_gets_var_id() {
        let mut list = lists(&["void", "f", "(", ")", "{", "int", "x", ";", "x", "=", "1", ";", "}"]);
        let db = build(&mut list, Language::C);
        let uses: Vec<u32> = list
            .iter()
            .filter(|&id| list.text(id) == "x")
            .map(|id| list.tok(id).var_id)
            .collect();
        assert_eq!(uses.len(), 2);
        assert!(uses[0] > 0);
        assert_eq!(uses[0], uses[1]);
        assert_eq!(db.variables.len(), 1);
        assert!(db.variables[0].is_local);
        assert!(!db.variables[0].has_init);
    }

    #[test]
    fn function_and_arguments_are_recorded() {
        let mut list = lists(&[
            "void", "f", "(", "int", "*", "p", ")", "{", "*", "p", "=", "1", ";", "}",
        ]);
        let db = build(&mut list, Language::C);
        assert_eq!(db.functions.len(), 1);
        let func = &db.functions[0];
        assert_eq!(func.name, "f");
        assert!(func.has_body);
        assert_eq!(func.arg_count(), 1);
        let arg = &db.variables[func.args[0]];
        assert!(arg.is_pointer());
        assert!(arg.is_argument);
        // The use of `p` in the body resolves to the argument.
        let body_p = list
            .iter()
            .filter(|&id| list.text(id) == "p")
            .last()
            .unwrap();
        assert_eq!(list.tok(body_p).var_id, arg.decl_id);
    }

    #[test]
    fn prototype_then_definition_share_the_id() {
        let mut list = lists(&[
            "void", "f", "(", "int", "*", "p", ")", ";", "\n", "void", "f", "(", "int", "*", "p",
            ")", "{", "}",
        ]);
        let db = build(&mut list, Language::C);
        assert_eq!(db.functions.len(), 1);
        let func = &db.functions[0];
        assert!(func.has_body);
        // token_def is the prototype's name token on line 1.
        assert_eq!(list.tok(func.token_def).line, 1);
        assert_eq!(func.id, "test.c:1:2");
    }

    #[test]
    fn call_resolves_to_known_function() {
        let mut list = lists(&[
            "void", "f", "(", "int", "x", ")", ";", "void", "g", "(", ")", "{", "f", "(", "0", ")",
            ";", "}",
        ]);
        let db = build(&mut list, Language::C);
        let call = list
            .iter()
            .filter(|&id| list.text(id) == "f")
            .last()
            .unwrap();
        let func_idx = list.tok(call).function.unwrap();
        assert_eq!(db.functions[func_idx].name, "f");
    }

    #[test]
    fn array_dimensions_are_parsed() {
        let mut list = lists(&["void", "f", "(", ")", "{", "int", "a", "[", "10", "]", ";", "}"]);
        let db = build(&mut list, Language::C);
        assert!(db.variables[0].is_array);
        assert_eq!(db.variables[0].dimension(0), 10);
    }

    #[test]
    fn scopes_nest_with_parents() {
        let mut list = lists(&["void", "f", "(", ")", "{", "{", "int", "x", ";", "}", "}"]);
        let db = build(&mut list, Language::C);
        assert_eq!(db.scopes.len(), 3);
        assert_eq!(db.scopes[1].kind, ScopeKind::Function);
        assert_eq!(db.scopes[2].kind, ScopeKind::Block);
        assert_eq!(db.scopes[2].parent, Some(1));
        assert!(db.scopes[1].is_executable());
    }

    #[test]
    fn initializer_names_resolve_against_earlier_declarations() {
        let mut list = lists(&[
            "void", "f", "(", ")", "{", "int", "x", ";", "int", "y", "=", "x", ";", "}",
        ]);
        let db = build(&mut list, Language::C);
        let xs: Vec<u32> = list
            .iter()
            .filter(|&id| list.text(id) == "x")
            .map(|id| list.tok(id).var_id)
            .collect();
        assert_eq!(xs.len(), 2);
        assert_ne!(xs[0], 0);
        assert_eq!(xs[0], xs[1]);
        assert!(db.variables.iter().any(|v| v.name == "y" && v.has_init));
    }

    #[test]
    fn initializer_calls_resolve_to_functions() {
        let mut list = lists(&[
            "int", "g", "(", ")", ";", "void", "f", "(", ")", "{", "int", "y", "=", "g", "(", ")",
            ";", "}",
        ]);
        build(&mut list, Language::C);
        let call = list
            .iter()
            .filter(|&id| list.text(id) == "g")
            .last()
            .unwrap();
        assert!(list.tok(call).function.is_some());
    }

    #[test]
    fn multiple_declarators_each_get_a_variable() {
        let mut list = lists(&["void", "f", "(", ")", "{", "int", "a", ",", "b", ";", "}"]);
        let db = build(&mut list, Language::C);
        let names: Vec<&str> = db.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
