//! Preprocessor: include resolution, conditional compilation, macro
//! expansion, directive capture and the TU checksum.
//!
//! The driver feeds the raw token stream through [`Preprocessor::load_files`]
//! once, then calls [`Preprocessor::preprocess`] once per configuration.
//! Fatal conditions surface as [`PreprocError`]; non-fatal ones are
//! collected and reported as advisories.

pub mod configs;
pub mod lexer;
pub mod suppressions;

pub use lexer::{lex, RawKind, RawToken};

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::Project;

const MAX_INCLUDE_DEPTH: usize = 400;

/// Classification of preprocessor outputs, mirroring the taxonomy the
/// driver branches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreprocErrorKind {
    Error,
    SyntaxError,
    IncludeNestedTooDeeply,
    UnhandledChar,
    ExplicitIncludeNotFound,
    Warning,
    MissingHeader,
    PortabilityBackslash,
}

impl PreprocErrorKind {
    /// Fatal outputs halt the TU with a `syntaxError` diagnostic.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            PreprocErrorKind::Error
                | PreprocErrorKind::SyntaxError
                | PreprocErrorKind::IncludeNestedTooDeeply
                | PreprocErrorKind::UnhandledChar
                | PreprocErrorKind::ExplicitIncludeNotFound
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PreprocError {
    pub kind: PreprocErrorKind,
    pub message: String,
    pub file_index: u32,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for PreprocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A captured directive line, kept for the dump file and define rules.
#[derive(Clone, Debug, PartialEq)]
pub struct Directive {
    pub name: String,
    /// Tokens after the directive name.
    pub tokens: Vec<RawToken>,
    pub file_index: u32,
    pub line: u32,
}

impl Directive {
    pub fn text(&self) -> String {
        let mut out = format!("#{}", self.name);
        for tok in &self.tokens {
            out.push(' ');
            out.push_str(&tok.text);
        }
        out
    }
}

/// Group the raw stream into directive lines (`#name ...`).
pub fn directive_lines(tokens: &[RawToken]) -> Vec<Directive> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        let line_start = i == 0
            || tokens[i - 1].line != tok.line
            || tokens[i - 1].file_index != tok.file_index;
        if tok.text == "#" && tok.kind == RawKind::Op && line_start {
            let (file_index, line) = (tok.file_index, tok.line);
            let mut j = i + 1;
            let mut body = Vec::new();
            while j < tokens.len()
                && tokens[j].file_index == file_index
                && tokens[j].line == line
            {
                if tokens[j].kind != RawKind::Comment {
                    body.push(tokens[j].clone());
                }
                j += 1;
            }
            let name = match body.first() {
                Some(t) if t.kind == RawKind::Name => t.text.clone(),
                _ => String::new(),
            };
            let rest = if body.is_empty() { body } else { body[1..].to_vec() };
            out.push(Directive {
                name,
                tokens: rest,
                file_index,
                line,
            });
            i = j;
            continue;
        }
        i += 1;
    }
    out
}

/// A preprocessor macro definition.
#[derive(Clone, Debug)]
struct Macro {
    params: Option<Vec<String>>,
    body: Vec<RawToken>,
}

pub struct Preprocessor<'a> {
    project: &'a Project,
    directives: Vec<Directive>,
    /// Non-fatal outputs collected during include resolution.
    outputs: Vec<PreprocError>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(project: &'a Project) -> Preprocessor<'a> {
        Preprocessor {
            project,
            directives: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn outputs(&self) -> &[PreprocError] {
        &self.outputs
    }

    /// Capture directives for the dump file and define rules.
    pub fn set_directives(&mut self, tokens: &[RawToken]) {
        self.directives = directive_lines(tokens);
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Resolve `#include` directives recursively, splicing the included
    /// files into the stream and extending `files`.
    pub fn load_files(
        &mut self,
        tokens: Vec<RawToken>,
        files: &mut Vec<String>,
    ) -> Result<Vec<RawToken>, PreprocError> {
        let mut out = Vec::new();
        self.splice_includes(tokens, files, 0, &mut out)?;
        // Forced includes (`--include=`) must exist.
        for forced in &self.project.force_includes {
            if !forced.exists() {
                return Err(PreprocError {
                    kind: PreprocErrorKind::ExplicitIncludeNotFound,
                    message: format!("Couldn't find the file \"{}\"", forced.display()),
                    file_index: 0,
                    line: 0,
                    col: 0,
                });
            }
        }
        Ok(out)
    }

    fn splice_includes(
        &mut self,
        tokens: Vec<RawToken>,
        files: &mut Vec<String>,
        depth: usize,
        out: &mut Vec<RawToken>,
    ) -> Result<(), PreprocError> {
        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            let line_start = i == 0
                || tokens[i - 1].line != tok.line
                || tokens[i - 1].file_index != tok.file_index;
            let is_include = line_start
                && tok.text == "#"
                && tokens
                    .get(i + 1)
                    .map(|t| t.text == "include" && t.line == tok.line)
                    .unwrap_or(false);
            if !is_include {
                out.push(tok.clone());
                i += 1;
                continue;
            }
            // Consume the whole directive line.
            let (file_index, line) = (tok.file_index, tok.line);
            let mut j = i + 2;
            let mut body: Vec<RawToken> = Vec::new();
            while j < tokens.len() && tokens[j].file_index == file_index && tokens[j].line == line {
                body.push(tokens[j].clone());
                j += 1;
            }
            i = j;
            let (header, local) = match parse_include_target(&body) {
                Some(pair) => pair,
                None => continue,
            };
            if header.contains('\\') {
                self.outputs.push(PreprocError {
                    kind: PreprocErrorKind::PortabilityBackslash,
                    message: format!(
                        "Include file \"{header}\" uses backslash as path separator"
                    ),
                    file_index,
                    line,
                    col: 1,
                });
            }
            if depth >= MAX_INCLUDE_DEPTH {
                return Err(PreprocError {
                    kind: PreprocErrorKind::IncludeNestedTooDeeply,
                    message: "#include nested too deeply".to_string(),
                    file_index,
                    line,
                    col: 1,
                });
            }
            let current_file = files.get(file_index as usize).cloned().unwrap_or_default();
            match self.resolve_include(&header, local, &current_file) {
                Some(path) => {
                    let path_str = path.to_string_lossy().into_owned();
                    let new_index = match files.iter().position(|f| *f == path_str) {
                        Some(idx) => idx as u32,
                        None => {
                            files.push(path_str.clone());
                            (files.len() - 1) as u32
                        }
                    };
                    match std::fs::read_to_string(&path) {
                        Ok(content) => {
                            debug!(header = %header, "including");
                            let included = lexer::lex(&content, new_index)?;
                            self.splice_includes(included, files, depth + 1, out)?;
                        }
                        Err(err) => self.outputs.push(PreprocError {
                            kind: PreprocErrorKind::MissingHeader,
                            message: format!("Header not readable: {header}: {err}"),
                            file_index,
                            line,
                            col: 1,
                        }),
                    }
                }
                None => self.outputs.push(PreprocError {
                    kind: PreprocErrorKind::MissingHeader,
                    message: format!("Include file: \"{header}\" not found."),
                    file_index,
                    line,
                    col: 1,
                }),
            }
        }
        Ok(())
    }

    fn resolve_include(&self, header: &str, local: bool, current_file: &str) -> Option<PathBuf> {
        if local {
            let dir = Path::new(current_file).parent().unwrap_or(Path::new("."));
            let candidate = dir.join(header);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        for dir in &self.project.include_paths {
            let candidate = dir.join(header);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Enumerate configurations for the TU.
    pub fn get_configs(&self, tokens: &[RawToken], files: &[String]) -> BTreeSet<String> {
        configs::get_configs(
            tokens,
            &self.project.user_undefs,
            files,
            &self.project.config_excludes,
        )
    }

    /// Select the configuration's branches, expand macros, drop the
    /// directives. The result is what the tokenizer consumes.
    pub fn preprocess(
        &self,
        tokens: &[RawToken],
        cfg: &str,
        _files: &[String],
    ) -> Result<Vec<RawToken>, PreprocError> {
        let mut macros: HashMap<String, Macro> = HashMap::new();
        for element in cfg.split(';').filter(|e| !e.is_empty()) {
            let (name, value) = match element.split_once('=') {
                Some((n, v)) => (n, v),
                None => (element, "1"),
            };
            if self.project.user_undefs.contains(name) {
                continue;
            }
            macros.insert(
                name.to_string(),
                Macro {
                    params: None,
                    body: vec![RawToken::new(value, RawKind::Number, 0, 0, 0)],
                },
            );
        }

        struct Frame {
            active: bool,
            taken: bool,
            parent_active: bool,
        }
        let mut frames: Vec<Frame> = Vec::new();
        let mut out: Vec<RawToken> = Vec::new();
        let mut segment: Vec<RawToken> = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            if tok.kind == RawKind::Comment {
                i += 1;
                continue;
            }
            let line_start = i == 0
                || tokens[i - 1].line != tok.line
                || tokens[i - 1].file_index != tok.file_index;
            if !(tok.text == "#" && line_start) {
                if frames.iter().all(|f| f.active) {
                    segment.push(tok.clone());
                }
                i += 1;
                continue;
            }
            // Flush the pending code segment under the current macro table.
            expand_tokens(&segment, &macros, &mut Vec::new(), &mut out);
            segment.clear();

            // Collect the directive line.
            let (file_index, line) = (tok.file_index, tok.line);
            let mut body: Vec<RawToken> = Vec::new();
            let mut j = i + 1;
            while j < tokens.len() && tokens[j].file_index == file_index && tokens[j].line == line {
                if tokens[j].kind != RawKind::Comment {
                    body.push(tokens[j].clone());
                }
                j += 1;
            }
            i = j;
            let name = match body.first() {
                Some(t) if t.kind == RawKind::Name => t.text.clone(),
                _ => continue,
            };
            let rest = &body[1..];
            let active = frames.iter().all(|f| f.active);
            match name.as_str() {
                "define" if active => {
                    self.handle_define(rest, &mut macros);
                }
                "undef" if active => {
                    if let Some(name_tok) = rest.first() {
                        macros.remove(&name_tok.text);
                    }
                }
                "ifdef" | "ifndef" => {
                    let parent_active = active;
                    let defined = rest
                        .first()
                        .map(|t| macros.contains_key(&t.text))
                        .unwrap_or(false);
                    let cond = if name == "ifdef" { defined } else { !defined };
                    frames.push(Frame {
                        active: parent_active && cond,
                        taken: cond,
                        parent_active,
                    });
                }
                "if" => {
                    let parent_active = active;
                    let cond = parent_active && eval_condition(rest, &macros) != 0;
                    frames.push(Frame {
                        active: cond,
                        taken: cond,
                        parent_active,
                    });
                }
                "elif" => match frames.last_mut() {
                    Some(frame) => {
                        if frame.taken {
                            frame.active = false;
                        } else {
                            let cond = frame.parent_active && eval_condition(rest, &macros) != 0;
                            frame.active = cond;
                            frame.taken = cond;
                        }
                    }
                    None => {
                        return Err(directive_error(tok, "#elif without #if"));
                    }
                },
                "else" => match frames.last_mut() {
                    Some(frame) => {
                        frame.active = frame.parent_active && !frame.taken;
                        frame.taken = true;
                    }
                    None => {
                        return Err(directive_error(tok, "#else without #if"));
                    }
                },
                "endif" => {
                    if frames.pop().is_none() {
                        return Err(directive_error(tok, "#endif without #if"));
                    }
                }
                "error" if active => {
                    let text: Vec<String> = rest.iter().map(|t| t.text.clone()).collect();
                    return Err(PreprocError {
                        kind: PreprocErrorKind::Error,
                        message: format!("#error {}", text.join(" ")),
                        file_index,
                        line,
                        col: 1,
                    });
                }
                // include was resolved earlier; pragma/line/warning carry
                // nothing for the analysis.
                _ => {}
            }
        }
        expand_tokens(&segment, &macros, &mut Vec::new(), &mut out);
        Ok(out)
    }

    fn handle_define(&self, rest: &[RawToken], macros: &mut HashMap<String, Macro>) {
        let Some(name_tok) = rest.first() else { return };
        if name_tok.kind != RawKind::Name {
            return;
        }
        if self.project.user_undefs.contains(&name_tok.text) {
            return;
        }
        // Function-like only when `(` is glued to the name.
        let is_function = rest
            .get(1)
            .map(|t| t.text == "(" && t.col == name_tok.col + name_tok.text.chars().count() as u32)
            .unwrap_or(false);
        if is_function {
            let mut params = Vec::new();
            let mut idx = 2;
            while idx < rest.len() && rest[idx].text != ")" {
                if rest[idx].kind == RawKind::Name {
                    params.push(rest[idx].text.clone());
                }
                idx += 1;
            }
            let body = rest.get(idx + 1..).unwrap_or(&[]).to_vec();
            macros.insert(
                name_tok.text.clone(),
                Macro {
                    params: Some(params),
                    body,
                },
            );
        } else {
            macros.insert(
                name_tok.text.clone(),
                Macro {
                    params: None,
                    body: rest[1..].to_vec(),
                },
            );
        }
    }

    /// `-E` mode: render the preprocessed token stream as text.
    pub fn getcode(
        &self,
        tokens: &[RawToken],
        cfg: &str,
        files: &[String],
    ) -> Result<String, PreprocError> {
        let processed = self.preprocess(tokens, cfg, files)?;
        let mut out = String::new();
        let mut last_line = 1u32;
        let mut last_file = u32::MAX;
        for tok in &processed {
            if tok.file_index != last_file {
                last_file = tok.file_index;
                last_line = tok.line;
                if !out.is_empty() {
                    out.push('\n');
                }
            } else if tok.line != last_line {
                let gap = tok.line.saturating_sub(last_line).min(2);
                for _ in 0..gap.max(1) {
                    out.push('\n');
                }
                last_line = tok.line;
            } else if !out.is_empty() && !out.ends_with('\n') {
                out.push(' ');
            }
            out.push_str(&tok.text);
        }
        out.push('\n');
        Ok(out)
    }

    /// Deterministic checksum over the token stream and tool state.
    pub fn calculate_checksum(tokens: &[RawToken], toolinfo: &str) -> u32 {
        let mut hasher = Sha256::new();
        hasher.update(toolinfo.as_bytes());
        for tok in tokens {
            if tok.kind == RawKind::Comment {
                continue;
            }
            hasher.update(tok.text.as_bytes());
            hasher.update(tok.file_index.to_le_bytes());
            hasher.update(tok.line.to_le_bytes());
            hasher.update([0x1f]);
        }
        let digest = hasher.finalize();
        u32::from_le_bytes(digest[..4].try_into().expect("digest is 32 bytes"))
    }

    /// Drop comment tokens.
    pub fn strip_comments(tokens: Vec<RawToken>) -> Vec<RawToken> {
        tokens
            .into_iter()
            .filter(|t| t.kind != RawKind::Comment)
            .collect()
    }
}

fn directive_error(tok: &RawToken, message: &str) -> PreprocError {
    PreprocError {
        kind: PreprocErrorKind::SyntaxError,
        message: message.to_string(),
        file_index: tok.file_index,
        line: tok.line,
        col: tok.col,
    }
}

fn parse_include_target(body: &[RawToken]) -> Option<(String, bool)> {
    let first = body.first()?;
    if first.kind == RawKind::Str {
        let header = first.text.trim_matches('"').to_string();
        return Some((header, true));
    }
    if first.text == "<" {
        let mut header = String::new();
        for tok in &body[1..] {
            if tok.text == ">" {
                return Some((header, false));
            }
            header.push_str(&tok.text);
        }
    }
    None
}

/// Expand macros in `input`, appending to `out`. `banned` holds the names
/// currently being expanded, preventing recursion.
fn expand_tokens(
    input: &[RawToken],
    macros: &HashMap<String, Macro>,
    banned: &mut Vec<String>,
    out: &mut Vec<RawToken>,
) {
    let mut i = 0;
    while i < input.len() {
        let tok = &input[i];
        if tok.kind != RawKind::Name || banned.contains(&tok.text) {
            out.push(tok.clone());
            i += 1;
            continue;
        }
        let Some(mac) = macros.get(&tok.text) else {
            out.push(tok.clone());
            i += 1;
            continue;
        };
        match &mac.params {
            None => {
                let body = relocate(&paste_tokens(&mac.body), tok);
                banned.push(tok.text.clone());
                expand_tokens(&body, macros, banned, out);
                banned.pop();
                i += 1;
            }
            Some(params) => {
                // A function-like macro name without `(` is a plain token.
                if input.get(i + 1).map(|t| t.text != "(").unwrap_or(true) {
                    out.push(tok.clone());
                    i += 1;
                    continue;
                }
                let (args, consumed) = collect_arguments(input, i + 1);
                let substituted = substitute(&mac.body, params, &args);
                let body = relocate(&paste_tokens(&substituted), tok);
                banned.push(tok.text.clone());
                expand_tokens(&body, macros, banned, out);
                banned.pop();
                i += 1 + consumed;
            }
        }
    }
}

/// Collect `( a , b , ... )` starting at `start` (the `(`). Returns the
/// argument token lists and the number of tokens consumed.
fn collect_arguments(input: &[RawToken], start: usize) -> (Vec<Vec<RawToken>>, usize) {
    let mut args: Vec<Vec<RawToken>> = Vec::new();
    let mut current: Vec<RawToken> = Vec::new();
    let mut depth = 0usize;
    let mut i = start;
    while i < input.len() {
        let text = input[i].text.as_str();
        match text {
            "(" => {
                if depth > 0 {
                    current.push(input[i].clone());
                }
                depth += 1;
            }
            ")" => {
                depth -= 1;
                if depth == 0 {
                    if !current.is_empty() || !args.is_empty() {
                        args.push(current);
                    }
                    return (args, i - start + 1);
                }
                current.push(input[i].clone());
            }
            "," if depth == 1 => {
                args.push(std::mem::take(&mut current));
            }
            _ => current.push(input[i].clone()),
        }
        i += 1;
    }
    (args, i - start)
}

/// Replace parameters in a function-like body; handles `#` stringize.
fn substitute(body: &[RawToken], params: &[String], args: &[Vec<RawToken>]) -> Vec<RawToken> {
    let arg_of = |name: &str| -> Option<&Vec<RawToken>> {
        params.iter().position(|p| p == name).and_then(|i| args.get(i))
    };
    let mut out = Vec::new();
    let mut i = 0;
    while i < body.len() {
        let tok = &body[i];
        if tok.text == "#" && i + 1 < body.len() {
            if let Some(arg) = arg_of(&body[i + 1].text) {
                let text: Vec<String> = arg.iter().map(|t| t.text.clone()).collect();
                out.push(RawToken::new(
                    format!("\"{}\"", text.join(" ")),
                    RawKind::Str,
                    tok.file_index,
                    tok.line,
                    tok.col,
                ));
                i += 2;
                continue;
            }
        }
        if tok.kind == RawKind::Name {
            if let Some(arg) = arg_of(&tok.text) {
                out.extend(arg.iter().cloned());
                i += 1;
                continue;
            }
        }
        out.push(tok.clone());
        i += 1;
    }
    out
}

/// Apply `##` token pasting.
fn paste_tokens(body: &[RawToken]) -> Vec<RawToken> {
    let mut out: Vec<RawToken> = Vec::new();
    let mut i = 0;
    while i < body.len() {
        if body[i].text == "##" && !out.is_empty() && i + 1 < body.len() {
            let prev = out.pop().unwrap();
            let next = &body[i + 1];
            let text = format!("{}{}", prev.text, next.text);
            let kind = if text.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                RawKind::Number
            } else if text
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic() || c == '_')
                .unwrap_or(false)
            {
                RawKind::Name
            } else {
                RawKind::Op
            };
            out.push(RawToken::new(text, kind, prev.file_index, prev.line, prev.col));
            i += 2;
            continue;
        }
        out.push(body[i].clone());
        i += 1;
    }
    out
}

/// Expanded tokens report the invocation site.
fn relocate(tokens: &[RawToken], site: &RawToken) -> Vec<RawToken> {
    tokens
        .iter()
        .map(|t| {
            let mut t = t.clone();
            t.file_index = site.file_index;
            t.line = site.line;
            t.col = site.col;
            t
        })
        .collect()
}

/// Evaluate a `#if`/`#elif` condition to an integer.
fn eval_condition(tokens: &[RawToken], macros: &HashMap<String, Macro>) -> i64 {
    let mut eval = CondEval {
        toks: tokens,
        pos: 0,
        macros,
    };
    eval.expression(0).unwrap_or(0)
}

struct CondEval<'a> {
    toks: &'a [RawToken],
    pos: usize,
    macros: &'a HashMap<String, Macro>,
}

impl CondEval<'_> {
    fn peek(&self) -> Option<&RawToken> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<&RawToken> {
        let tok = self.toks.get(self.pos);
        self.pos += 1;
        tok
    }

    fn expression(&mut self, min_bp: u8) -> Option<i64> {
        let mut lhs = self.prefix()?;
        loop {
            let Some(op) = self.peek() else { break };
            let text = op.text.clone();
            if text == "?" {
                if 2 < min_bp {
                    break;
                }
                self.bump();
                let then_v = self.expression(0)?;
                if self.peek().map(|t| t.text != ":").unwrap_or(true) {
                    return None;
                }
                self.bump();
                let else_v = self.expression(1)?;
                lhs = if lhs != 0 { then_v } else { else_v };
                continue;
            }
            let Some((l_bp, r_bp)) = cond_binding(&text) else { break };
            if l_bp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.expression(r_bp)?;
            lhs = apply_binary(&text, lhs, rhs)?;
        }
        Some(lhs)
    }

    fn prefix(&mut self) -> Option<i64> {
        let tok = self.bump()?.clone();
        match tok.text.as_str() {
            "!" => Some((self.expression(23)? == 0) as i64),
            "~" => Some(!self.expression(23)?),
            "-" => Some(-self.expression(23)?),
            "+" => self.expression(23),
            "(" => {
                let v = self.expression(0)?;
                if self.peek().map(|t| t.text == ")").unwrap_or(false) {
                    self.bump();
                }
                Some(v)
            }
            "defined" => {
                let mut name = self.bump()?.clone();
                if name.text == "(" {
                    name = self.bump()?.clone();
                    if self.peek().map(|t| t.text == ")").unwrap_or(false) {
                        self.bump();
                    }
                }
                Some(self.macros.contains_key(&name.text) as i64)
            }
            _ => match tok.kind {
                RawKind::Number => parse_int(&tok.text),
                RawKind::Char => Some(char_value(&tok.text)),
                RawKind::Name => {
                    // Object-like macro with a numeric body, else 0.
                    match self.macros.get(&tok.text) {
                        Some(mac) if mac.params.is_none() => {
                            let mut inner = CondEval {
                                toks: &mac.body,
                                pos: 0,
                                macros: self.macros,
                            };
                            inner.expression(0).or(Some(0))
                        }
                        _ => Some(0),
                    }
                }
                _ => None,
            },
        }
    }
}

fn cond_binding(text: &str) -> Option<(u8, u8)> {
    Some(match text {
        "||" => (3, 4),
        "&&" => (5, 6),
        "|" => (7, 8),
        "^" => (9, 10),
        "&" => (11, 12),
        "==" | "!=" => (13, 14),
        "<" | "<=" | ">" | ">=" => (15, 16),
        "<<" | ">>" => (17, 18),
        "+" | "-" => (19, 20),
        "*" | "/" | "%" => (21, 22),
        _ => return None,
    })
}

fn apply_binary(op: &str, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        "||" => ((a != 0) || (b != 0)) as i64,
        "&&" => ((a != 0) && (b != 0)) as i64,
        "|" => a | b,
        "^" => a ^ b,
        "&" => a & b,
        "==" => (a == b) as i64,
        "!=" => (a != b) as i64,
        "<" => (a < b) as i64,
        "<=" => (a <= b) as i64,
        ">" => (a > b) as i64,
        ">=" => (a >= b) as i64,
        "<<" => a.checked_shl(b.try_into().ok()?)?,
        ">>" => a.checked_shr(b.try_into().ok()?)?,
        "+" => a.checked_add(b)?,
        "-" => a.checked_sub(b)?,
        "*" => a.checked_mul(b)?,
        "/" => a.checked_div(b)?,
        "%" => a.checked_rem(b)?,
        _ => return None,
    })
}

/// Parse a C integer literal (decimal, hex, octal; suffixes ignored).
pub fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text
        .trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'));
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if trimmed.len() > 1 && trimmed.starts_with('0') && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return i64::from_str_radix(&trimmed[1..], 8).ok();
    }
    trimmed.parse().ok()
}

fn char_value(text: &str) -> i64 {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project::new()
    }

    fn preprocess_str(src: &str, cfg: &str) -> Vec<String> {
        let project = project();
        let pp = Preprocessor::new(&project);
        let toks = lex(src, 0).unwrap();
        pp.preprocess(&toks, cfg, &["test.c".to_string()])
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn conditional_selection_follows_configuration() {
        let src = "#ifdef A\nint a;\n#else\nint b;\n#endif\n";
        assert_eq!(preprocess_str(src, "A"), vec!["int", "a", ";"]);
        assert_eq!(preprocess_str(src, ""), vec!["int", "b", ";"]);
    }

    #[test]
    fn object_macro_expands() {
        let src = "#define N 10\nint a[N];\n";
        assert_eq!(
            preprocess_str(src, ""),
            vec!["int", "a", "[", "10", "]", ";"]
        );
    }

    #[test]
    fn function_macro_expands_arguments() {
        let src = "#define MAX(a,b) ((a)>(b)?(a):(b))\nx = MAX(1, y);\n";
        let texts = preprocess_str(src, "");
        assert_eq!(
            texts.join(" "),
            "x = ( ( 1 ) > ( y ) ? ( 1 ) : ( y ) ) ;"
        );
    }

    #[test]
    fn nested_macro_expansion_terminates() {
        let src = "#define A B\n#define B A\nint x = A;\n";
        // Recursive definitions must not loop; the banned set stops them.
        let texts = preprocess_str(src, "");
        assert_eq!(texts, vec!["int", "x", "=", "A", ";"]);
    }

    #[test]
    fn stringize_and_paste() {
        let src = "#define S(x) #x\n#define CAT(a,b) a##b\nchar *s = S(hi); int CAT(v,1);\n";
        let texts = preprocess_str(src, "");
        assert!(texts.contains(&"\"hi\"".to_string()));
        assert!(texts.contains(&"v1".to_string()));
    }

    #[test]
    fn if_expression_evaluates() {
        let src = "#define V 3\n#if V > 2\nint yes;\n#endif\n#if V > 5\nint no;\n#endif\n";
        let texts = preprocess_str(src, "");
        assert_eq!(texts, vec!["int", "yes", ";"]);
    }

    #[test]
    fn elif_chains_take_first_true_branch() {
        let src = "#if defined(A)\nint a;\n#elif defined(B)\nint b;\n#else\nint c;\n#endif\n";
        assert_eq!(preprocess_str(src, "B"), vec!["int", "b", ";"]);
        assert_eq!(preprocess_str(src, "A;B"), vec!["int", "a", ";"]);
        assert_eq!(preprocess_str(src, ""), vec!["int", "c", ";"]);
    }

    #[test]
    fn error_directive_is_fatal() {
        let project = project();
        let pp = Preprocessor::new(&project);
        let toks = lex("#ifdef A\n#error bad config\n#endif\n", 0).unwrap();
        let err = pp
            .preprocess(&toks, "A", &["t.c".to_string()])
            .unwrap_err();
        assert_eq!(err.kind, PreprocErrorKind::Error);
        assert!(err.kind.is_fatal());
        assert!(err.message.contains("bad config"));
        // Inactive branch: no error.
        assert!(pp.preprocess(&toks, "", &["t.c".to_string()]).is_ok());
    }

    #[test]
    fn unbalanced_endif_is_a_syntax_error() {
        let project = project();
        let pp = Preprocessor::new(&project);
        let toks = lex("#endif\n", 0).unwrap();
        let err = pp.preprocess(&toks, "", &["t.c".to_string()]).unwrap_err();
        assert_eq!(err.kind, PreprocErrorKind::SyntaxError);
    }

    #[test]
    fn checksum_is_stable_and_location_sensitive() {
        let t1 = lex("int x = 1;", 0).unwrap();
        let t2 = lex("int x = 1;", 0).unwrap();
        let t3 = lex("int  x  =  2;", 0).unwrap();
        assert_eq!(
            Preprocessor::calculate_checksum(&t1, "tool"),
            Preprocessor::calculate_checksum(&t2, "tool")
        );
        assert_ne!(
            Preprocessor::calculate_checksum(&t1, "tool"),
            Preprocessor::calculate_checksum(&t3, "tool")
        );
        assert_ne!(
            Preprocessor::calculate_checksum(&t1, "tool"),
            Preprocessor::calculate_checksum(&t1, "other")
        );
    }

    #[test]
    fn comments_do_not_affect_the_checksum() {
        let t1 = lex("int x; // note", 0).unwrap();
        let t2 = lex("int x;", 0).unwrap();
        assert_eq!(
            Preprocessor::calculate_checksum(&t1, "t"),
            Preprocessor::calculate_checksum(&t2, "t")
        );
    }

    #[test]
    fn directive_lines_capture_defines() {
        let toks = lex("#define A 1\nint x;\n#ifdef A\n#endif\n", 0).unwrap();
        let dirs = directive_lines(&toks);
        let names: Vec<&str> = dirs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["define", "ifdef", "endif"]);
        assert_eq!(dirs[0].text(), "#define A 1");
    }

    #[test]
    fn getcode_renders_lines() {
        let project = project();
        let pp = Preprocessor::new(&project);
        let toks = lex("#define N 2\nint a;\nint b[N];\n", 0).unwrap();
        let code = pp.getcode(&toks, "", &["t.c".to_string()]).unwrap();
        assert!(code.contains("int a ;"));
        assert!(code.contains("int b [ 2 ] ;"));
    }

    #[test]
    fn parse_int_handles_bases_and_suffixes() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("0x1f"), Some(31));
        assert_eq!(parse_int("010"), Some(8));
        assert_eq!(parse_int("7u"), Some(7));
        assert_eq!(parse_int("100UL"), Some(100));
    }
}
