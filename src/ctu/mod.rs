//! Cross-translation-unit summaries.
//!
//! Each TU records the calls it makes with interesting argument values,
//! the calls that merely forward a pointer argument, and per-check unsafe
//! usages. The whole-program phase joins the summaries through
//! [`find_path`], walking from an unsafe read up the call graph to a call
//! site that supplies an invalid value.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::analyzerinfo::write_atomic;
use crate::checks::{Check, FileInfo};
use crate::diagnostics::xml::{escape_xml, XmlNode};
use crate::diagnostics::{ErrorMessage, FileLocation};
use crate::symbols;
use crate::tokenizer::Tokenizer;
use crate::tokens::ast::get_arguments;
use crate::tokens::{TokenId, TokenList};
use crate::valueflow::value::ValuePayload;

/// Hard recursion cap for [`find_path`], regardless of configuration.
pub const MAX_FIND_PATH_DEPTH: usize = 10;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn of(list: &TokenList, tok: TokenId) -> Location {
        let t = list.tok(tok);
        Location {
            file: list.file_of(tok).to_string(),
            line: t.line,
            column: t.column,
        }
    }

    pub fn to_file_location(&self) -> FileLocation {
        FileLocation::new(self.file.clone(), self.line, self.column)
    }
}

/// A call with a concrete argument value worth tracking.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCallRec {
    /// Callee function id (`file:line:column` of its declaration).
    pub call_id: String,
    pub call_function_name: String,
    /// 1-based argument index.
    pub call_arg_nr: u32,
    pub call_argument_expression: String,
    /// Payload tag of the recorded value.
    pub call_value_tag: u8,
    pub call_arg_value: i64,
    pub location: Location,
    /// Value is conditional: reportable only at warning severity.
    pub warning: bool,
    pub call_value_path: Vec<FileLocation>,
}

/// A function that forwards its own argument into a nested call.
#[derive(Clone, Debug, PartialEq)]
pub struct NestedCallRec {
    pub call_id: String,
    pub call_function_name: String,
    pub call_arg_nr: u32,
    pub location: Location,
    /// The forwarding function and its argument.
    pub my_id: String,
    pub my_arg_nr: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CallRecord {
    Call(FunctionCallRec),
    Nested(NestedCallRec),
}

impl CallRecord {
    pub fn call_id(&self) -> &str {
        match self {
            CallRecord::Call(c) => &c.call_id,
            CallRecord::Nested(n) => &n.call_id,
        }
    }

    pub fn call_arg_nr(&self) -> u32 {
        match self {
            CallRecord::Call(c) => c.call_arg_nr,
            CallRecord::Nested(n) => n.call_arg_nr,
        }
    }

    pub fn call_function_name(&self) -> &str {
        match self {
            CallRecord::Call(c) => &c.call_function_name,
            CallRecord::Nested(n) => &n.call_function_name,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            CallRecord::Call(c) => &c.location,
            CallRecord::Nested(n) => &n.location,
        }
    }
}

/// An argument that is read before any write inside its function.
#[derive(Clone, Debug, PartialEq)]
pub struct UnsafeUsage {
    pub my_id: String,
    pub my_arg_nr: u32,
    pub my_arg_name: String,
    pub location: Location,
    pub value: i64,
}

/// The predicate a caller's value must satisfy to make an unsafe usage
/// reportable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidValueKind {
    Null,
    Uninit,
    BufferOverflow,
}

pub type CallsMap = im::HashMap<String, Vec<CallRecord>>;

/// Per-TU summary, persisted as the analyzer-info file.
#[derive(Debug, Default)]
pub struct CtuInfo {
    pub source_file: String,
    pub file_size: u64,
    pub analyzer_file: Option<PathBuf>,
    pub checksum: u32,
    pub function_calls: Vec<FunctionCallRec>,
    pub nested_calls: Vec<NestedCallRec>,
    /// Diagnostics already emitted for this TU, replayed on cache hits.
    pub errors: Vec<ErrorMessage>,
    check_info: BTreeMap<String, FileInfo>,
}

impl CtuInfo {
    pub fn new(source_file: impl Into<String>, file_size: u64, analyzer_file: Option<PathBuf>) -> CtuInfo {
        CtuInfo {
            source_file: source_file.into(),
            file_size,
            analyzer_file,
            ..CtuInfo::default()
        }
    }

    pub fn add_check_info(&mut self, check: impl Into<String>, info: FileInfo) {
        self.check_info.insert(check.into(), info);
    }

    pub fn get_check_info(&self, check: &str) -> Option<&FileInfo> {
        self.check_info.get(check)
    }

    pub fn check_info(&self) -> impl Iterator<Item = (&String, &FileInfo)> {
        self.check_info.iter()
    }

    pub fn report_err(&mut self, msg: ErrorMessage) {
        self.errors.push(msg);
    }

    /// Scan the analyzed TU and record function calls and nested calls.
    pub fn parse_tokens(&mut self, tokenizer: &Tokenizer<'_>) {
        let Some(symbols) = tokenizer.symbol_database() else {
            return;
        };
        let list = &tokenizer.list;

        for scope_idx in symbols.function_scopes() {
            let scope = &symbols.scopes[scope_idx];
            let function = symbols.function_of_scope(scope_idx).expect("function scope");
            let (Some(start), Some(end)) = (scope.body_start, scope.body_end) else {
                continue;
            };

            let mut cursor = list.next(start);
            while let Some(tok) = cursor {
                if tok == end {
                    break;
                }
                cursor = list.next(tok);
                if list.text(tok) != "(" {
                    continue;
                }
                let t = list.tok(tok);
                let (Some(callee), Some(_args_root)) = (t.ast_op1, t.ast_op2) else {
                    continue;
                };
                let Some(callee_func) = list.tok(callee).function else {
                    continue;
                };
                let callee_func = &symbols.functions[callee_func];
                let args = get_arguments(list, tok);
                for (argnr, &argtok) in args.iter().enumerate() {
                    self.record_argument(
                        list,
                        symbols,
                        &tokenizer.project.platform,
                        tok,
                        callee_func,
                        argnr as u32 + 1,
                        argtok,
                    );
                }
            }

            // Nested calls: arguments forwarded as-is.
            for (argnr, &arg_var_idx) in function.args.iter().enumerate() {
                let arg_var = &symbols.variables[arg_var_idx];
                if !arg_var.is_pointer() {
                    continue;
                }
                if let Some(nested) =
                    self.find_nested_call(list, symbols, scope_idx, function, argnr as u32 + 1, arg_var.decl_id)
                {
                    self.nested_calls.push(nested);
                }
            }
        }
        debug!(
            calls = self.function_calls.len(),
            nested = self.nested_calls.len(),
            "parsed CTU records"
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn record_argument(
        &mut self,
        list: &TokenList,
        symbols: &symbols::SymbolDatabase,
        platform: &crate::config::Platform,
        call_paren: TokenId,
        callee: &symbols::Function,
        arg_nr: u32,
        argtok: TokenId,
    ) {
        let location = Location::of(list, call_paren);
        let call_function_name = list
            .tok(call_paren)
            .ast_op1
            .map(|c| list.expression_string(c))
            .unwrap_or_default();

        // Interesting values on the argument expression itself.
        for value in &list.tok(argtok).values {
            let interesting = (value.int_payload() == Some(0) && !value.is_inconclusive())
                || value.is_buffer_size();
            if !interesting || value.is_impossible() {
                continue;
            }
            let call_value_path = value
                .error_path
                .iter()
                .map(|(tok, info)| {
                    let mut loc = list.location(*tok);
                    loc.info = info.clone();
                    loc
                })
                .collect();
            self.function_calls.push(FunctionCallRec {
                call_id: callee.id.clone(),
                call_function_name: call_function_name.clone(),
                call_arg_nr: arg_nr,
                call_argument_expression: list.expression_string(argtok),
                call_value_tag: value.payload.tag(),
                call_arg_value: value.numeric_payload(),
                location: location.clone(),
                warning: !value.error_severity(),
                call_value_path,
            });
        }

        // Array argument: a known buffer size.
        if let Some(var_idx) = list.tok(argtok).variable {
            let var = &symbols.variables[var_idx];
            if var.is_array && var.dimensions.len() == 1 && var.dimension(0) > 1 {
                let elem = var.value_type.type_size(platform) as i64;
                if elem > 0 {
                    self.function_calls.push(FunctionCallRec {
                        call_id: callee.id.clone(),
                        call_function_name: call_function_name.clone(),
                        call_arg_nr: arg_nr,
                        call_argument_expression: list.expression_string(argtok),
                        call_value_tag: ValuePayload::BufferSize(0).tag(),
                        call_arg_value: var.dimension(0) * elem,
                        location: location.clone(),
                        warning: false,
                        call_value_path: Vec::new(),
                    });
                }
            }
        }

        // `&x` of a scalar: buffer of sizeof(x); uninitialized `&x` is an
        // UNINIT record.
        if crate::tokens::ast::is_unary_op(list, argtok, "&") {
            let Some(inner) = list.tok(argtok).ast_op1 else { return };
            let inner_tok = list.tok(inner);
            let Some(vt) = inner_tok.value_type.clone() else { return };
            if vt.is_pointer() {
                return;
            }
            let is_array = inner_tok
                .variable
                .map(|i| symbols.variables[i].is_array)
                .unwrap_or(false);
            if !is_array {
                let size = vt.type_size(platform) as i64;
                if size > 0 {
                    self.function_calls.push(FunctionCallRec {
                        call_id: callee.id.clone(),
                        call_function_name: call_function_name.clone(),
                        call_arg_nr: arg_nr,
                        call_argument_expression: list.expression_string(argtok),
                        call_value_tag: ValuePayload::BufferSize(0).tag(),
                        call_arg_value: size,
                        location: location.clone(),
                        warning: false,
                        call_value_path: Vec::new(),
                    });
                }
            }
            let values = &inner_tok.values;
            if values.len() == 1 && values[0].is_uninit() && !values[0].is_inconclusive() {
                self.function_calls.push(FunctionCallRec {
                    call_id: callee.id.clone(),
                    call_function_name,
                    call_arg_nr: arg_nr,
                    call_argument_expression: list.expression_string(inner),
                    call_value_tag: ValuePayload::Uninit.tag(),
                    call_arg_value: 0,
                    location,
                    warning: false,
                    call_value_path: Vec::new(),
                });
            }
        }
    }

    /// A call in this function's body that passes `decl_id` straight
    /// through as an argument.
    fn find_nested_call(
        &self,
        list: &TokenList,
        symbols: &symbols::SymbolDatabase,
        scope_idx: usize,
        function: &symbols::Function,
        my_arg_nr: u32,
        decl_id: u32,
    ) -> Option<NestedCallRec> {
        let scope = &symbols.scopes[scope_idx];
        let (start, end) = (scope.body_start?, scope.body_end?);
        let mut cursor = list.next(start);
        while let Some(tok) = cursor {
            if tok == end {
                break;
            }
            cursor = list.next(tok);
            if list.text(tok) != "(" {
                continue;
            }
            let t = list.tok(tok);
            let Some(callee) = t.ast_op1 else { continue };
            let Some(callee_func_idx) = list.tok(callee).function else {
                continue;
            };
            let args = get_arguments(list, tok);
            for (i, &arg) in args.iter().enumerate() {
                if list.tok(arg).var_id == decl_id {
                    let callee_func = &symbols.functions[callee_func_idx];
                    return Some(NestedCallRec {
                        call_id: callee_func.id.clone(),
                        call_function_name: list.expression_string(callee),
                        call_arg_nr: i as u32 + 1,
                        location: Location::of(list, tok),
                        my_id: function.id.clone(),
                        my_arg_nr,
                    });
                }
            }
        }
        None
    }

    /// Join map: callee id to every recorded call reaching it.
    pub fn get_calls_map(&self) -> CallsMap {
        let mut map: CallsMap = im::HashMap::new();
        for nc in &self.nested_calls {
            map.entry(nc.call_id.clone())
                .or_insert_with(Vec::new)
                .push(CallRecord::Nested(nc.clone()));
        }
        for fc in &self.function_calls {
            map.entry(fc.call_id.clone())
                .or_insert_with(Vec::new)
                .push(CallRecord::Call(fc.clone()));
        }
        map
    }

    /// Error path from the originating call site down to the unsafe read.
    /// Empty when no path exists.
    pub fn get_error_path(
        invalid: InvalidValueKind,
        usage: &UnsafeUsage,
        calls_map: &CallsMap,
        info: &str,
        warning: bool,
        max_ctu_depth: usize,
    ) -> (Vec<FileLocation>, Option<FunctionCallRec>) {
        let Some(path) = find_path(
            &usage.my_id,
            usage.my_arg_nr,
            usage.value,
            invalid,
            calls_map,
            0,
            warning,
            max_ctu_depth,
        ) else {
            return (Vec::new(), None);
        };

        let value_name = match invalid {
            InvalidValueKind::Null => "null",
            _ => "uninitialized",
        };
        let mut locations = Vec::new();
        let mut origin = None;
        for record in &path {
            if let CallRecord::Call(fc) = record {
                origin = Some(fc.clone());
                locations.extend(fc.call_value_path.iter().cloned());
            }
            let loc = record.location().to_file_location().with_info(format!(
                "Calling function {}, {} argument is {}",
                record.call_function_name(),
                ordinal(record.call_arg_nr()),
                value_name
            ));
            locations.push(loc);
        }
        locations.push(
            usage
                .location
                .to_file_location()
                .with_info(info.replace("ARG", &usage.my_arg_name)),
        );
        (locations, origin)
    }

    /// Load cached results when the stored checksum matches.
    pub fn try_load_from_file(&mut self, checksum: u32, checks: &[Box<dyn Check>]) -> bool {
        self.checksum = checksum;
        let Some(path) = &self.analyzer_file else {
            return false;
        };
        let Ok(text) = std::fs::read_to_string(path) else {
            return false;
        };
        let Ok(root) = XmlNode::parse(&text) else {
            return false;
        };
        if root.name != "analyzerinfo" || root.attr_u32("checksum") != Some(checksum) {
            return false;
        }
        for node in &root.children {
            match node.name.as_str() {
                "error" => {
                    if let Some(msg) = ErrorMessage::from_xml(node) {
                        self.errors.push(msg);
                    }
                }
                "function-call" => {
                    if let Some(fc) = function_call_from_xml(node) {
                        self.function_calls.push(fc);
                    }
                }
                "nested-call" => {
                    if let Some(nc) = nested_call_from_xml(node) {
                        self.nested_calls.push(nc);
                    }
                }
                other => {
                    for check in checks {
                        if check.name() == other {
                            if let Some(info) = check.load_file_info_from_xml(node) {
                                self.add_check_info(check.name(), info);
                            }
                            break;
                        }
                    }
                }
            }
        }
        true
    }

    /// Persist the summary; written atomically so concurrent readers never
    /// observe a partial file.
    pub fn write_file(&self) -> Result<()> {
        let Some(path) = &self.analyzer_file else {
            return Ok(());
        };
        let mut out = String::from("<?xml version=\"1.0\"?>\n");
        out.push_str(&format!("<analyzerinfo checksum=\"{}\">\n", self.checksum));
        for err in &self.errors {
            out.push_str("  ");
            out.push_str(&err.to_xml());
            out.push('\n');
        }
        for fc in &self.function_calls {
            out.push_str(&function_call_to_xml(fc));
        }
        for nc in &self.nested_calls {
            out.push_str(&nested_call_to_xml(nc));
        }
        for (name, info) in &self.check_info {
            out.push_str(&info.to_xml(name));
        }
        out.push_str("</analyzerinfo>\n");
        write_atomic(path, out.as_bytes())
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Walk from an unsafe usage up the calls map looking for a caller that
/// supplies an invalid value. Returns the chain origin-first.
#[allow(clippy::too_many_arguments)]
pub fn find_path<'m>(
    call_id: &str,
    call_arg_nr: u32,
    unsafe_value: i64,
    invalid: InvalidValueKind,
    calls_map: &'m CallsMap,
    depth: usize,
    warning: bool,
    max_ctu_depth: usize,
) -> Option<Vec<&'m CallRecord>> {
    if depth >= max_ctu_depth.min(MAX_FIND_PATH_DEPTH) {
        return None;
    }
    let callers = calls_map.get(call_id)?;
    for record in callers {
        if record.call_arg_nr() != call_arg_nr {
            continue;
        }
        match record {
            CallRecord::Call(fc) => {
                if !warning && fc.warning {
                    continue;
                }
                let matches = match invalid {
                    InvalidValueKind::Null => {
                        fc.call_value_tag == ValuePayload::Int(0).tag() && fc.call_arg_value == 0
                    }
                    InvalidValueKind::Uninit => fc.call_value_tag == ValuePayload::Uninit.tag(),
                    InvalidValueKind::BufferOverflow => {
                        fc.call_value_tag == ValuePayload::BufferSize(0).tag()
                            && (unsafe_value < 0 || unsafe_value >= fc.call_arg_value)
                    }
                };
                if matches {
                    return Some(vec![record]);
                }
            }
            CallRecord::Nested(nc) => {
                if let Some(mut path) = find_path(
                    &nc.my_id,
                    nc.my_arg_nr,
                    unsafe_value,
                    invalid,
                    calls_map,
                    depth + 1,
                    warning,
                    max_ctu_depth,
                ) {
                    path.push(record);
                    return Some(path);
                }
            }
        }
    }
    None
}

/// Collect unsafe usages: per pointer/array argument, the first read not
/// preceded by a write. `is_unsafe_usage` is the check's predicate; it
/// returns the value payload to record when the token is an unsafe read.
pub fn get_unsafe_usage(
    tokenizer: &Tokenizer<'_>,
    is_unsafe_usage: &dyn Fn(&Tokenizer<'_>, TokenId) -> Option<i64>,
) -> Vec<UnsafeUsage> {
    let mut out = Vec::new();
    let Some(symbols) = tokenizer.symbol_database() else {
        return out;
    };
    let list = &tokenizer.list;
    for scope_idx in symbols.function_scopes() {
        let scope = &symbols.scopes[scope_idx];
        let function = symbols.function_of_scope(scope_idx).expect("function scope");
        for (argnr, &arg_var_idx) in function.args.iter().enumerate() {
            let var = &symbols.variables[arg_var_idx];
            if !var.is_array_or_pointer() {
                continue;
            }
            if let Some((tok, value)) =
                first_unconditional_read(tokenizer, scope_idx, var.decl_id, is_unsafe_usage)
            {
                out.push(UnsafeUsage {
                    my_id: function.id.clone(),
                    my_arg_nr: argnr as u32 + 1,
                    my_arg_name: var.name.clone(),
                    location: Location::of(list, tok),
                    value,
                });
            }
        }
    }
    out
}

/// Program-order scan of one function body for the first unconditional
/// use of the argument. Conditional bodies that modify it, or that may
/// return, invalidate the scan.
fn first_unconditional_read(
    tokenizer: &Tokenizer<'_>,
    scope_idx: usize,
    decl_id: u32,
    is_unsafe_usage: &dyn Fn(&Tokenizer<'_>, TokenId) -> Option<i64>,
) -> Option<(TokenId, i64)> {
    let symbols = tokenizer.symbol_database()?;
    let list = &tokenizer.list;
    let scope = &symbols.scopes[scope_idx];
    let (start, end) = (scope.body_start?, scope.body_end?);
    let mut cursor = list.next(start);
    while let Some(tok) = cursor {
        if tok == end {
            break;
        }
        let text = list.text(tok);
        // Conditional body: `) {` or `else {`.
        if text == "{" {
            let prev_is_branch = list
                .prev(tok)
                .map(|p| list.text(p) == ")" || list.text(p) == "else")
                .unwrap_or(false);
            if prev_is_branch {
                let close = list.link(tok)?;
                if range_contains(list, tok, close, |t| {
                    matches!(list.text(t), "return" | "throw")
                }) {
                    return None;
                }
                if range_contains(list, tok, close, |t| {
                    list.tok(t).var_id == decl_id
                        && crate::valueflow::access_of(list, t) != crate::valueflow::Access::Read
                }) {
                    return None;
                }
                cursor = list.next(close);
                continue;
            }
        }
        // Short-circuit and ternary operators make later reads conditional.
        if matches!(text, "&&" | "||" | "?") {
            cursor = crate::valueflow::statement_end(list, tok).and_then(|s| list.next(s));
            continue;
        }
        if list.tok(tok).var_id == decl_id {
            return is_unsafe_usage(tokenizer, tok).map(|value| (tok, value));
        }
        cursor = list.next(tok);
    }
    None
}

fn range_contains(
    list: &TokenList,
    start: TokenId,
    end: TokenId,
    pred: impl Fn(TokenId) -> bool,
) -> bool {
    let mut cursor = list.next(start);
    while let Some(tok) = cursor {
        if tok == end {
            return false;
        }
        if pred(tok) {
            return true;
        }
        cursor = list.next(tok);
    }
    false
}

fn location_to_xml(loc: &Location) -> String {
    format!(
        "file=\"{}\" line=\"{}\" col=\"{}\"",
        escape_xml(&loc.file),
        loc.line,
        loc.column
    )
}

fn function_call_to_xml(fc: &FunctionCallRec) -> String {
    let mut out = format!(
        "  <function-call call-id=\"{}\" call-funcname=\"{}\" call-argnr=\"{}\" {} call-argexpr=\"{}\" my-argnr=\"{}\" call-argvaluetype=\"{}\" call-argvalue=\"{}\"",
        escape_xml(&fc.call_id),
        escape_xml(&fc.call_function_name),
        fc.call_arg_nr,
        location_to_xml(&fc.location),
        escape_xml(&fc.call_argument_expression),
        fc.call_value_tag,
        fc.call_value_tag,
        fc.call_arg_value
    );
    if fc.warning {
        out.push_str(" warning=\"true\"");
    }
    if fc.call_value_path.is_empty() {
        out.push_str("/>\n");
        return out;
    }
    out.push_str(">\n");
    for loc in &fc.call_value_path {
        out.push_str(&format!(
            "    <path file=\"{}\" line=\"{}\" col=\"{}\" info=\"{}\"/>\n",
            escape_xml(&loc.file),
            loc.line,
            loc.column,
            escape_xml(&loc.info)
        ));
    }
    out.push_str("  </function-call>\n");
    out
}

fn function_call_from_xml(node: &XmlNode) -> Option<FunctionCallRec> {
    Some(FunctionCallRec {
        call_id: node.attr("call-id")?.to_string(),
        call_function_name: node.attr("call-funcname")?.to_string(),
        call_arg_nr: node.attr_u32("call-argnr")?,
        call_argument_expression: node.attr("call-argexpr").unwrap_or("").to_string(),
        call_value_tag: node.attr_u32("call-argvaluetype")? as u8,
        call_arg_value: node.attr_i64("call-argvalue")?,
        location: Location {
            file: node.attr("file")?.to_string(),
            line: node.attr_u32("line")?,
            column: node.attr_u32("col")?,
        },
        warning: node.attr("warning") == Some("true"),
        call_value_path: node
            .children_named("path")
            .map(|p| {
                FileLocation::new(
                    p.attr("file").unwrap_or("").to_string(),
                    p.attr_u32("line").unwrap_or(0),
                    p.attr_u32("col").unwrap_or(0),
                )
                .with_info(p.attr("info").unwrap_or("").to_string())
            })
            .collect(),
    })
}

fn nested_call_to_xml(nc: &NestedCallRec) -> String {
    format!(
        "  <nested-call my-id=\"{}\" my-argnr=\"{}\" call-id=\"{}\" call-funcname=\"{}\" call-argnr=\"{}\" {}/>\n",
        escape_xml(&nc.my_id),
        nc.my_arg_nr,
        escape_xml(&nc.call_id),
        escape_xml(&nc.call_function_name),
        nc.call_arg_nr,
        location_to_xml(&nc.location)
    )
}

fn nested_call_from_xml(node: &XmlNode) -> Option<NestedCallRec> {
    Some(NestedCallRec {
        call_id: node.attr("call-id")?.to_string(),
        call_function_name: node.attr("call-funcname").unwrap_or("").to_string(),
        call_arg_nr: node.attr_u32("call-argnr")?,
        location: Location {
            file: node.attr("file").unwrap_or("").to_string(),
            line: node.attr_u32("line").unwrap_or(0),
            column: node.attr_u32("col").unwrap_or(0),
        },
        my_id: node.attr("my-id")?.to_string(),
        my_arg_nr: node.attr_u32("my-argnr")?,
    })
}

/// Serialize an unsafe-usage list under a check's element.
pub fn unsafe_usages_to_xml(check_name: &str, usages: &[UnsafeUsage]) -> String {
    let mut out = format!("  <{check_name}>\n");
    for u in usages {
        out.push_str(&format!(
            "    <unsafe-usage my-id=\"{}\" my-argnr=\"{}\" my-argname=\"{}\" file=\"{}\" line=\"{}\" col=\"{}\" value=\"{}\"/>\n",
            escape_xml(&u.my_id),
            u.my_arg_nr,
            escape_xml(&u.my_arg_name),
            escape_xml(&u.location.file),
            u.location.line,
            u.location.column,
            u.value
        ));
    }
    out.push_str(&format!("  </{check_name}>\n"));
    out
}

/// Parse the unsafe-usage children of a check's element.
pub fn unsafe_usages_from_xml(node: &XmlNode) -> Vec<UnsafeUsage> {
    node.children_named("unsafe-usage")
        .filter_map(|e| {
            Some(UnsafeUsage {
                my_id: e.attr("my-id")?.to_string(),
                my_arg_nr: e.attr_u32("my-argnr")?,
                my_arg_name: e.attr("my-argname").unwrap_or("").to_string(),
                location: Location {
                    file: e.attr("file").unwrap_or("").to_string(),
                    line: e.attr_u32("line").unwrap_or(0),
                    column: e.attr_u32("col").unwrap_or(0),
                },
                value: e.attr_i64("value").unwrap_or(0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(call_id: &str, arg: u32, tag: u8, value: i64, warning: bool) -> FunctionCallRec {
        FunctionCallRec {
            call_id: call_id.to_string(),
            call_function_name: "f".to_string(),
            call_arg_nr: arg,
            call_argument_expression: "0".to_string(),
            call_value_tag: tag,
            call_arg_value: value,
            location: Location {
                file: "b.c".to_string(),
                line: 3,
                column: 5,
            },
            warning,
            call_value_path: Vec::new(),
        }
    }

    fn nested(my_id: &str, my_arg: u32, call_id: &str, call_arg: u32) -> NestedCallRec {
        NestedCallRec {
            call_id: call_id.to_string(),
            call_function_name: "g".to_string(),
            call_arg_nr: call_arg,
            location: Location {
                file: "m.c".to_string(),
                line: 7,
                column: 2,
            },
            my_id: my_id.to_string(),
            my_arg_nr: my_arg,
        }
    }

    fn map_of(records: Vec<CallRecord>) -> CallsMap {
        let mut ctu = CtuInfo::default();
        for r in records {
            match r {
                CallRecord::Call(c) => ctu.function_calls.push(c),
                CallRecord::Nested(n) => ctu.nested_calls.push(n),
            }
        }
        ctu.get_calls_map()
    }

    #[test]
    fn find_path_matches_null_argument() {
        let map = map_of(vec![CallRecord::Call(call("a.c:1:6", 1, 0, 0, false))]);
        let path = find_path("a.c:1:6", 1, 0, InvalidValueKind::Null, &map, 0, false, 2);
        assert_eq!(path.unwrap().len(), 1);
        // Wrong argument index: no path.
        assert!(find_path("a.c:1:6", 2, 0, InvalidValueKind::Null, &map, 0, false, 2).is_none());
    }

    #[test]
    fn find_path_recurses_through_nested_calls() {
        let map = map_of(vec![
            CallRecord::Nested(nested("a.c:1:6", 1, "a.c:9:6", 2)),
            CallRecord::Call(call("a.c:1:6", 1, 0, 0, false)),
        ]);
        // Unsafe usage is inside callee `a.c:9:6` arg 2; its caller chain
        // goes through the forwarder `a.c:1:6`.
        let path = find_path("a.c:9:6", 2, 0, InvalidValueKind::Null, &map, 0, false, 4)
            .expect("path through forwarder");
        assert_eq!(path.len(), 2);
        assert!(matches!(path[0], CallRecord::Call(_)));
        assert!(matches!(path[1], CallRecord::Nested(_)));
    }

    #[test]
    fn find_path_respects_depth_cap() {
        // A forwards to itself: infinite chain without the cap.
        let map = map_of(vec![CallRecord::Nested(nested("a.c:1:6", 1, "a.c:1:6", 1))]);
        assert!(find_path("a.c:1:6", 1, 0, InvalidValueKind::Null, &map, 0, false, 100).is_none());
        // Depth 0 finds nothing at all.
        assert!(find_path("a.c:1:6", 1, 0, InvalidValueKind::Null, &map, 0, false, 0).is_none());
    }

    #[test]
    fn find_path_skips_warning_edges_without_warning_severity() {
        let map = map_of(vec![CallRecord::Call(call("a.c:1:6", 1, 0, 0, true))]);
        assert!(find_path("a.c:1:6", 1, 0, InvalidValueKind::Null, &map, 0, false, 2).is_none());
        assert!(find_path("a.c:1:6", 1, 0, InvalidValueKind::Null, &map, 0, true, 2).is_some());
    }

    #[test]
    fn buffer_overflow_predicate_uses_the_interval() {
        let map = map_of(vec![CallRecord::Call(call(
            "a.c:1:6",
            1,
            ValuePayload::BufferSize(0).tag(),
            8,
            false,
        ))]);
        // Reading offset 8 from an 8-byte buffer overflows.
        assert!(find_path("a.c:1:6", 1, 8, InvalidValueKind::BufferOverflow, &map, 0, false, 2).is_some());
        // Offset 4 is in bounds.
        assert!(find_path("a.c:1:6", 1, 4, InvalidValueKind::BufferOverflow, &map, 0, false, 2).is_none());
        // Negative offsets always overflow.
        assert!(find_path("a.c:1:6", 1, -1, InvalidValueKind::BufferOverflow, &map, 0, false, 2).is_some());
    }

    #[test]
    fn error_path_is_origin_first_and_substitutes_arg() {
        let map = map_of(vec![CallRecord::Call(call("a.c:1:6", 1, 0, 0, false))]);
        let usage = UnsafeUsage {
            my_id: "a.c:1:6".to_string(),
            my_arg_nr: 1,
            my_arg_name: "p".to_string(),
            location: Location {
                file: "a.c".to_string(),
                line: 1,
                column: 20,
            },
            value: 0,
        };
        let (path, origin) = CtuInfo::get_error_path(
            InvalidValueKind::Null,
            &usage,
            &map,
            "Dereferencing argument ARG that is null",
            false,
            2,
        );
        assert!(origin.is_some());
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].file, "b.c");
        assert_eq!(path[0].info, "Calling function f, 1st argument is null");
        assert_eq!(path[1].info, "Dereferencing argument p that is null");
    }

    #[test]
    fn ordinal_text() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(21), "21st");
    }

    #[test]
    fn function_call_xml_round_trip() {
        let mut fc = call("a.c:1:6", 1, 0, 0, true);
        fc.call_value_path
            .push(FileLocation::new("b.c", 2, 4).with_info("Assignment 'p=0'"));
        let xml = function_call_to_xml(&fc);
        let node = XmlNode::parse(xml.trim()).unwrap();
        let back = function_call_from_xml(&node).unwrap();
        assert_eq!(back, fc);
    }

    #[test]
    fn nested_call_xml_round_trip() {
        let nc = nested("a.c:1:6", 1, "a.c:9:6", 2);
        let xml = nested_call_to_xml(&nc);
        let node = XmlNode::parse(xml.trim()).unwrap();
        let back = nested_call_from_xml(&node).unwrap();
        assert_eq!(back, nc);
    }
}
