//! Check harness: the capability trait every check implements and the
//! explicit registry the driver builds at startup.

pub mod null_pointer;
pub mod uninit_var;

use crate::analyzerinfo::AnalyzerInformation;
use crate::config::{Project, Settings};
use crate::ctu::{self, CtuInfo, UnsafeUsage};
use crate::diagnostics::xml::XmlNode;
use crate::diagnostics::ErrorMessage;
use crate::tokenizer::Tokenizer;
use crate::tokens::{TokenId, TokenList};

/// Everything a check may look at. Owns nothing; borrows everything.
pub struct Context<'a> {
    pub project: &'a Project,
    pub settings: &'a Settings,
    pub tokenizer: &'a Tokenizer<'a>,
}

impl<'a> Context<'a> {
    pub fn new(
        project: &'a Project,
        settings: &'a Settings,
        tokenizer: &'a Tokenizer<'a>,
    ) -> Context<'a> {
        Context {
            project,
            settings,
            tokenizer,
        }
    }
}

/// Per-check whole-program data stored in the CTU cache, addressed by the
/// check's name.
#[derive(Clone, Debug, PartialEq)]
pub enum FileInfo {
    UnsafeUsages(Vec<UnsafeUsage>),
}

impl FileInfo {
    pub fn to_xml(&self, check_name: &str) -> String {
        match self {
            FileInfo::UnsafeUsages(usages) => ctu::unsafe_usages_to_xml(check_name, usages),
        }
    }

    pub fn unsafe_usages(&self) -> &[UnsafeUsage] {
        match self {
            FileInfo::UnsafeUsages(usages) => usages,
        }
    }
}

/// The capability set of a check. `run_checks` and `get_file_info` run
/// per configuration / per TU; `analyse_whole_program` runs once per run
/// over the union of all CTU summaries.
pub trait Check: Send + Sync {
    fn name(&self) -> &'static str;

    /// Human-readable description used by `--doc`. Either empty or a
    /// block ending in exactly one newline.
    fn class_info(&self) -> &'static str;

    fn run_checks(&self, ctx: &Context<'_>) -> Vec<ErrorMessage>;

    /// Example instances of every diagnostic this check can emit, for
    /// `--errorlist`.
    fn get_error_messages(&self) -> Vec<ErrorMessage>;

    fn get_file_info(&self, ctx: &Context<'_>) -> Option<FileInfo> {
        let _ = ctx;
        None
    }

    fn load_file_info_from_xml(&self, node: &XmlNode) -> Option<FileInfo> {
        let _ = node;
        None
    }

    /// Whole-program phase over all CTU summaries. Returns the
    /// diagnostics found.
    fn analyse_whole_program(
        &self,
        combined: &CtuInfo,
        info: &AnalyzerInformation,
        project: &Project,
    ) -> Vec<ErrorMessage> {
        let _ = (combined, info, project);
        Vec::new()
    }
}

/// Build the registry. Sorted by name; the order is a documented,
/// tested invariant.
pub fn builtin_checks() -> Vec<Box<dyn Check>> {
    let mut checks: Vec<Box<dyn Check>> = vec![
        Box::new(null_pointer::NullPointer),
        Box::new(uninit_var::UninitVar),
    ];
    checks.sort_by_key(|c| c.name());
    checks
}

/// True when `tok` is dereferenced: `*tok` or `tok[...]`.
pub fn is_pointer_deref(list: &TokenList, tok: TokenId) -> bool {
    let Some(parent) = list.tok(tok).ast_parent else {
        return false;
    };
    let p = list.tok(parent);
    match p.text.as_str() {
        "*" => p.ast_op1 == Some(tok) && p.ast_op2.is_none(),
        "[" => p.ast_op1 == Some(tok),
        _ => false,
    }
}
