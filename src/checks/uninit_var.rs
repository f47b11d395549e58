//! Use of uninitialized variables, per-TU and whole-program.

use crate::analyzerinfo::AnalyzerInformation;
use crate::checks::{is_pointer_deref, Check, Context, FileInfo};
use crate::config::Project;
use crate::ctu::{self, CtuInfo, InvalidValueKind};
use crate::diagnostics::xml::XmlNode;
use crate::diagnostics::{Certainty, ErrorMessage, FileLocation, Severity};
use crate::tokenizer::Tokenizer;
use crate::tokens::TokenId;
use crate::valueflow::{access_of, Access};

const CWE_UNINIT: u16 = 457;

pub struct UninitVar;

fn is_unsafe_usage(tokenizer: &Tokenizer<'_>, tok: TokenId) -> Option<i64> {
    // Reading through the pointer uses the pointed-at data.
    is_pointer_deref(&tokenizer.list, tok).then_some(0)
}

impl Check for UninitVar {
    fn name(&self) -> &'static str {
        "UninitVar"
    }

    fn class_info(&self) -> &'static str {
        "Uninitialized variables:\n\
         - using an uninitialized variable\n\
         - passing a pointer to uninitialized data to a function that reads it (cross-TU)\n"
    }

    fn run_checks(&self, ctx: &Context<'_>) -> Vec<ErrorMessage> {
        let list = &ctx.tokenizer.list;
        let mut out = Vec::new();
        for id in list.iter() {
            if list.tok(id).var_id == 0 {
                continue;
            }
            if !matches!(access_of(list, id), Access::Read | Access::ReadWrite) {
                continue;
            }
            let uninit = list
                .tok(id)
                .values
                .iter()
                .find(|v| v.is_uninit() && !v.is_impossible());
            let Some(value) = uninit else { continue };
            if value.is_inconclusive()
                && !ctx.project.certainty.is_enabled(Certainty::Inconclusive)
            {
                continue;
            }
            let name = list.expression_string(id);
            let mut call_stack: Vec<FileLocation> = value
                .error_path
                .iter()
                .map(|(t, info)| {
                    let mut loc = list.location(*t);
                    loc.info = info.clone();
                    loc
                })
                .collect();
            call_stack.push(list.location(id));
            let certainty = if value.is_inconclusive() {
                Certainty::Inconclusive
            } else {
                Certainty::Safe
            };
            out.push(
                ErrorMessage::new(
                    call_stack,
                    list.source_path(),
                    Severity::Error,
                    &format!("Uninitialized variable: {name}"),
                    "uninitvar",
                    certainty,
                )
                .with_cwe(CWE_UNINIT),
            );
        }
        out
    }

    fn get_error_messages(&self) -> Vec<ErrorMessage> {
        vec![ErrorMessage::new(
            vec![FileLocation::new("", 0, 0)],
            "",
            Severity::Error,
            "Uninitialized variable: var",
            "uninitvar",
            Certainty::Safe,
        )
        .with_cwe(CWE_UNINIT)]
    }

    fn get_file_info(&self, ctx: &Context<'_>) -> Option<FileInfo> {
        let usages = ctu::get_unsafe_usage(ctx.tokenizer, &is_unsafe_usage);
        if usages.is_empty() {
            None
        } else {
            Some(FileInfo::UnsafeUsages(usages))
        }
    }

    fn load_file_info_from_xml(&self, node: &XmlNode) -> Option<FileInfo> {
        let usages = ctu::unsafe_usages_from_xml(node);
        if usages.is_empty() {
            None
        } else {
            Some(FileInfo::UnsafeUsages(usages))
        }
    }

    fn analyse_whole_program(
        &self,
        combined: &CtuInfo,
        info: &AnalyzerInformation,
        project: &Project,
    ) -> Vec<ErrorMessage> {
        let calls_map = combined.get_calls_map();
        let warning = project.severity.is_enabled(Severity::Warning);
        let mut out = Vec::new();
        for ctu in info.ctus() {
            let Some(file_info) = ctu.get_check_info(self.name()) else {
                continue;
            };
            for usage in file_info.unsafe_usages() {
                let (path, _origin) = CtuInfo::get_error_path(
                    InvalidValueKind::Uninit,
                    usage,
                    &calls_map,
                    "Dereferencing argument ARG that points at uninitialized data",
                    warning,
                    project.max_ctu_depth,
                );
                if path.is_empty() {
                    continue;
                }
                out.push(
                    ErrorMessage::new(
                        path,
                        ctu.source_file.clone(),
                        Severity::Error,
                        &format!("Uninitialized variable: {}", usage.my_arg_name),
                        "uninitvar",
                        Certainty::Safe,
                    )
                    .with_cwe(CWE_UNINIT),
                );
            }
        }
        out
    }
}
