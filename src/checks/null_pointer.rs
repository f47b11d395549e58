//! Null pointer dereference check, per-TU and whole-program.

use crate::analyzerinfo::AnalyzerInformation;
use crate::checks::{is_pointer_deref, Check, Context, FileInfo};
use crate::config::Project;
use crate::ctu::{self, CtuInfo, InvalidValueKind};
use crate::diagnostics::xml::XmlNode;
use crate::diagnostics::{Certainty, ErrorMessage, FileLocation, Severity};
use crate::tokenizer::Tokenizer;
use crate::tokens::TokenId;

const CWE_NULL_DEREF: u16 = 476;

pub struct NullPointer;

impl NullPointer {
    fn report(
        &self,
        ctx: &Context<'_>,
        tok: TokenId,
        value: &crate::valueflow::value::Value,
    ) -> Option<ErrorMessage> {
        let list = &ctx.tokenizer.list;
        let name = list.expression_string(tok);
        let mut call_stack: Vec<FileLocation> = value
            .error_path
            .iter()
            .map(|(t, info)| {
                let mut loc = list.location(*t);
                loc.info = info.clone();
                loc
            })
            .collect();
        call_stack.push(list.location(tok));

        let (severity, certainty, text) = if value.is_inconclusive() {
            if !ctx.project.certainty.is_enabled(Certainty::Inconclusive) {
                return None;
            }
            (
                Severity::Error,
                Certainty::Inconclusive,
                format!("Null pointer dereference: {name}"),
            )
        } else if value.condition.is_some() {
            if !ctx.project.severity.is_enabled(Severity::Warning) {
                return None;
            }
            (
                Severity::Warning,
                Certainty::Safe,
                format!("Possible null pointer dereference: {name}"),
            )
        } else {
            (
                Severity::Error,
                Certainty::Safe,
                format!("Null pointer dereference: {name}"),
            )
        };
        Some(
            ErrorMessage::new(
                call_stack,
                list.source_path(),
                severity,
                &text,
                "nullPointer",
                certainty,
            )
            .with_cwe(CWE_NULL_DEREF),
        )
    }
}

fn is_unsafe_usage(tokenizer: &Tokenizer<'_>, tok: TokenId) -> Option<i64> {
    is_pointer_deref(&tokenizer.list, tok).then_some(0)
}

impl Check for NullPointer {
    fn name(&self) -> &'static str {
        "NullPointer"
    }

    fn class_info(&self) -> &'static str {
        "Null pointers:\n\
         - null pointer dereference\n\
         - null pointer passed to a function that dereferences it (cross-TU)\n"
    }

    fn run_checks(&self, ctx: &Context<'_>) -> Vec<ErrorMessage> {
        let list = &ctx.tokenizer.list;
        let mut out = Vec::new();
        for id in list.iter() {
            if list.tok(id).var_id == 0 || !is_pointer_deref(list, id) {
                continue;
            }
            let null = list
                .tok(id)
                .values
                .iter()
                .find(|v| v.int_payload() == Some(0) && !v.is_impossible());
            if let Some(value) = null {
                if let Some(msg) = self.report(ctx, id, value) {
                    out.push(msg);
                }
            }
        }
        out
    }

    fn get_error_messages(&self) -> Vec<ErrorMessage> {
        vec![ErrorMessage::new(
            vec![FileLocation::new("", 0, 0)],
            "",
            Severity::Error,
            "Null pointer dereference: pointer",
            "nullPointer",
            Certainty::Safe,
        )
        .with_cwe(CWE_NULL_DEREF)]
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
                let (path, origin) = CtuInfo::get_error_path(
                    InvalidValueKind::Null,
                    usage,
                    &calls_map,
                    "Dereferencing argument ARG that is null",
                    warning,
                    project.max_ctu_depth,
                );
                if path.is_empty() {
                    continue;
                }
                let expr = origin
                    .as_ref()
                    .map(|fc| fc.call_argument_expression.clone())
                    .unwrap_or_else(|| usage.my_arg_name.clone());
                out.push(
                    ErrorMessage::new(
                        path,
                        ctu.source_file.clone(),
                        Severity::Error,
                        &format!("Null pointer dereference: {expr}"),
                        "nullPointer",
                        Certainty::Safe,
                    )
                    .with_cwe(CWE_NULL_DEREF),
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Language, Settings};
    use crate::preprocessor::lex;

    fn run_on(src: &str) -> Vec<ErrorMessage> {
        let project = Project::new();
        let settings = Settings::default();
        let raw = lex(src, 0).unwrap();
        let mut tokenizer = Tokenizer::new(&project, &settings, Language::C);
        tokenizer.create_tokens(&raw, vec!["test.c".to_string()]);
        tokenizer.simplify_tokens0("").unwrap();
        tokenizer.simplify_tokens1().unwrap();
        let ctx = Context::new(&project, &settings, &tokenizer);
        NullPointer.run_checks(&ctx)
    }

    #[test]
    fn dereferencing_assigned_null_is_reported() {
        let msgs = run_on("void f() { int *p = 0; *p = 1; }");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id, "nullPointer");
        assert_eq!(msgs[0].severity, Severity::Error);
        assert_eq!(msgs[0].certainty, Certainty::Safe);
        assert!(msgs[0].message.contains("p"));
        // The error path explains the assignment.
        assert!(msgs[0]
            .call_stack
            .iter()
            .any(|loc| loc.info.contains("Assignment")));
    }

    #[test]
    fn impossible_null_is_never_selected() {
        // Inside `p != 0` the null value is impossible and must not be
        // reported.
        let msgs = run_on("void f(int *p) { if (p != 0) { *p = 1; } }");
        assert!(msgs.is_empty());
    }

    #[test]
    fn valid_pointer_is_quiet() {
        let msgs = run_on("void f(int *q) { int x; int *p = &x; *p = 1; *q = 2; }");
        assert!(msgs.is_empty());
    }

    #[test]
    fn unsafe_usage_collects_dereferenced_arguments() {
        let project = Project::new();
        let settings = Settings::default();
        let raw = lex("void f(int *p) { *p = 1; }", 0).unwrap();
        let mut tokenizer = Tokenizer::new(&project, &settings, Language::C);
        tokenizer.create_tokens(&raw, vec!["a.c".to_string()]);
        tokenizer.simplify_tokens0("").unwrap();
        tokenizer.simplify_tokens1().unwrap();
        let ctx = Context::new(&project, &settings, &tokenizer);
        let info = NullPointer.get_file_info(&ctx).expect("unsafe usage");
        let usages = info.unsafe_usages();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].my_arg_nr, 1);
        assert_eq!(usages[0].my_arg_name, "p");
        assert_eq!(usages[0].my_id, "a.c:1:6");
    }

    #[test]
    fn guarded_dereference_is_not_an_unsafe_usage() {
        let project = Project::new();
        let settings = Settings::default();
        let raw = lex("void f(int *p) { if (p) { *p = 1; } }", 0).unwrap();
        let mut tokenizer = Tokenizer::new(&project, &settings, Language::C);
        tokenizer.create_tokens(&raw, vec!["a.c".to_string()]);
        tokenizer.simplify_tokens0("").unwrap();
        tokenizer.simplify_tokens1().unwrap();
        let ctx = Context::new(&project, &settings, &tokenizer);
        // The only read is inside a conditional body; not unconditional.
        assert!(NullPointer.get_file_info(&ctx).is_none());
    }
}
