//! `--dump` writer: an XML snapshot of raw tokens, directives and the
//! analyzed token list per configuration.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::analyzerinfo::write_atomic;
use crate::config::Project;
use crate::diagnostics::xml::escape_xml;
use crate::preprocessor::{Directive, RawToken};
use crate::tokenizer::Tokenizer;

pub struct DumpWriter {
    path: PathBuf,
    buffer: String,
}

impl DumpWriter {
    /// Start a dump document with the platform and raw-token prolog.
    pub fn new(path: &Path, project: &Project, files: &[String], raw: &[RawToken]) -> DumpWriter {
        let platform = &project.platform;
        let mut buffer = String::from("<?xml version=\"1.0\"?>\n<dumps>\n");
        buffer.push_str(&format!(
            "  <platform name=\"{}\" char_bit=\"{}\" short_bit=\"{}\" int_bit=\"{}\" long_bit=\"{}\" long_long_bit=\"{}\" pointer_bit=\"{}\"/>\n",
            escape_xml(&platform.name),
            platform.char_bit,
            platform.short_bit,
            platform.int_bit,
            platform.long_bit,
            platform.long_long_bit,
            platform.pointer_bit(),
        ));
        buffer.push_str("  <rawtokens>\n");
        for (i, file) in files.iter().enumerate() {
            buffer.push_str(&format!(
                "    <file index=\"{i}\" name=\"{}\"/>\n",
                escape_xml(file)
            ));
        }
        for tok in raw {
            buffer.push_str(&format!(
                "    <tok fileIndex=\"{}\" linenr=\"{}\" column=\"{}\" str=\"{}\"/>\n",
                tok.file_index,
                tok.line,
                tok.col,
                escape_xml(&tok.text)
            ));
        }
        buffer.push_str("  </rawtokens>\n");
        DumpWriter {
            path: path.to_path_buf(),
            buffer,
        }
    }

    /// Append one configuration's dump.
    pub fn add_configuration(
        &mut self,
        cfg: &str,
        tokenizer: &Tokenizer<'_>,
        directives: &[Directive],
    ) {
        let project = tokenizer.project;
        self.buffer
            .push_str(&format!("  <dump cfg=\"{}\">\n", escape_xml(cfg)));
        self.buffer.push_str("    <standards>\n");
        self.buffer.push_str(&format!(
            "      <c version=\"{}\"/>\n",
            escape_xml(&project.standards.c)
        ));
        self.buffer.push_str(&format!(
            "      <cpp version=\"{}\"/>\n",
            escape_xml(&project.standards.cpp)
        ));
        self.buffer.push_str("    </standards>\n");

        self.buffer.push_str("    <directivelist>\n");
        for dir in directives {
            self.buffer.push_str(&format!(
                "      <directive file=\"{}\" linenr=\"{}\" str=\"{}\"/>\n",
                dir.file_index,
                dir.line,
                escape_xml(&dir.text())
            ));
        }
        self.buffer.push_str("    </directivelist>\n");

        self.buffer.push_str("    <tokenlist>\n");
        let list = &tokenizer.list;
        for id in list.iter() {
            let tok = list.tok(id);
            let mut line = format!(
                "      <token id=\"{}\" fileIndex=\"{}\" linenr=\"{}\" column=\"{}\" str=\"{}\"",
                id.0,
                tok.file_index,
                tok.line,
                tok.column,
                escape_xml(&tok.text)
            );
            if tok.var_id != 0 {
                line.push_str(&format!(" varId=\"{}\"", tok.var_id));
            }
            if tok.expr_id != 0 {
                line.push_str(&format!(" exprId=\"{}\"", tok.expr_id));
            }
            if let Some(link) = tok.link {
                line.push_str(&format!(" link=\"{}\"", link.0));
            }
            if let Some(parent) = tok.ast_parent {
                line.push_str(&format!(" astParent=\"{}\"", parent.0));
            }
            if let Some(op1) = tok.ast_op1 {
                line.push_str(&format!(" astOperand1=\"{}\"", op1.0));
            }
            if let Some(op2) = tok.ast_op2 {
                line.push_str(&format!(" astOperand2=\"{}\"", op2.0));
            }
            line.push_str("/>\n");
            self.buffer.push_str(&line);
        }
        self.buffer.push_str("    </tokenlist>\n");
        self.buffer.push_str("  </dump>\n");
    }

    /// Close the document and write it atomically.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.buffer.push_str("</dumps>\n");
        write_atomic(&self.path, self.buffer.as_bytes())?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Language, Settings};
    use crate::diagnostics::xml::XmlNode;
    use crate::preprocessor::lex;
    use tempfile::TempDir;

    #[test]
    fn dump_is_wellformed_xml_with_ast_edges() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.c.dump");
        let project = Project::new();
        let settings = Settings::default();
        let src = "int main() { int a = 1 + 2; return a; }";
        let raw = lex(src, 0).unwrap();
        let files = vec!["t.c".to_string()];

        let mut writer = DumpWriter::new(&path, &project, &files, &raw);
        let mut tokenizer = Tokenizer::new(&project, &settings, Language::C);
        tokenizer.create_tokens(&raw, files.clone());
        tokenizer.simplify_tokens0("").unwrap();
        tokenizer.simplify_tokens1().unwrap();
        writer.add_configuration("", &tokenizer, &[]);
        let written = writer.finish().unwrap();

        let text = std::fs::read_to_string(written).unwrap();
        let root = XmlNode::parse(&text).unwrap();
        assert_eq!(root.name, "dumps");
        assert!(root.children_named("rawtokens").next().is_some());
        let dump = root.children_named("dump").next().unwrap();
        assert!(dump.children_named("standards").next().is_some());
        let tokens = dump.children_named("tokenlist").next().unwrap();
        assert!(tokens
            .children
            .iter()
            .any(|t| t.attr("astOperand1").is_some()));
        assert!(tokens.children.iter().any(|t| t.attr("varId").is_some()));
    }
}
