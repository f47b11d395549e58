//! Suppression rules: which diagnostics the user has silenced.
//!
//! A rule is `<id>[:<file>[:<line>]]`; `*` and `?` wildcards are accepted
//! in the id and the file pattern. Rules come from the command line, from
//! plain-text list files, from the suppressions XML format, and from
//! inline `// ccheck-suppress <id>` comments collected by the
//! preprocessor.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::diagnostics::xml::XmlNode;

/// The portion of a diagnostic a suppression is matched against.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageKey {
    pub id: String,
    pub file: String,
    pub line: Option<u32>,
}

/// One suppression rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suppression {
    /// Diagnostic id, `*` matches every id.
    pub id: String,
    /// File pattern; empty matches any file.
    pub file: String,
    /// Line restriction; `None` matches any line.
    pub line: Option<u32>,
    /// True for suppressions parsed from inline comments.
    pub inline: bool,
    /// Set once a diagnostic matched this rule.
    pub matched: bool,
}

impl Suppression {
    pub fn parse_spec(spec: &str) -> Result<Suppression> {
        if spec.is_empty() {
            bail!("empty suppression specification");
        }
        let mut parts = spec.splitn(3, ':');
        let id = parts.next().unwrap_or_default().to_string();
        let file = parts.next().unwrap_or_default().to_string();
        let line = match parts.next() {
            Some(text) => Some(
                text.parse::<u32>()
                    .with_context(|| format!("invalid line in suppression '{spec}'"))?,
            ),
            None => None,
        };
        if id.is_empty() {
            bail!("suppression id missing in '{spec}'");
        }
        Ok(Suppression {
            id,
            file,
            line,
            inline: false,
            matched: false,
        })
    }

    fn matches(&self, key: &MessageKey) -> bool {
        if !wildcard_match(&self.id, &key.id) {
            return false;
        }
        if !self.file.is_empty() && !wildcard_match(&self.file, &key.file) {
            return false;
        }
        match self.line {
            Some(line) => key.line == Some(line),
            None => true,
        }
    }
}

/// Glob-lite matching with `*` and `?`.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    match_at(&pat, &txt)
}

fn match_at(pat: &[char], txt: &[char]) -> bool {
    match pat.split_first() {
        None => txt.is_empty(),
        Some(('*', rest)) => (0..=txt.len()).any(|skip| match_at(rest, &txt[skip..])),
        Some(('?', rest)) => !txt.is_empty() && match_at(rest, &txt[1..]),
        Some((c, rest)) => txt.first() == Some(c) && match_at(rest, &txt[1..]),
    }
}

/// An ordered list of suppression rules.
#[derive(Debug, Clone, Default)]
pub struct Suppressions {
    rules: Vec<Suppression>,
}

impl Suppressions {
    pub fn add(&mut self, rule: Suppression) {
        self.rules.push(rule);
    }

    pub fn add_spec(&mut self, spec: &str) -> Result<()> {
        self.add(Suppression::parse_spec(spec)?);
        Ok(())
    }

    /// One spec per line; `#` starts a comment.
    pub fn parse_list_text(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.add_spec(line)?;
        }
        Ok(())
    }

    pub fn parse_list_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read suppressions list {}", path.display()))?;
        self.parse_list_text(&text)
            .with_context(|| format!("in suppressions list {}", path.display()))
    }

    /// `<suppressions><suppression><id>..</id>..</suppression></suppressions>`
    /// is accepted in the attribute form used by the analyzer family:
    /// `<suppression id=".." fileName=".." lineNumber=".."/>`.
    pub fn parse_xml_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read suppressions XML {}", path.display()))?;
        let root = XmlNode::parse(&text)?;
        if root.name != "suppressions" {
            bail!("{}: root element is not <suppressions>", path.display());
        }
        for node in root.children_named("suppression") {
            let id = node.attr("id").unwrap_or("*").to_string();
            let file = node.attr("fileName").unwrap_or("").to_string();
            let line = node.attr_u32("lineNumber");
            self.add(Suppression {
                id,
                file,
                line,
                inline: false,
                matched: false,
            });
        }
        Ok(())
    }

    /// Match `key` against every rule; marks the first matching rule.
    pub fn is_suppressed(&mut self, key: &MessageKey) -> bool {
        for rule in &mut self.rules {
            if rule.matches(key) {
                rule.matched = true;
                return true;
            }
        }
        false
    }

    /// Like [`Suppressions::is_suppressed`] but restricted to inline rules.
    pub fn is_suppressed_local(&mut self, key: &MessageKey) -> bool {
        for rule in &mut self.rules {
            if rule.inline && rule.matches(key) {
                rule.matched = true;
                return true;
            }
        }
        false
    }

    /// Rules that never matched anything, for `unmatchedSuppression`.
    pub fn unmatched(&self) -> impl Iterator<Item = &Suppression> {
        self.rules.iter().filter(|r| !r.matched)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Stable text form folded into the build-dir checksum, so that a
    /// change in suppressions invalidates cached results.
    pub fn checksum_text(&self) -> String {
        let mut out = String::new();
        for rule in &self.rules {
            out.push_str(&rule.id);
            out.push(':');
            out.push_str(&rule.file);
            if let Some(line) = rule.line {
                out.push(':');
                out.push_str(&line.to_string());
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str, file: &str, line: u32) -> MessageKey {
        MessageKey {
            id: id.to_string(),
            file: file.to_string(),
            line: Some(line),
        }
    }

    #[test]
    fn parse_full_spec() {
        let s = Suppression::parse_spec("uninitvar:src/a.c:17").unwrap();
        assert_eq!(s.id, "uninitvar");
        assert_eq!(s.file, "src/a.c");
        assert_eq!(s.line, Some(17));
    }

    #[test]
    fn id_only_spec_matches_any_location() {
        let mut supps = Suppressions::default();
        supps.add_spec("uninitvar").unwrap();
        assert!(supps.is_suppressed(&key("uninitvar", "x.c", 1)));
        assert!(!supps.is_suppressed(&key("nullPointer", "x.c", 1)));
    }

    #[test]
    fn wildcard_id_matches_everything() {
        let mut supps = Suppressions::default();
        supps.add_spec("*:generated/*").unwrap();
        assert!(supps.is_suppressed(&key("nullPointer", "generated/p.c", 2)));
        assert!(!supps.is_suppressed(&key("nullPointer", "src/p.c", 2)));
    }

    #[test]
    fn line_restriction_is_exact() {
        let mut supps = Suppressions::default();
        supps.add_spec("uninitvar:a.c:10").unwrap();
        assert!(supps.is_suppressed(&key("uninitvar", "a.c", 10)));
        assert!(!supps.is_suppressed(&key("uninitvar", "a.c", 11)));
    }

    #[test]
    fn local_matching_only_sees_inline_rules() {
        let mut supps = Suppressions::default();
        supps.add_spec("uninitvar").unwrap();
        assert!(!supps.is_suppressed_local(&key("uninitvar", "a.c", 1)));
        supps.add(Suppression {
            id: "uninitvar".into(),
            file: "a.c".into(),
            line: Some(1),
            inline: true,
            matched: false,
        });
        assert!(supps.is_suppressed_local(&key("uninitvar", "a.c", 1)));
    }

    #[test]
    fn unmatched_rules_are_reported() {
        let mut supps = Suppressions::default();
        supps.add_spec("uninitvar").unwrap();
        supps.add_spec("nullPointer").unwrap();
        assert!(supps.is_suppressed(&key("uninitvar", "a.c", 1)));
        let unmatched: Vec<_> = supps.unmatched().map(|s| s.id.clone()).collect();
        assert_eq!(unmatched, vec!["nullPointer".to_string()]);
    }

    #[test]
    fn list_text_skips_comments_and_blanks() {
        let mut supps = Suppressions::default();
        supps
            .parse_list_text("# header\n\nuninitvar:a.c\nnullPointer\n")
            .unwrap();
        assert!(supps.is_suppressed(&key("nullPointer", "b.c", 3)));
    }
}
