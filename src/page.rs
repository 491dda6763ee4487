//! `Page`: a parsed or synthesized document (spec §3).

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assets::{blake2b_hex, StaticAsset};
use crate::ast::{Node, NodeData};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::directives::PendingTask;
use crate::fileid::FileId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub fileid: FileId,
    pub output_filename: String,
    pub source: String,
    pub ast: Node,
    pub blake2b: String,
    pub dependencies: HashMap<FileId, String>,
    pub static_assets: HashSet<StaticAsset>,
    pub category: Option<String>,
}

impl Page {
    /// Mirrors `Page.create` in the original implementation: the
    /// blake2b fingerprint is computed at construction time from the
    /// source bytes, directly supporting testable property 1 (spec
    /// §8): `P.blake2b == blake2b(P.source)`.
    pub fn create(fileid: FileId, output_filename: impl Into<String>, source: String, ast: Node) -> Self {
        let blake2b = blake2b_hex(source.as_bytes());
        Page {
            fileid,
            output_filename: output_filename.into(),
            source,
            ast,
            blake2b,
            dependencies: HashMap::new(),
            static_assets: HashSet::new(),
            category: None,
        }
    }

    /// Executes and clears pending tasks: deferred literal-include
    /// reads and image checksums, in the order their marker nodes
    /// appear in the AST (source order), matching the order
    /// `pending_tasks` were recorded in during parsing.
    pub fn finish(&mut self, root: &Path, pending_tasks: Vec<PendingTask>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut tasks = pending_tasks.into_iter();

        self.ast.for_each_mut(&mut |node: &mut Node| match &mut node.data {
            NodeData::Code { value, lang, .. } if value.is_empty() => {
                if let Some(PendingTask::LiteralInclude {
                    path,
                    start_after,
                    end_before,
                    dedent,
                    language,
                }) = tasks.next()
                {
                    let full_path = root.join(path.as_path());
                    match std::fs::read_to_string(&full_path) {
                        Ok(contents) => {
                            self.dependencies.insert(path.clone(), blake2b_hex(contents.as_bytes()));
                            match apply_literal_include_trim(&contents, start_after.as_deref(), end_before.as_deref()) {
                                Ok(mut trimmed) => {
                                    if dedent {
                                        trimmed = dedent_text(&trimmed);
                                    }
                                    *value = trimmed;
                                    if let Some(l) = language {
                                        *lang = Some(l);
                                    }
                                }
                                Err(msg) => {
                                    diagnostics.push(Diagnostic::new(
                                        DiagnosticKind::InvalidLiteralInclude { message: msg },
                                        node.span.start_line,
                                    ));
                                }
                            }
                        }
                        Err(err) => {
                            diagnostics.push(Diagnostic::new(
                                DiagnosticKind::CannotOpenFile {
                                    path: full_path,
                                    reason: err.to_string(),
                                },
                                node.span.start_line,
                            ));
                        }
                    }
                }
            }
            NodeData::Directive { name, options, .. }
                if matches!(name.as_str(), "figure" | "image" | "atf-image")
                    && !options.contains_key("checksum") =>
            {
                if let Some(PendingTask::ImageChecksum { path }) = tasks.next() {
                    let full_path = root.join(path.as_path());
                    match std::fs::read(&full_path) {
                        Ok(bytes) => {
                            let checksum = blake2b_hex(&bytes);
                            options.insert(
                                "checksum".to_string(),
                                crate::ast::OptionValue::Str(checksum),
                            );
                            self.static_assets.insert(StaticAsset::new(
                                path.as_posix(),
                                path.clone(),
                                full_path.clone(),
                                true,
                            ));
                        }
                        Err(err) => {
                            diagnostics.push(Diagnostic::new(
                                DiagnosticKind::CannotOpenFile {
                                    path: full_path,
                                    reason: err.to_string(),
                                },
                                node.span.start_line,
                            ));
                        }
                    }
                }
            }
            _ => {}
        });

        diagnostics
    }
}

/// Applies `start-after`/`end-before` substring trimming. With neither
/// option the entire file is returned. A `start-after` occurring after
/// `end-before` is an error producing empty content (spec §8 boundary
/// behaviors).
fn apply_literal_include_trim(
    text: &str,
    start_after: Option<&str>,
    end_before: Option<&str>,
) -> Result<String, String> {
    let start_idx = match start_after {
        Some(anchor) => match text.find(anchor) {
            Some(idx) => Some(idx + anchor.len()),
            None => return Err(format!("start-after anchor {anchor:?} not found")),
        },
        None => None,
    };
    let end_idx = match end_before {
        Some(anchor) => match text.find(anchor) {
            Some(idx) => Some(idx),
            None => return Err(format!("end-before anchor {anchor:?} not found")),
        },
        None => None,
    };

    match (start_idx, end_idx) {
        (Some(s), Some(e)) if s > e => {
            Err("start-after occurs after end-before".to_string())
        }
        (Some(s), Some(e)) => Ok(text[s..e].trim_matches('\n').to_string()),
        (Some(s), None) => Ok(text[s..].trim_matches('\n').to_string()),
        (None, Some(e)) => Ok(text[..e].trim_matches('\n').to_string()),
        (None, None) => Ok(text.to_string()),
    }
}

fn dedent_text(text: &str) -> String {
    let min_indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|l| if l.len() >= min_indent { &l[min_indent..] } else { l })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b_matches_source() {
        let ast = Node::new(
            crate::ast::Span::new(1),
            NodeData::Root {
                children: vec![],
                options: Default::default(),
                fileid: FileId::new("a.rst"),
            },
        );
        let page = Page::create(FileId::new("a.rst"), "a.html", "hello".to_string(), ast);
        assert_eq!(page.blake2b, blake2b_hex(b"hello"));
    }

    #[test]
    fn literal_include_with_neither_anchor_returns_whole_file() {
        let result = apply_literal_include_trim("a\nb\nc", None, None).unwrap();
        assert_eq!(result, "a\nb\nc");
    }

    #[test]
    fn literal_include_start_after_end_before_order_errors() {
        let text = "one end two start three";
        let err = apply_literal_include_trim(text, Some("start"), Some("end")).unwrap_err();
        assert!(err.contains("after"));
    }

    #[test]
    fn dedent_strips_minimum_indent() {
        let result = dedent_text("  foo\n    bar\n");
        assert_eq!(result, "foo\n  bar\n");
    }
}
