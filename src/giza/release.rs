//! `release-*.yaml`: release-specific code/prose snippets (spec §4.5),
//! grounded on the original implementation's `gizaparser/release.py`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::{Node, NodeData, Options, Span};
use crate::diagnostic::Diagnostic;
use crate::fileid::FileId;
use crate::page::Page;

use super::entry::{substitute_text, GizaBase, GizaNode, Inherit};
use super::{code_node, parse_embedded_block};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseSpecification {
    #[serde(flatten)]
    pub base: GizaBase,
    pub pre: Option<String>,
    pub copyable: Option<bool>,
    pub language: Option<String>,
    pub code: Option<String>,
}

impl ReleaseSpecification {
    fn render(&self) -> Vec<Node> {
        let mut children = Vec::new();
        if let Some(pre) = &self.pre {
            children.extend(parse_embedded_block(pre, self.base.line));
        }
        if let Some(code) = &self.code {
            children.push(code_node(
                self.base.line,
                self.language.clone(),
                self.copyable.unwrap_or(true),
                code.clone(),
            ));
        }
        children
    }
}

impl GizaNode for ReleaseSpecification {
    fn ref_id(&self) -> Option<&str> {
        self.base.ref_id.as_deref()
    }
    fn line(&self) -> u32 {
        self.base.line
    }
    fn source(&self) -> Option<&Inherit> {
        self.base.source.as_ref()
    }
    fn replacement(&self) -> &HashMap<String, String> {
        &self.base.replacement
    }
    fn inherit_from(&mut self, parent: &Self) {
        if self.pre.is_none() {
            self.pre = parent.pre.clone();
        }
        if self.copyable.is_none() {
            self.copyable = parent.copyable;
        }
        if self.language.is_none() {
            self.language = parent.language.clone();
        }
        if self.code.is_none() {
            self.code = parent.code.clone();
        }
        let mut merged = parent.base.replacement.clone();
        merged.extend(self.base.replacement.clone());
        self.base.replacement = merged;
    }
    fn apply_substitutions(&mut self, diagnostics: &mut Vec<Diagnostic>) {
        let repl = &self.base.replacement;
        if let Some(v) = &self.pre {
            self.pre = Some(substitute_text(v, repl, diagnostics, self.base.line));
        }
        if let Some(v) = &self.code {
            self.code = Some(substitute_text(v, repl, diagnostics, self.base.line));
        }
    }
}

/// Synthesizes one page per node whose `ref` does not start with `_`,
/// matching `GizaReleaseSpecificationCategory._generate_pages`.
pub fn release_to_pages(
    source_fileid: &FileId,
    nodes: &[ReleaseSpecification],
    text: &str,
) -> Vec<Page> {
    nodes
        .iter()
        .filter_map(|node| {
            let ref_id = node.base.ref_id.as_deref()?;
            if ref_id.starts_with('_') {
                return None;
            }
            let output_name = format!("{ref_id}.rst");
            let directive = Node::new(
                Span::new(node.base.line),
                NodeData::Directive {
                    children: node.render(),
                    domain: String::new(),
                    name: "release_specification".to_string(),
                    argument: vec![],
                    options: Options::new(),
                },
            );
            let root = Node::new(
                Span::new(0),
                NodeData::Root {
                    children: vec![directive],
                    options: Options::new(),
                    fileid: source_fileid.clone(),
                },
            );
            let mut page = Page::create(source_fileid.clone(), output_name, text.to_string(), root);
            page.category = Some("release".to_string());
            Some(page)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherit_fills_code_and_language() {
        let mut child = ReleaseSpecification {
            base: GizaBase {
                ref_id: Some("child".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let parent = ReleaseSpecification {
            code: Some("echo hi".to_string()),
            language: Some("sh".to_string()),
            ..Default::default()
        };
        child.inherit_from(&parent);
        assert_eq!(child.code.as_deref(), Some("echo hi"));
        assert_eq!(child.language.as_deref(), Some("sh"));
    }
}
