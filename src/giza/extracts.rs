//! `extracts-*.yaml`: reusable content fragments (spec §4.5), grounded
//! on the original implementation's `gizaparser/extracts.py`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::{Node, NodeData, Options, Span};
use crate::diagnostic::Diagnostic;
use crate::fileid::FileId;
use crate::page::Page;

use super::entry::{substitute_text, GizaBase, GizaNode, Inherit};
use super::parse_embedded_block;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Extract {
    #[serde(flatten)]
    pub base: GizaBase,
    pub heading: Option<String>,
    pub content: Option<String>,
    pub only: Option<String>,
}

impl Extract {
    fn render(&self) -> Vec<Node> {
        let mut children = Vec::new();
        if let Some(heading) = &self.heading {
            children.push(Node::new(
                Span::new(self.base.line),
                NodeData::Heading {
                    children: parse_embedded_block(heading, self.base.line),
                    id: String::new(),
                },
            ));
        }
        if let Some(content) = &self.content {
            children.extend(parse_embedded_block(content, self.base.line));
        }
        children
    }
}

impl GizaNode for Extract {
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
        if self.heading.is_none() {
            self.heading = parent.heading.clone();
        }
        if self.content.is_none() {
            self.content = parent.content.clone();
        }
        if self.only.is_none() {
            self.only = parent.only.clone();
        }
        let mut merged = parent.base.replacement.clone();
        merged.extend(self.base.replacement.clone());
        self.base.replacement = merged;
    }
    fn apply_substitutions(&mut self, diagnostics: &mut Vec<Diagnostic>) {
        let repl = &self.base.replacement;
        if let Some(v) = &self.content {
            self.content = Some(substitute_text(v, repl, diagnostics, self.base.line));
        }
        if let Some(v) = &self.heading {
            self.heading = Some(substitute_text(v, repl, diagnostics, self.base.line));
        }
    }
}

/// Synthesizes one page per extract whose `ref` doesn't start with
/// `_` (an underscore-prefixed ref marks a private base for
/// inheritance only), matching `GizaExtractsCategory._generate_pages`.
pub fn extracts_to_pages(source_fileid: &FileId, extracts: &[Extract], text: &str) -> Vec<Page> {
    extracts
        .iter()
        .filter_map(|extract| {
            let ref_id = extract.base.ref_id.as_deref()?;
            if ref_id.starts_with('_') {
                return None;
            }
            let output_name = format!("{ref_id}.rst");
            let directive = Node::new(
                Span::new(extract.base.line),
                NodeData::Directive {
                    children: extract.render(),
                    domain: String::new(),
                    name: "extract".to_string(),
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
            page.category = Some("extracts".to_string());
            Some(page)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underscore_prefixed_ref_produces_no_page() {
        let extract = Extract {
            base: GizaBase {
                ref_id: Some("_private".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let pages = extracts_to_pages(&FileId::new("extracts-x.yaml"), &[extract], "");
        assert!(pages.is_empty());
    }

    #[test]
    fn visible_ref_produces_one_page() {
        let extract = Extract {
            base: GizaBase {
                ref_id: Some("public".to_string()),
                ..Default::default()
            },
            content: Some("hi".to_string()),
            ..Default::default()
        };
        let pages = extracts_to_pages(&FileId::new("extracts-x.yaml"), &[extract], "");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].output_filename, "public.rst");
    }
}
