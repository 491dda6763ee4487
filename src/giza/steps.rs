//! `steps-*.yaml`: numbered procedures (spec §4.5), grounded on the
//! original implementation's `gizaparser/steps.py`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::{Node, NodeData, Options, Span};
use crate::diagnostic::Diagnostic;
use crate::fileid::FileId;
use crate::page::Page;

use super::entry::{substitute_text, GizaBase, GizaNode, Inherit};
use super::{code_node, parse_embedded_block};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Action {
    pub heading: Option<String>,
    pub code: Option<String>,
    pub copyable: Option<bool>,
    pub content: Option<String>,
    pub language: Option<String>,
    pub post: Option<String>,
    pub pre: Option<String>,
    #[serde(skip)]
    pub line: u32,
}

impl Action {
    fn render(&self) -> Vec<Node> {
        let mut children: Vec<Node> = Vec::new();
        if let Some(heading) = &self.heading {
            let heading_children = parse_embedded_block(heading, self.line);
            let section = Node::new(
                Span::new(self.line),
                NodeData::Section {
                    children: vec![Node::new(
                        Span::new(self.line),
                        NodeData::Heading {
                            children: heading_children,
                            id: String::new(),
                        },
                    )],
                },
            );
            return vec![section];
        }
        if let Some(pre) = &self.pre {
            children.extend(parse_embedded_block(pre, self.line));
        }
        if let Some(code) = &self.code {
            children.push(code_node(
                self.line,
                self.language.clone(),
                self.copyable.unwrap_or(true),
                code.clone(),
            ));
        }
        if let Some(content) = &self.content {
            children.extend(parse_embedded_block(content, self.line));
        }
        if let Some(post) = &self.post {
            children.extend(parse_embedded_block(post, self.line));
        }
        children
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub base: GizaBase,
    pub heading: Option<String>,
    pub stepnum: Option<u32>,
    pub content: Option<String>,
    pub post: Option<String>,
    pub pre: Option<String>,
    pub level: Option<u32>,
    pub optional: Option<bool>,
    #[serde(default)]
    pub action: Vec<Action>,
}

impl Step {
    pub fn render(&self) -> Node {
        let mut children: Vec<Node> = Vec::new();
        if let Some(heading) = &self.heading {
            children.push(Node::new(
                Span::new(self.base.line),
                NodeData::Heading {
                    children: parse_embedded_block(heading, self.base.line),
                    id: String::new(),
                },
            ));
        }
        if let Some(pre) = &self.pre {
            children.extend(parse_embedded_block(pre, self.base.line));
        }
        for action in &self.action {
            children.extend(action.render());
        }
        if let Some(content) = &self.content {
            children.extend(parse_embedded_block(content, self.base.line));
        }
        if let Some(post) = &self.post {
            children.extend(parse_embedded_block(post, self.base.line));
        }
        Node::new(Span::new(self.base.line), NodeData::Section { children })
    }
}

impl GizaNode for Step {
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
        macro_rules! fill {
            ($field:ident) => {
                if self.$field.is_none() {
                    self.$field = parent.$field.clone();
                }
            };
        }
        fill!(heading);
        fill!(stepnum);
        fill!(content);
        fill!(post);
        fill!(pre);
        fill!(level);
        fill!(optional);
        if self.action.is_empty() {
            self.action = parent.action.clone();
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
        if let Some(v) = &self.pre {
            self.pre = Some(substitute_text(v, repl, diagnostics, self.base.line));
        }
        if let Some(v) = &self.post {
            self.post = Some(substitute_text(v, repl, diagnostics, self.base.line));
        }
        if let Some(v) = &self.heading {
            self.heading = Some(substitute_text(v, repl, diagnostics, self.base.line));
        }
        for action in &mut self.action {
            action.line = self.base.line;
            if let Some(v) = &action.content {
                action.content = Some(substitute_text(v, repl, diagnostics, self.base.line));
            }
            if let Some(v) = &action.pre {
                action.pre = Some(substitute_text(v, repl, diagnostics, self.base.line));
            }
            if let Some(v) = &action.post {
                action.post = Some(substitute_text(v, repl, diagnostics, self.base.line));
            }
        }
    }
}

/// Wraps a file's resolved steps in a `procedure` directive and
/// synthesizes the output page, stripping the `steps-` filename prefix
/// the way the original implementation's `_generate_pages` does.
pub fn steps_to_page(source_fileid: &FileId, steps: &[Step], text: &str) -> Page {
    let name = source_fileid.name();
    let output_name = name
        .strip_prefix("steps-")
        .unwrap_or(&name)
        .replace(".yaml", ".rst");

    let mut options = Options::new();
    options.insert(
        "style".to_string(),
        crate::ast::OptionValue::Str("normal".to_string()),
    );
    let children: Vec<Node> = steps
        .iter()
        .map(|s| Node::new(Span::new(s.base.line), NodeData::Directive {
            children: vec![s.render()],
            domain: String::new(),
            name: "step".to_string(),
            argument: vec![],
            options: Options::new(),
        }))
        .collect();
    let procedure = Node::new(
        Span::new(0),
        NodeData::Directive {
            children,
            domain: String::new(),
            name: "procedure".to_string(),
            argument: vec![],
            options,
        },
    );
    let root = Node::new(
        Span::new(0),
        NodeData::Root {
            children: vec![procedure],
            options: Options::new(),
            fileid: source_fileid.clone(),
        },
    );
    let mut page = Page::create(source_fileid.clone(), output_name, text.to_string(), root);
    page.category = Some("steps".to_string());
    page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_filename_strips_prefix() {
        let page = steps_to_page(&FileId::new("steps-install.yaml"), &[], "");
        assert_eq!(page.output_filename, "install.rst");
    }

    #[test]
    fn inherit_fills_missing_content_only() {
        let mut child = Step {
            base: GizaBase {
                ref_id: Some("child".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let parent = Step {
            content: Some("parent content".to_string()),
            ..Default::default()
        };
        child.inherit_from(&parent);
        assert_eq!(child.content.as_deref(), Some("parent content"));
    }
}
