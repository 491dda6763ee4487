//! Tagged-variant AST, serializable to a JSON-ish map keyed by `type`.
//!
//! Mirrors the dataclass hierarchy in the original implementation's `n.py`,
//! adapted to an explicit Rust enum rather than class-name dispatch (per
//! the re-architecture guidance: replace `getattr(self, "handle_" + ...)`
//! dispatch with a visitor over the tagged variant).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::fileid::FileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start_line: u32,
}

impl Span {
    pub fn new(start_line: u32) -> Self {
        Span { start_line }
    }
}

/// A directive/role/rstobject option value, once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Length { value: f64, unit: String },
    Flag,
    Linenos(Vec<(u32, u32)>),
}

pub type Options = HashMap<String, OptionValue>;

/// A single node in the AST. Serializes as a JSON-ish map keyed by
/// `type` via `#[serde(tag = "type")]` on [`NodeData`], flattened here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub span: Span,
    #[serde(flatten)]
    pub data: NodeData,
}

impl Node {
    pub fn new(span: Span, data: NodeData) -> Self {
        Node { span, data }
    }

    pub fn children(&self) -> &[Node] {
        self.data.children()
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        self.data.children_mut()
    }

    pub fn is_inline(&self) -> bool {
        self.data.is_inline()
    }

    pub fn is_leaf(&self) -> bool {
        self.data.is_leaf()
    }

    /// Concatenated text of this node and its descendants (for titles,
    /// labels, etc).
    pub fn get_text(&self) -> String {
        match &self.data {
            NodeData::Text { value } => value.clone(),
            _ => self
                .children()
                .iter()
                .map(|c| c.get_text())
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    pub fn for_each(&self, f: &mut dyn FnMut(&Node)) {
        f(self);
        for child in self.children() {
            child.for_each(f);
        }
    }

    pub fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut Node)) {
        f(self);
        for child in self.children_mut() {
            child.for_each_mut(f);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeData {
    // --- leaves ---
    Text {
        value: String,
    },
    Code {
        #[serde(skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        copyable: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        emphasize_lines: Option<Vec<(u32, u32)>>,
        value: String,
    },
    Transition {},
    TargetIdentifier {
        ids: Vec<String>,
    },
    Literal {
        children: Vec<Node>,
    },

    // --- inline parents ---
    Emphasis {
        children: Vec<Node>,
    },
    Strong {
        children: Vec<Node>,
    },
    Reference {
        children: Vec<Node>,
        refuri: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        refname: Option<String>,
    },
    RefRole {
        children: Vec<Node>,
        domain: String,
        name: String,
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        flag: Option<char>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fileid: Option<(FileId, String)>,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Role {
        children: Vec<Node>,
        domain: String,
        name: String,
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        flag: Option<char>,
    },
    SubstitutionReference {
        children: Vec<Node>,
        name: String,
    },
    FootnoteReference {
        children: Vec<Node>,
        id: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        refname: Option<String>,
    },

    // --- block parents ---
    Paragraph {
        children: Vec<Node>,
    },
    Section {
        children: Vec<Node>,
    },
    Heading {
        children: Vec<Node>,
        id: String,
    },
    ListNode {
        children: Vec<Node>,
        ordered: bool,
    },
    ListNodeItem {
        children: Vec<Node>,
    },
    DefinitionList {
        children: Vec<Node>,
    },
    DefinitionListItem {
        children: Vec<Node>,
        term: String,
    },
    Line {
        children: Vec<Node>,
    },
    LineBlock {
        children: Vec<Node>,
    },
    Footnote {
        children: Vec<Node>,
        id: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    SubstitutionDefinition {
        children: Vec<Node>,
        name: String,
    },
    Table {
        children: Vec<Node>,
    },
    Directive {
        children: Vec<Node>,
        domain: String,
        name: String,
        argument: Vec<Node>,
        options: Options,
    },
    TocTreeDirective {
        children: Vec<Node>,
        domain: String,
        name: String,
        argument: Vec<Node>,
        options: Options,
        entries: Vec<TocTreeDirectiveEntry>,
    },
    DirectiveArgument {
        children: Vec<Node>,
    },
    Target {
        children: Vec<Node>,
        domain: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        refuri: Option<String>,
    },
    Root {
        children: Vec<Node>,
        options: Options,
        fileid: FileId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocTreeDirectiveEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Vec<Node>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

static NO_CHILDREN: [Node; 0] = [];

impl NodeData {
    pub fn children(&self) -> &[Node] {
        use NodeData::*;
        match self {
            Text { .. } | Code { .. } | Transition {} | TargetIdentifier { .. } => &NO_CHILDREN,
            Literal { children }
            | Emphasis { children }
            | Strong { children }
            | Reference { children, .. }
            | RefRole { children, .. }
            | Role { children, .. }
            | SubstitutionReference { children, .. }
            | FootnoteReference { children, .. }
            | Paragraph { children }
            | Section { children }
            | Heading { children, .. }
            | ListNode { children, .. }
            | ListNodeItem { children }
            | DefinitionList { children }
            | DefinitionListItem { children, .. }
            | Line { children }
            | LineBlock { children }
            | Footnote { children, .. }
            | SubstitutionDefinition { children, .. }
            | Table { children }
            | Directive { children, .. }
            | TocTreeDirective { children, .. }
            | DirectiveArgument { children }
            | Target { children, .. }
            | Root { children, .. } => children,
        }
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        use NodeData::*;
        match self {
            Text { .. } | Code { .. } | Transition {} | TargetIdentifier { .. } => {
                panic!("leaf node has no mutable children vec")
            }
            Literal { children }
            | Emphasis { children }
            | Strong { children }
            | Reference { children, .. }
            | RefRole { children, .. }
            | Role { children, .. }
            | SubstitutionReference { children, .. }
            | FootnoteReference { children, .. }
            | Paragraph { children }
            | Section { children }
            | Heading { children, .. }
            | ListNode { children, .. }
            | ListNodeItem { children }
            | DefinitionList { children }
            | DefinitionListItem { children, .. }
            | Line { children }
            | LineBlock { children }
            | Footnote { children, .. }
            | SubstitutionDefinition { children, .. }
            | Table { children }
            | Directive { children, .. }
            | TocTreeDirective { children, .. }
            | DirectiveArgument { children }
            | Target { children, .. }
            | Root { children, .. } => children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            NodeData::Text { .. }
                | NodeData::Code { .. }
                | NodeData::Transition {}
                | NodeData::TargetIdentifier { .. }
        )
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            NodeData::Text { .. }
                | NodeData::Literal { .. }
                | NodeData::Emphasis { .. }
                | NodeData::Strong { .. }
                | NodeData::Reference { .. }
                | NodeData::RefRole { .. }
                | NodeData::Role { .. }
                | NodeData::SubstitutionReference { .. }
                | NodeData::FootnoteReference { .. }
        )
    }

    /// Verifies structural invariants local to this node (spec §3):
    /// inline-parent children are all inline, `RefRole` has exactly one
    /// of fileid/url once resolved, sections start with at most one
    /// heading as their first child.
    pub fn verify(&self) -> Result<(), String> {
        if self.is_inline() {
            for child in self.children() {
                if !child.is_inline() {
                    return Err(format!(
                        "inline parent contains non-inline child: {:?}",
                        child.data
                    ));
                }
            }
        }
        if let NodeData::RefRole {
            fileid, url, name, ..
        } = self
        {
            if fileid.is_some() && url.is_some() {
                return Err(format!("ref_role '{name}' has both fileid and url set"));
            }
        }
        if let NodeData::Section { children } = self {
            for (i, child) in children.iter().enumerate() {
                if matches!(child.data, NodeData::Heading { .. }) && i != 0 {
                    return Err("section has a heading that is not its first child".to_string());
                }
            }
        }
        Ok(())
    }
}
