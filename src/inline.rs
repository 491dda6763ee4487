//! Inline-markup recognizer (spec §4.3).
//!
//! Scans an already-escaped line of text (backslash escapes replaced by
//! the caller) left to right, recognizing emphasis/strong/literal,
//! substitution and footnote references, roles, explicit targets, and
//! standalone URIs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Node, NodeData, Span};
use crate::diagnostic::{Diagnostic, DiagnosticKind};

static STANDALONE_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:https?|ftp|mailto)://[^\s<>]+|\b[\w.+-]+@[\w-]+\.[\w.-]+\b")
        .expect("static regex")
});

static ROLE_EXPLICIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:([A-Za-z][\w-]*):`([^`]*)`$").expect("static regex"));
static ROLE_TRAILING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^`([^`]*)`:([A-Za-z][\w-]*):$").expect("static regex"));
static SUBSTITUTION_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|([^|]+)\|(__|_)?$").expect("static regex"));
static FOOTNOTE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(#[\w-]*|\*|\d+)\]_$").expect("static regex"));
static SIMPLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w][\w.+-]*?)(__|_)$").expect("static regex"));
static EXPLICIT_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*<([^<>]+)>$").expect("static regex"));

/// Parses one line of already-escaped inline text into a sequence of
/// inline nodes plus any diagnostics raised along the way.
pub fn parse_inline(text: &str, line: u32) -> (Vec<Node>, Vec<Diagnostic>) {
    let mut nodes = Vec::new();
    let mut diagnostics = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0usize;
    let mut plain = String::new();

    macro_rules! flush_plain {
        () => {
            if !plain.is_empty() {
                nodes.push(leaf(line, NodeData::Text { value: std::mem::take(&mut plain) }));
            }
        };
    }

    while i < chars.len() {
        let rest: String = chars[i..].iter().collect();

        if rest.starts_with("**") {
            if let Some((inner, consumed)) = take_delimited(&chars, i, "**", "**") {
                flush_plain!();
                let (children, mut d) = parse_inline(&inner, line);
                diagnostics.append(&mut d);
                nodes.push(leaf(line, NodeData::Strong { children }));
                i += consumed;
                continue;
            }
        }
        if rest.starts_with('*') {
            if let Some((inner, consumed)) = take_delimited(&chars, i, "*", "*") {
                flush_plain!();
                let (children, mut d) = parse_inline(&inner, line);
                diagnostics.append(&mut d);
                nodes.push(leaf(line, NodeData::Emphasis { children }));
                i += consumed;
                continue;
            }
        }
        if rest.starts_with("``") {
            if let Some((inner, consumed)) = take_delimited(&chars, i, "``", "``") {
                flush_plain!();
                nodes.push(leaf(
                    line,
                    NodeData::Literal {
                        children: vec![leaf(line, NodeData::Text { value: inner })],
                    },
                ));
                i += consumed;
                continue;
            }
        }
        if rest.starts_with('`') {
            // interpreted text / role / phrase reference: scan to matching closer,
            // allowing an optional leading `:role:` or trailing `:role:`.
            if let Some((whole, consumed)) = take_role_span(&chars, i) {
                flush_plain!();
                let (node, mut d) = parse_role_or_phrase(&whole, line);
                diagnostics.append(&mut d);
                nodes.push(node);
                i += consumed;
                continue;
            }
        }
        if chars[i] == '|' {
            if let Some((whole, consumed)) = take_token(&chars, i) {
                if let Some(caps) = SUBSTITUTION_REF.captures(&whole) {
                    flush_plain!();
                    let name = caps[1].to_string();
                    nodes.push(leaf(
                        line,
                        NodeData::SubstitutionReference {
                            children: vec![],
                            name,
                        },
                    ));
                    i += consumed;
                    continue;
                }
            }
        }
        if chars[i] == '[' {
            if let Some((whole, consumed)) = take_token(&chars, i) {
                if let Some(caps) = FOOTNOTE_REF.captures(&whole) {
                    flush_plain!();
                    let label = &caps[1];
                    let id = label.trim_start_matches('#').parse::<u32>().unwrap_or(0);
                    nodes.push(leaf(
                        line,
                        NodeData::FootnoteReference {
                            children: vec![],
                            id,
                            refname: if label.starts_with('#') && id == 0 {
                                None
                            } else {
                                Some(label.to_string())
                            },
                        },
                    ));
                    i += consumed;
                    continue;
                }
            }
        }

        // standalone URI / email at this position
        if let Some(m) = STANDALONE_URI.find(&rest) {
            if m.start() == 0 {
                flush_plain!();
                let uri = m.as_str().to_string();
                nodes.push(leaf(
                    line,
                    NodeData::Reference {
                        children: vec![leaf(line, NodeData::Text { value: uri.clone() })],
                        refuri: uri.clone(),
                        refname: None,
                    },
                ));
                i += uri.chars().count();
                continue;
            }
        }

        // bare `name_` / `name__` simple reference
        if let Some((whole, consumed)) = take_token(&chars, i) {
            if let Some(caps) = SIMPLE_REF.captures(&whole) {
                flush_plain!();
                let name = caps[1].to_string();
                nodes.push(leaf(
                    line,
                    NodeData::Reference {
                        children: vec![leaf(line, NodeData::Text { value: name.clone() })],
                        refuri: String::new(),
                        refname: Some(name),
                    },
                ));
                i += consumed;
                continue;
            }
        }

        plain.push(chars[i]);
        i += 1;
    }
    flush_plain!();

    let consumed_len: usize = text.chars().count();
    debug_assert!(consumed_len >= 0);
    (nodes, diagnostics)
}

fn leaf(line: u32, data: NodeData) -> Node {
    Node::new(Span::new(line), data)
}

/// Scans `**`/`*` delimited spans; the closing delimiter must not be
/// preceded by whitespace (so `* foo *bar*` doesn't prematurely close).
fn take_delimited(chars: &[char], start: usize, open: &str, close: &str) -> Option<(String, usize)> {
    let open_len = open.chars().count();
    let opening: String = chars[start..start + open_len.min(chars.len() - start)].iter().collect();
    if opening != open {
        return None;
    }
    let mut j = start + open_len;
    while j < chars.len() {
        let remaining: String = chars[j..].iter().collect();
        if remaining.starts_with(close) && j > start + open_len && chars[j - 1] != ' ' {
            let inner: String = chars[start + open_len..j].iter().collect();
            if inner.is_empty() {
                return None;
            }
            return Some((inner, j + close.chars().count() - start));
        }
        j += 1;
    }
    None
}

/// Grabs a `|...|` or `[...]_`-style token starting at `start` up to
/// the first whitespace or end of string (these constructs never
/// contain unescaped whitespace in their closing delimiter search).
fn take_token(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut j = start;
    while j < chars.len() && !chars[j].is_whitespace() {
        j += 1;
    }
    if j == start {
        return None;
    }
    let tok: String = chars[start..j].iter().collect();
    Some((tok, j - start))
}

/// Scans a backtick span (possibly with a leading/trailing `:role:`) to
/// its close.
fn take_role_span(chars: &[char], start: usize) -> Option<(String, usize)> {
    // optional leading `:name:`
    let mut scan_start = start;
    if start > 0 {
        // caller already positioned at the opening backtick or at `:role:`
    }
    let _ = scan_start;
    scan_start = start;

    let mut j = scan_start;
    // consume up to end of token sequence: find closing backtick then
    // optional trailing `_`/`__`/`:role:`
    if chars[j] != '`' {
        return None;
    }
    j += 1;
    let content_start = j;
    while j < chars.len() && chars[j] != '`' {
        j += 1;
    }
    if j >= chars.len() {
        return None;
    }
    let content_end = j;
    j += 1; // consume closing backtick
    let mut end = j;
    if end < chars.len() && chars[end] == '_' {
        end += 1;
        if end < chars.len() && chars[end] == '_' {
            end += 1;
        }
    } else {
        // trailing `:role:`
        if end + 1 < chars.len() && chars[end] == ':' {
            let mut k = end + 1;
            while k < chars.len() && (chars[k].is_alphanumeric() || chars[k] == '-') {
                k += 1;
            }
            if k < chars.len() && chars[k] == ':' {
                end = k + 1;
            }
        }
    }

    let whole: String = chars[start..end].iter().collect();
    let _ = content_start;
    let _ = content_end;
    Some((whole, end - start))
}

fn parse_role_or_phrase(whole: &str, line: u32) -> (Node, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    if let Some(caps) = ROLE_EXPLICIT.captures(whole) {
        let role_name = caps[1].to_string();
        let inner = caps[2].to_string();
        return build_role(&role_name, &inner, line);
    }
    if let Some(caps) = ROLE_TRAILING.captures(whole) {
        let inner = caps[1].to_string();
        let role_name = caps[2].to_string();
        return build_role(&role_name, &inner, line);
    }

    // bare interpreted text `...`[_[_]]
    let (body, is_ref, is_anon) = if let Some(stripped) = whole.strip_suffix("__") {
        (strip_backticks(stripped), true, true)
    } else if let Some(stripped) = whole.strip_suffix('_') {
        (strip_backticks(stripped), true, false)
    } else {
        (strip_backticks(whole), false, false)
    };
    let _ = is_anon;

    if is_ref {
        if let Some(caps) = EXPLICIT_TITLE.captures(&body) {
            let title = caps[1].trim().to_string();
            let target = caps[2].trim().to_string();
            return (
                leaf(
                    line,
                    NodeData::Reference {
                        children: vec![leaf(line, NodeData::Text { value: title })],
                        refuri: target,
                        refname: None,
                    },
                ),
                diagnostics,
            );
        }
        return (
            leaf(
                line,
                NodeData::Reference {
                    children: vec![leaf(line, NodeData::Text { value: body.clone() })],
                    refuri: String::new(),
                    refname: Some(body),
                },
            ),
            diagnostics,
        );
    }

    diagnostics.push(Diagnostic::new(
        DiagnosticKind::Other {
            message: "monospace with two backticks is not a role".to_string(),
        },
        line,
    ));
    (
        leaf(
            line,
            NodeData::Literal {
                children: vec![leaf(line, NodeData::Text { value: body })],
            },
        ),
        diagnostics,
    )
}

fn strip_backticks(s: &str) -> String {
    s.trim_start_matches('`').trim_end_matches('`').to_string()
}

fn build_role(role_name: &str, inner: &str, line: u32) -> (Node, Vec<Diagnostic>) {
    let diagnostics = Vec::new();
    let (domain, name) = match role_name.split_once(':') {
        Some((d, n)) => (d.to_string(), n.to_string()),
        None => (String::new(), role_name.to_string()),
    };

    if name == "ref" || name == "doc" {
        let mut target = inner.trim().to_string();
        let mut flag = None;
        if let Some(rest) = target.strip_prefix('~') {
            flag = Some('~');
            target = rest.to_string();
        } else if let Some(rest) = target.strip_prefix('!') {
            flag = Some('!');
            target = rest.to_string();
        }
        let (title, target) = if let Some(caps) = EXPLICIT_TITLE.captures(&target) {
            (Some(caps[1].trim().to_string()), caps[2].trim().to_string())
        } else {
            (None, target)
        };
        let children = title
            .map(|t| vec![leaf(line, NodeData::Text { value: t })])
            .unwrap_or_default();
        return (
            leaf(
                line,
                NodeData::RefRole {
                    children,
                    domain,
                    name,
                    target,
                    flag,
                    fileid: None,
                    url: None,
                },
            ),
            diagnostics,
        );
    }

    (
        leaf(
            line,
            NodeData::Role {
                children: vec![leaf(line, NodeData::Text { value: inner.to_string() })],
                domain,
                name,
                target: inner.to_string(),
                flag: None,
            },
        ),
        diagnostics,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_text() {
        let (nodes, diags) = parse_inline("hello world", 1);
        assert!(diags.is_empty());
        assert_eq!(nodes.len(), 1);
        assert!(matches!(nodes[0].data, NodeData::Text { .. }));
    }

    #[test]
    fn parses_strong_and_emphasis() {
        let (nodes, _) = parse_inline("a **b** c *d*", 1);
        assert!(nodes.iter().any(|n| matches!(n.data, NodeData::Strong { .. })));
        assert!(nodes.iter().any(|n| matches!(n.data, NodeData::Emphasis { .. })));
    }

    #[test]
    fn parses_substitution_reference() {
        let (nodes, diags) = parse_inline("foo |bar|", 1);
        assert!(diags.is_empty());
        assert!(nodes
            .iter()
            .any(|n| matches!(&n.data, NodeData::SubstitutionReference{name, ..} if name == "bar")));
    }

    #[test]
    fn parses_ref_role() {
        let (nodes, _) = parse_inline(":ref:`a`", 1);
        assert_eq!(nodes.len(), 1);
        match &nodes[0].data {
            NodeData::RefRole { domain, name, target, .. } => {
                assert_eq!(domain, "");
                assert_eq!(name, "ref");
                assert_eq!(target, "a");
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn parses_standalone_uri() {
        let (nodes, _) = parse_inline("see https://example.com for more", 1);
        assert!(nodes
            .iter()
            .any(|n| matches!(&n.data, NodeData::Reference{refuri, ..} if refuri == "https://example.com")));
    }
}
