//! Standard directive rules (spec §4.4).

use crate::ast::{Node, NodeData, OptionValue, Options, Span, TocTreeDirectiveEntry};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::directives::{DirectiveResult, PendingTask};
use crate::fileid::FileId;
use crate::inline::parse_inline;
use crate::spec::validators::PrimitiveType;

/// Raw, unvalidated input to a directive handler.
pub struct RawDirective<'a> {
    pub domain: &'a str,
    pub name: &'a str,
    pub argument: Option<String>,
    pub options: Vec<(String, String)>,
    pub content: Vec<String>,
    pub line: u32,
}

fn leaf(line: u32, data: NodeData) -> Node {
    Node::new(Span::new(line), data)
}

fn paragraph_from_text(text: &str, line: u32) -> Node {
    let (children, _diags) = parse_inline(text, line);
    leaf(line, NodeData::Paragraph { children })
}

/// Dispatches a raw directive invocation to its handler. Directives not
/// named here fall through to the generic case: validate options
/// against the spec registry, parse `content` as nested blocks.
pub fn run_directive(raw: RawDirective<'_>) -> DirectiveResult {
    match raw.name {
        "code-block" | "code" | "sourcecode" => code_block(raw),
        "literalinclude" => literal_include(raw),
        "include" => include_directive(raw),
        "figure" | "image" | "atf-image" => image_directive(raw),
        "list-table" => list_table(raw),
        "toctree" => toctree(raw),
        "versionadded" | "versionchanged" | "deprecated" => version_note(raw),
        "todo" => todo_directive(raw),
        _ => generic_directive(raw),
    }
}

fn option_map(options: &[(String, String)]) -> std::collections::HashMap<String, String> {
    options.iter().cloned().collect()
}

fn code_block(raw: RawDirective<'_>) -> DirectiveResult {
    let mut diagnostics = Vec::new();
    let opts = option_map(&raw.options);

    let copyable = match opts.get("copyable") {
        Some(v) => PrimitiveType::Boolean
            .validate(v)
            .ok()
            .and_then(|v| match v {
                OptionValue::Bool(b) => Some(b),
                _ => None,
            })
            .unwrap_or(true),
        None => true,
    };

    let value = raw.content.join("\n");
    let line_count = raw.content.len().max(1) as u32;

    let emphasize_lines = match opts.get("emphasize-lines") {
        Some(v) => match PrimitiveType::Linenos.validate(v) {
            Ok(OptionValue::Linenos(ranges)) => {
                let invalid = ranges.iter().any(|(s, e)| *s > line_count || *e > line_count);
                if invalid {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::InvalidTableStructure {
                            message: format!("invalid emphasize-lines specification: {v}"),
                        },
                        raw.line,
                    ));
                }
                Some(ranges)
            }
            Err(_) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::InvalidTableStructure {
                        message: format!("invalid emphasize-lines specification: {v}"),
                    },
                    raw.line,
                ));
                None
            }
        },
        None => None,
    };

    let node = leaf(
        raw.line,
        NodeData::Code {
            lang: raw.argument,
            copyable,
            emphasize_lines,
            value,
        },
    );

    DirectiveResult {
        nodes: vec![node],
        pending_tasks: vec![],
        diagnostics,
    }
}

fn literal_include(raw: RawDirective<'_>) -> DirectiveResult {
    let opts = option_map(&raw.options);
    let mut diagnostics = Vec::new();

    let path = match &raw.argument {
        Some(p) if !p.trim().is_empty() => FileId::new(p.trim()),
        _ => {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::ExpectedPathArg {
                    name: std::path::PathBuf::new(),
                },
                raw.line,
            ));
            return DirectiveResult {
                nodes: vec![],
                pending_tasks: vec![],
                diagnostics,
            };
        }
    };

    let start_after = opts.get("start-after").cloned();
    let end_before = opts.get("end-before").cloned();
    let dedent = opts.contains_key("dedent");
    let language = opts.get("language").cloned();

    let node = leaf(
        raw.line,
        NodeData::Code {
            lang: language.clone(),
            copyable: true,
            emphasize_lines: None,
            value: String::new(),
        },
    );

    DirectiveResult {
        nodes: vec![node],
        pending_tasks: vec![PendingTask::LiteralInclude {
            path,
            start_after,
            end_before,
            dedent,
            language,
        }],
        diagnostics,
    }
}

fn include_directive(raw: RawDirective<'_>) -> DirectiveResult {
    let mut options = Options::new();
    if let Some(arg) = &raw.argument {
        options.insert("path".to_string(), OptionValue::Str(arg.clone()));
    }
    let node = leaf(
        raw.line,
        NodeData::Directive {
            children: vec![],
            domain: raw.domain.to_string(),
            name: "include".to_string(),
            argument: raw
                .argument
                .map(|a| vec![paragraph_from_text(&a, raw.line)])
                .unwrap_or_default(),
            options,
        },
    );
    DirectiveResult {
        nodes: vec![node],
        pending_tasks: vec![],
        diagnostics: vec![],
    }
}

fn image_directive(raw: RawDirective<'_>) -> DirectiveResult {
    let mut diagnostics = Vec::new();
    let path = match &raw.argument {
        Some(p) if !p.trim().is_empty() => FileId::new(p.trim()),
        _ => {
            diagnostics.push(Diagnostic::new(DiagnosticKind::ExpectedImgArg, raw.line));
            return DirectiveResult {
                nodes: vec![],
                pending_tasks: vec![],
                diagnostics,
            };
        }
    };

    let mut options = Options::new();
    for (k, v) in &raw.options {
        options.insert(k.clone(), OptionValue::Str(v.clone()));
    }

    let node = leaf(
        raw.line,
        NodeData::Directive {
            children: vec![],
            domain: raw.domain.to_string(),
            name: raw.name.to_string(),
            argument: vec![paragraph_from_text(&path.as_posix(), raw.line)],
            options,
        },
    );

    DirectiveResult {
        nodes: vec![node],
        pending_tasks: vec![PendingTask::ImageChecksum { path }],
        diagnostics,
    }
}

fn list_table(raw: RawDirective<'_>) -> DirectiveResult {
    let mut diagnostics = Vec::new();
    let opts = option_map(&raw.options);

    let declared_widths = opts.get("widths").map(|v| v.split(',').count());

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut current_cell: Option<String> = None;
    for line in &raw.content {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("* - ") {
            if let Some(cell) = current_cell.take() {
                current_row.push(cell);
            }
            if !current_row.is_empty() {
                rows.push(std::mem::take(&mut current_row));
            }
            current_cell = Some(rest.to_string());
        } else if let Some(rest) = trimmed.strip_prefix("- ") {
            if let Some(cell) = current_cell.take() {
                current_row.push(cell);
            }
            current_cell = Some(rest.to_string());
        } else if let Some(cell) = current_cell.as_mut() {
            cell.push(' ');
            cell.push_str(trimmed);
        }
    }
    if let Some(cell) = current_cell.take() {
        current_row.push(cell);
    }
    if !current_row.is_empty() {
        rows.push(current_row);
    }

    let expected = declared_widths.or_else(|| rows.first().map(|r| r.len()));
    if let Some(expected) = expected {
        for row in &rows {
            if row.len() != expected {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::InvalidTableStructure {
                        message: format!(
                            "row has {} columns, expected {}",
                            row.len(),
                            expected
                        ),
                    },
                    raw.line,
                ));
            }
        }
    }

    let children: Vec<Node> = rows
        .into_iter()
        .map(|row| {
            let cells: Vec<Node> = row
                .into_iter()
                .map(|cell| paragraph_from_text(&cell, raw.line))
                .collect();
            leaf(raw.line, NodeData::ListNodeItem { children: cells })
        })
        .collect();

    let node = leaf(raw.line, NodeData::Table { children });
    DirectiveResult {
        nodes: vec![node],
        pending_tasks: vec![],
        diagnostics,
    }
}

fn toctree(raw: RawDirective<'_>) -> DirectiveResult {
    let mut diagnostics = Vec::new();
    let mut entries = Vec::new();

    for line in &raw.content {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(caps) = regex::Regex::new(r"^(.*?)\s*<([^<>]+)>$")
            .unwrap()
            .captures(trimmed)
        {
            let label = caps[1].trim().to_string();
            let target = caps[2].trim().to_string();
            if url::Url::parse(&target).is_ok() {
                entries.push(TocTreeDirectiveEntry {
                    title: Some(vec![paragraph_from_text(&label, raw.line)]),
                    url: Some(target),
                    slug: None,
                });
            } else {
                entries.push(TocTreeDirectiveEntry {
                    title: Some(vec![paragraph_from_text(&label, raw.line)]),
                    url: None,
                    slug: Some(target),
                });
            }
        } else if url::Url::parse(trimmed).is_ok() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::InvalidURL,
                raw.line,
            ));
        } else {
            entries.push(TocTreeDirectiveEntry {
                title: None,
                url: None,
                slug: Some(trimmed.to_string()),
            });
        }
    }

    let node = leaf(
        raw.line,
        NodeData::TocTreeDirective {
            children: vec![],
            domain: raw.domain.to_string(),
            name: "toctree".to_string(),
            argument: vec![],
            options: Options::new(),
            entries,
        },
    );

    DirectiveResult {
        nodes: vec![node],
        pending_tasks: vec![],
        diagnostics,
    }
}

fn version_note(raw: RawDirective<'_>) -> DirectiveResult {
    let children: Vec<Node> = raw
        .content
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| paragraph_from_text(l, raw.line))
        .collect();

    let mut options = Options::new();
    if let Some(arg) = &raw.argument {
        options.insert("version".to_string(), OptionValue::Str(arg.clone()));
    }

    let node = leaf(
        raw.line,
        NodeData::Directive {
            children,
            domain: raw.domain.to_string(),
            name: raw.name.to_string(),
            argument: raw
                .argument
                .map(|a| vec![paragraph_from_text(&a, raw.line)])
                .unwrap_or_default(),
            options,
        },
    );

    DirectiveResult {
        nodes: vec![node],
        pending_tasks: vec![],
        diagnostics: vec![],
    }
}

fn todo_directive(raw: RawDirective<'_>) -> DirectiveResult {
    let message = raw.argument.unwrap_or_default();
    DirectiveResult {
        nodes: vec![],
        pending_tasks: vec![],
        diagnostics: vec![Diagnostic::new(
            DiagnosticKind::TodoInfo { message },
            raw.line,
        )],
    }
}

fn generic_directive(raw: RawDirective<'_>) -> DirectiveResult {
    let mut options = Options::new();
    for (k, v) in &raw.options {
        options.insert(k.clone(), OptionValue::Str(v.clone()));
    }
    let children: Vec<Node> = raw
        .content
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| paragraph_from_text(l, raw.line))
        .collect();

    let node = leaf(
        raw.line,
        NodeData::Directive {
            children,
            domain: raw.domain.to_string(),
            name: raw.name.to_string(),
            argument: raw
                .argument
                .map(|a| vec![paragraph_from_text(&a, raw.line)])
                .unwrap_or_default(),
            options,
        },
    );

    DirectiveResult {
        nodes: vec![node],
        pending_tasks: vec![],
        diagnostics: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw<'a>(name: &'a str, argument: Option<&str>, options: Vec<(&str, &str)>, content: Vec<&str>) -> RawDirective<'a> {
        RawDirective {
            domain: "",
            name,
            argument: argument.map(|s| s.to_string()),
            options: options.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            content: content.into_iter().map(|s| s.to_string()).collect(),
            line: 1,
        }
    }

    #[test]
    fn s1_code_block_with_emphasize_lines() {
        let r = run_directive(raw(
            "code-block",
            Some("sh"),
            vec![("emphasize-lines", "1, 2-3")],
            vec!["foo", "bar", "baz"],
        ));
        assert!(r.diagnostics.is_empty());
        match &r.nodes[0].data {
            NodeData::Code { lang, copyable, emphasize_lines, value } => {
                assert_eq!(lang.as_deref(), Some("sh"));
                assert!(copyable);
                assert_eq!(emphasize_lines, &Some(vec![(1, 1), (2, 3)]));
                assert_eq!(value, "foo\nbar\nbaz");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn s2_out_of_range_emphasize_lines_warns() {
        let r = run_directive(raw(
            "code-block",
            Some("sh"),
            vec![("emphasize-lines", "10")],
            vec!["foo", "bar", "baz"],
        ));
        assert_eq!(r.diagnostics.len(), 1);
    }

    #[test]
    fn toctree_parses_labeled_url_and_bare_slug() {
        let r = run_directive(raw(
            "toctree",
            None,
            vec![],
            vec!["/page1", "Extern <https://example.com>"],
        ));
        match &r.nodes[0].data {
            NodeData::TocTreeDirective { entries, .. } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].slug.as_deref(), Some("/page1"));
                assert_eq!(entries[1].url.as_deref(), Some("https://example.com"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn todo_emits_info_with_no_node() {
        let r = run_directive(raw("todo", Some("fix this"), vec![], vec![]));
        assert!(r.nodes.is_empty());
        assert_eq!(r.diagnostics.len(), 1);
        assert_eq!(r.diagnostics[0].severity(), crate::diagnostic::Severity::Info);
    }

    #[test]
    fn list_table_mismatched_columns_reported() {
        let r = run_directive(raw(
            "list-table",
            None,
            vec![],
            vec!["* - a", "  - b", "* - c"],
        ));
        assert_eq!(r.diagnostics.len(), 1);
    }
}
