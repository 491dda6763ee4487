//! End-to-end postprocessor scenarios (S4-S6).

mod common;

use std::collections::{HashMap, HashSet};

use noet_core::ast::{Node, NodeData, Options, Span, TocTreeDirectiveEntry};
use noet_core::fileid::FileId;
use noet_core::page::Page;
use noet_core::postprocess::{PostprocessConfig, Postprocessor};
use noet_core::target::TargetDatabase;

fn text(value: &str) -> Node {
    Node::new(Span::new(0), NodeData::Text { value: value.into() })
}

fn root_page(fileid: FileId, children: Vec<Node>) -> Page {
    let root = Node::new(
        Span::new(0),
        NodeData::Root {
            children,
            options: Options::new(),
            fileid: fileid.clone(),
        },
    );
    Page::create(fileid, "page.html", String::new(), root)
}

/// S4 - ref resolution (local): a `target{domain=std, name=label,
/// target="a"}` immediately followed by a section titled "Hello"
/// resolves a later `:ref:` to that section's heading.
#[test]
fn s4_ref_resolution_local() {
    let target_node = Node::new(
        Span::new(1),
        NodeData::Target {
            children: vec![Node::new(
                Span::new(1),
                NodeData::TargetIdentifier { ids: vec!["a".to_string()] },
            )],
            domain: "std".to_string(),
            name: "label".to_string(),
            refuri: None,
        },
    );
    let section = Node::new(
        Span::new(2),
        NodeData::Section {
            children: vec![Node::new(
                Span::new(2),
                NodeData::Heading {
                    children: vec![text("Hello")],
                    id: "hello".to_string(),
                },
            )],
        },
    );
    let ref_role = Node::new(
        Span::new(5),
        NodeData::RefRole {
            children: vec![],
            domain: "std".to_string(),
            name: "label".to_string(),
            target: "a".to_string(),
            flag: None,
            fileid: None,
            url: None,
        },
    );

    let fileid = FileId::new("index.txt");
    let page = root_page(fileid.clone(), vec![target_node, section, ref_role]);
    let mut pages = HashMap::new();
    pages.insert(fileid.clone(), page);

    let targets = TargetDatabase::new();
    let postprocessor = Postprocessor::new(PostprocessConfig {
        title: "Proj".to_string(),
        toc_landing_pages: HashSet::new(),
    });
    let (_metadata, diagnostics) = postprocessor.run(&mut pages, &targets);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let resolved = &pages[&fileid];
    let ref_node = match &resolved.ast.data {
        NodeData::Root { children, .. } => &children[2],
        other => panic!("unexpected root data {other:?}"),
    };
    match &ref_node.data {
        NodeData::RefRole { fileid, children, domain, name, target, .. } => {
            assert_eq!(domain, "std");
            assert_eq!(name, "label");
            assert_eq!(target, "a");
            assert!(fileid.is_some());
            assert_eq!(children[0].get_text(), "Hello");
        }
        other => panic!("unexpected node {other:?}"),
    }
}

/// S5 - toctree build: `contents.txt` lists `/page1` and an external
/// link; `page1.txt` has a heading "Page One".
#[test]
fn s5_toctree_build() {
    let entries = vec![
        TocTreeDirectiveEntry {
            title: None,
            url: None,
            slug: Some("/page1".to_string()),
        },
        TocTreeDirectiveEntry {
            title: Some(vec![text("Extern")]),
            url: Some("https://example.com".to_string()),
            slug: None,
        },
    ];
    let toctree = Node::new(
        Span::new(1),
        NodeData::TocTreeDirective {
            children: vec![],
            domain: String::new(),
            name: "toctree".to_string(),
            argument: vec![],
            options: Options::new(),
            entries,
        },
    );
    let contents = root_page(FileId::new("contents.txt"), vec![toctree]);

    let heading = Node::new(
        Span::new(1),
        NodeData::Heading {
            children: vec![text("Page One")],
            id: "page-one".to_string(),
        },
    );
    let page1 = root_page(FileId::new("page1.txt"), vec![heading]);

    let mut pages = HashMap::new();
    pages.insert(FileId::new("contents.txt"), contents);
    pages.insert(FileId::new("page1.txt"), page1);

    let mut toc_landing_pages = HashSet::new();
    toc_landing_pages.insert("page1".to_string());

    let targets = TargetDatabase::new();
    let postprocessor = Postprocessor::new(PostprocessConfig {
        title: "My Project".to_string(),
        toc_landing_pages,
    });
    let (metadata, _diagnostics) = postprocessor.run(&mut pages, &targets);

    assert_eq!(metadata.toctree.slug.as_deref(), Some("/"));
    assert!(metadata.toctree.options.is_none());
    assert_eq!(metadata.toctree.children.len(), 2);

    let page1_node = &metadata.toctree.children[0];
    assert_eq!(page1_node.slug.as_deref(), Some("page1"));
    assert_eq!(page1_node.title.as_ref().unwrap()[0].get_text(), "Page One");
    assert!(!page1_node.options.as_ref().unwrap().drawer);

    let extern_node = &metadata.toctree.children[1];
    assert_eq!(extern_node.url.as_deref(), Some("https://example.com"));
    assert!(extern_node.slug.is_none());

    assert_eq!(metadata.toctree_order, vec!["/".to_string(), "page1".to_string()]);
}

/// S6 - include expansion: `page.txt` includes `/other.rst`, whose
/// paragraph becomes the directive node's children after postprocess.
#[test]
fn s6_include_expansion() {
    let paragraph = Node::new(
        Span::new(1),
        NodeData::Paragraph {
            children: vec![text("hi")],
        },
    );
    let other = root_page(FileId::new("other.rst"), vec![paragraph]);

    let include_argument = Node::new(Span::new(1), NodeData::Text { value: "/other.rst".to_string() });
    let include_directive = Node::new(
        Span::new(1),
        NodeData::Directive {
            children: vec![],
            domain: String::new(),
            name: "include".to_string(),
            argument: vec![include_argument],
            options: Options::new(),
        },
    );
    let page = root_page(FileId::new("page.txt"), vec![include_directive]);

    let mut pages = HashMap::new();
    pages.insert(FileId::new("page.txt"), page);
    pages.insert(FileId::new("other.rst"), other);

    let targets = TargetDatabase::new();
    let postprocessor = Postprocessor::new(PostprocessConfig {
        title: "Proj".to_string(),
        toc_landing_pages: HashSet::new(),
    });
    let (_metadata, _diagnostics) = postprocessor.run(&mut pages, &targets);

    let page = &pages[&FileId::new("page.txt")];
    match &page.ast.data {
        NodeData::Root { children, .. } => match &children[0].data {
            NodeData::Directive { children, name, .. } => {
                assert_eq!(name, "include");
                assert_eq!(children.len(), 1);
                match &children[0].data {
                    NodeData::Paragraph { children } => assert_eq!(children[0].get_text(), "hi"),
                    other => panic!("unexpected included node {other:?}"),
                }
            }
            other => panic!("unexpected child {other:?}"),
        },
        other => panic!("unexpected root {other:?}"),
    }
}
