pub mod handlers;

use crate::ast::Node;
use crate::diagnostic::Diagnostic;
use crate::fileid::FileId;

/// Deferred I/O a directive handler could not finish synchronously
/// (literal-include body loading, image checksums). Run serially after
/// the initial parse, before the page is stored — see spec §9
/// re-architecture guidance. Each task corresponds, in order, to the
/// marker node its handler placed in the tree (an empty-valued `Code`
/// node for literal-include, an image-like `Directive` missing its
/// `checksum` option); [`crate::page::Page::finish`] walks the AST in
/// source order and resolves tasks against tree order one for one.
pub enum PendingTask {
    LiteralInclude {
        path: FileId,
        start_after: Option<String>,
        end_before: Option<String>,
        dedent: bool,
        language: Option<String>,
    },
    ImageChecksum {
        path: FileId,
    },
}

pub struct DirectiveResult {
    pub nodes: Vec<Node>,
    pub pending_tasks: Vec<PendingTask>,
    pub diagnostics: Vec<Diagnostic>,
}
