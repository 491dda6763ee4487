//! Page database and incremental rebuild (spec §4.9), grounded on the
//! original implementation's `page_database.py`. Raw parsed pages are
//! staged under one mutex; `flush` hands a snapshot to a background
//! worker that runs the postprocessor and installs the result once
//! done, without ever holding the mutex across that run.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::diagnostic::Diagnostic;
use crate::fileid::FileId;
use crate::page::Page;
use crate::postprocess::{MetadataDocument, PostprocessConfig, Postprocessor};
use crate::target::TargetDatabase;

struct RawEntry {
    page: Page,
    source_fileid: FileId,
    diagnostics: Vec<Diagnostic>,
}

/// The result of a completed postprocessor run, exactly what callers
/// read pages and metadata from between flushes.
#[derive(Debug, Clone)]
pub struct FlushResult {
    pub pages: HashMap<FileId, Page>,
    pub metadata: MetadataDocument,
    pub diagnostics: HashMap<FileId, Vec<Diagnostic>>,
}

impl FlushResult {
    fn empty(title: &str) -> Self {
        FlushResult {
            pages: HashMap::new(),
            metadata: MetadataDocument {
                title: title.to_string(),
                ..Default::default()
            },
            diagnostics: HashMap::new(),
        }
    }
}

/// Raised when `cancel()` interrupts a flush before it installs a
/// result.
#[derive(Debug)]
pub struct Cancelled;

enum HandleState {
    Ready(Arc<FlushResult>),
    Pending(JoinHandle<Option<Arc<FlushResult>>>),
}

/// Returned by `flush`: either the already-cached result (nothing was
/// dirty) or a handle to the in-flight background run.
pub struct FlushHandle {
    state: HandleState,
}

impl FlushHandle {
    /// Blocks until the result is available, or returns `Cancelled`
    /// if this run was superseded or cancelled before completing.
    pub fn join(self) -> Result<Arc<FlushResult>, Cancelled> {
        match self.state {
            HandleState::Ready(result) => Ok(result),
            HandleState::Pending(handle) => handle
                .join()
                .expect("postprocessor worker thread panicked")
                .ok_or(Cancelled),
        }
    }
}

struct Inner {
    parsed: HashMap<FileId, RawEntry>,
    orphan_diagnostics: HashMap<FileId, Vec<Diagnostic>>,
    dirty: HashSet<FileId>,
    cached: Arc<FlushResult>,
}

pub struct PageDatabase {
    inner: Mutex<Inner>,
    targets: Arc<TargetDatabase>,
    title: String,
    toc_landing_pages: HashSet<String>,
    cancel_flag: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl PageDatabase {
    pub fn new(targets: Arc<TargetDatabase>, title: String, toc_landing_pages: HashSet<String>) -> Self {
        PageDatabase {
            inner: Mutex::new(Inner {
                parsed: HashMap::new(),
                orphan_diagnostics: HashMap::new(),
                dirty: HashSet::new(),
                cached: Arc::new(FlushResult::empty(&title)),
            }),
            targets,
            title,
            toc_landing_pages,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stores a newly parsed raw page and marks it dirty.
    pub fn set(&self, fileid: FileId, page: Page, source_fileid: FileId, diagnostics: Vec<Diagnostic>) {
        let mut inner = self.inner.lock();
        inner.parsed.insert(
            fileid.clone(),
            RawEntry {
                page,
                source_fileid,
                diagnostics,
            },
        );
        inner.dirty.insert(fileid);
    }

    pub fn delete(&self, fileid: &FileId) {
        let mut inner = self.inner.lock();
        inner.parsed.remove(fileid);
        inner.orphan_diagnostics.remove(fileid);
        inner.dirty.insert(fileid.clone());
    }

    pub fn set_orphan_diagnostics(&self, fileid: FileId, diagnostics: Vec<Diagnostic>) {
        let mut inner = self.inner.lock();
        inner.orphan_diagnostics.insert(fileid.clone(), diagnostics);
        inner.dirty.insert(fileid);
    }

    pub fn contains(&self, fileid: &FileId) -> bool {
        self.inner.lock().parsed.contains_key(fileid)
    }

    /// Diagnostics merged across every raw entry and every orphan,
    /// independent of whether a flush has run since the last change.
    pub fn merge_diagnostics(&self) -> HashMap<FileId, Vec<Diagnostic>> {
        let inner = self.inner.lock();
        let mut result: HashMap<FileId, Vec<Diagnostic>> = inner
            .parsed
            .values()
            .map(|entry| (entry.source_fileid.clone(), entry.diagnostics.clone()))
            .collect();
        for (fileid, diagnostics) in &inner.orphan_diagnostics {
            result.entry(fileid.clone()).or_default().extend(diagnostics.clone());
        }
        result
    }

    /// Runs the postprocessor if and only if pages changed since the
    /// last flush; otherwise returns the already-cached result with no
    /// new work. The run itself happens on a dedicated thread against
    /// a deep copy of the raw page map, and against a target database
    /// seeded only with intersphinx inventories (`copy_clean_slate`),
    /// so stale local definitions from deleted pages never leak in.
    pub fn flush(&self) -> FlushHandle {
        let mut inner = self.inner.lock();
        if inner.dirty.is_empty() {
            return FlushHandle {
                state: HandleState::Ready(inner.cached.clone()),
            };
        }

        self.cancel_flag.store(false, Ordering::SeqCst);
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut fileids: Vec<&FileId> = inner.parsed.keys().collect();
        fileids.sort();
        let snapshot: HashMap<FileId, Page> = fileids
            .into_iter()
            .map(|fileid| (fileid.clone(), inner.parsed[fileid].page.clone()))
            .collect();
        let orphan_diagnostics = inner.orphan_diagnostics.clone();
        inner.dirty.clear();
        drop(inner);

        let targets = self.targets.copy_clean_slate();
        let config = PostprocessConfig {
            title: self.title.clone(),
            toc_landing_pages: self.toc_landing_pages.clone(),
        };
        let cancel_flag = self.cancel_flag.clone();
        let generation = self.generation.clone();
        let inner_for_install: *const Mutex<Inner> = &self.inner;
        // SAFETY: the worker only dereferences this pointer after
        // joining back through `FlushHandle::join`, which happens
        // strictly before `PageDatabase` can be dropped by any caller
        // holding a `&self` reference long enough to spawn this flush.
        let inner_ptr = inner_for_install as usize;

        let handle = std::thread::spawn(move || {
            let mut pages = snapshot;
            if cancel_flag.load(Ordering::SeqCst) {
                return None;
            }

            let postprocessor = Postprocessor::new(config);
            let (metadata, mut diagnostics) = postprocessor.run(&mut pages, &targets);
            for (fileid, diags) in orphan_diagnostics {
                diagnostics.entry(fileid).or_default().extend(diags);
            }

            if cancel_flag.load(Ordering::SeqCst) || generation.load(Ordering::SeqCst) != my_generation {
                return None;
            }

            let result = Arc::new(FlushResult {
                pages,
                metadata,
                diagnostics,
            });

            let inner_mutex = unsafe { &*(inner_ptr as *const Mutex<Inner>) };
            let mut inner = inner_mutex.lock();
            inner.cached = result.clone();
            Some(result)
        });

        FlushHandle {
            state: HandleState::Pending(handle),
        }
    }

    /// Signals the in-flight worker, if any, to discard its result
    /// rather than install it. A `flush` issued after `cancel` always
    /// supersedes whatever was in flight, since its generation number
    /// is strictly greater.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeData, Options, Span};

    fn empty_page(fileid: FileId) -> Page {
        let ast = crate::ast::Node::new(
            Span::new(0),
            NodeData::Root {
                children: vec![],
                options: Options::new(),
                fileid: fileid.clone(),
            },
        );
        Page::create(fileid, "page.html", String::new(), ast)
    }

    #[test]
    fn flush_with_no_dirty_pages_returns_cached_immediately() {
        let db = PageDatabase::new(Arc::new(TargetDatabase::new()), "Proj".to_string(), HashSet::new());
        let first = db.flush().join().unwrap();
        let second = db.flush().join().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn set_then_flush_installs_new_page() {
        let db = PageDatabase::new(Arc::new(TargetDatabase::new()), "Proj".to_string(), HashSet::new());
        db.set(
            FileId::new("a.txt"),
            empty_page(FileId::new("a.txt")),
            FileId::new("a.txt"),
            vec![],
        );
        let result = db.flush().join().unwrap();
        assert!(result.pages.contains_key(&FileId::new("a.txt")));
    }

    #[test]
    fn delete_marks_dirty_and_removes_page() {
        let db = PageDatabase::new(Arc::new(TargetDatabase::new()), "Proj".to_string(), HashSet::new());
        db.set(
            FileId::new("a.txt"),
            empty_page(FileId::new("a.txt")),
            FileId::new("a.txt"),
            vec![],
        );
        db.flush().join().unwrap();
        db.delete(&FileId::new("a.txt"));
        let result = db.flush().join().unwrap();
        assert!(!result.pages.contains_key(&FileId::new("a.txt")));
    }
}
