//! Cross-file loading of entity definitions.
//!
//! An [`EdfLoadJob`] fetches a start file through a [`TextSource`], follows its
//! `[$require]` lists (relative to the requiring file), orders the files so
//! that required files come first, and links the concatenated entries. Each
//! file is fetched at most once, so require loops terminate; a loop is then
//! reported as [`EdfError::CyclicRequire`].
//!
//! The job never blocks. Call [`EdfLoadJob::poll`] once per frame until it
//! returns `Poll::Ready`.

use std::collections::HashMap;
use std::task::Poll;
use std::time::Duration;

use crate::chain::DependencyChain;
use crate::definition::LinkedEdf;
use crate::linker::link;
use crate::parser::{EdfParser, ParsedEdf};
use crate::sink::EdfErrorSink;
use crate::source::TextSource;
use crate::task::{Pending, DEFAULT_TIMEOUT};
use crate::EdfError;

/// Normalise `a/./b/../c` style paths. Leading slashes are dropped.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Resolve `required` as listed in `from`. Paths starting with `/` are
/// relative to the source root, all others to the directory of `from`.
pub fn resolve_path(from: &str, required: &str) -> String {
    let required = required.trim();
    if let Some(rooted) = required.strip_prefix('/') {
        return normalize_path(rooted);
    }
    let dir = from.rfind('/').map(|i| &from[..i]).unwrap_or("");
    normalize_path(&format!("{dir}/{required}"))
}

enum FileSlot {
    Fetching(Pending<String>),
    Parsed(ParsedEdf),
    Failed,
}

/// In-progress load of a start file and everything it requires.
pub struct EdfLoadJob {
    start: String,
    timeout: Duration,
    /// Load cache keyed by normalised path.
    slots: HashMap<String, FileSlot>,
    /// Paths in discovery order.
    order: Vec<String>,
}

impl std::fmt::Debug for EdfLoadJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdfLoadJob")
            .field("start", &self.start)
            .field("files", &self.order)
            .finish()
    }
}

impl EdfLoadJob {
    pub fn new(start_file: &str) -> Self {
        Self {
            start: normalize_path(start_file),
            timeout: DEFAULT_TIMEOUT,
            slots: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Deadline applied to every file fetch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn start_file(&self) -> &str {
        &self.start
    }

    fn request(&mut self, path: String, source: &dyn TextSource) {
        tracing::debug!(file = %path, "fetching definition file");
        let pending = source.fetch(&path).with_timeout(self.timeout);
        self.slots.insert(path.clone(), FileSlot::Fetching(pending));
        self.order.push(path);
    }

    /// Advance the load. Errors that only exclude part of the file set go to
    /// `sink`; a missing start file or a require cycle fails the whole load.
    pub fn poll(
        &mut self,
        source: &dyn TextSource,
        sink: &mut dyn EdfErrorSink,
    ) -> Poll<Result<LinkedEdf, EdfError>> {
        if self.order.is_empty() {
            self.request(self.start.clone(), source);
        }

        loop {
            let mut progressed = false;

            for path in &self.order {
                let Some(slot) = self.slots.get_mut(path) else {
                    continue;
                };
                let FileSlot::Fetching(pending) = slot else {
                    continue;
                };
                match pending.poll() {
                    Poll::Pending => {}
                    Poll::Ready(Ok(text)) => {
                        let result = EdfParser::new(&mut *sink).parse(path, &text);
                        let parsed = match result {
                            Ok(parsed) => parsed,
                            Err(error) => {
                                sink.report(error);
                                ParsedEdf {
                                    file: path.clone(),
                                    entries: Vec::new(),
                                    required: None,
                                }
                            }
                        };
                        *slot = FileSlot::Parsed(parsed);
                        progressed = true;
                    }
                    Poll::Ready(Err(reason)) => {
                        let error = EdfError::MissingFile {
                            file: path.clone(),
                            reason,
                        };
                        if *path == self.start {
                            return Poll::Ready(Err(error));
                        }
                        sink.report(error);
                        *slot = FileSlot::Failed;
                        progressed = true;
                    }
                }
            }

            let mut discovered: Vec<String> = Vec::new();
            for path in &self.order {
                if let Some(FileSlot::Parsed(parsed)) = self.slots.get(path) {
                    for required in parsed.required_files() {
                        let full = resolve_path(path, required);
                        if !self.slots.contains_key(&full) && !discovered.contains(&full) {
                            discovered.push(full);
                        }
                    }
                }
            }
            for path in discovered {
                self.request(path, source);
                progressed = true;
            }

            if !progressed {
                break;
            }
        }

        if self
            .slots
            .values()
            .any(|s| matches!(s, FileSlot::Fetching(_)))
        {
            return Poll::Pending;
        }
        Poll::Ready(self.assemble(sink))
    }

    fn assemble(&self, sink: &mut dyn EdfErrorSink) -> Result<LinkedEdf, EdfError> {
        let mut chain = DependencyChain::new();
        for path in &self.order {
            if let Some(FileSlot::Parsed(parsed)) = self.slots.get(path) {
                chain.add_node(path.clone());
                for required in parsed.required_files() {
                    let full = resolve_path(path, required);
                    if matches!(self.slots.get(&full), Some(FileSlot::Parsed(_))) {
                        chain.connect_ab(path.clone(), full);
                    }
                }
            }
        }
        let files = chain
            .resolve_chain_to_list()
            .ok_or_else(|| EdfError::CyclicRequire {
                files: chain.resolve().unresolved,
            })?;

        let entries: Vec<_> = files
            .iter()
            .filter_map(|f| match self.slots.get(f) {
                Some(FileSlot::Parsed(parsed)) => Some(parsed.entries.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect();

        let mut linked = link(&entries, sink);
        tracing::debug!(
            files = files.len(),
            definitions = linked.len(),
            "linked entity definitions"
        );
        linked.files = files;
        Ok(linked)
    }
}

/// Drive a load to completion on the current thread. For tools and tests.
pub fn load_blocking(
    start_file: &str,
    source: &dyn TextSource,
    sink: &mut dyn EdfErrorSink,
) -> Result<LinkedEdf, EdfError> {
    let mut job = EdfLoadJob::new(start_file);
    loop {
        match job.poll(source, sink) {
            Poll::Ready(result) => return result,
            Poll::Pending => std::thread::sleep(Duration::from_millis(1)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use crate::source::MemoryTextSource;
    use crate::task::{Completer, LoadError};
    use std::cell::RefCell;

    #[test]
    fn paths_resolve_relative_to_requiring_file() {
        assert_eq!(resolve_path("levels/one.edf", "common.edf"), "levels/common.edf");
        assert_eq!(resolve_path("levels/one.edf", "../base.edf"), "base.edf");
        assert_eq!(resolve_path("levels/one.edf", "/shared/x.edf"), "shared/x.edf");
        assert_eq!(resolve_path("main.edf", "./a.edf"), "a.edf");
    }

    #[test]
    fn required_files_are_linked_first() {
        let source = MemoryTextSource::new()
            .with_file("main.edf", "[$require]\nlib/base.edf\n[Player(Actor)]\nspeed = 2\n")
            .with_file("lib/base.edf", "[Actor]\n@Transform\nspeed = 1\n");
        let mut sink = CollectingSink::new();
        let linked = load_blocking("main.edf", &source, &mut sink).unwrap();
        assert!(sink.is_empty(), "{:?}", sink.errors);
        assert_eq!(linked.files, vec!["lib/base.edf", "main.edf"]);
        assert_eq!(linked.get("player").unwrap().components, vec!["Transform"]);
    }

    #[test]
    fn missing_start_file_fails_the_load() {
        let source = MemoryTextSource::new();
        let mut sink = CollectingSink::new();
        let err = load_blocking("main.edf", &source, &mut sink).unwrap_err();
        assert!(matches!(err, EdfError::MissingFile { .. }));
    }

    #[test]
    fn missing_required_file_is_partial_failure() {
        let source = MemoryTextSource::new()
            .with_file("main.edf", "[$require]\ngone.edf\n[A]\n@C\n");
        let mut sink = CollectingSink::new();
        let linked = load_blocking("main.edf", &source, &mut sink).unwrap();
        assert!(linked.get("a").is_some());
        assert!(matches!(
            sink.errors.as_slice(),
            [EdfError::MissingFile { reason: LoadError::NotFound(_), .. }]
        ));
    }

    #[test]
    fn require_loop_is_detected() {
        let source = MemoryTextSource::new()
            .with_file("a.edf", "[$require]\nb.edf\n")
            .with_file("b.edf", "[$require]\na.edf\n");
        let mut sink = CollectingSink::new();
        let err = load_blocking("a.edf", &source, &mut sink).unwrap_err();
        assert!(matches!(err, EdfError::CyclicRequire { .. }));
    }

    #[test]
    fn shared_dependency_is_fetched_once() {
        let fetches = RefCell::new(Vec::new());
        let files = MemoryTextSource::new()
            .with_file("main.edf", "[$require]\na.edf\nb.edf\n")
            .with_file("a.edf", "[$require]\ncommon.edf\n")
            .with_file("b.edf", "[$require]\ncommon.edf\n")
            .with_file("common.edf", "[Base]\n@C\n");
        let source = |path: &str| {
            fetches.borrow_mut().push(path.to_owned());
            files.fetch(path)
        };
        let mut sink = CollectingSink::new();
        let linked = load_blocking("main.edf", &source, &mut sink).unwrap();
        assert_eq!(linked.files[0], "common.edf");
        assert_eq!(linked.files.last().unwrap(), "main.edf");
        let common_fetches = fetches.borrow().iter().filter(|p| *p == "common.edf").count();
        assert_eq!(common_fetches, 1);
    }

    #[test]
    fn job_stays_pending_until_text_arrives() {
        let completers: RefCell<Vec<Completer<String>>> = RefCell::new(Vec::new());
        let source = |_: &str| {
            let (completer, pending) = Pending::channel();
            completers.borrow_mut().push(completer);
            pending
        };
        let mut sink = CollectingSink::new();
        let mut job = EdfLoadJob::new("main.edf");
        assert!(job.poll(&source, &mut sink).is_pending());
        assert!(job.poll(&source, &mut sink).is_pending());

        let completer = completers.borrow_mut().pop().unwrap();
        completer.complete(Ok("[A]\n@C\n".to_owned()));
        match job.poll(&source, &mut sink) {
            Poll::Ready(Ok(linked)) => assert!(linked.get("a").is_some()),
            other => panic!("expected linked set, got {other:?}"),
        }
    }
}
