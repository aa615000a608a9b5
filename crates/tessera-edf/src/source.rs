//! Asynchronous providers of EDF text.

use std::collections::HashMap;

use crate::task::{LoadError, Pending};

/// Provides the text of definition files by path.
///
/// Implementations may resolve immediately or hand back a waiting
/// [`Pending`] completed from a background thread.
pub trait TextSource {
    /// Begin fetching the file at `path`.
    fn fetch(&self, path: &str) -> Pending<String>;
}

impl<F> TextSource for F
where
    F: Fn(&str) -> Pending<String>,
{
    fn fetch(&self, path: &str) -> Pending<String> {
        self(path)
    }
}

/// An in-memory file table. Every fetch resolves immediately.
#[derive(Debug, Clone, Default)]
pub struct MemoryTextSource {
    files: HashMap<String, String>,
}

impl MemoryTextSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(mut self, path: &str, text: &str) -> Self {
        self.insert(path, text);
        self
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: &str, text: &str) {
        self.files.insert(path.to_owned(), text.to_owned());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl TextSource for MemoryTextSource {
    fn fetch(&self, path: &str) -> Pending<String> {
        match self.files.get(path) {
            Some(text) => Pending::ready(text.clone()),
            None => Pending::failed(LoadError::NotFound(path.to_owned())),
        }
    }
}
