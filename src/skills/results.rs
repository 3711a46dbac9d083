//! Last web search result, shared between the search and open skills

use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
}

/// Cheaply cloneable handle to the most recent result
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    last: Arc<Mutex<Option<SearchResult>>>,
}

impl ResultStore {
    pub fn set(&self, result: SearchResult) {
        *self.last.lock() = Some(result);
    }

    pub fn last(&self) -> Option<SearchResult> {
        self.last.lock().clone()
    }
}
