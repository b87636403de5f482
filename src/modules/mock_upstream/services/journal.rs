use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::modules::mock_upstream::models::{InboundRequest, RecordedInteraction, RequestMatcher};

#[derive(Default)]
struct JournalInner {
    entries: Vec<Arc<RecordedInteraction>>,
    next_sequence: u64,
}

/// Append-only record of inbound requests, cleared only by `clear`
#[derive(Default)]
pub struct Journal {
    inner: Mutex<JournalInner>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one request and return its sequence number
    pub fn append(&self, request: InboundRequest, matched_rule: Option<usize>) -> u64 {
        let mut inner = self.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.entries.push(Arc::new(RecordedInteraction {
            sequence,
            request,
            matched_rule,
            received_at: Utc::now(),
        }));
        sequence
    }

    /// Entries as of now; later appends are not reflected
    pub fn snapshot(&self) -> Vec<Arc<RecordedInteraction>> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.next_sequence = 0;
    }

    fn lock(&self) -> MutexGuard<'_, JournalInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Lazy, restartable view of journaled requests filtered by a matcher.
///
/// Nothing is read until iteration starts, and every call to [`iter`] reads
/// the journal afresh, so a view created before the subject runs still
/// sees its calls.
///
/// [`iter`]: RecordedRequests::iter
#[derive(Clone)]
pub struct RecordedRequests {
    journal: Arc<Journal>,
    matcher: RequestMatcher,
}

impl RecordedRequests {
    pub fn new(journal: Arc<Journal>, matcher: RequestMatcher) -> Self {
        Self { journal, matcher }
    }

    pub fn matcher(&self) -> &RequestMatcher {
        &self.matcher
    }

    pub fn iter(&self) -> impl Iterator<Item = Arc<RecordedInteraction>> + '_ {
        self.journal
            .snapshot()
            .into_iter()
            .filter(move |interaction| self.matcher.matches(&interaction.request))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn first(&self) -> Option<Arc<RecordedInteraction>> {
        self.iter().next()
    }

    pub fn to_vec(&self) -> Vec<Arc<RecordedInteraction>> {
        self.iter().collect()
    }
}
