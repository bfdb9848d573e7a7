//! Recent warnings about surprising adapter responses.

use std::collections::VecDeque;
use std::fmt;

use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A coalesced fetch response did not contain every requested record.
    MissingFromPayload,
    /// A `find_record` response's primary data had a different id.
    MismatchedId,
    /// A fetch failed for a record that was never loaded.
    FetchFailed,
}

impl DiagnosticKind {
    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticKind::MissingFromPayload => "missing-from-payload",
            DiagnosticKind::MismatchedId => "mismatched-id",
            DiagnosticKind::FetchFailed => "fetch-failed",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Bounded log of diagnostics; the oldest entry is evicted first.
#[derive(Debug)]
pub struct Diagnostics {
    capacity: usize,
    entries: VecDeque<Diagnostic>,
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        Diagnostics {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(64)),
        }
    }

    /// Log at warn level and keep the entry.
    pub fn record(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        warn!(kind = %kind, "{}", message);
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Diagnostic { kind, message });
    }

    pub fn entries(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
