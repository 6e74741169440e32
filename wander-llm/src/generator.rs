//! The generation seam the host drives.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LlmError;
use crate::types::LineRequest;

/// Produces one line of dialogue for a request.
///
/// Implementations may take arbitrarily long or never finish; the caller
/// bounds every call with its own timeout.
pub trait LineGenerator: Send + Sync {
    /// Generate the line.
    fn generate_line(
        &self,
        request: &LineRequest,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// Offline generator that cycles through fixed lines.
#[derive(Debug, Default)]
pub struct CannedGenerator {
    lines: Vec<String>,
    next: AtomicUsize,
}

impl CannedGenerator {
    /// Cycle through `lines` in order. With no lines every call fails.
    #[must_use]
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            next: AtomicUsize::new(0),
        }
    }
}

impl LineGenerator for CannedGenerator {
    async fn generate_line(&self, _request: &LineRequest) -> Result<String, LlmError> {
        if self.lines.is_empty() {
            return Err(LlmError::Unavailable("no canned lines".into()));
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.lines.len();
        Ok(self.lines[i].clone())
    }
}
