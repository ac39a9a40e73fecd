//! Retrying narrator with local fallback.
//!
//! Wraps a narrative service with bounded retries at a fixed delay. When
//! every attempt fails, the request's base text is used, and when that is
//! empty a canned line is chosen in rotation. Phrasing through this wrapper
//! never fails.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::config::NarrativeConfig;
use crate::error::{CasebookError, Recover, Result};
use crate::narrative::{CommandNarrator, EchoNarrator, NarrativeRequest, Narrator};

/// A narrator that retries and then degrades to local text.
pub struct FallbackNarrator<N> {
    inner: N,
    attempts: u32,
    retry_delay: Duration,
    fallback_lines: Vec<String>,
    next_line: AtomicUsize,
}

impl<N: Narrator> FallbackNarrator<N> {
    pub fn new(inner: N, attempts: u32, retry_delay: Duration, fallback_lines: Vec<String>) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            retry_delay,
            fallback_lines,
            next_line: AtomicUsize::new(0),
        }
    }

    /// Phrase a request, always producing text.
    pub fn narrate(&self, request: &NarrativeRequest) -> String {
        match self.try_attempts(request) {
            Ok(text) => text,
            failed => failed.recover_with(
                &format!("phrasing via {}", self.inner.name()),
                self.fallback_text(request),
            ),
        }
    }

    fn try_attempts(&self, request: &NarrativeRequest) -> Result<String> {
        let mut last_error = CasebookError::narrative("no attempts made");
        for attempt in 1..=self.attempts {
            match self.inner.phrase(request) {
                Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
                Ok(_) => last_error = CasebookError::narrative("empty response"),
                Err(err) => last_error = err,
            }
            if attempt < self.attempts {
                warn!(
                    "narrative attempt {}/{} via '{}' failed: {}",
                    attempt,
                    self.attempts,
                    self.inner.name(),
                    last_error
                );
                thread::sleep(self.retry_delay);
            }
        }
        Err(last_error)
    }

    fn fallback_text(&self, request: &NarrativeRequest) -> String {
        if !request.base_text.trim().is_empty() {
            return request.base_text.clone();
        }
        if self.fallback_lines.is_empty() {
            return String::new();
        }
        let index = self.next_line.fetch_add(1, Ordering::Relaxed) % self.fallback_lines.len();
        self.fallback_lines[index].clone()
    }
}

impl FallbackNarrator<Box<dyn Narrator>> {
    /// Build from configuration: the configured command when present,
    /// otherwise base texts verbatim with no retries.
    pub fn from_config(config: &NarrativeConfig) -> Self {
        match CommandNarrator::from_command_line(&config.command, config.timeout()) {
            Some(command) => Self::new(
                Box::new(command),
                config.attempts,
                config.retry_delay(),
                config.fallback_lines.clone(),
            ),
            None => Self::new(
                Box::new(EchoNarrator),
                1,
                Duration::ZERO,
                config.fallback_lines.clone(),
            ),
        }
    }
}

impl<N: Narrator> Narrator for FallbackNarrator<N> {
    fn phrase(&self, request: &NarrativeRequest) -> Result<String> {
        Ok(self.narrate(request))
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
