//! C7: two-phase deferred-action queue (§4.7). Local-reconciliation
//! decisions that are safe to apply immediately (fast-forwards) are queued
//! as phase 1; decisions that must observe phase 1's effects (rebases) are
//! queued as phase 2. `finish()` drains both, in order, and reports whether
//! every project came through clean.

use tracing::info;

use crate::error::SyncOutcome;

type LateAction = Box<dyn FnOnce() -> Result<(), crate::error::SyncError> + Send>;

struct Later {
    project: String,
    action: LateAction,
}

#[derive(Default)]
pub struct SyncBuffer {
    messages: Vec<String>,
    failures: Vec<(String, String)>,
    /// Index into `failures` up to which `flush_messages` has already
    /// logged — `finish()` calls `flush_messages` three times, and
    /// `failures` accumulates across all three, so this prevents the same
    /// failure from being logged more than once.
    flushed_failures: usize,
    later1: Vec<Later>,
    later2: Vec<Later>,
}

impl SyncBuffer {
    pub fn new() -> Self {
        SyncBuffer::default()
    }

    pub fn info(&mut self, project: &str, message: impl Into<String>) {
        self.messages.push(format!("{project}: {}", message.into()));
    }

    pub fn fail(&mut self, project: &str, err: impl std::fmt::Display) {
        self.failures.push((project.to_owned(), err.to_string()));
    }

    pub fn later1(
        &mut self,
        project: &str,
        action: impl FnOnce() -> Result<(), crate::error::SyncError> + Send + 'static,
    ) {
        self.later1.push(Later { project: project.to_owned(), action: Box::new(action) });
    }

    pub fn later2(
        &mut self,
        project: &str,
        action: impl FnOnce() -> Result<(), crate::error::SyncError> + Send + 'static,
    ) {
        self.later2.push(Later { project: project.to_owned(), action: Box::new(action) });
    }

    /// Print every buffered message, run phase 1 in order, print again, run
    /// phase 2 — unless phase 1 produced any failure, in which case phase 2
    /// is skipped entirely — print a final time, and report the overall
    /// outcome (§9 REDESIGN FLAGS: a tagged [`SyncOutcome`] rather than a
    /// bare boolean, so callers can inspect which project failed and why).
    pub fn finish(mut self) -> SyncOutcome {
        self.flush_messages();

        let mut phase1_failed = false;
        for later in self.later1.drain(..) {
            if let Err(err) = (later.action)() {
                phase1_failed = true;
                self.failures.push((later.project, err.to_string()));
            }
        }
        self.flush_messages();

        if !phase1_failed {
            for later in self.later2.drain(..) {
                if let Err(err) = (later.action)() {
                    self.failures.push((later.project, err.to_string()));
                }
            }
        } else {
            info!("skipping phase-2 actions: phase 1 reported failures");
        }
        self.flush_messages();

        if self.failures.is_empty() {
            SyncOutcome::Clean
        } else {
            let errors = self
                .failures
                .into_iter()
                .map(|(project, reason)| crate::error::SyncError::Buffered { project, reason })
                .collect();
            SyncOutcome::Failed { errors }
        }
    }

    fn flush_messages(&mut self) {
        for message in self.messages.drain(..) {
            info!("{message}");
        }
        for (project, err) in &self.failures[self.flushed_failures..] {
            tracing::error!("{project}: {err}");
        }
        self.flushed_failures = self.failures.len();
    }

    pub fn unclean_projects(&self) -> Vec<&str> {
        self.failures.iter().map(|(p, _)| p.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_when_nothing_fails() {
        let mut buffer = SyncBuffer::new();
        buffer.info("p1", "fast-forwarded");
        buffer.later1("p1", || Ok(()));
        assert!(buffer.finish().is_clean());
    }

    #[test]
    fn phase1_failure_skips_phase2() {
        let mut buffer = SyncBuffer::new();
        let ran_phase2 = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = ran_phase2.clone();
        buffer.later1("p1", || {
            Err(crate::error::SyncError::Dirty { project: "p1".into() })
        });
        buffer.later2("p2", move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });
        assert!(!buffer.finish().is_clean());
        assert!(!ran_phase2.load(std::sync::atomic::Ordering::SeqCst));
    }
}
