//! User-facing notification sink.
//!
//! A plain callback pair invoked after a mutation settles. There is no
//! logic here beyond "call if configured"; how the message reaches the
//! user (toast, log line, status bar) is the embedding application's
//! business.

use std::sync::Arc;

type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional success/error callbacks for mutation outcomes.
#[derive(Clone, Default)]
pub struct Notifier {
    on_success: Option<Callback>,
    on_error: Option<Callback>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the callback invoked with a caller-supplied message when a
    /// mutation succeeds.
    pub fn on_success(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Set the callback invoked with the error display when a mutation
    /// fails terminally.
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Invoke the success callback, if configured.
    pub fn success(&self, message: &str) {
        if let Some(cb) = &self.on_success {
            cb(message);
        }
    }

    /// Invoke the error callback, if configured.
    pub fn error(&self, message: &str) {
        if let Some(cb) = &self.on_error {
            cb(message);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_unconfigured_callbacks_are_noops() {
        let notifier = Notifier::new();
        notifier.success("ok");
        notifier.error("bad");
    }

    #[test]
    fn test_configured_callbacks_fire() {
        let successes = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let s = successes.clone();
        let e = errors.clone();

        let notifier = Notifier::new()
            .on_success(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            });

        notifier.success("saved");
        notifier.success("saved again");
        notifier.error("boom");

        assert_eq!(successes.load(Ordering::SeqCst), 2);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }
}
