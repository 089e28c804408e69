//! One-shot listener for the Connection Handle's failed transition.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

type Hook = Box<dyn Fn(&str) + Send + Sync>;

/// Surfaces a connection-establishment failure without crashing the host.
///
/// Fires at most once per adapter instance: it emits a warning record with
/// the failure message and invokes the optional hook the host registered.
/// It does not retry and does not affect already-issued commands.
pub struct FailureNotifier {
    fired: AtomicBool,
    hook: Option<Hook>,
}

impl FailureNotifier {
    /// Notifier that only logs.
    pub fn new() -> Self {
        FailureNotifier {
            fired: AtomicBool::new(false),
            hook: None,
        }
    }

    /// Notifier that logs and then calls `hook` with the failure message.
    pub fn with_hook(hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        FailureNotifier {
            fired: AtomicBool::new(false),
            hook: Some(Box::new(hook)),
        }
    }

    /// True once a connection failure has been reported.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub(crate) fn fire(&self, message: &str) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!("store connection failed: {message}");
        if let Some(hook) = &self.hook {
            hook(message);
        }
    }
}

impl Default for FailureNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn fires_at_most_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let notifier = FailureNotifier::with_hook(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!notifier.has_fired());
        notifier.fire("refused");
        notifier.fire("refused again");
        assert!(notifier.has_fired());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
