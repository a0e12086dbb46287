use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Default)]
struct Flag {
    cancelled: AtomicBool,
    parent: Option<Arc<Flag>>,
}

impl Flag {
    fn is_set(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.parent.as_ref().map_or(false, |parent| parent.is_set())
    }
}

/// Cooperative cancellation signal threaded through every `tick` call.
///
/// Clones share the same flag. A token made with [`CancellationToken::child_token`]
/// reports cancelled when it or any of its ancestors has been cancelled, but
/// cancelling the child leaves the parent untouched. The driver uses this to
/// scope one token to its whole Active lifetime and a child token to the
/// current task assignment.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<Flag>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child_token(&self) -> Self {
        Self {
            flag: Arc::new(Flag {
                cancelled: AtomicBool::new(false),
                parent: Some(self.flag.clone()),
            }),
        }
    }

    pub fn cancel(&self) {
        self.flag.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.is_set()
    }
}
