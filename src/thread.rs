use std::thread::{self, ThreadId};

/// Remembers the thread it was created on and asserts that later calls come from it.
#[derive(Debug)]
pub(crate) struct ThreadChecker {
    owner: ThreadId,
    owner_name: Option<String>,
}

impl ThreadChecker {
    /// Binds the checker to the calling thread.
    pub fn current() -> Self {
        let owner = thread::current();
        Self {
            owner: owner.id(),
            owner_name: owner.name().map(str::to_owned),
        }
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Panics when called from any thread but the owner. A violation is a caller bug.
    #[track_caller]
    pub fn check(&self, operation: &str) {
        if !self.is_current() {
            let caller = thread::current();
            panic!(
                "{operation} must be called on the control thread {:?} ({}), not on {:?} ({})",
                self.owner,
                self.owner_name.as_deref().unwrap_or("unnamed"),
                caller.id(),
                caller.name().unwrap_or("unnamed"),
            );
        }
    }
}
