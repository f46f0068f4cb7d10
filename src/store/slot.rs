use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Invocation id handed out when a write-producing operation starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// One store entity with whole-value replacement and generation tagging.
///
/// Readers get an `Arc` of the current value and never see a partial write.
/// A commit only lands if its ticket is still the newest one issued for this
/// slot; results of superseded invocations are dropped whole.
pub struct Slot<T> {
    value: RwLock<Arc<T>>,
    issued: AtomicU64,
    applied: AtomicU64,
}

impl<T> Slot<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: RwLock::new(Arc::new(initial)),
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> Arc<T> {
        self.value.read().clone()
    }

    pub fn begin(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }

    /// Replaces the value if `ticket` is still current. Returns whether it landed.
    pub fn commit(&self, ticket: &Ticket, value: T) -> bool {
        let mut guard = self.value.write();
        if !self.is_current(ticket) {
            return false;
        }
        *guard = Arc::new(value);
        self.applied.store(ticket.0, Ordering::SeqCst);
        true
    }

    /// Generation of the value currently held, 0 before the first commit
    pub fn generation(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }
}

impl<T: Default> Default for Slot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_ticket_wins() {
        let slot = Slot::new(0u32);
        let first = slot.begin();
        let second = slot.begin();

        assert!(slot.commit(&second, 2));
        assert!(!slot.commit(&first, 1));
        assert_eq!(*slot.get(), 2);
        assert_eq!(slot.generation(), second.generation());
    }

    #[test]
    fn test_stale_ticket_cannot_overwrite_before_newer_lands() {
        let slot = Slot::new("initial");
        let stale = slot.begin();
        let _fresh = slot.begin();

        assert!(!slot.commit(&stale, "stale"));
        assert_eq!(*slot.get(), "initial");
        assert_eq!(slot.generation(), 0);
    }

    #[test]
    fn test_ticket_can_commit_twice() {
        let slot = Slot::new(String::new());
        let ticket = slot.begin();
        assert!(slot.commit(&ticket, "pending".to_string()));
        assert!(slot.commit(&ticket, "done".to_string()));
        assert_eq!(slot.get().as_str(), "done");
    }
}
