// Completion barrier: the single synchronization point between a
// composite's independently completing member chains.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::warn;

/// Tracks how many members of a composite have been imported, and fires
/// exactly once when all of them have.
pub struct CompletionBarrier {
    total: usize,
    completed: AtomicUsize,
    fired: AtomicBool,
}

impl CompletionBarrier {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            fired: AtomicBool::new(false),
        }
    }

    /// Record one member arrival. Returns `true` for exactly the arrival
    /// that completes the set; a late or duplicate arrival is clamped and
    /// can never refire.
    pub fn arrive(&self) -> bool {
        let prev = self
            .completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n < self.total {
                    Some(n + 1)
                } else {
                    None
                }
            });

        match prev {
            Ok(prev) if prev + 1 == self.total => !self.fired.swap(true, Ordering::AcqRel),
            Ok(_) => false,
            Err(_) => {
                warn!("arrival past barrier total {}", self.total);
                false
            }
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fires_exactly_on_last_arrival() {
        let barrier = CompletionBarrier::new(3);
        assert!(!barrier.arrive());
        assert!(!barrier.arrive());
        assert!(!barrier.has_fired());
        assert!(barrier.arrive());
        assert!(barrier.has_fired());
        assert_eq!(barrier.completed(), 3);
    }

    #[test]
    fn test_late_arrival_is_clamped_and_never_refires() {
        let barrier = CompletionBarrier::new(2);
        assert!(!barrier.arrive());
        assert!(barrier.arrive());
        // A stray extra arrival must neither refire nor push the counter
        // past total.
        assert!(!barrier.arrive());
        assert_eq!(barrier.completed(), 2);
    }

    #[test]
    fn test_incomplete_set_never_fires() {
        let barrier = CompletionBarrier::new(3);
        barrier.arrive();
        barrier.arrive();
        assert!(!barrier.has_fired());
        assert_eq!(barrier.completed(), 2);
    }

    #[test]
    fn test_concurrent_arrivals_fire_once() {
        let total = 16;
        let barrier = Arc::new(CompletionBarrier::new(total));

        let handles: Vec<_> = (0..total)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || barrier.arrive())
            })
            .collect();

        let fires = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fired| *fired)
            .count();

        assert_eq!(fires, 1);
        assert!(barrier.has_fired());
        assert_eq!(barrier.completed(), total);
    }
}
