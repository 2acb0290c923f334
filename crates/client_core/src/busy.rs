use std::sync::atomic::{AtomicUsize, Ordering};

/// Count of store operations still in progress. Each operation holds an
/// [`InFlightGuard`] for its whole lifetime, so a future dropped mid-request
/// still gives its slot back.
#[derive(Debug, Default)]
pub(crate) struct InFlight(AtomicUsize);

impl InFlight {
    pub(crate) fn enter(&self) -> InFlightGuard<'_> {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(&self.0)
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

#[must_use = "the operation stops counting as busy once the guard is dropped"]
pub(crate) struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_until_every_guard_is_dropped() {
        let in_flight = InFlight::default();
        assert!(!in_flight.is_busy());

        let first = in_flight.enter();
        let second = in_flight.enter();
        drop(first);
        assert!(in_flight.is_busy());
        drop(second);
        assert!(!in_flight.is_busy());
    }
}
