//! Proportional allocation rebalancer.
//!
//! Holds one basket's entries while a user drags allocation sliders. Every
//! successful step leaves the allocations summing to exactly 100 (floating
//! point); [`Rebalancer::finalize_for_save`] turns that into whole percents.
//!
//! Entry order is insertion order. "First unlocked entry" always means the
//! earliest such entry in that order.

use tracing::debug;

use super::types::{
    total_allocation, Adjustment, AllocationEntry, AllocationError, Unchanged,
    ALLOCATION_EPSILON, FULL_ALLOCATION,
};

/// Receives the full entry set after every successful mutation.
pub trait AllocationObserver: Send {
    fn on_change(&self, entries: &[AllocationEntry]);
}

impl<F> AllocationObserver for F
where
    F: Fn(&[AllocationEntry]) + Send,
{
    fn on_change(&self, entries: &[AllocationEntry]) {
        self(entries)
    }
}

/// In-memory rebalancing session over one basket.
#[derive(Default)]
pub struct Rebalancer {
    entries: Vec<AllocationEntry>,
    observers: Vec<Box<dyn AllocationObserver>>,
}

impl std::fmt::Debug for Rebalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rebalancer")
            .field("entries", &self.entries)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Rebalancer {
    pub fn new(entries: Vec<AllocationEntry>) -> Self {
        Self {
            entries,
            observers: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[AllocationEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<AllocationEntry> {
        self.entries
    }

    pub fn total_allocation(&self) -> f64 {
        total_allocation(&self.entries)
    }

    /// Register an observer notified after each successful mutation.
    pub fn subscribe(&mut self, observer: impl AllocationObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&self) {
        for observer in &self.observers {
            observer.on_change(&self.entries);
        }
    }

    /// Move one entry to `new_value`, letting unlocked peers absorb the delta
    /// in proportion to their current share.
    pub fn set_allocation(&mut self, id: &str, new_value: f64) -> Adjustment {
        if !new_value.is_finite() {
            return Adjustment::Unchanged(Unchanged::InvalidValue);
        }
        let new_value = new_value.clamp(0.0, FULL_ALLOCATION);

        let Some(target) = self.entries.iter().position(|e| e.id == id) else {
            return Adjustment::Unchanged(Unchanged::UnknownEntry);
        };

        let delta = new_value - self.entries[target].allocation;
        if delta.abs() < ALLOCATION_EPSILON {
            return Adjustment::Unchanged(Unchanged::BelowThreshold);
        }

        let others: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, e)| *i != target && !e.locked)
            .map(|(i, _)| i)
            .collect();

        if others.is_empty() {
            debug!(entry_id = %id, "Rejected allocation change: no unlocked peers");
            return Adjustment::Unchanged(Unchanged::NoUnlockedPeers);
        }

        self.entries[target].allocation = new_value;

        let pool: f64 = others.iter().map(|&i| self.entries[i].allocation).sum();
        if pool > ALLOCATION_EPSILON {
            for &i in &others {
                let current = self.entries[i].allocation;
                self.entries[i].allocation = (current - delta * (current / pool)).max(0.0);
            }
        } else {
            let share = (FULL_ALLOCATION - new_value).max(0.0) / others.len() as f64;
            for &i in &others {
                self.entries[i].allocation = share;
            }
        }

        self.renormalize();

        debug!(
            entry_id = %id,
            new_value,
            delta,
            peers = others.len(),
            "Applied allocation change"
        );
        self.notify();
        Adjustment::Applied
    }

    /// Scale every allocation so the total is exactly 100.
    fn renormalize(&mut self) {
        let sum = self.total_allocation();
        if sum > 0.0 {
            let factor = FULL_ALLOCATION / sum;
            for entry in &mut self.entries {
                entry.allocation *= factor;
            }
        }
    }

    /// Split whatever the locked entries leave over evenly across unlocked
    /// entries, in whole percents.
    pub fn reset_to_equal(&mut self) -> Adjustment {
        let unlocked = self.entries.iter().filter(|e| !e.locked).count();
        if unlocked == 0 {
            return Adjustment::Unchanged(Unchanged::NoUnlockedPeers);
        }

        let locked_sum: f64 = self
            .entries
            .iter()
            .filter(|e| e.locked)
            .map(|e| e.allocation)
            .sum();
        let remaining = (FULL_ALLOCATION - locked_sum).max(0.0);
        let share = (remaining / unlocked as f64).floor();

        for entry in self.entries.iter_mut().filter(|e| !e.locked) {
            entry.allocation = share;
        }

        let total = self.total_allocation();
        if total < FULL_ALLOCATION {
            if let Some(first) = self.entries.iter_mut().find(|e| !e.locked) {
                first.allocation += FULL_ALLOCATION - total;
            }
        }

        debug!(unlocked, share, locked_sum, "Reset allocations to equal split");
        self.notify();
        Adjustment::Applied
    }

    /// Round to whole percents and push any rounding residue onto the first
    /// unlocked entry that stays within 0..=100 after absorbing it, so the
    /// total is exactly 100.
    ///
    /// On failure the entries are left untouched.
    pub fn finalize_for_save(&mut self) -> Result<Vec<AllocationEntry>, AllocationError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut finalized = self.entries.clone();
        for entry in &mut finalized {
            entry.allocation = entry.allocation.round();
        }

        let rounded_sum = total_allocation(&finalized);
        let correction = FULL_ALLOCATION - rounded_sum;
        if correction.abs() > ALLOCATION_EPSILON {
            let absorber = finalized.iter_mut().filter(|e| !e.locked).find(|e| {
                (0.0..=FULL_ALLOCATION).contains(&(e.allocation + correction))
            });
            match absorber {
                Some(entry) => entry.allocation += correction,
                None => {
                    return Err(AllocationError::CannotReconcileAllocations { rounded_sum });
                }
            }
        }

        let changed = finalized != self.entries;
        self.entries = finalized;
        if changed {
            self.notify();
        }
        Ok(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn entry(id: &str, allocation: f64, locked: bool) -> AllocationEntry {
        AllocationEntry::new(id, id, allocation).locked(locked)
    }

    fn allocations(rebalancer: &Rebalancer) -> Vec<f64> {
        rebalancer.entries().iter().map(|e| e.allocation).collect()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "expected {:?}, got {:?}", expected, actual);
        }
    }

    #[test]
    fn test_locked_peer_is_excluded() {
        let mut r = Rebalancer::new(vec![
            entry("A", 50.0, false),
            entry("B", 30.0, false),
            entry("C", 20.0, true),
        ]);

        assert_eq!(r.set_allocation("A", 60.0), Adjustment::Applied);
        assert_close(&allocations(&r), &[60.0, 20.0, 20.0]);
        assert!((r.total_allocation() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_delta_split_proportionally() {
        let mut r = Rebalancer::new(vec![
            entry("A", 40.0, false),
            entry("B", 40.0, false),
            entry("C", 20.0, false),
        ]);

        r.set_allocation("A", 10.0);
        // B and C absorb -30 in a 2:1 ratio
        assert_close(&allocations(&r), &[10.0, 60.0, 30.0]);
    }

    #[test]
    fn test_zero_pool_gets_even_split() {
        let mut r = Rebalancer::new(vec![
            entry("A", 100.0, false),
            entry("B", 0.0, false),
            entry("C", 0.0, false),
        ]);

        r.set_allocation("A", 40.0);
        assert_close(&allocations(&r), &[40.0, 30.0, 30.0]);
    }

    #[test]
    fn test_rejected_when_all_others_locked() {
        let mut r = Rebalancer::new(vec![
            entry("A", 50.0, false),
            entry("B", 30.0, true),
            entry("C", 20.0, true),
        ]);

        assert_eq!(
            r.set_allocation("A", 70.0),
            Adjustment::Unchanged(Unchanged::NoUnlockedPeers)
        );
        assert_close(&allocations(&r), &[50.0, 30.0, 20.0]);
    }

    #[test]
    fn test_tiny_change_is_noop() {
        let mut r = Rebalancer::new(vec![entry("A", 50.0, false), entry("B", 50.0, false)]);
        assert_eq!(
            r.set_allocation("A", 50.0005),
            Adjustment::Unchanged(Unchanged::BelowThreshold)
        );
        assert_close(&allocations(&r), &[50.0, 50.0]);
    }

    #[test]
    fn test_value_is_clamped() {
        let mut r = Rebalancer::new(vec![entry("A", 50.0, false), entry("B", 50.0, false)]);
        r.set_allocation("A", 250.0);
        assert_close(&allocations(&r), &[100.0, 0.0]);

        r.set_allocation("A", -5.0);
        assert_close(&allocations(&r), &[0.0, 100.0]);
    }

    #[test]
    fn test_unknown_and_invalid_inputs() {
        let mut r = Rebalancer::new(vec![entry("A", 50.0, false), entry("B", 50.0, false)]);
        assert_eq!(
            r.set_allocation("Z", 10.0),
            Adjustment::Unchanged(Unchanged::UnknownEntry)
        );
        assert_eq!(
            r.set_allocation("A", f64::NAN),
            Adjustment::Unchanged(Unchanged::InvalidValue)
        );
    }

    #[test]
    fn test_overshoot_is_renormalized() {
        // Peers floor at zero, so the raw sum exceeds 100 and gets scaled back
        let mut r = Rebalancer::new(vec![
            entry("A", 10.0, false),
            entry("B", 10.0, false),
            entry("C", 80.0, true),
        ]);

        r.set_allocation("A", 50.0);
        let sum = r.total_allocation();
        assert!((sum - 100.0).abs() < 1e-9);
        assert_eq!(r.entries()[1].allocation, 0.0);
    }

    #[test]
    fn test_reset_to_equal_assigns_remainder_to_first() {
        let mut r = Rebalancer::new(vec![
            entry("A", 70.0, false),
            entry("B", 20.0, false),
            entry("C", 10.0, false),
        ]);

        assert_eq!(r.reset_to_equal(), Adjustment::Applied);
        assert_close(&allocations(&r), &[34.0, 33.0, 33.0]);
    }

    #[test]
    fn test_reset_to_equal_respects_locked() {
        let mut r = Rebalancer::new(vec![
            entry("A", 25.0, true),
            entry("B", 70.0, false),
            entry("C", 5.0, false),
        ]);

        r.reset_to_equal();
        assert_close(&allocations(&r), &[25.0, 38.0, 37.0]);
    }

    #[test]
    fn test_reset_to_equal_all_locked_is_noop() {
        let mut r = Rebalancer::new(vec![entry("A", 60.0, true), entry("B", 40.0, true)]);
        assert_eq!(
            r.reset_to_equal(),
            Adjustment::Unchanged(Unchanged::NoUnlockedPeers)
        );
        assert_close(&allocations(&r), &[60.0, 40.0]);
    }

    #[test]
    fn test_finalize_rounds_and_corrects_first_unlocked() {
        let mut r = Rebalancer::new(vec![
            entry("A", 33.4, false),
            entry("B", 33.3, false),
            entry("C", 33.3, false),
        ]);

        let saved = r.finalize_for_save().unwrap();
        let values: Vec<f64> = saved.iter().map(|e| e.allocation).collect();
        assert_eq!(values, vec![34.0, 33.0, 33.0]);
    }

    #[test]
    fn test_finalize_skips_locked_for_correction() {
        let mut r = Rebalancer::new(vec![
            entry("A", 33.4, true),
            entry("B", 33.3, false),
            entry("C", 33.3, false),
        ]);

        let saved = r.finalize_for_save().unwrap();
        let values: Vec<f64> = saved.iter().map(|e| e.allocation).collect();
        assert_eq!(values, vec![33.0, 34.0, 33.0]);
    }

    #[test]
    fn test_finalize_correction_skips_entry_that_would_go_negative() {
        let mut r = Rebalancer::new(vec![
            entry("A", 0.0, false),
            entry("D", 0.0, false),
            entry("B", 1.0, true),
            entry("C", 99.0, true),
        ]);
        assert!(r.set_allocation("D", 99.0).is_applied());
        assert_close(&allocations(&r), &[0.5, 49.5, 0.5, 49.5]);

        // Everything rounds up to 102; A sits at 1 and cannot give back 2
        let saved = r.finalize_for_save().unwrap();
        let values: Vec<f64> = saved.iter().map(|e| e.allocation).collect();
        assert_eq!(values, vec![1.0, 48.0, 1.0, 50.0]);
    }

    #[test]
    fn test_finalize_fails_when_no_unlocked_entry_can_absorb() {
        let mut r = Rebalancer::new(vec![
            entry("A", 0.4, false),
            entry("B", 50.5, true),
            entry("C", 50.5, true),
        ]);

        let err = r.finalize_for_save().unwrap_err();
        assert_eq!(
            err,
            AllocationError::CannotReconcileAllocations { rounded_sum: 102.0 }
        );
        assert_close(&allocations(&r), &[0.4, 50.5, 50.5]);
    }

    #[test]
    fn test_finalize_all_locked_fails_and_keeps_state() {
        let mut r = Rebalancer::new(vec![entry("A", 33.4, true), entry("B", 33.3, true)]);

        let err = r.finalize_for_save().unwrap_err();
        assert_eq!(
            err,
            AllocationError::CannotReconcileAllocations { rounded_sum: 66.0 }
        );
        assert_close(&allocations(&r), &[33.4, 33.3]);
    }

    #[test]
    fn test_finalize_all_locked_already_whole_succeeds() {
        let mut r = Rebalancer::new(vec![entry("A", 60.0, true), entry("B", 40.0, true)]);
        assert!(r.finalize_for_save().is_ok());
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut r = Rebalancer::new(vec![
            entry("A", 34.0, false),
            entry("B", 33.0, false),
            entry("C", 33.0, true),
        ]);

        let first = r.finalize_for_save().unwrap();
        let second = r.finalize_for_save().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, r.entries().to_vec());
    }

    #[test]
    fn test_observers_see_successful_mutations_only() {
        let seen: Arc<Mutex<Vec<Vec<f64>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut r = Rebalancer::new(vec![entry("A", 50.0, false), entry("B", 50.0, false)]);
        r.subscribe(move |entries: &[AllocationEntry]| {
            sink.lock()
                .unwrap()
                .push(entries.iter().map(|e| e.allocation).collect());
        });

        r.set_allocation("A", 50.0);
        r.set_allocation("Z", 10.0);
        r.set_allocation("A", 80.0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_close(&seen[0], &[80.0, 20.0]);
    }
}
