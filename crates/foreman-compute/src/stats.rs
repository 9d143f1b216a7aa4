use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::id::{ItemId, WorkerId};

/// System-wide statistics shared by all problems and the dispatcher.
///
/// Per-problem collectors forward their deltas here through an explicit
/// reference, so the system view stays consistent with the per-problem
/// views without any ambient shared state. All mutations are synchronized;
/// critical sections never block on I/O.
#[derive(Debug, Default)]
pub struct SystemStatistics {
    inner: Mutex<SystemCounters>,
}

#[derive(Debug, Default)]
struct SystemCounters {
    registered_operatives: usize,
    free_operatives: usize,
    requested_items: u64,
    created_items: u64,
    computing_items: u64,
    computed_items: u64,
    processed_items: u64,
    aborted_items: u64,
    total_computation_time: Duration,
    items_computed_by_worker: HashMap<WorkerId, u64>,
}

impl SystemStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SystemCounters> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn notify_operative_registered(&self) {
        let mut counters = self.lock();
        counters.registered_operatives += 1;
        counters.free_operatives += 1;
    }

    pub fn notify_operative_unregistered(&self, was_idle: bool) {
        let mut counters = self.lock();
        counters.registered_operatives = counters.registered_operatives.saturating_sub(1);
        if was_idle {
            counters.free_operatives = counters.free_operatives.saturating_sub(1);
        }
    }

    pub fn notify_operative_busy(&self) {
        let mut counters = self.lock();
        counters.free_operatives = counters.free_operatives.saturating_sub(1);
    }

    pub fn notify_operative_idle(&self) {
        self.lock().free_operatives += 1;
    }

    fn add_requested(&self, count: u64) {
        self.lock().requested_items += count;
    }

    fn add_created(&self, count: u64) {
        self.lock().created_items += count;
    }

    fn inc_computing(&self) {
        self.lock().computing_items += 1;
    }

    fn dec_computing(&self) {
        let mut counters = self.lock();
        counters.computing_items = counters.computing_items.saturating_sub(1);
    }

    fn add_computed(&self, worker_id: WorkerId, duration: Duration) {
        let mut counters = self.lock();
        counters.computed_items += 1;
        counters.total_computation_time += duration;
        *counters.items_computed_by_worker.entry(worker_id).or_default() += 1;
    }

    fn add_processed(&self) {
        self.lock().processed_items += 1;
    }

    fn add_aborted(&self, count: u64) {
        self.lock().aborted_items += count;
    }

    pub fn average_computation_time(&self) -> Option<Duration> {
        let counters = self.lock();
        if counters.computed_items == 0 {
            None
        } else {
            Some(counters.total_computation_time / counters.computed_items as u32)
        }
    }

    /// Returns an immutable deep copy of the current counters.
    pub fn report(&self) -> SystemReport {
        let counters = self.lock();
        let average_computation_time_ms = if counters.computed_items == 0 {
            None
        } else {
            Some((counters.total_computation_time / counters.computed_items as u32).as_millis() as u64)
        };
        let mut items_computed_by_worker: Vec<WorkerComputedCount> = counters
            .items_computed_by_worker
            .iter()
            .map(|(&worker_id, &computed_items)| WorkerComputedCount {
                worker_id,
                computed_items,
            })
            .collect();
        items_computed_by_worker.sort_by_key(|x| x.worker_id);
        SystemReport {
            registered_operatives: counters.registered_operatives,
            free_operatives: counters.free_operatives,
            requested_items: counters.requested_items,
            created_items: counters.created_items,
            computing_items: counters.computing_items,
            computed_items: counters.computed_items,
            processed_items: counters.processed_items,
            aborted_items: counters.aborted_items,
            processing_items: counters.created_items
                - counters.processed_items
                - counters.aborted_items,
            total_computation_time_ms: counters.total_computation_time.as_millis() as u64,
            average_computation_time_ms,
            items_computed_by_worker,
        }
    }
}

/// Statistics for a single submitted problem.
///
/// The collector optionally forwards every delta to the system-wide
/// [SystemStatistics] it was created with.
#[derive(Debug)]
pub struct ProblemStatistics {
    system: Option<Arc<SystemStatistics>>,
    inner: Mutex<ProblemCounters>,
}

#[derive(Debug)]
struct ProblemCounters {
    born_at: Instant,
    requested_items: u64,
    created_items: u64,
    computed_items: u64,
    processed_items: u64,
    aborted_items: u64,
    total_computation_time: Duration,
    /// Dispatch timestamps for items currently being computed.
    /// An entry is cleared when the item is reclaimed to the queue, so the
    /// recorded duration covers only the attempt that produced the first
    /// accepted result.
    in_flight: HashMap<ItemId, Instant>,
}

impl ProblemStatistics {
    pub fn new(system: Option<Arc<SystemStatistics>>) -> Self {
        Self {
            system,
            inner: Mutex::new(ProblemCounters {
                born_at: Instant::now(),
                requested_items: 0,
                created_items: 0,
                computed_items: 0,
                processed_items: 0,
                aborted_items: 0,
                total_computation_time: Duration::ZERO,
                in_flight: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProblemCounters> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn notify_requested_items(&self, count: u64) {
        self.lock().requested_items += count;
        if let Some(system) = &self.system {
            system.add_requested(count);
        }
    }

    pub fn notify_created_items(&self, count: u64) {
        self.lock().created_items += count;
        if let Some(system) = &self.system {
            system.add_created(count);
        }
    }

    /// Records that `item` left the queue for an operative.
    /// A no-op if the item is already in flight with another holder.
    pub fn notify_item_dispatched(&self, item_id: ItemId) {
        let mut counters = self.lock();
        if counters.in_flight.contains_key(&item_id) {
            return;
        }
        counters.in_flight.insert(item_id, Instant::now());
        drop(counters);
        if let Some(system) = &self.system {
            system.inc_computing();
        }
    }

    /// Records that `item` lost its last holder and returned to the queue.
    pub fn notify_item_reclaimed(&self, item_id: ItemId) {
        let removed = self.lock().in_flight.remove(&item_id).is_some();
        if removed {
            if let Some(system) = &self.system {
                system.dec_computing();
            }
        }
    }

    /// Records the first accepted result for `item`, computed by `worker_id`.
    pub fn notify_item_computed(&self, item_id: ItemId, worker_id: WorkerId) {
        let mut counters = self.lock();
        let duration = counters
            .in_flight
            .remove(&item_id)
            .map(|started_at| Instant::now().saturating_duration_since(started_at))
            .unwrap_or_default();
        counters.computed_items += 1;
        counters.total_computation_time += duration;
        drop(counters);
        if let Some(system) = &self.system {
            system.dec_computing();
            system.add_computed(worker_id, duration);
        }
    }

    pub fn notify_item_processed(&self) {
        self.lock().processed_items += 1;
        if let Some(system) = &self.system {
            system.add_processed();
        }
    }

    pub fn notify_aborted_items(&self, count: u64) {
        self.lock().aborted_items += count;
        if let Some(system) = &self.system {
            system.add_aborted(count);
        }
    }

    /// Clears the in-flight timers when the problem is discarded.
    pub fn drain_in_flight(&self) {
        let drained = {
            let mut counters = self.lock();
            let n = counters.in_flight.len();
            counters.in_flight.clear();
            n
        };
        if let Some(system) = &self.system {
            for _ in 0..drained {
                system.dec_computing();
            }
        }
    }

    pub fn average_computation_time(&self) -> Option<Duration> {
        let counters = self.lock();
        if counters.computed_items == 0 {
            None
        } else {
            Some(counters.total_computation_time / counters.computed_items as u32)
        }
    }

    /// Estimates the remaining computation time for this problem.
    ///
    /// With nothing mid-computation the estimate is zero. Otherwise the
    /// per-item average is the problem's own historical average, falling
    /// back to the system-wide average; the estimate is then the average
    /// times the queued count, plus the expected remainder of every item in
    /// flight. With no average available at all, the estimate is the longest
    /// time any in-flight item has been computing so far.
    pub fn estimated_remaining_time(&self, queued_items: usize) -> Duration {
        let now = Instant::now();
        let counters = self.lock();
        if counters.in_flight.is_empty() {
            return Duration::ZERO;
        }
        let own_average = if counters.computed_items == 0 {
            None
        } else {
            Some(counters.total_computation_time / counters.computed_items as u32)
        };
        let average = own_average.or_else(|| {
            self.system
                .as_ref()
                .and_then(|system| system.average_computation_time())
        });
        match average {
            Some(average) => {
                let mut total = average * queued_items as u32;
                for &started_at in counters.in_flight.values() {
                    let elapsed = now.saturating_duration_since(started_at);
                    total += average.saturating_sub(elapsed);
                }
                total
            }
            None => counters
                .in_flight
                .values()
                .map(|&started_at| now.saturating_duration_since(started_at))
                .max()
                .unwrap_or_default(),
        }
    }

    /// Returns an immutable deep copy of the current counters.
    pub fn report(&self, queued_items: usize) -> ProblemReport {
        let estimated_remaining_time = self.estimated_remaining_time(queued_items);
        let counters = self.lock();
        let average_computation_time_ms = if counters.computed_items == 0 {
            None
        } else {
            Some((counters.total_computation_time / counters.computed_items as u32).as_millis() as u64)
        };
        ProblemReport {
            age_ms: Instant::now()
                .saturating_duration_since(counters.born_at)
                .as_millis() as u64,
            requested_items: counters.requested_items,
            created_items: counters.created_items,
            queued_items: queued_items as u64,
            computing_items: counters.in_flight.len() as u64,
            computed_items: counters.computed_items,
            processed_items: counters.processed_items,
            aborted_items: counters.aborted_items,
            processing_items: counters.created_items
                - counters.processed_items
                - counters.aborted_items,
            total_computation_time_ms: counters.total_computation_time.as_millis() as u64,
            average_computation_time_ms,
            estimated_remaining_time_ms: estimated_remaining_time.as_millis() as u64,
        }
    }
}

/// A deep-copy snapshot of the system-wide counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemReport {
    pub registered_operatives: usize,
    pub free_operatives: usize,
    pub requested_items: u64,
    pub created_items: u64,
    pub computing_items: u64,
    pub computed_items: u64,
    pub processed_items: u64,
    pub aborted_items: u64,
    /// Always equals `created_items - processed_items - aborted_items`.
    pub processing_items: u64,
    pub total_computation_time_ms: u64,
    pub average_computation_time_ms: Option<u64>,
    pub items_computed_by_worker: Vec<WorkerComputedCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerComputedCount {
    pub worker_id: WorkerId,
    pub computed_items: u64,
}

/// A deep-copy snapshot of the counters for one problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemReport {
    pub age_ms: u64,
    pub requested_items: u64,
    pub created_items: u64,
    pub queued_items: u64,
    pub computing_items: u64,
    pub computed_items: u64,
    pub processed_items: u64,
    pub aborted_items: u64,
    /// Always equals `created_items - processed_items - aborted_items`.
    pub processing_items: u64,
    pub total_computation_time_ms: u64,
    pub average_computation_time_ms: Option<u64>,
    pub estimated_remaining_time_ms: u64,
}
