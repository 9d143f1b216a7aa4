use std::collections::{HashMap, HashSet, VecDeque};

use crate::id::{ItemId, WorkerId};

/// The per-problem queue of work items and their in-flight holder sets.
///
/// An item can legitimately be computed zero, one, or many times; only the
/// first accepted result counts. There is no global retry cap: an item that
/// fails on every operative is requeued indefinitely, which is a known
/// liveness risk for computations that crash every operative attempting
/// them.
pub struct WorkQueue {
    queued: VecDeque<ItemId>,
    items: HashMap<ItemId, ItemEntry>,
}

struct ItemEntry {
    payload: Vec<u8>,
    holders: HashSet<WorkerId>,
    solved: bool,
}

/// The outcome of reclaiming an item from a disappeared holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reclaim {
    /// The item lost its last holder and is queued again, at the front.
    Requeued,
    /// Other operatives still hold the item; nothing changed.
    StillHeld,
    /// The operative did not hold the item, or the item is already solved.
    Ignored,
}

/// The outcome of accepting a returned partial solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// The first result for this item; `other_holders` lists every other
    /// operative still computing it, whose work is now moot.
    First { other_holders: Vec<WorkerId> },
    /// A duplicate or late result, to be discarded silently.
    Duplicate,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            queued: VecDeque::new(),
            items: HashMap::new(),
        }
    }

    /// Appends a newly produced item to the back of the queue.
    pub fn enqueue(&mut self, item_id: ItemId, payload: Vec<u8>) {
        self.items.insert(
            item_id,
            ItemEntry {
                payload,
                holders: HashSet::new(),
                solved: false,
            },
        );
        self.queued.push_back(item_id);
    }

    /// Pops the next undispatched item in FIFO order.
    pub fn dequeue(&mut self) -> Option<ItemId> {
        while let Some(item_id) = self.queued.pop_front() {
            match self.items.get(&item_id) {
                Some(entry) if !entry.solved => return Some(item_id),
                _ => {}
            }
        }
        None
    }

    pub fn payload(&self, item_id: ItemId) -> Option<&[u8]> {
        self.items.get(&item_id).map(|entry| entry.payload.as_slice())
    }

    /// Records `worker_id` as a holder of `item_id`.
    /// Returns `true` if the item was not in flight before this call.
    pub fn add_holder(&mut self, item_id: ItemId, worker_id: WorkerId) -> bool {
        match self.items.get_mut(&item_id) {
            Some(entry) => {
                let was_idle = entry.holders.is_empty();
                entry.holders.insert(worker_id);
                was_idle
            }
            None => false,
        }
    }

    /// Removes `worker_id` from the holder set of `item_id` after the
    /// operative disappeared or reported a failure.
    pub fn reclaim(&mut self, item_id: ItemId, worker_id: WorkerId) -> Reclaim {
        let Some(entry) = self.items.get_mut(&item_id) else {
            return Reclaim::Ignored;
        };
        if !entry.holders.remove(&worker_id) || entry.solved {
            return Reclaim::Ignored;
        }
        if entry.holders.is_empty() {
            self.queued.push_front(item_id);
            Reclaim::Requeued
        } else {
            Reclaim::StillHeld
        }
    }

    /// Records a returned solution for `item_id`. The first acceptance wins;
    /// every later result for the same item is a duplicate. A result is
    /// accepted regardless of whether the reporting operative is still a
    /// known holder, so a solution from an operative that was presumed dead
    /// still counts.
    pub fn accept(&mut self, item_id: ItemId, worker_id: WorkerId) -> Acceptance {
        let Some(entry) = self.items.get_mut(&item_id) else {
            return Acceptance::Duplicate;
        };
        if entry.solved {
            return Acceptance::Duplicate;
        }
        entry.solved = true;
        entry.holders.remove(&worker_id);
        let other_holders = entry.holders.drain().collect();
        Acceptance::First { other_holders }
    }

    /// Drops a solved item once its result has been processed,
    /// returning its payload.
    pub fn remove(&mut self, item_id: ItemId) -> Option<Vec<u8>> {
        self.items.remove(&item_id).map(|entry| entry.payload)
    }

    pub fn holders(&self, item_id: ItemId) -> Vec<WorkerId> {
        self.items
            .get(&item_id)
            .map(|entry| entry.holders.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// The number of unsolved items currently held by at least one
    /// operative.
    pub fn in_flight_len(&self) -> usize {
        self.items
            .values()
            .filter(|entry| !entry.solved && !entry.holders.is_empty())
            .count()
    }

    /// The number of items that have been created but not yet solved.
    pub fn outstanding_len(&self) -> usize {
        self.items.values().filter(|entry| !entry.solved).count()
    }

    /// Removes every remaining item, returning each unsolved item's holder
    /// set so their computations can be stopped. Used on abort.
    pub fn drain(&mut self) -> Vec<(ItemId, Vec<WorkerId>)> {
        self.queued.clear();
        self.items
            .drain()
            .filter(|(_, entry)| !entry.solved)
            .map(|(item_id, entry)| (item_id, entry.holders.into_iter().collect()))
            .collect()
    }
}
