use tokio::sync::oneshot;

use crate::error::ComputeResult;
use crate::id::{ItemId, WorkerId};

pub enum WorkerEvent {
    /// Registration with the dispatcher completed.
    Registered {
        worker_id: WorkerId,
    },
    /// The dispatcher assigned a work item.
    RunItem {
        item_id: ItemId,
        payload: Vec<u8>,
    },
    /// The dispatcher no longer needs the computation of this item.
    StopItem {
        item_id: ItemId,
    },
    /// The spawned computation task finished.
    ItemComputed {
        item_id: ItemId,
        outcome: ComputeResult<Vec<u8>>,
    },
    /// A reachability probe from the dispatcher.
    Probe {
        result: oneshot::Sender<()>,
    },
    Shutdown,
}
