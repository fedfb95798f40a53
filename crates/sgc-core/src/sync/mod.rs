//! Offline sync: pending operations, the mutation queue, connectivity
//! tracking and snapshot reconciliation.

mod connectivity;
mod operation;
mod queue;
mod reconcile;

pub use connectivity::{run_probe, ConnectivityMonitor};
pub use operation::{PendingOperation, RowData};
pub use queue::{DeadLetter, DrainReport, MutationQueue};
pub use reconcile::{
    ensure_bootstrap_admin, merge_messages, merge_snapshot, CollectionOutcome, Overlay,
    PendingKeys, ReconcileReport,
};
