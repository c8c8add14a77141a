// Now-playing sources, arbitration and pause reconciliation

mod identity;
mod manager;
mod pause;
mod source;
pub mod sources;
mod types;
mod worker;

pub use identity::TrackIdentity;
pub use manager::SourceArbiter;
pub use pause::{PauseReconciler, ReconcilerState, Transition};
pub use source::{ControlOp, TrackSnapshotSource};
pub use types::*;
pub use worker::{spawn_source_worker, SourceHandle};
