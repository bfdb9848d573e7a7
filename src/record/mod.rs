//! Per-record state: lifecycle, data layers, validation errors and the lazily
//! materialized user-facing handle.

mod data;
mod errors;
mod handle;
mod internal_model;
mod state;

pub use data::{DataChanges, RecordData, RelationshipData, RelationshipState};
pub use errors::RecordErrors;
pub use handle::RecordHandle;
pub use internal_model::InternalModel;
pub use state::{DirtyType, RecordEvent, RecordState};
