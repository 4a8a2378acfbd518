// Application layer - Use case coordinators

pub mod export_coordinator;
pub mod marking;

pub use export_coordinator::{ExportCoordinator, ExportError, Selection};
pub use marking::MarkingSession;
