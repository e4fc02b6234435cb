//! Run lifecycle for the collection pipeline.
//!
//! [`CollectionOrchestrator`] owns the registered collectors, filters the
//! active pairs down to ones a collector can serve, and drives one batch
//! collection run to a [`RunSummary`].

pub mod orchestrator;
pub mod summary;

pub use orchestrator::{CollectionOrchestrator, RunState};
pub use summary::{InitFailure, RunSummary};
