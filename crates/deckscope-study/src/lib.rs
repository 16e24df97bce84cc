//! # deckscope-study
//!
//! Stateful review services for deckscope.
//!
//! - [`ledger`]: grade persistence with an offline-first local cache
//! - [`reconciler`]: taxonomy ensure-or-create and replace-links sequences
//! - [`controller`]: the [`StudyController`] owning catalog, scope and session
//! - [`config`]: environment configuration for the `deckscope` binary

pub mod config;
pub mod controller;
pub mod ledger;
pub mod reconciler;

pub use config::StudyConfig;
pub use controller::StudyController;
pub use ledger::{
    DrainReport, FileStore, GradeLedger, GradeOutcome, LocalGradeCache, LocalStore, MemoryStore,
};
pub use reconciler::{CascadeReport, ReplaceReport, TaxonomyReconciler};
