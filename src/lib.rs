//! Guided batch azimuthal integration of 2D detector images.
//!
//! The numerics are delegated to an external azimuthal integrator (pyFAI);
//! this crate owns everything around it: the editable `.int` parameter
//! file, the coercion of loosely typed user input, the reconciliation of
//! the selected sample folders with the mirrored output tree, the strictly
//! sequential batch loop with its output post-processing, and the record
//! file a run leaves behind.

pub mod batch;
pub mod config;
mod error;
pub mod intfile;
pub mod params;
pub mod reconcile;
pub mod record;

pub use batch::{Batch, BatchRun, CommandIntegrator, Integrator, PlannedBatch, ValidatedBatch};
pub use config::{DataSource, ErrorModel, IntegrationConfig, RadialUnit, SplitMethod};
pub use error::Error;
pub use intfile::IntFile;
pub use reconcile::DirectorySelectionPlan;
