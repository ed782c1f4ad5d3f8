use crate::{
    batch::BatchError, config::ConfigError, intfile::IntFileError, reconcile::ReconcileError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `config` module")]
    Config(#[from] ConfigError),
    #[error("Error in the `intfile` module")]
    IntFile(#[from] IntFileError),
    #[error("Error in the `reconcile` module")]
    Reconcile(#[from] ReconcileError),
    #[error("Error in the `batch` module")]
    Batch(#[from] BatchError),
}
