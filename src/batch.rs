//! The sequential batch driver.
//!
//! A run walks the linear chain `Batch` (plan and parameters as given) →
//! [`ValidatedBatch`] (resources checked, plan resolved) → [`PlannedBatch`]
//! (output tree mirrored) → [`BatchRun`] (every image integrated). Each step
//! consumes the previous one, so there is no way back and no way to reach
//! `execute` without passing the validation and reconciliation gates. Any
//! failure inside the integrator or the post-processing aborts the whole
//! run; there are no retries and no partial-directory skips.

use std::{
    fs, io,
    path::{Path, PathBuf},
    process,
};

use indicatif::{MultiProgress, ProgressBar};
use itertools::Itertools;

use crate::{
    config::{ConfigError, IntegrationConfig},
    intfile::{IntFile, IntFileError},
    reconcile::{self, DirectorySelectionPlan, ReconcileError},
    record,
};

/// Number of calibration/setup header lines of a raw integrator output file
pub const PREAMBLE_LINES: usize = 23;

/// The external azimuthal-integration collaborator
///
/// Given a 2D image, an implementation writes `output`: a fixed-size header
/// of [`PREAMBLE_LINES`] lines followed by whitespace-delimited numeric
/// rows, two columns without an error model and three with one. The mask,
/// automask threshold, splitting method, unit, point count and ranges are
/// all taken from the configuration.
pub trait Integrator {
    fn integrate1d(
        &self,
        image: &Path,
        output: &Path,
        config: &IntegrationConfig,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Integrator that invokes an external command once per image
///
/// The command receives the geometry, mask and every integration parameter
/// as arguments and must write the raw pattern file to the given output
/// path. A non-zero exit status fails the image and with it the whole run.
pub struct CommandIntegrator {
    program: PathBuf,
}

impl CommandIntegrator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Integrator for CommandIntegrator {
    fn integrate1d(
        &self,
        image: &Path,
        output: &Path,
        config: &IntegrationConfig,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut command = process::Command::new(&self.program);
        command
            .arg("--poni")
            .arg(&config.poni_file)
            .arg("--method")
            .arg(config.split_method.to_string())
            .arg("--unit")
            .arg(config.unit.to_string())
            .arg("--npt")
            .arg(config.radial_points.to_string());
        if let Some(mask) = &config.mask_file {
            command.arg("--mask").arg(mask);
        }
        if let Some(threshold) = config.automask {
            command.arg("--dummy").arg(threshold.to_string());
        }
        if let Some((lower, upper)) = config.radial_range {
            command
                .arg("--radial-range")
                .arg(lower.to_string())
                .arg(upper.to_string());
        }
        if let Some((lower, upper)) = config.azimuthal_range {
            command
                .arg("--azimuth-range")
                .arg(lower.to_string())
                .arg(upper.to_string());
        }
        command.arg("--error-model").arg(config.error_model.to_string());
        let status = command.arg(image).arg(output).status()?;
        if !status.success() {
            return Err(format!("{} exited with {status}", self.program.display()).into());
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("cannot list the images of {path:?}")]
    ListImages {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("integration failed for {image:?}")]
    Integration {
        image: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("cannot rewrite the integrated pattern {path:?}")]
    Rewrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed integrated pattern {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("cannot write the post-processed pattern")]
    Csv(#[from] csv::Error),
}
type Result<T> = std::result::Result<T, BatchError>;

/// A batch integration as handed over by the user: not yet validated
pub struct Batch {
    config: IntegrationConfig,
    source_root: PathBuf,
    plan: DirectorySelectionPlan,
}

impl Batch {
    pub fn new(
        config: IntegrationConfig,
        source_root: impl Into<PathBuf>,
        plan: DirectorySelectionPlan,
    ) -> Self {
        Self {
            config,
            source_root: source_root.into(),
            plan,
        }
    }
    /// Checks the calibration files and resolves the selection plan
    pub fn validate(self) -> Result<ValidatedBatch> {
        let config = self.config.validated()?;
        let directories = self.plan.resolve(&self.source_root)?;
        Ok(ValidatedBatch {
            config,
            source_root: self.source_root,
            directories,
        })
    }
}

/// A validated batch: resources exist, the plan is resolved
pub struct ValidatedBatch {
    config: IntegrationConfig,
    source_root: PathBuf,
    directories: Vec<String>,
}

impl ValidatedBatch {
    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }
    /// The resolved sample folder names, in plan order
    pub fn directories(&self) -> &[String] {
        &self.directories
    }
    /// Mirrors the sample folders under the pattern root
    ///
    /// All-or-nothing: a single folder that cannot be mirrored fails the
    /// whole batch here, before any image is integrated.
    pub fn mirror(self) -> Result<PlannedBatch> {
        let mirrored = reconcile::mirror(&self.config.pattern_root, &self.directories)?;
        reconcile::check(&self.directories, &mirrored)?;
        Ok(PlannedBatch {
            config: self.config,
            source_root: self.source_root,
            directories: self.directories,
        })
    }
}

/// A batch with its output tree in place, ready to execute
pub struct PlannedBatch {
    config: IntegrationConfig,
    source_root: PathBuf,
    directories: Vec<String>,
}

impl PlannedBatch {
    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }
    pub fn directories(&self) -> &[String] {
        &self.directories
    }
    /// Re-serializes the `.int` file before execution, keeping `notes`
    pub fn persist_config(
        &self,
        notes: &str,
        path: impl AsRef<Path>,
    ) -> std::result::Result<(), IntFileError> {
        IntFile {
            config: self.config.clone(),
            notes: notes.to_string(),
        }
        .save(path)
    }
    /// Integrates every image of every sample folder, strictly sequentially
    ///
    /// Sample folders are processed in plan order and images in sorted
    /// filename order. Each raw integrator output is rewritten in place
    /// with labeled columns, 8-decimal values and tab separators.
    pub fn execute(self, integrator: &dyn Integrator) -> Result<BatchRun> {
        let listings: Vec<(String, Vec<String>)> = self
            .directories
            .iter()
            .map(|dir| {
                let image_dir = self.config.data_source.image_dir(&self.source_root.join(dir));
                list_images(&image_dir, self.config.data_source.image_extension())
                    .map(|files| (dir.clone(), files))
            })
            .collect::<Result<_>>()?;
        let total: usize = listings.iter().map(|(_, files)| files.len()).sum();
        log::info!(
            "integrating {total} images from {} directories",
            listings.len()
        );

        let progress = MultiProgress::new();
        let overall = progress.add(ProgressBar::new(total as u64));
        let mut images = vec![];
        for (dir, files) in &listings {
            // a per-directory bar only makes sense for more than one folder
            let dir_bar = (listings.len() > 1)
                .then(|| progress.add(ProgressBar::new(files.len() as u64)));
            let image_dir = self.config.data_source.image_dir(&self.source_root.join(dir));
            let pattern_dir = self.config.pattern_root.join(dir);
            for file in files {
                let image = image_dir.join(file);
                let output = pattern_dir.join(
                    Path::new(file).with_extension(self.config.error_model.pattern_extension()),
                );
                integrator
                    .integrate1d(&image, &output, &self.config)
                    .map_err(|source| BatchError::Integration {
                        image: image.clone(),
                        source,
                    })?;
                rewrite_pattern(&output, &self.config)?;
                images.push(file.clone());
                overall.inc(1);
                if let Some(bar) = &dir_bar {
                    bar.inc(1);
                }
            }
            if let Some(bar) = dir_bar {
                bar.finish_and_clear();
            }
        }
        overall.finish();

        Ok(BatchRun {
            config: self.config,
            directories: self.directories,
            images,
        })
    }
}

/// A completed batch: the audit trail of what was integrated
pub struct BatchRun {
    pub config: IntegrationConfig,
    /// Sample folders parsed, in plan order
    pub directories: Vec<String>,
    /// Every integrated image filename, in integration order
    pub images: Vec<String>,
}

impl BatchRun {
    /// Total number of integrated images
    pub fn total(&self) -> usize {
        self.images.len()
    }
    /// Writes the record file, overwriting any prior content
    pub fn write_record(&self, path: impl AsRef<Path>) -> io::Result<()> {
        record::write(path, &self.config, &self.directories, &self.images)
    }
}

/// Image filenames of one directory, sorted for a deterministic record
fn list_images(image_dir: &Path, extension: &str) -> Result<Vec<String>> {
    let suffix = format!(".{extension}");
    let entries = fs::read_dir(image_dir).map_err(|source| BatchError::ListImages {
        path: image_dir.to_path_buf(),
        source,
    })?;
    let mut files = vec![];
    for entry in entries {
        let entry = entry.map_err(|source| BatchError::ListImages {
            path: image_dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(&suffix) && entry.path().is_file() {
            files.push(name);
        }
    }
    Ok(files.into_iter().sorted().collect())
}

/// Rewrites a raw integrator output file into its final shape
///
/// Skips the fixed-size preamble, then relabels the whitespace-delimited
/// numeric rows with the columns dictated by the error model, fixed
/// 8-decimal formatting, tab-separated.
fn rewrite_pattern(path: &Path, config: &IntegrationConfig) -> Result<()> {
    let contents = fs::read_to_string(path).map_err(|source| BatchError::Rewrite {
        path: path.to_path_buf(),
        source,
    })?;
    let columns = config.error_model.columns(config.unit);
    let mut rows = vec![];
    for line in contents.lines().skip(PREAMBLE_LINES) {
        if line.trim().is_empty() {
            continue;
        }
        let row: Vec<f64> = line
            .split_whitespace()
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| BatchError::Malformed {
                path: path.to_path_buf(),
                reason: format!("non-numeric row {line:?}"),
            })?;
        if row.len() != columns.len() {
            return Err(BatchError::Malformed {
                path: path.to_path_buf(),
                reason: format!("expected {} columns, found {}", columns.len(), row.len()),
            });
        }
        rows.push(row);
    }
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    wtr.write_record(&columns)?;
    for row in rows {
        wtr.write_record(row.iter().map(|value| format!("{value:.8}")))?;
    }
    wtr.flush().map_err(|source| BatchError::Rewrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
