use std::{
    fmt,
    path::{Path, PathBuf},
};

use strum_macros::EnumIter;

/// Mask filetypes accepted for the static mask
pub const MASK_EXTENSIONS: [&str; 4] = ["tif", "edf", "npy", "msk"];
/// Required extension of the instrument geometry file
pub const PONI_EXTENSION: &str = "poni";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(r#"data source {0:?} is not recognized, expected "NSLS-II", "APS" or "SSRL""#)]
    DataSource(String),
    #[error("poni file {0:?} does not exist")]
    PoniMissing(PathBuf),
    #[error("poni file {0:?} is not a .poni file")]
    PoniExtension(PathBuf),
    #[error("radial points {0:?} is not a positive integer")]
    RadialPoints(String),
}
type Result<T> = std::result::Result<T, ConfigError>;

/// Synchrotron facility the data was collected at
///
/// The source settles the expected image extension (`.tiff` for NSLS-II,
/// `.tif` for APS and SSRL) and the sample folder layout: NSLS-II nests
/// images in a `dark_sub` sub-folder, APS and SSRL keep them at the top of
/// the sample folder.
#[derive(EnumIter, Clone, Copy, PartialEq, Eq, Debug)]
pub enum DataSource {
    NslsII,
    Aps,
    Ssrl,
}
impl DataSource {
    /// Get a new `DataSource` chosen from NSLS-II, APS or SSRL (any case)
    pub fn new(source: &str) -> Result<Self> {
        use DataSource::*;
        match source.to_lowercase().as_str() {
            "nsls-ii" => Ok(NslsII),
            "aps" => Ok(Aps),
            "ssrl" => Ok(Ssrl),
            _ => Err(ConfigError::DataSource(source.to_string())),
        }
    }
    /// Extension of the detector images to integrate
    pub fn image_extension(&self) -> &'static str {
        match self {
            DataSource::NslsII => "tiff",
            DataSource::Aps | DataSource::Ssrl => "tif",
        }
    }
    /// Directory holding the images of one sample folder
    pub fn image_dir(&self, sample_dir: &Path) -> PathBuf {
        match self {
            DataSource::NslsII => sample_dir.join("dark_sub"),
            DataSource::Aps | DataSource::Ssrl => sample_dir.to_path_buf(),
        }
    }
}
impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::NslsII => write!(f, "NSLS-II"),
            DataSource::Aps => write!(f, "APS"),
            DataSource::Ssrl => write!(f, "SSRL"),
        }
    }
}

/// Pixel splitting method handed to the azimuthal integrator
#[derive(EnumIter, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SplitMethod {
    No,
    #[default]
    Full,
    Bbox,
    Pseudo,
}
impl SplitMethod {
    /// Get a new `SplitMethod` chosen from no, full, bbox or pseudo (any case)
    pub fn new(method: &str) -> Option<Self> {
        use SplitMethod::*;
        match method.to_lowercase().as_str() {
            "no" => Some(No),
            "full" => Some(Full),
            "bbox" => Some(Bbox),
            "pseudo" => Some(Pseudo),
            _ => None,
        }
    }
}
impl fmt::Display for SplitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitMethod::No => write!(f, "no"),
            SplitMethod::Full => write!(f, "full"),
            SplitMethod::Bbox => write!(f, "bbox"),
            SplitMethod::Pseudo => write!(f, "pseudo"),
        }
    }
}

/// Radial (x-axis) unit of the 1D pattern
#[derive(EnumIter, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum RadialUnit {
    /// 2theta in degrees
    #[default]
    TwoThetaDeg,
    /// 2theta in radians
    TwoThetaRad,
    /// Scattering vector in inverse nanometers
    QNm,
    /// Scattering vector in inverse Angstroms
    QAngstrom,
    /// Radius in millimeters
    RadiusMm,
}
impl RadialUnit {
    /// Get a new `RadialUnit` from one of the accepted unit names (any case)
    ///
    /// Shorthands are resolved first: `tth` maps to `2th_deg` and `q` to
    /// `q_A^-1`.
    pub fn new(unit: &str) -> Option<Self> {
        use RadialUnit::*;
        match unit.to_lowercase().as_str() {
            "tth" | "2th_deg" => Some(TwoThetaDeg),
            "2th_rad" => Some(TwoThetaRad),
            "q_nm^-1" => Some(QNm),
            "q" | "q_a^-1" => Some(QAngstrom),
            "r_mm" => Some(RadiusMm),
            _ => None,
        }
    }
}
impl fmt::Display for RadialUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadialUnit::TwoThetaDeg => write!(f, "2th_deg"),
            RadialUnit::TwoThetaRad => write!(f, "2th_rad"),
            RadialUnit::QNm => write!(f, "q_nm^-1"),
            RadialUnit::QAngstrom => write!(f, "q_A^-1"),
            RadialUnit::RadiusMm => write!(f, "r_mm"),
        }
    }
}

/// Intensity error model of the integrated pattern
///
/// The error model settles the shape of the 1D files: without one the
/// patterns are `[x-unit, I]` columns in a `.xy` file, with the poisson
/// model they gain an `I_err` column and a `.xye` extension.
#[derive(EnumIter, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ErrorModel {
    #[default]
    None,
    Poisson,
}
impl ErrorModel {
    /// Get a new `ErrorModel` chosen from none or poisson (any case)
    pub fn new(model: &str) -> Option<Self> {
        match model.to_lowercase().as_str() {
            "none" => Some(ErrorModel::None),
            "poisson" => Some(ErrorModel::Poisson),
            _ => None,
        }
    }
    /// Extension of the integrated pattern files
    pub fn pattern_extension(&self) -> &'static str {
        match self {
            ErrorModel::None => "xy",
            ErrorModel::Poisson => "xye",
        }
    }
    /// Column labels of the rewritten pattern files
    pub fn columns(&self, unit: RadialUnit) -> Vec<String> {
        let mut columns = vec![format!("#{}", unit), "I".to_string()];
        if let ErrorModel::Poisson = self {
            columns.push("I_err".to_string());
        }
        columns
    }
}
impl fmt::Display for ErrorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorModel::None => write!(f, "none"),
            ErrorModel::Poisson => write!(f, "poisson"),
        }
    }
}

/// The persisted unit of configuration of a batch integration
///
/// Built once, either from a loaded `.int` file or programmatically, then
/// passed around immutably; it is re-serialized before every batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationConfig {
    /// Facility the data was collected at
    pub data_source: DataSource,
    /// Directory under which the per-sample pattern directories are created
    pub pattern_root: PathBuf,
    /// Instrument geometry (.poni) file
    pub poni_file: PathBuf,
    /// Optional static mask file
    pub mask_file: Option<PathBuf>,
    /// Pixel splitting method
    pub split_method: SplitMethod,
    /// Radial unit of the 1D patterns
    pub unit: RadialUnit,
    /// Number of radial bins
    pub radial_points: u32,
    /// Radial range, in x units; the full range when absent
    pub radial_range: Option<(f64, f64)>,
    /// Azimuthal range, in degrees; the full range when absent
    pub azimuthal_range: Option<(f64, f64)>,
    /// Pixels below this value are masked automatically; disabled when absent
    pub automask: Option<f64>,
    /// Intensity error model
    pub error_model: ErrorModel,
}

/// Default number of radial bins
pub const DEFAULT_RADIAL_POINTS: u32 = 6000;
/// Default automask threshold (masks all negative pixels)
pub const DEFAULT_AUTOMASK: f64 = -1e-10;

impl IntegrationConfig {
    /// New configuration with the default integration parameters
    pub fn new(
        data_source: DataSource,
        pattern_root: impl Into<PathBuf>,
        poni_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            data_source,
            pattern_root: pattern_root.into(),
            poni_file: poni_file.into(),
            mask_file: None,
            split_method: Default::default(),
            unit: Default::default(),
            radial_points: DEFAULT_RADIAL_POINTS,
            radial_range: None,
            azimuthal_range: None,
            automask: Some(DEFAULT_AUTOMASK),
            error_model: Default::default(),
        }
    }
    /// Checks the geometry and mask files on disk
    ///
    /// A missing poni file or one without the `.poni` extension is fatal.
    /// A missing mask or one of the wrong filetype only downgrades the
    /// configuration to run without a static mask.
    pub fn validated(mut self) -> Result<Self> {
        if !self.poni_file.is_file() {
            return Err(ConfigError::PoniMissing(self.poni_file));
        }
        if self.poni_file.extension().and_then(|e| e.to_str()) != Some(PONI_EXTENSION) {
            return Err(ConfigError::PoniExtension(self.poni_file));
        }
        if let Some(mask) = self.mask_file.take() {
            let extension = mask.extension().and_then(|e| e.to_str());
            if !mask.is_file() {
                log::warn!("mask file {mask:?} does not exist, no mask will be used");
            } else if !extension.is_some_and(|e| MASK_EXTENSIONS.contains(&e)) {
                log::warn!(
                    "mask file {mask:?} is not a .tif, .edf, .npy or .msk file, no mask will be used"
                );
            } else {
                self.mask_file = Some(mask);
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn data_source_layout() {
        let nsls = DataSource::new("nsls-ii").unwrap();
        assert_eq!(nsls.image_extension(), "tiff");
        assert_eq!(
            nsls.image_dir(Path::new("/data/Sample1")),
            Path::new("/data/Sample1/dark_sub")
        );
        let aps = DataSource::new("APS").unwrap();
        assert_eq!(aps.image_extension(), "tif");
        assert_eq!(
            aps.image_dir(Path::new("/data/Sample1")),
            Path::new("/data/Sample1")
        );
    }

    #[test]
    fn error_model_shapes_output() {
        let unit = RadialUnit::TwoThetaDeg;
        assert_eq!(ErrorModel::None.pattern_extension(), "xy");
        assert_eq!(ErrorModel::None.columns(unit), vec!["#2th_deg", "I"]);
        assert_eq!(ErrorModel::Poisson.pattern_extension(), "xye");
        assert_eq!(
            ErrorModel::Poisson.columns(unit),
            vec!["#2th_deg", "I", "I_err"]
        );
    }

    #[test]
    fn poni_file_is_required() {
        let dir = tempfile::tempdir().unwrap();
        let config = IntegrationConfig::new(
            DataSource::NslsII,
            dir.path().join("1D"),
            dir.path().join("absent.poni"),
        );
        assert!(matches!(
            config.validated(),
            Err(ConfigError::PoniMissing(_))
        ));

        let not_poni = dir.path().join("geometry.txt");
        File::create(&not_poni).unwrap();
        let config = IntegrationConfig::new(DataSource::NslsII, dir.path().join("1D"), &not_poni);
        assert!(matches!(
            config.validated(),
            Err(ConfigError::PoniExtension(_))
        ));
    }

    #[test]
    fn bad_mask_downgrades() {
        let dir = tempfile::tempdir().unwrap();
        let poni = dir.path().join("geometry.poni");
        File::create(&poni).unwrap();
        let mut config = IntegrationConfig::new(DataSource::Aps, dir.path().join("1D"), &poni);
        config.mask_file = Some(dir.path().join("absent.msk"));
        let config = config.validated().unwrap();
        assert_eq!(config.mask_file, None);

        let bad_type = dir.path().join("mask.png");
        File::create(&bad_type).unwrap();
        let mut config = IntegrationConfig::new(DataSource::Aps, dir.path().join("1D"), &poni);
        config.mask_file = Some(bad_type);
        let config = config.validated().unwrap();
        assert_eq!(config.mask_file, None);
    }

    #[test]
    fn good_mask_survives() {
        let dir = tempfile::tempdir().unwrap();
        let poni = dir.path().join("geometry.poni");
        File::create(&poni).unwrap();
        let mask = dir.path().join("mask.msk");
        File::create(&mask).unwrap();
        let mut config = IntegrationConfig::new(DataSource::Ssrl, dir.path().join("1D"), &poni);
        config.mask_file = Some(mask.clone());
        let config = config.validated().unwrap();
        assert_eq!(config.mask_file, Some(mask));
    }
}
