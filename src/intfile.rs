//! The ".int" parameter file: an annotated, user-editable text format.
//!
//! The artifact is made of a citation banner, a static description of every
//! parameter, an editable `Key: value` section bounded by two banner lines,
//! and a free-form user notes section that is preserved verbatim whenever an
//! existing file is re-serialized. Parsing is a two-pass line scan: locate
//! the section bounds, then locate each required key inside them.

use std::{fs, path::Path};

use chrono::Local;

use crate::{
    config::{ConfigError, IntegrationConfig},
    params,
};

/// Program version written to the banner of every artifact
pub const VERSION: &str = "0.1";

/// First line of the editable section banner
pub const SECTION_START: &str = "Integration parameters and setup.";
/// User notes banner line; everything below it is never parsed
pub const SECTION_END: &str = "User notes / metadata allowed below here:";

const KEY_DATA_SOURCE: &str = "Data from NSLS-II, APS, or SSRL";
const KEY_PATTERN_ROOT: &str = "Main integrated pattern directory";
const KEY_PONI: &str = "Poni file";
const KEY_MASK: &str = "Mask file";
const KEY_SPLIT: &str = "Pixel splitting method";
const KEY_UNIT: &str = "X unit";
const KEY_POINTS: &str = "Radial (x-unit) points";
const KEY_RADIAL_RANGE: &str = "Radial (x-unit) range";
const KEY_AZIMUTHAL_RANGE: &str = "Azimuthal (deg.) range";
const KEY_AUTOMASK: &str = "Automask pixel value";
const KEY_ERROR_MODEL: &str = "Intensity error model";

/// The 11 `Key: value` lines every `.int` file must carry
pub const REQUIRED_KEYS: [&str; 11] = [
    KEY_DATA_SOURCE,
    KEY_PATTERN_ROOT,
    KEY_PONI,
    KEY_MASK,
    KEY_SPLIT,
    KEY_UNIT,
    KEY_POINTS,
    KEY_RADIAL_RANGE,
    KEY_AZIMUTHAL_RANGE,
    KEY_AUTOMASK,
    KEY_ERROR_MODEL,
];

#[derive(Debug, thiserror::Error)]
pub enum IntFileError {
    #[error("cannot find keyword line(s) in .int file for: {}", .0.join(", "))]
    MissingKeys(Vec<String>),
    #[error("cannot read or write the .int file")]
    Io(#[from] std::io::Error),
    #[error("invalid parameter in .int file")]
    Config(#[from] ConfigError),
}
type Result<T> = std::result::Result<T, IntFileError>;

/// An `.int` file: the configuration plus the preserved user notes
#[derive(Debug, Clone, PartialEq)]
pub struct IntFile {
    pub config: IntegrationConfig,
    /// Free-form text below the user notes banner, kept verbatim on re-write
    pub notes: String,
}

impl IntFile {
    /// New `.int` file with empty user notes
    pub fn new(config: IntegrationConfig) -> Self {
        Self {
            config,
            notes: String::new(),
        }
    }

    /// Reads and parses an `.int` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Parses the text of an `.int` file
    ///
    /// The first occurrence of each banner line bounds the editable section;
    /// a missing end banner degrades to end-of-file, a missing start banner
    /// degrades to a whole-file scan that skips commented-out lines. Every
    /// one of the 11 required keys must be located or the parse fails,
    /// reporting all of the missing ones.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.iter().position(|line| line.contains(SECTION_START));
        let end = lines.iter().position(|line| line.contains(SECTION_END));
        if start.is_none() {
            log::warn!(
                "section header for integration parameters has been modified, \
                 scanning the whole file for keyword lines"
            );
        }
        if end.is_none() {
            log::warn!(
                "section footer for integration parameters has been modified, \
                 expecting the section to end at the end of the file"
            );
        }

        let (from, to) = (start.unwrap_or(0), end.unwrap_or(lines.len()));
        // an end banner above the start banner leaves nothing to parse
        let section: &[&str] = if from <= to { &lines[from..to] } else { &[] };
        let mut missing = vec![];
        let mut raw = |key: &str| -> String {
            let line = match start {
                // first matching line within the section bounds
                Some(_) => section.iter().find(|line| line.contains(key)),
                // no bounds: a '#' before the key comments the whole line out
                None => section.iter().find(|line| {
                    line.contains(key)
                        && line.find('#').map_or(true, |hash| {
                            hash > line.find(key).expect("key was just matched")
                        })
                }),
            };
            match line {
                Some(line) => extract_value(line, key).to_string(),
                None => {
                    missing.push(key.to_string());
                    String::new()
                }
            }
        };

        let data_source = raw(KEY_DATA_SOURCE);
        let pattern_root = raw(KEY_PATTERN_ROOT);
        let poni_file = raw(KEY_PONI);
        let mask_file = raw(KEY_MASK);
        let split_method = raw(KEY_SPLIT);
        let unit = raw(KEY_UNIT);
        let radial_points = raw(KEY_POINTS);
        let radial_range = raw(KEY_RADIAL_RANGE);
        let azimuthal_range = raw(KEY_AZIMUTHAL_RANGE);
        let automask = raw(KEY_AUTOMASK);
        let error_model = raw(KEY_ERROR_MODEL);
        if !missing.is_empty() {
            return Err(IntFileError::MissingKeys(missing));
        }

        let config = IntegrationConfig {
            data_source: params::data_source(&data_source)?,
            pattern_root: pattern_root.into(),
            poni_file: poni_file.into(),
            mask_file: params::mask_file(&mask_file),
            split_method: params::split_method(&split_method),
            unit: params::unit(&unit),
            radial_points: params::radial_points(&radial_points)?,
            radial_range: params::range(&radial_range, KEY_RADIAL_RANGE),
            azimuthal_range: params::range(&azimuthal_range, KEY_AZIMUTHAL_RANGE),
            automask: params::automask(&automask),
            error_model: params::error_model(&error_model),
        };
        Ok(Self {
            config,
            notes: trailing_notes(&lines, end),
        })
    }

    /// Serializes and writes the `.int` file, overwriting any prior content
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }

    /// The full text of the `.int` file
    pub fn render(&self) -> String {
        let mut text = String::from("#Guided Integration .int parameter file");
        text.push_str(&banner());
        text.push_str(&description());
        text.push_str(&setup_block(&self.config));
        text.push_str(&notes_banner());
        if !self.notes.is_empty() {
            text.push('\n');
            text.push_str(&self.notes);
        }
        text.push('\n');
        text
    }
}

/// Value of a `Key: value` line: the text after the first colon that follows
/// the key label, inline comment stripped, surrounding whitespace trimmed
fn extract_value<'a>(line: &'a str, key: &str) -> &'a str {
    let after_key = match line.find(key) {
        Some(pos) => &line[pos + key.len()..],
        None => line,
    };
    // split on the colon of the `Key:` literal so paths keep their colons
    let mut value = after_key
        .split_once(':')
        .map(|(_, value)| value)
        .unwrap_or("");
    if let Some(hash) = value.find('#') {
        value = &value[..hash];
    }
    value.trim()
}

/// User notes below the end banner, with the banner's closing rule dropped
fn trailing_notes(lines: &[&str], end: Option<usize>) -> String {
    let Some(end) = end else {
        return String::new();
    };
    let below = &lines[end + 1..];
    let below = match below.first() {
        Some(line) if line.starts_with("####") => &below[1..],
        _ => below,
    };
    below
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

fn rule() -> String {
    "#".repeat(150)
}

/// Citation banner shared by the `.int` and record files
pub(crate) fn banner() -> String {
    let now = Local::now();
    format!(
        "\n#Date: {date}\n#Time: {time}\n#Version: {VERSION}\
         \n#Github: github.com/adamcorrao/GuidedIntegration\
         \n#Citation: Guided Integration Version {VERSION} ({year}). https://github.com/adamcorrao/GuidedIntegration\
         \n#Citation for latest paper on pyFAI: Kieffer, J., Valls, V., Blanc, N. & Hennig, C. (2020). J. Synchrotron Rad. 27, 558-566.",
        date = now.format("%d%b%Y"),
        time = now.format("%H-%M-%S"),
        year = now.format("%Y"),
    )
}

/// Static, human-facing documentation of the accepted parameter values
fn description() -> String {
    [
        "\n\n#Description of parameters, options available, acceptable operand / filetypes (Guided Integration formats this correctly):",
        "\n\t#Data from NSLS-II, APS, or SSRL: where was data collected? Expected image extensions are .tiff for NSLS-II and .tif for APS / SSRL. NSLS-II images expected in sub directory 'dark_sub'",
        "\n\t#Main integrated pattern directory: directory where sub directories are created in which integrated patterns are saved",
        "\n\t#Poni file: instrument geometry (e.g., sample-to-detector distance, detector tilts) file - filetype must be .poni",
        "\n\t#Mask file: static mask (e.g., beamstop, detector edges) - must be one of the following filetypes: *.tif | *.edf | *.npy | *.msk",
        "\n\n#Integration parameters (see pyFAI docs for more details):",
        "\n\t#Pixel splitting options: no (no splitting), full (full splitting), bbox (bounding box), pseudo (scaled down bbox)",
        "\n\t#X unit options: 2th_deg, 2th_rad, q_nm^-1, q_A^-1, r_mm",
        "\n\t#Radial (x-unit) points: the number of bins in the x-axis - must be a number",
        "\n\t#Radial (x-unit) range: radial range to integrate image over (x-unit specific) - must be a pair of comma separated numbers or None for full range",
        "\n\t#Azimuthal (deg.) range: azimuthal (deg.) range to integrate image over - must be a pair of comma separated numbers or None for full range",
        "\n\t#Automask pixel value: pixels with intensity less than this value are automatically masked - must be a number",
        "\n\t#Intensity error model options: none, poisson for variance = I",
    ]
    .concat()
}

/// The editable section: banner, directories and calibration files, then the
/// integration parameters, one `Key: value` line each
pub(crate) fn setup_block(config: &IntegrationConfig) -> String {
    format!(
        "\n\n{rule}\n{SECTION_START}\nBelow here user can edit parameters after the colon. In-line comments are allowed.\n{rule}\
         \n\n{KEY_DATA_SOURCE}: {data_source}\
         \n{KEY_PATTERN_ROOT}: {pattern_root}\
         \n{KEY_PONI}: {poni}\
         \n{KEY_MASK}: {mask}\
         \n\n{KEY_SPLIT}: {split}\
         \n{KEY_UNIT}: {unit}\
         \n{KEY_POINTS}: {points}\
         \n{KEY_RADIAL_RANGE}: {radial_range}\
         \n{KEY_AZIMUTHAL_RANGE}: {azimuthal_range}\
         \n{KEY_AUTOMASK}: {automask}\
         \n{KEY_ERROR_MODEL}: {error_model}",
        rule = rule(),
        data_source = config.data_source,
        pattern_root = config.pattern_root.display(),
        poni = config.poni_file.display(),
        mask = config
            .mask_file
            .as_ref()
            .map_or("None".to_string(), |mask| mask.display().to_string()),
        split = config.split_method,
        unit = config.unit,
        points = config.radial_points,
        radial_range = format_range(config.radial_range),
        azimuthal_range = format_range(config.azimuthal_range),
        automask = config
            .automask
            .map_or("None".to_string(), format_threshold),
        error_model = config.error_model,
    )
}

pub(crate) fn notes_banner() -> String {
    let rule = rule();
    format!("\n\n{rule}\n{SECTION_END}\n{rule}")
}

fn format_range(range: Option<(f64, f64)>) -> String {
    match range {
        Some((lower, upper)) => format!("({lower}, {upper})"),
        None => "None".to_string(),
    }
}

fn format_threshold(threshold: f64) -> String {
    if threshold != 0.0 && threshold.abs() < 1e-3 {
        format!("{threshold:e}")
    } else {
        format!("{threshold}")
    }
}

/// Default timestamped `.int` filename
pub fn default_filename() -> String {
    format!(
        "GuidedIntegration_{}.int",
        Local::now().format("%d%b%Y_%H-%M-%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataSource, ErrorModel, RadialUnit, SplitMethod};

    fn config() -> IntegrationConfig {
        let mut config =
            IntegrationConfig::new(DataSource::NslsII, "/data/1D", "/data/calib/geometry.poni");
        config.mask_file = Some("/data/calib/mask.msk".into());
        config.radial_range = Some((0.0, 15.4));
        config.error_model = ErrorModel::Poisson;
        config
    }

    #[test]
    fn round_trip() {
        let int_file = IntFile::new(config());
        let parsed = IntFile::parse(&int_file.render()).unwrap();
        assert_eq!(parsed, int_file);
    }

    #[test]
    fn round_trip_with_notes() {
        let mut int_file = IntFile::new(config());
        int_file.notes = "Kapton capillary, 0.5s exposures\nruns 40-60 are empty holder".to_string();
        let parsed = IntFile::parse(&int_file.render()).unwrap();
        assert_eq!(parsed.notes, int_file.notes);
        // notes survive a second serialization verbatim
        let reparsed = IntFile::parse(&parsed.render()).unwrap();
        assert_eq!(reparsed, parsed);
    }

    #[test]
    fn values_tolerate_reordering_and_comments() {
        let text = "\
####\nIntegration parameters and setup.\n####\n\
Intensity error model: poisson\n\
X unit: q  # shorthand\n\
Pixel splitting method: BBOX\n\
Data from NSLS-II, APS, or SSRL: aps\n\
Main integrated pattern directory: C:\\data\\1D\n\
Poni file: /calib/geometry.poni\n\
Mask file: None\n\
Radial (x-unit) points: 3000\n\
Radial (x-unit) range: 0.0,15.4\n\
Azimuthal (deg.) range: None\n\
Automask pixel value: -1e-10\n\
####\nUser notes / metadata allowed below here:\n####\n";
        let int_file = IntFile::parse(text).unwrap();
        let config = &int_file.config;
        assert_eq!(config.data_source, DataSource::Aps);
        // the split happens on the `Key:` literal, drive-letter colons survive
        assert_eq!(config.pattern_root, std::path::PathBuf::from("C:\\data\\1D"));
        assert_eq!(config.split_method, SplitMethod::Bbox);
        assert_eq!(config.unit, RadialUnit::QAngstrom);
        assert_eq!(config.radial_points, 3000);
        assert_eq!(config.radial_range, Some((0.0, 15.4)));
        assert_eq!(config.error_model, ErrorModel::Poisson);
    }

    #[test]
    fn missing_keys_are_all_reported() {
        let mut int_file = IntFile::new(config());
        int_file.notes = String::new();
        let text = int_file
            .render()
            .lines()
            .filter(|line| !line.contains("Poni file") && !line.contains("X unit"))
            .collect::<Vec<_>>()
            .join("\n");
        match IntFile::parse(&text) {
            Err(IntFileError::MissingKeys(keys)) => {
                assert_eq!(keys, vec!["Poni file".to_string(), "X unit".to_string()]);
            }
            other => panic!("expected MissingKeys, got {other:?}"),
        }
    }

    #[test]
    fn missing_end_banner_reads_to_eof() {
        let int_file = IntFile::new(config());
        let text = int_file
            .render()
            .lines()
            .take_while(|line| !line.contains(SECTION_END))
            .collect::<Vec<_>>()
            .join("\n");
        let parsed = IntFile::parse(&text).unwrap();
        assert_eq!(parsed.config, int_file.config);
    }

    #[test]
    fn missing_start_banner_skips_commented_lines() {
        // the description block comments every key; without the section
        // banner the parser must skip those and find the live lines below
        let text = IntFile::new(config())
            .render()
            .replace(SECTION_START, "section header gone");
        let parsed = IntFile::parse(&text).unwrap();
        assert_eq!(parsed.config, config());
    }

    #[test]
    fn first_banner_occurrence_wins() {
        // a copy of the editable section pasted into the notes is ignored
        let mut int_file = IntFile::new(config());
        let mut decoy = config();
        decoy.radial_points = 11;
        int_file.notes = setup_block(&decoy);
        let parsed = IntFile::parse(&int_file.render()).unwrap();
        assert_eq!(parsed.config.radial_points, config().radial_points);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.int");
        let int_file = IntFile::new(config());
        int_file.save(&path).unwrap();
        assert_eq!(IntFile::load(&path).unwrap(), int_file);
    }
}
