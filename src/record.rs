//! The record file: a write-only audit trail of one batch run.

use std::{fs, io, path::Path};

use chrono::Local;

use crate::{config::IntegrationConfig, intfile};

/// Writes the record: banner, configuration echo, the directories parsed
/// and every image integrated, closed by the user notes banner
///
/// The write is a destructive overwrite of any prior content at `path`.
pub fn write(
    path: impl AsRef<Path>,
    config: &IntegrationConfig,
    directories: &[String],
    images: &[String],
) -> io::Result<()> {
    let rule = "#".repeat(150);
    let mut text = String::from("#Guided Integration record file");
    text.push_str(&intfile::banner());
    text.push_str(&intfile::setup_block(config));
    text.push_str(&format!(
        "\n\n{rule}\nIntegration record\n{rule}\n\nDirectories parsed for files to integrate:\n"
    ));
    text.push_str(&directories.join("\n"));
    text.push_str("\n\nImages integrated:\n");
    text.push_str(&images.join("\n"));
    text.push_str(&intfile::notes_banner());
    text.push('\n');
    fs::write(path, text)
}

/// Default timestamped record filename
pub fn default_filename() -> String {
    format!(
        "GuidedIntegration_{}_record.txt",
        Local::now().format("%d%b%Y_%H-%M-%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataSource, IntegrationConfig};

    #[test]
    fn record_lists_directories_and_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_record.txt");
        let config =
            IntegrationConfig::new(DataSource::NslsII, "/data/1D", "/calib/geometry.poni");
        let directories = vec!["Sample1".to_string(), "Sample2".to_string()];
        let images = vec!["a.tiff".to_string(), "b.tiff".to_string()];
        write(&path, &config, &directories, &images).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("#Guided Integration record file"));
        assert!(text.contains("Poni file: /calib/geometry.poni"));
        assert!(text.contains("Directories parsed for files to integrate:\nSample1\nSample2"));
        assert!(text.contains("Images integrated:\na.tiff\nb.tiff"));
        assert!(text.contains(intfile::SECTION_END));
    }

    #[test]
    fn rewrite_replaces_prior_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_record.txt");
        fs::write(&path, "stale content from an earlier run").unwrap();
        let config = IntegrationConfig::new(DataSource::Aps, "/data/1D", "/calib/geometry.poni");
        write(&path, &config, &[], &[]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale content"));
    }
}
