//! Source directory selection and the mirrored output tree.
//!
//! A selection plan resolves to an ordered list of sample folder names, each
//! of which must end up with an identically named folder under the pattern
//! root. Creation is idempotent, the final check is all-or-nothing: a single
//! name that cannot be mirrored aborts the run before any integration.

use std::{fs, io, path::Path};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("cannot list the sub directories of {path}")]
    Enumerate {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("missing integrated pattern directories for: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("cannot create the integrated pattern directory {0}")]
    PatternRoot(String, #[source] io::Error),
}
type Result<T> = std::result::Result<T, ReconcileError>;

/// How the sample folders to integrate are chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorySelectionPlan {
    /// An explicit ordered list of sample folder names
    Explicit(Vec<String>),
    /// Keep the folders whose name contains the keyword; the literal `ALL`
    /// (any case) keeps every folder
    Keyword(String),
}

impl DirectorySelectionPlan {
    /// Resolves the plan against the source root
    ///
    /// Keyword mode enumerates the immediate sub directories of the source
    /// root, one level deep, in the order the filesystem returns them; the
    /// keyword match is a case-sensitive substring test. Explicit mode
    /// returns the listed names untouched.
    pub fn resolve(&self, source_root: &Path) -> Result<Vec<String>> {
        match self {
            DirectorySelectionPlan::Explicit(names) => Ok(names.clone()),
            DirectorySelectionPlan::Keyword(keyword) => {
                let all = keyword.eq_ignore_ascii_case("all");
                if all {
                    log::info!("based on provided keyword, all directories are selected");
                }
                let entries =
                    fs::read_dir(source_root).map_err(|source| ReconcileError::Enumerate {
                        path: source_root.display().to_string(),
                        source,
                    })?;
                let mut names = vec![];
                for entry in entries {
                    let entry = entry.map_err(|source| ReconcileError::Enumerate {
                        path: source_root.display().to_string(),
                        source,
                    })?;
                    if !entry.path().is_dir() {
                        continue;
                    }
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if all || name.contains(keyword.as_str()) {
                        names.push(name);
                    }
                }
                Ok(names)
            }
        }
    }
}

/// Creates a same-named directory under the pattern root for every resolved
/// sample folder, returning the names that were successfully mirrored
///
/// A directory that already exists counts as mirrored; any other creation
/// failure leaves its name out of the returned list.
pub fn mirror(pattern_root: &Path, names: &[String]) -> Result<Vec<String>> {
    fs::create_dir_all(pattern_root)
        .map_err(|source| ReconcileError::PatternRoot(pattern_root.display().to_string(), source))?;
    let mut mirrored = vec![];
    for name in names {
        match fs::create_dir(pattern_root.join(name)) {
            Ok(()) => {
                log::info!("created integrated pattern directory for: {name}");
                mirrored.push(name.clone());
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if pattern_root.join(name).is_dir() {
                    log::info!("integrated pattern directory already exists for: {name}");
                    mirrored.push(name.clone());
                } else {
                    log::warn!("integrated pattern directory for {name} is blocked by a file");
                }
            }
            Err(e) => {
                log::warn!("cannot create integrated pattern directory for {name}: {e}");
            }
        }
    }
    Ok(mirrored)
}

/// The all-or-nothing gate: every resolved name must have been mirrored
pub fn check(resolved: &[String], mirrored: &[String]) -> Result<()> {
    let missing: Vec<String> = resolved
        .iter()
        .filter(|name| !mirrored.contains(name))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::Missing(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn source_tree(samples: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for sample in samples {
            fs::create_dir(dir.path().join(sample)).unwrap();
        }
        dir
    }

    #[test]
    fn keyword_all_selects_everything() {
        let source = source_tree(&["Fe3LiCl_100C", "NaCl_ref", "empty_holder"]);
        for keyword in ["ALL", "all", "All"] {
            let mut names = DirectorySelectionPlan::Keyword(keyword.to_string())
                .resolve(source.path())
                .unwrap();
            names.sort();
            assert_eq!(names, vec!["Fe3LiCl_100C", "NaCl_ref", "empty_holder"]);
        }
    }

    #[test]
    fn keyword_is_a_case_sensitive_substring() {
        let source = source_tree(&["Fe3LiCl_100C", "LiCl_ref", "licl_cold", "NaCl_ref"]);
        let mut names = DirectorySelectionPlan::Keyword("LiCl".to_string())
            .resolve(source.path())
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["Fe3LiCl_100C", "LiCl_ref"]);
    }

    #[test]
    fn files_are_not_selected() {
        let source = source_tree(&["Sample1"]);
        File::create(source.path().join("Sample2.tif")).unwrap();
        let names = DirectorySelectionPlan::Keyword("ALL".to_string())
            .resolve(source.path())
            .unwrap();
        assert_eq!(names, vec!["Sample1"]);
    }

    #[test]
    fn explicit_plan_keeps_order() {
        let plan = DirectorySelectionPlan::Explicit(vec!["b".to_string(), "a".to_string()]);
        let names = plan.resolve(Path::new("/nonexistent")).unwrap();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn mirroring_is_idempotent() {
        let out = tempfile::tempdir().unwrap();
        let names = vec!["Sample1".to_string(), "Sample2".to_string()];
        let mirrored = mirror(out.path(), &names).unwrap();
        assert_eq!(mirrored, names);
        // second pass finds them already there and still succeeds
        let mirrored = mirror(out.path(), &names).unwrap();
        assert_eq!(mirrored, names);
        check(&names, &mirrored).unwrap();
    }

    #[test]
    fn unmirrored_names_abort() {
        let out = tempfile::tempdir().unwrap();
        // a plain file squats on one of the names
        File::create(out.path().join("Sample2")).unwrap();
        let names: Vec<String> = ["Sample1", "Sample2", "Sample3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mirrored = mirror(out.path(), &names).unwrap();
        match check(&names, &mirrored) {
            Err(ReconcileError::Missing(missing)) => {
                assert_eq!(missing, vec!["Sample2".to_string()]);
            }
            other => panic!("expected Missing, got {other:?}"),
        }
    }
}
