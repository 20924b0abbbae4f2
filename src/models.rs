use crate::error::CaptureError;
use anyhow::Context;
use opencv::core;
use std::path::{Path, PathBuf};
use tracing::debug;

const PROBE_CASCADE: &str = "haarcascades/haarcascade_frontalface_alt.xml";

const SYSTEM_CASCADE_DIRS: &[&str] = &[
    "/usr/share/opencv4/haarcascades",
    "/usr/local/share/opencv4/haarcascades",
    "/usr/share/opencv/haarcascades",
    "/opt/homebrew/share/opencv4/haarcascades",
];

/// A haar cascade definition the detector can be built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelRef {
    pub name: String,
    pub path: PathBuf,
}

impl ModelRef {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            path: dir.join(name),
        }
    }
}

/// Picks the cascade directory: explicit override first, then the data
/// bundled with OpenCV, then well known install locations.
pub fn resolve_cascade_dir(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }

    let found = core::find_file(PROBE_CASCADE, false, true)?;
    if !found.is_empty() {
        if let Some(dir) = Path::new(&found).parent() {
            debug!(dir = %dir.display(), "Using OpenCV bundled cascades");
            return Ok(dir.to_path_buf());
        }
    }

    SYSTEM_CASCADE_DIRS
        .iter()
        .map(PathBuf::from)
        .find(|dir| dir.is_dir())
        .ok_or_else(|| CaptureError::NoCascadeDirectory.into())
}

/// Lists `.xml` cascades in `dir`, sorted by file name.
pub fn scan_models(dir: &Path) -> anyhow::Result<Vec<ModelRef>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read cascade directory {}", dir.display()))?;

    let mut models = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.ends_with(".xml") {
            models.push(ModelRef::new(dir, name));
        }
    }
    models.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(models)
}

/// Finds the model named `name`, falling back to the first entry.
pub fn select_model<'a>(models: &'a [ModelRef], name: Option<&str>) -> Option<&'a ModelRef> {
    name.and_then(|name| models.iter().find(|model| model.name == name))
        .or_else(|| models.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scan_lists_only_xml_files_sorted() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("haarcascade_smile.xml"), "").unwrap();
        fs::write(tmp.path().join("haarcascade_eye.xml"), "").unwrap();
        fs::write(tmp.path().join("README.md"), "").unwrap();
        fs::create_dir(tmp.path().join("nested.xml")).unwrap();

        let models = scan_models(tmp.path()).unwrap();
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["haarcascade_eye.xml", "haarcascade_smile.xml"]);
        assert_eq!(models[0].path, tmp.path().join("haarcascade_eye.xml"));
    }

    #[test]
    fn scan_missing_directory_fails() {
        let tmp = tempdir().unwrap();
        assert!(scan_models(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn explicit_cascade_dir_wins() {
        let dir = resolve_cascade_dir(Some(Path::new("/some/where"))).unwrap();
        assert_eq!(dir, PathBuf::from("/some/where"));
    }

    #[test]
    fn select_prefers_named_model() {
        let dir = Path::new("/c");
        let models = vec![ModelRef::new(dir, "a.xml"), ModelRef::new(dir, "b.xml")];
        assert_eq!(select_model(&models, Some("b.xml")).unwrap().name, "b.xml");
        assert_eq!(select_model(&models, Some("zzz.xml")).unwrap().name, "a.xml");
        assert_eq!(select_model(&models, None).unwrap().name, "a.xml");
        assert!(select_model(&[], None).is_none());
    }
}
