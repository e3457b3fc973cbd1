use std::path::Path;

use crate::detection::infrastructure::cascade_classifier::CascadeClassifier;
use crate::detection::infrastructure::hog_people_proposer::PeopleModel;
use crate::detection::infrastructure::model_error::ModelLoadError;
use crate::detection::infrastructure::shape_predictor::ShapePredictor;

/// Existence / readability check consulted before a model file is opened.
pub trait FileAccess: Send + Sync {
    fn is_readable(&self, path: &Path) -> bool;
}

/// Checks the local filesystem.
pub struct FsFileAccess;

impl FileAccess for FsFileAccess {
    fn is_readable(&self, path: &Path) -> bool {
        path.is_file() && std::fs::File::open(path).is_ok()
    }
}

/// Models loaded for one face detector instance.
///
/// Each model loads independently: a missing or broken file leaves that
/// slot empty and the rest of the detector usable.
#[derive(Default)]
pub struct ModelStore {
    classifier: Option<CascadeClassifier>,
    landmarks: Option<ShapePredictor>,
}

impl ModelStore {
    pub fn load(classifier_path: &Path, landmark_path: &Path, files: &dyn FileAccess) -> Self {
        let classifier = load_or_warn(
            "region classifier",
            classifier_path,
            files,
            CascadeClassifier::load,
        );
        let landmarks = load_or_warn("landmark", landmark_path, files, ShapePredictor::load);
        Self {
            classifier,
            landmarks,
        }
    }

    /// Pedestrian model under the same degradation rules.
    pub fn load_people(path: &Path, files: &dyn FileAccess) -> Option<PeopleModel> {
        load_or_warn("people", path, files, PeopleModel::load)
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn has_landmarks(&self) -> bool {
        self.landmarks.is_some()
    }

    pub fn into_parts(self) -> (Option<CascadeClassifier>, Option<ShapePredictor>) {
        (self.classifier, self.landmarks)
    }
}

fn load_model<T>(
    path: &Path,
    files: &dyn FileAccess,
    loader: impl FnOnce(&Path) -> Result<T, ModelLoadError>,
) -> Result<T, ModelLoadError> {
    if path.as_os_str().is_empty() {
        return Err(ModelLoadError::EmptyPath);
    }
    if !files.is_readable(path) {
        return Err(ModelLoadError::Unavailable(path.to_path_buf()));
    }
    loader(path)
}

fn load_or_warn<T>(
    kind: &str,
    path: &Path,
    files: &dyn FileAccess,
    loader: impl FnOnce(&Path) -> Result<T, ModelLoadError>,
) -> Option<T> {
    match load_model(path, files, loader) {
        Ok(model) => {
            log::info!("Loaded {kind} model from {}", path.display());
            Some(model)
        }
        Err(e) => {
            log::warn!("No {kind} model: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::cascade_classifier::{
        CascadeModel, Feature, Stage, Stump, WeightedRect,
    };
    use crate::detection::infrastructure::shape_predictor::ShapeModel;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct DenyAll;

    impl FileAccess for DenyAll {
        fn is_readable(&self, _path: &Path) -> bool {
            false
        }
    }

    fn write_cascade(dir: &Path) -> PathBuf {
        let model = CascadeModel {
            window_width: 24,
            window_height: 24,
            stages: vec![Stage {
                threshold: 0.5,
                stumps: vec![Stump {
                    feature: Feature::Haar {
                        rects: vec![WeightedRect {
                            x: 0,
                            y: 0,
                            width: 24,
                            height: 24,
                            weight: 1.0,
                        }],
                    },
                    threshold: 1.0,
                    left: 0.0,
                    right: 1.0,
                }],
            }],
        };
        let path = dir.join("cascade.json");
        fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();
        path
    }

    fn write_shape(dir: &Path) -> PathBuf {
        let model = ShapeModel {
            initial_shape: vec![(0.5, 0.5)],
            cascades: vec![],
        };
        let path = dir.join("shape.json");
        fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_both_models_load() {
        let tmp = TempDir::new().unwrap();
        let store = ModelStore::load(
            &write_cascade(tmp.path()),
            &write_shape(tmp.path()),
            &FsFileAccess,
        );
        assert!(store.has_classifier());
        assert!(store.has_landmarks());
    }

    #[test]
    fn test_missing_landmark_model_keeps_classifier() {
        let tmp = TempDir::new().unwrap();
        let store = ModelStore::load(
            &write_cascade(tmp.path()),
            &tmp.path().join("missing.json"),
            &FsFileAccess,
        );
        assert!(store.has_classifier());
        assert!(!store.has_landmarks());
    }

    #[test]
    fn test_empty_paths_load_nothing() {
        let store = ModelStore::load(Path::new(""), Path::new(""), &FsFileAccess);
        assert!(!store.has_classifier());
        assert!(!store.has_landmarks());
    }

    #[test]
    fn test_unreadable_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = ModelStore::load(
            &write_cascade(tmp.path()),
            &write_shape(tmp.path()),
            &DenyAll,
        );
        assert!(!store.has_classifier());
        assert!(!store.has_landmarks());
    }

    #[test]
    fn test_corrupt_classifier_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let bad = tmp.path().join("bad.json");
        fs::write(&bad, "not a model").unwrap();
        let store = ModelStore::load(&bad, &write_shape(tmp.path()), &FsFileAccess);
        assert!(!store.has_classifier());
        assert!(store.has_landmarks());
    }

    #[test]
    fn test_load_model_reports_empty_path() {
        let result = load_model(Path::new(""), &FsFileAccess, ShapePredictor::load);
        assert!(matches!(result, Err(ModelLoadError::EmptyPath)));
    }

    #[test]
    fn test_load_people_missing_is_none() {
        assert!(ModelStore::load_people(Path::new("/nonexistent/people.json"), &FsFileAccess).is_none());
    }

    #[test]
    fn test_fs_access_rejects_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(!FsFileAccess.is_readable(tmp.path()));
    }
}
