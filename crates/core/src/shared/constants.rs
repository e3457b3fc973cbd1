pub const FACE_LABEL: &str = "face";
pub const PERSON_LABEL: &str = "person";

/// Default file names looked up by the model resolver.
pub const CLASSIFIER_MODEL_NAME: &str = "face_cascade_lbp.json";
pub const LANDMARK_MODEL_NAME: &str = "shape_predictor_68_face_landmarks.json";
pub const PEOPLE_MODEL_NAME: &str = "hog_people_svm.json";

/// Application directory name under the platform data/config directories.
pub const APP_DIR_NAME: &str = "Facemark";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
