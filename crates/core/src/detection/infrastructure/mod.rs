pub mod annotator;
pub mod cascade_classifier;
pub mod cascade_proposer;
pub mod feature_retouch;
pub mod hog_descriptor;
pub mod hog_people_proposer;
pub mod image_loader;
pub mod integral_image;
pub mod math;
pub mod model_error;
pub mod model_resolver;
pub mod model_store;
pub mod rect_grouping;
pub mod shape_predictor;
