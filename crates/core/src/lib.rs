//! Face and pedestrian detection for still images: cascade region proposal
//! with ERT landmark regression, and HOG + linear SVM people detection.

pub mod shared {
    pub mod config;
    pub mod constants;
    pub mod image_view;
    pub mod rect;
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod face_features;
        pub mod landmark_extractor;
        pub mod region_proposer;
        pub mod shape;
        pub mod suppressor;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod detection_session;
    pub mod pipeline_logger;
}

pub mod boundary {
    pub mod handle_registry;
}
