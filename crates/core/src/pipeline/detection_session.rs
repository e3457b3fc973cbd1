use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use thiserror::Error;

use crate::detection::domain::detection::{Detection, DetectionResult};
use crate::detection::domain::landmark_extractor::LandmarkExtractor;
use crate::detection::domain::region_proposer::RegionProposer;
use crate::detection::domain::shape::Shape;
use crate::detection::domain::suppressor::Suppressor;
use crate::detection::infrastructure::cascade_proposer::CascadeProposer;
use crate::detection::infrastructure::hog_people_proposer::HogPeopleProposer;
use crate::detection::infrastructure::image_loader::{load_image, PixelLayout};
use crate::detection::infrastructure::model_store::{FileAccess, ModelStore};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::config::{DetectorConfig, PipelineKind};
use crate::shared::constants::{FACE_LABEL, PERSON_LABEL};
use crate::shared::image_view::ImageView;
use crate::shared::rect::Rectangle;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("result index {index} out of range ({count} results)")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Detector components of a session. A `None` component is a model that
/// failed to load; the session degrades instead of failing.
pub enum DetectorPipeline {
    Face {
        proposer: Option<Box<dyn RegionProposer>>,
        extractor: Option<Box<dyn LandmarkExtractor>>,
    },
    Pedestrian {
        proposer: Option<Box<dyn RegionProposer>>,
    },
}

impl DetectorPipeline {
    /// Face pipeline from the cascade and landmark models in `store`.
    pub fn face(store: ModelStore, config: &DetectorConfig) -> Self {
        if !store.has_classifier() {
            log::warn!("Face pipeline has no region classifier; detect will report nothing");
        } else if !store.has_landmarks() {
            log::info!("Face pipeline without landmarks");
        }
        let (classifier, predictor) = store.into_parts();
        DetectorPipeline::Face {
            proposer: classifier.map(|c| {
                Box::new(CascadeProposer::new(c, config.cascade.clone())) as Box<dyn RegionProposer>
            }),
            extractor: predictor.map(|p| Box::new(p) as Box<dyn LandmarkExtractor>),
        }
    }

    /// Pedestrian pipeline from the HOG people model at `path`.
    pub fn pedestrian(path: &Path, config: &DetectorConfig, files: &dyn FileAccess) -> Self {
        let proposer = ModelStore::load_people(path, files).and_then(|model| {
            match HogPeopleProposer::new(model, config.hog.clone()) {
                Ok(p) => Some(Box::new(p) as Box<dyn RegionProposer>),
                Err(e) => {
                    log::warn!("No people model: {e}");
                    None
                }
            }
        });
        DetectorPipeline::Pedestrian { proposer }
    }

    pub fn kind(&self) -> PipelineKind {
        match self {
            DetectorPipeline::Face { .. } => PipelineKind::Face,
            DetectorPipeline::Pedestrian { .. } => PipelineKind::Pedestrian,
        }
    }

    pub fn layout(&self) -> PixelLayout {
        match self {
            DetectorPipeline::Face { .. } => PixelLayout::Gray,
            DetectorPipeline::Pedestrian { .. } => PixelLayout::Rgb,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DetectorPipeline::Face { .. } => FACE_LABEL,
            DetectorPipeline::Pedestrian { .. } => PERSON_LABEL,
        }
    }

    fn proposer(&self) -> Option<&dyn RegionProposer> {
        match self {
            DetectorPipeline::Face { proposer, .. } | DetectorPipeline::Pedestrian { proposer } => {
                proposer.as_deref()
            }
        }
    }

    fn extractor(&self) -> Option<&dyn LandmarkExtractor> {
        match self {
            DetectorPipeline::Face { extractor, .. } => extractor.as_deref(),
            DetectorPipeline::Pedestrian { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No region proposer loaded; every detect call reports zero.
    Uninitialized,
    Ready,
    Detecting,
}

/// One detector instance: its models plus the results of the latest call.
///
/// Results stay readable until the next successful detect call replaces
/// them. Calls rejected for bad input leave them untouched.
pub struct DetectionSession {
    pipeline: DetectorPipeline,
    suppressor: Suppressor,
    state: SessionState,
    regions: Vec<Rectangle>,
    shapes: HashMap<usize, Shape>,
    logger: Box<dyn PipelineLogger>,
}

impl DetectionSession {
    pub fn new(pipeline: DetectorPipeline) -> Self {
        let state = if pipeline.proposer().is_some() {
            SessionState::Ready
        } else {
            SessionState::Uninitialized
        };
        Self {
            pipeline,
            suppressor: Suppressor::new(),
            state,
            regions: Vec::new(),
            shapes: HashMap::new(),
            logger: Box::new(NullPipelineLogger),
        }
    }

    /// Face session loading both models from disk.
    pub fn open_face(
        classifier_path: &Path,
        landmark_path: &Path,
        config: &DetectorConfig,
        files: &dyn FileAccess,
    ) -> Self {
        let store = ModelStore::load(classifier_path, landmark_path, files);
        Self::new(DetectorPipeline::face(store, config))
    }

    pub fn open_pedestrian(people_path: &Path, config: &DetectorConfig, files: &dyn FileAccess) -> Self {
        Self::new(DetectorPipeline::pedestrian(people_path, config, files))
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        let message = format!(
            "{:?} detector {:?} (landmarks: {})",
            self.kind(),
            self.state,
            if self.has_landmarks() { "yes" } else { "no" }
        );
        self.logger.info(&message);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn kind(&self) -> PipelineKind {
        self.pipeline.kind()
    }

    pub fn has_landmarks(&self) -> bool {
        self.pipeline.extractor().is_some()
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    /// Runs the pipeline on `image` and returns the number of detections.
    ///
    /// Empty, inconsistent or wrongly laid out input returns 0 and keeps the
    /// previous results.
    pub fn detect(&mut self, image: &ImageView<'_>) -> usize {
        if image.is_empty() || !image.is_consistent() {
            log::error!(
                "Rejected image {}x{}x{} with {} bytes",
                image.width(),
                image.height(),
                image.channels(),
                image.data().len()
            );
            return 0;
        }
        let expected = self.pipeline.layout().channels();
        if image.channels() != expected {
            channel_mismatch(self.pipeline.kind(), expected, image.channels());
            return 0;
        }
        if self.state == SessionState::Uninitialized {
            log::warn!("Detect called without a region model");
            self.logger.info("Detect skipped: no region model");
            self.clear();
            return 0;
        }

        self.state = SessionState::Detecting;
        let count = self.run(image);
        self.state = SessionState::Ready;
        count
    }

    /// Decodes `path` into the layout the pipeline needs and detects on it.
    /// Undecodable files report zero detections.
    pub fn detect_path(&mut self, path: &Path) -> usize {
        match load_image(path, self.pipeline.layout()) {
            Ok(loaded) => self.detect(&loaded.view()),
            Err(e) => {
                log::error!("Failed to decode {}: {e}", path.display());
                0
            }
        }
    }

    fn run(&mut self, image: &ImageView<'_>) -> usize {
        let Some(proposer) = self.pipeline.proposer() else {
            return 0;
        };

        let t0 = Instant::now();
        let mut regions = match proposer.propose(image) {
            Ok(regions) => regions,
            Err(e) => {
                log::error!("Region proposal failed: {e}");
                Vec::new()
            }
        };
        self.logger.timing("propose", ms(t0));

        if self.pipeline.kind() == PipelineKind::Pedestrian {
            let t0 = Instant::now();
            regions = self.suppressor.suppress(&regions);
            self.logger.timing("suppress", ms(t0));
        }

        let mut shapes = HashMap::new();
        if let Some(extractor) = self.pipeline.extractor() {
            let t0 = Instant::now();
            let parts = extractor.num_parts();
            for (i, region) in regions.iter().enumerate() {
                match extractor.extract(image, region) {
                    Ok(shape) if shape.num_parts() == parts => {
                        shapes.insert(i, shape);
                    }
                    Ok(shape) => log::warn!(
                        "Discarding shape for region {i}: {} points, model has {parts}",
                        shape.num_parts()
                    ),
                    Err(e) => log::warn!("Landmark extraction failed for region {i}: {e}"),
                }
            }
            self.logger.timing("landmarks", ms(t0));
        }

        self.logger.metric("regions", regions.len() as f64);
        log::debug!("Detected {} {}(s)", regions.len(), self.pipeline.label());
        self.regions = regions;
        self.shapes = shapes;
        self.regions.len()
    }

    fn clear(&mut self) {
        self.regions.clear();
        self.shapes.clear();
    }

    /// Number of detections from the latest successful call.
    pub fn count(&self) -> usize {
        self.regions.len()
    }

    pub fn result(&self, index: usize) -> Result<Detection, SessionError> {
        let rect = self
            .regions
            .get(index)
            .ok_or(SessionError::IndexOutOfRange {
                index,
                count: self.regions.len(),
            })?;
        Ok(Detection::new(
            *rect,
            self.pipeline.label(),
            self.shapes.get(&index).cloned(),
        ))
    }

    /// All detections from the latest successful call, in proposer order.
    pub fn results(&self) -> DetectionResult {
        self.regions
            .iter()
            .enumerate()
            .map(|(i, rect)| Detection::new(*rect, self.pipeline.label(), self.shapes.get(&i).cloned()))
            .collect()
    }
}

#[cfg(feature = "strict-preconditions")]
fn channel_mismatch(kind: PipelineKind, expected: u8, got: u8) {
    panic!("{kind:?} pipeline requires {expected} channel(s), got {got}");
}

#[cfg(not(feature = "strict-preconditions"))]
fn channel_mismatch(kind: PipelineKind, expected: u8, got: u8) {
    log::error!("{kind:?} pipeline requires {expected} channel(s), got {got}");
}

fn ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
