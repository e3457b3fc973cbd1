//! Process-wide registry of detector instances behind opaque handles.
//!
//! Callers hold a [`DetectorHandle`] and drive the
//! `init → detect → get_result → deinit` contract. The registry map has one
//! lock and each session has its own, so a session is never dropped while a
//! call is using it.
//!
//! `detect` and `get_result` take the session lock separately. Indexed reads
//! therefore pair with the latest detect on the handle only when that detect
//! came from the reading thread; otherwise `get_result` fails with
//! [`BoundaryError::StaleResults`]. Callers sharing a handle across threads
//! use [`HandleRegistry::detect_all`] or [`HandleRegistry::with_session`],
//! which hold the lock for the whole detect-then-read window.
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread::{self, ThreadId};

use serde::Serialize;
use thiserror::Error;

use crate::detection::domain::detection::Detection;
use crate::detection::infrastructure::model_store::FsFileAccess;
use crate::pipeline::detection_session::{DetectionSession, SessionError};
use crate::shared::config::DetectorConfig;
use crate::shared::image_view::ImageView;

/// Opaque detector identifier. `0` is the null handle and never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetectorHandle(u64);

impl DetectorHandle {
    pub const NULL: DetectorHandle = DetectorHandle(0);

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Image input accepted at the boundary.
pub enum ImageSource<'a> {
    Path(&'a Path),
    Buffer(ImageView<'a>),
}

/// Flat detection record: exclusive right/bottom edges, label, landmark
/// pairs (empty when no landmark model is loaded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionRecord {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub label: String,
    pub landmarks: Vec<(i32, i32)>,
}

impl From<Detection> for DetectionRecord {
    fn from(detection: Detection) -> Self {
        let (left, top, right, bottom) = detection.rect.edges();
        Self {
            left,
            top,
            right,
            bottom,
            label: detection.label.to_string(),
            landmarks: detection.landmarks().iter().map(|p| (p.x, p.y)).collect(),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BoundaryError {
    #[error("unknown detector handle {}", .0.raw())]
    UnknownHandle(DetectorHandle),
    #[error("result index {index} out of range ({count} results)")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("results of detector {} belong to another thread's detect call", .0.raw())]
    StaleResults(DetectorHandle),
}

impl From<SessionError> for BoundaryError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::IndexOutOfRange { index, count } => {
                BoundaryError::IndexOutOfRange { index, count }
            }
        }
    }
}

/// A session plus the thread whose detect call produced its results.
struct Slot {
    session: DetectionSession,
    last_detect: Option<ThreadId>,
}

impl Slot {
    fn detect(&mut self, source: ImageSource<'_>) -> usize {
        self.last_detect = Some(thread::current().id());
        match source {
            ImageSource::Path(path) => self.session.detect_path(path),
            ImageSource::Buffer(view) => self.session.detect(&view),
        }
    }
}

type SharedSession = Arc<Mutex<Slot>>;

pub struct HandleRegistry {
    sessions: Mutex<HashMap<u64, SharedSession>>,
    next_id: AtomicU64,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static HandleRegistry {
        static REGISTRY: OnceLock<HandleRegistry> = OnceLock::new();
        REGISTRY.get_or_init(HandleRegistry::new)
    }

    /// Face detector with default parameters. Always returns a live handle;
    /// missing models leave it degraded.
    pub fn init(&self, landmark_path: &Path, classifier_path: &Path) -> DetectorHandle {
        self.init_with_config(landmark_path, classifier_path, &DetectorConfig::default())
    }

    pub fn init_with_config(
        &self,
        landmark_path: &Path,
        classifier_path: &Path,
        config: &DetectorConfig,
    ) -> DetectorHandle {
        let session = DetectionSession::open_face(classifier_path, landmark_path, config, &FsFileAccess);
        self.register(session)
    }

    pub fn init_pedestrian(&self, people_model_path: &Path, config: &DetectorConfig) -> DetectorHandle {
        let session = DetectionSession::open_pedestrian(people_model_path, config, &FsFileAccess);
        self.register(session)
    }

    /// Adopts an already built session.
    pub fn register(&self, session: DetectionSession) -> DetectorHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Slot {
            session,
            last_detect: None,
        };
        lock(&self.sessions).insert(id, Arc::new(Mutex::new(slot)));
        log::info!("Created detector {id}");
        DetectorHandle(id)
    }

    /// Destroys the detector. Waits for an in-flight call on it to finish.
    /// Null and unknown handles are ignored.
    pub fn deinit(&self, handle: DetectorHandle) {
        let removed = lock(&self.sessions).remove(&handle.0);
        if let Some(session) = removed {
            drop(lock(&session));
            log::info!("Destroyed detector {}", handle.0);
        }
    }

    /// Runs detection and returns the result count; 0 for unknown handles.
    pub fn detect(&self, handle: DetectorHandle, source: ImageSource<'_>) -> usize {
        let Some(session) = self.session(handle) else {
            log::warn!("Detect on unknown handle {}", handle.0);
            return 0;
        };
        let mut slot = lock(&session);
        slot.detect(source)
    }

    /// Result `index` of this thread's latest detect call on `handle`.
    pub fn get_result(
        &self,
        handle: DetectorHandle,
        index: usize,
    ) -> Result<DetectionRecord, BoundaryError> {
        let session = self
            .session(handle)
            .ok_or(BoundaryError::UnknownHandle(handle))?;
        let slot = lock(&session);
        if slot
            .last_detect
            .is_some_and(|owner| owner != thread::current().id())
        {
            return Err(BoundaryError::StaleResults(handle));
        }
        Ok(slot.session.result(index)?.into())
    }

    /// Detects and reads every result under one session lock.
    pub fn detect_all(
        &self,
        handle: DetectorHandle,
        source: ImageSource<'_>,
    ) -> Result<Vec<DetectionRecord>, BoundaryError> {
        let session = self
            .session(handle)
            .ok_or(BoundaryError::UnknownHandle(handle))?;
        let mut slot = lock(&session);
        slot.detect(source);
        Ok(slot.session.results().into_iter().map(Into::into).collect())
    }

    /// Runs `f` with exclusive access to the session behind `handle`.
    pub fn with_session<R>(
        &self,
        handle: DetectorHandle,
        f: impl FnOnce(&mut DetectionSession) -> R,
    ) -> Result<R, BoundaryError> {
        let session = self
            .session(handle)
            .ok_or(BoundaryError::UnknownHandle(handle))?;
        let mut slot = lock(&session);
        Ok(f(&mut slot.session))
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn session(&self, handle: DetectorHandle) -> Option<SharedSession> {
        if handle.is_null() {
            return None;
        }
        lock(&self.sessions).get(&handle.0).cloned()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Locks, recovering the data from a poisoned mutex.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
