//! Process-wide landmark detector with lazy construction and explicit teardown.
//!
//! Loading an ONNX graph is far more expensive than running it, so a long-lived process
//! builds the detector on first use and keeps it until [`SharedDetector::teardown`]. A
//! teardown only drops the shared handle; requests already holding an `Arc` finish on the
//! old instance, and the next request builds a fresh one.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::Result;
use image::DynamicImage;
use log::{debug, info};

use crate::anchor::{LandmarkDetector, NormalizedLandmark};

type DetectorFactory = dyn Fn() -> Result<Arc<dyn LandmarkDetector>> + Send + Sync;

/// Lazily initialized, thread-safe holder for one [`LandmarkDetector`].
pub struct SharedDetector {
    slot: Mutex<Option<Arc<dyn LandmarkDetector>>>,
    factory: Box<DetectorFactory>,
}

impl SharedDetector {
    /// Wrap a factory. Nothing is built until the first [`get`](Self::get).
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn LandmarkDetector>> + Send + Sync + 'static,
    {
        Self {
            slot: Mutex::new(None),
            factory: Box::new(factory),
        }
    }

    /// The live detector, building it if needed.
    ///
    /// Initialization runs under the lock, so concurrent first callers share one instance.
    /// A failed build leaves the slot empty and is retried on the next call.
    pub fn get(&self) -> Result<Arc<dyn LandmarkDetector>> {
        let mut slot = self.lock();
        if let Some(detector) = slot.as_ref() {
            return Ok(Arc::clone(detector));
        }
        debug!("Initializing shared landmark detector");
        let detector = (self.factory)()?;
        *slot = Some(Arc::clone(&detector));
        Ok(detector)
    }

    /// Drop the shared instance. Returns whether one was live.
    pub fn teardown(&self) -> bool {
        let released = self.lock().take().is_some();
        if released {
            info!("Shared landmark detector released");
        }
        released
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().is_some()
    }

    // A panic inside a detector cannot leave the slot half-written, so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, Option<Arc<dyn LandmarkDetector>>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl fmt::Debug for SharedDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDetector")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl LandmarkDetector for SharedDetector {
    fn detect_landmarks(&self, image: &DynamicImage) -> Result<Vec<NormalizedLandmark>> {
        self.get()?.detect_landmarks(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::NoFaceDetector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(builds: Arc<AtomicUsize>) -> SharedDetector {
        SharedDetector::new(move || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NoFaceDetector) as Arc<dyn LandmarkDetector>)
        })
    }

    #[test]
    fn builds_once_until_teardown() {
        let builds = Arc::new(AtomicUsize::new(0));
        let shared = counting(Arc::clone(&builds));
        assert!(!shared.is_initialized());

        let image = DynamicImage::new_rgb8(4, 4);
        shared.detect_landmarks(&image).unwrap();
        shared.detect_landmarks(&image).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(shared.is_initialized());

        assert!(shared.teardown());
        assert!(!shared.teardown());
        shared.get().unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_build_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let shared = SharedDetector::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("model not ready");
            }
            Ok(Arc::new(NoFaceDetector) as Arc<dyn LandmarkDetector>)
        });

        assert!(shared.get().is_err());
        assert!(!shared.is_initialized());
        assert!(shared.get().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_callers_share_one_instance() {
        let builds = Arc::new(AtomicUsize::new(0));
        let shared = Arc::new(counting(Arc::clone(&builds)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || shared.get().map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
