use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock, Mutex, PoisonError, RwLock},
};

use tracing::{debug, info};

use super::{loader::load_model, model::CascadeModel};
use crate::error::Result;

static GLOBAL_CACHE: LazyLock<Arc<ModelCache>> = LazyLock::new(|| Arc::new(ModelCache::new()));

/// Read-mostly cache of loaded cascade models keyed by path.
///
/// Each path is loaded at most once; failed loads are not remembered.
/// Loading one path never blocks lookups or loads of another.
#[derive(Debug, Default)]
pub struct ModelCache {
    models: RwLock<HashMap<PathBuf, Arc<CascadeModel>>>,
    loading: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache shared by every processor that does not bring its own.
    pub fn global() -> Arc<ModelCache> {
        Arc::clone(&GLOBAL_CACHE)
    }

    pub fn get_or_load(&self, path: &Path) -> Result<Arc<CascadeModel>> {
        self.get_or_load_with(path, load_model)
    }

    fn get_or_load_with<F>(&self, path: &Path, load: F) -> Result<Arc<CascadeModel>>
    where
        F: FnOnce(&Path) -> Result<CascadeModel>,
    {
        if let Some(model) = self.get(path) {
            return Ok(model);
        }

        let key_lock = self.key_lock(path);
        let _loading = key_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = self.get(path) {
            debug!(path = %path.display(), "Model loaded by another request");
            return Ok(model);
        }

        let model = Arc::new(load(path)?);
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), Arc::clone(&model));
        info!(path = %path.display(), "Cached cascade model");
        Ok(model)
    }

    fn key_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut loading = self.loading.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(loading.entry(path.to_path_buf()).or_default())
    }

    pub fn get(&self, path: &Path) -> Option<Arc<CascadeModel>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.models.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cascade::{loader::tests::CURRENT_XML, model::tests::center_model},
        error::RecognitionError,
    };
    use std::{
        sync::mpsc,
        time::{Duration, Instant},
    };

    #[test]
    fn loads_once_and_shares() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.xml");
        std::fs::write(&path, CURRENT_XML).unwrap();

        let cache = ModelCache::new();
        let first = cache.get_or_load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = cache.get_or_load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_loads_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eye.xml");
        let cache = ModelCache::new();

        assert!(matches!(cache.get_or_load(&path), Err(RecognitionError::ModelLoad { .. })));
        assert!(cache.is_empty());

        std::fs::write(&path, CURRENT_XML).unwrap();
        assert!(cache.get_or_load(&path).is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_requests_share_one_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.xml");
        std::fs::write(&path, CURRENT_XML).unwrap();
        let cache = ModelCache::new();

        let models: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| cache.get_or_load(&path).unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(models.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn cached_lookup_does_not_wait_for_another_load() {
        let dir = tempfile::tempdir().unwrap();
        let eye = dir.path().join("eye.xml");
        let face = dir.path().join("face.xml");
        std::fs::write(&eye, CURRENT_XML).unwrap();
        let cache = ModelCache::new();
        let cached = cache.get_or_load(&eye).unwrap();

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let (cache, face) = (&cache, &face);
        std::thread::scope(|scope| {
            let slow = scope.spawn(move || {
                cache.get_or_load_with(face, |_| {
                    started_tx.send(()).unwrap();
                    release_rx
                        .recv_timeout(Duration::from_secs(5))
                        .map_err(|e| RecognitionError::model_load(face, e))?;
                    Ok(center_model())
                })
            });

            started_rx.recv().unwrap();
            let begun = Instant::now();
            let again = cache.get_or_load(&eye).unwrap();
            assert!(begun.elapsed() < Duration::from_secs(1));
            assert!(Arc::ptr_eq(&cached, &again));
            release_tx.send(()).unwrap();

            assert!(slow.join().unwrap().is_ok());
        });
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_injected_load_leaves_no_entry() {
        let cache = ModelCache::new();
        let path = Path::new("never.xml");
        let err = cache
            .get_or_load_with(path, |p| Err(RecognitionError::model_load(p, "unreadable")))
            .unwrap_err();
        assert!(matches!(err, RecognitionError::ModelLoad { .. }));
        assert!(cache.get(path).is_none());
        assert!(cache.get_or_load_with(path, |_| Ok(center_model())).is_ok());
    }
}
