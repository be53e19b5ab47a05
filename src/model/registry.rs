//! Model registry: closed id set, lazy loads, per-id single-flight caching.
//!
//! The registry is an explicit, injectable object rather than process-global
//! state. Slots for every configured id are created up front, so an unknown
//! id is rejected before any filesystem access, and each slot's mutex is
//! held across its first load: concurrent resolvers of one id wait for the
//! single load while other ids proceed untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::catalog::ModelCatalog;
use crate::error::ClassifyError;
use crate::model::ClassifierModel;

/// Capability to materialize a classifier artifact from its configured path.
///
/// Injected so tests can count loads or fail deterministically.
pub trait ArtifactLoader: Send + Sync {
    /// Read and deserialize one artifact. Validation happens in the registry.
    fn load(&self, path: &Path) -> Result<ClassifierModel, String>;
}

/// Default loader reading JSON artifacts from the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsArtifactLoader;

impl ArtifactLoader for FsArtifactLoader {
    fn load(&self, path: &Path) -> Result<ClassifierModel, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("read {}: {err}", path.display()))?;
        serde_json::from_str(&text).map_err(|err| format!("parse {}: {err}", path.display()))
    }
}

struct ModelSlot {
    path: PathBuf,
    cell: Mutex<Option<Arc<ClassifierModel>>>,
}

/// Registry mapping configured model ids to loaded handles.
pub struct ModelRegistry {
    loader: Box<dyn ArtifactLoader>,
    slots: HashMap<String, ModelSlot>,
}

impl ModelRegistry {
    /// Registry over the catalog's id set with the filesystem loader.
    pub fn new(catalog: &ModelCatalog) -> Self {
        Self::with_loader(catalog, Box::new(FsArtifactLoader))
    }

    /// Registry with an injected artifact loader.
    pub fn with_loader(catalog: &ModelCatalog, loader: Box<dyn ArtifactLoader>) -> Self {
        let slots = catalog
            .entries()
            .map(|(id, entry)| {
                let slot = ModelSlot {
                    path: entry.path.clone(),
                    cell: Mutex::new(None),
                };
                (id.to_string(), slot)
            })
            .collect();
        Self { loader, slots }
    }

    /// Resolve a model id to a shared handle, loading the artifact on first
    /// use. A failed load is not cached; the next resolve retries it.
    pub fn resolve(&self, id: &str) -> Result<Arc<ClassifierModel>, ClassifyError> {
        let slot = self
            .slots
            .get(id)
            .ok_or_else(|| ClassifyError::UnknownModel { id: id.to_string() })?;
        let mut cell = slot.cell.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(handle) = cell.as_ref() {
            return Ok(Arc::clone(handle));
        }

        info!(model = id, path = %slot.path.display(), "loading model artifact");
        let model = self
            .loader
            .load(&slot.path)
            .and_then(|model| model.validate().map(|_| model))
            .map_err(|reason| ClassifyError::ModelLoad {
                id: id.to_string(),
                reason,
            })?;
        let handle = Arc::new(model);
        *cell = Some(Arc::clone(&handle));
        info!(model = id, classes = handle.classes.len(), "model artifact ready");
        Ok(handle)
    }

    /// Configured ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// True when the id has a cached handle.
    pub fn is_loaded(&self, id: &str) -> bool {
        self.slots
            .get(id)
            .map(|slot| {
                slot.cell
                    .lock()
                    .unwrap_or_else(|err| err.into_inner())
                    .is_some()
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::bias_only_model;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        fail_first: AtomicUsize,
    }

    impl CountingLoader {
        fn new(fail_first: usize) -> (Arc<AtomicUsize>, Box<dyn ArtifactLoader>) {
            let loads = Arc::new(AtomicUsize::new(0));
            let loader = Box::new(Self {
                loads: Arc::clone(&loads),
                fail_first: AtomicUsize::new(fail_first),
            });
            (loads, loader)
        }
    }

    impl ArtifactLoader for CountingLoader {
        fn load(&self, _path: &Path) -> Result<ClassifierModel, String> {
            // Widen the race window so concurrent resolvers would observe a
            // duplicate load if single-flight were broken.
            std::thread::sleep(Duration::from_millis(25));
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err("simulated artifact failure".into());
            }
            Ok(bias_only_model(
                &["drone", "airplane", "helicopter"],
                &[1.0, 0.0, 0.0],
            ))
        }
    }

    fn catalog() -> ModelCatalog {
        ModelCatalog::from_toml_str(
            r#"
            [models."4"]
            path = "baseline.json"

            [models."6"]
            path = "distilled.json"
            "#,
            None,
        )
        .unwrap()
    }

    #[test]
    fn unknown_id_fails_before_any_load() {
        let (loads, loader) = CountingLoader::new(0);
        let registry = ModelRegistry::with_loader(&catalog(), loader);
        let err = registry.resolve("99").unwrap_err();
        assert!(matches!(err, ClassifyError::UnknownModel { ref id } if id == "99"));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn concurrent_first_resolution_loads_exactly_once() {
        let (loads, loader) = CountingLoader::new(0);
        let registry = Arc::new(ModelRegistry::with_loader(&catalog(), loader));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.resolve("4").unwrap())
            })
            .collect();
        let resolved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        let first = &resolved[0];
        for handle in &resolved {
            assert!(Arc::ptr_eq(first, handle));
        }
    }

    #[test]
    fn failed_load_is_retried_on_next_resolve() {
        let (loads, loader) = CountingLoader::new(1);
        let registry = ModelRegistry::with_loader(&catalog(), loader);

        let err = registry.resolve("4").unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad { .. }));
        assert!(!registry.is_loaded("4"));

        let handle = registry.resolve("4").unwrap();
        assert_eq!(handle.classes.len(), 3);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert!(registry.is_loaded("4"));
    }

    #[test]
    fn distinct_ids_load_independently() {
        let (loads, loader) = CountingLoader::new(0);
        let registry = Arc::new(ModelRegistry::with_loader(&catalog(), loader));

        let a = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.resolve("4").unwrap())
        };
        let b = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.resolve("6").unwrap())
        };
        a.join().unwrap();
        b.join().unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(registry.ids(), vec!["4", "6"]);
    }

    #[test]
    fn invalid_artifact_shape_is_a_load_failure() {
        struct BadShapeLoader;
        impl ArtifactLoader for BadShapeLoader {
            fn load(&self, _path: &Path) -> Result<ClassifierModel, String> {
                let mut model = bias_only_model(&["drone"], &[0.0]);
                model.input_len = 7;
                Ok(model)
            }
        }
        let registry = ModelRegistry::with_loader(&catalog(), Box::new(BadShapeLoader));
        let err = registry.resolve("4").unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad { .. }));
    }
}
