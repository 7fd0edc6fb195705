//! Compiled Transformation Cache

use feature_model::OnDemandFeatureView;
use schema_validator::{CompiledTransform, ValidationError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Cache key: one compiled body per view version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub project: String,
    pub name: String,
    pub version: u32,
}

impl CacheKey {
    pub fn for_view(view: &OnDemandFeatureView) -> Self {
        Self {
            project: view.project.clone(),
            name: view.name.clone(),
            version: view.transformation.version,
        }
    }
}

/// Shared cache of compiled transformations.
///
/// Entries live until invalidated; the registry invalidates a view whenever
/// it is saved or deleted. A hit is only served when the entry was compiled
/// from the same definition as the view being derived, so a compile that
/// lands after an update's invalidation is replaced rather than reused.
#[derive(Debug, Default)]
pub struct TransformCache {
    entries: RwLock<HashMap<CacheKey, Arc<CompiledTransform>>>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached compile of `view`, compiling it on a miss
    pub fn get_or_compile<F>(
        &self,
        view: &OnDemandFeatureView,
        compile: F,
    ) -> Result<Arc<CompiledTransform>, ValidationError>
    where
        F: FnOnce(&OnDemandFeatureView) -> Result<CompiledTransform, ValidationError>,
    {
        let key = CacheKey::for_view(view);

        if let Some(hit) = self.get(&key).filter(|c| c.compiled_from(view)) {
            metrics::counter!("odfv_cache_hits_total").increment(1);
            return Ok(hit);
        }
        metrics::counter!("odfv_cache_misses_total").increment(1);

        let compiled = Arc::new(compile(view)?);
        debug!("Compiled {}/{} v{}", key.project, key.name, key.version);

        if let Ok(mut entries) = self.entries.write() {
            // A concurrent compile of the same definition may have won
            if let Some(existing) = entries.get(&key).filter(|c| c.compiled_from(view)) {
                return Ok(existing.clone());
            }
            entries.insert(key, compiled.clone());
        }
        Ok(compiled)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<CompiledTransform>> {
        self.entries.read().ok()?.get(key).cloned()
    }

    /// Drop every cached version of a view
    pub fn invalidate(&self, project: &str, name: &str) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|k, _| !(k.project == project && k.name == name));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Invalidated {} cached compile(s) of {}/{}", removed, project, name);
        }
        removed
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
