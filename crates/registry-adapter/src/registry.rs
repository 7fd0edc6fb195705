//! Spec Registry
//!
//! Translates between in-memory views and persisted records, stamps registry
//! timestamps, and keeps the compiled-transform cache in step with updates.

use crate::error::RegistryError;
use crate::record::OnDemandFeatureViewRecord;
use crate::store::RegistryStore;
use chrono::Utc;
use derivation_engine::TransformCache;
use feature_model::OnDemandFeatureView;
use schema_validator::Validator;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Registry of on-demand feature views
pub struct SpecRegistry {
    store: Arc<dyn RegistryStore>,
    validator: Validator,
    cache: Arc<TransformCache>,
    /// Serializes writes: read-modify-write of a record plus its invalidation
    writes: Mutex<()>,
}

impl SpecRegistry {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        validator: Validator,
        cache: Arc<TransformCache>,
    ) -> Self {
        Self {
            store,
            validator,
            cache,
            writes: Mutex::new(()),
        }
    }

    fn write_lock(&self) -> Result<MutexGuard<'_, ()>, RegistryError> {
        self.writes
            .lock()
            .map_err(|e| RegistryError::StorageError(format!("Lock error: {}", e)))
    }

    /// Validate and persist a view, creating or replacing it.
    ///
    /// Returns the view as stored, with its registry timestamps.
    pub fn save(&self, mut view: OnDemandFeatureView) -> Result<OnDemandFeatureView, RegistryError> {
        self.validator.validate(&view)?;

        let _guard = self.write_lock()?;
        let now = Utc::now();
        let existing = self.store.get(&view.name, &view.project)?;
        view.meta.created_at = existing
            .and_then(|r| r.meta.created_timestamp)
            .or(Some(now));
        view.meta.last_updated_at = Some(now);

        self.store.put(&OnDemandFeatureViewRecord::from_view(&view)?)?;
        self.cache.invalidate(&view.project, &view.name);

        info!(
            "Saved on-demand view {}/{} (transformation {} v{})",
            view.project, view.name, view.transformation.name, view.transformation.version
        );
        Ok(view)
    }

    pub fn load(&self, name: &str, project: &str) -> Result<OnDemandFeatureView, RegistryError> {
        let record = self
            .store
            .get(name, project)?
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                project: project.to_string(),
            })?;
        debug!("Loaded on-demand view {}/{}", project, name);
        record.into_view()
    }

    pub fn list(&self, project: &str) -> Result<Vec<OnDemandFeatureView>, RegistryError> {
        self.store
            .list(project)?
            .into_iter()
            .map(OnDemandFeatureViewRecord::into_view)
            .collect()
    }

    pub fn delete(&self, name: &str, project: &str) -> Result<(), RegistryError> {
        let _guard = self.write_lock()?;
        if !self.store.delete(name, project)? {
            return Err(RegistryError::NotFound {
                name: name.to_string(),
                project: project.to_string(),
            });
        }
        self.cache.invalidate(project, name);
        info!("Deleted on-demand view {}/{}", project, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use derivation_engine::{DerivationEngine, EngineConfig};
    use feature_model::{
        ExpressionBody, FeatureSpec, FeatureViewProjection, Row, TransformationSpec, Value,
        ValueType,
    };

    fn driver_activity(source: &str) -> OnDemandFeatureView {
        OnDemandFeatureView::new(
            "driver_activity",
            "project",
            TransformationSpec::expression(
                "driver_activity",
                ExpressionBody::new().with_output("conv_rate_percent", source),
            ),
        )
        .with_feature("conv_rate_percent", ValueType::Float32)
        .with_source(
            "driver",
            FeatureViewProjection {
                feature_view_name: "driver_stats".to_string(),
                name_alias: None,
                entity_columns: Vec::new(),
                features: vec![FeatureSpec::new("conv_rate", ValueType::Float32)],
                join_key_map: Default::default(),
            },
        )
    }

    fn registry(cache: Arc<TransformCache>) -> SpecRegistry {
        SpecRegistry::new(Arc::new(InMemoryStore::new()), Validator::default(), cache)
    }

    #[test]
    fn test_save_and_load() {
        let registry = registry(Arc::new(TransformCache::new()));
        let saved = registry.save(driver_activity("conv_rate * 100")).unwrap();
        assert!(saved.meta.created_at.is_some());
        assert_eq!(saved.meta.created_at, saved.meta.last_updated_at);

        let loaded = registry.load("driver_activity", "project").unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_update_keeps_created_at() {
        let registry = registry(Arc::new(TransformCache::new()));
        let first = registry.save(driver_activity("conv_rate * 100")).unwrap();
        let second = registry.save(driver_activity("conv_rate * 10")).unwrap();

        assert_eq!(second.meta.created_at, first.meta.created_at);
        assert!(second.meta.last_updated_at >= first.meta.last_updated_at);
    }

    #[test]
    fn test_invalid_view_not_saved() {
        let registry = registry(Arc::new(TransformCache::new()));
        let err = registry.save(driver_activity("acc_rate * 100")).unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
        assert!(matches!(
            registry.load("driver_activity", "project"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let registry = registry(Arc::new(TransformCache::new()));
        registry.save(driver_activity("conv_rate * 100")).unwrap();
        let mut other = driver_activity("conv_rate * 100");
        other.project = "other".to_string();
        registry.save(other).unwrap();

        assert_eq!(registry.list("project").unwrap().len(), 1);
        registry.delete("driver_activity", "project").unwrap();
        assert!(registry.list("project").unwrap().is_empty());
        assert!(matches!(
            registry.delete("driver_activity", "project"),
            Err(RegistryError::NotFound { .. })
        ));
        assert_eq!(registry.list("other").unwrap().len(), 1);
    }

    #[test]
    fn test_update_invalidates_compiled_transform() {
        let cache = Arc::new(TransformCache::new());
        let registry = registry(cache.clone());
        let engine = DerivationEngine::new(EngineConfig::default(), Validator::default(), cache);
        let row = Row::from_iter([("conv_rate", Value::Float32(0.5))]);

        let view = registry.save(driver_activity("conv_rate * 100")).unwrap();
        let before = engine.derive_online(&view, &row).unwrap();
        assert_eq!(before.get("conv_rate_percent"), Some(&Value::Float32(50.0)));

        // Same name and version, new body
        let view = registry.save(driver_activity("conv_rate * 10")).unwrap();
        let after = engine.derive_online(&view, &row).unwrap();
        assert_eq!(after.get("conv_rate_percent"), Some(&Value::Float32(5.0)));
    }

    #[test]
    fn test_in_flight_derive_of_old_version_does_not_outlive_update() {
        let cache = Arc::new(TransformCache::new());
        let registry = registry(cache.clone());
        let engine = DerivationEngine::new(EngineConfig::default(), Validator::default(), cache);
        let row = Row::from_iter([("conv_rate", Value::Float32(0.5))]);

        registry.save(driver_activity("conv_rate * 100")).unwrap();
        let stale = registry.load("driver_activity", "project").unwrap();

        // The update lands between the load and the derive of a request
        registry.save(driver_activity("conv_rate * 10")).unwrap();
        let in_flight = engine.derive_online(&stale, &row).unwrap();
        assert_eq!(in_flight.get("conv_rate_percent"), Some(&Value::Float32(50.0)));

        let current = registry.load("driver_activity", "project").unwrap();
        let after = engine.derive_online(&current, &row).unwrap();
        assert_eq!(after.get("conv_rate_percent"), Some(&Value::Float32(5.0)));
    }

    #[test]
    fn test_concurrent_applies_keep_created_at() {
        let registry = Arc::new(registry(Arc::new(TransformCache::new())));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .save(driver_activity(&format!("conv_rate * {}", i + 1)))
                        .unwrap()
                })
            })
            .collect();
        let saved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Whichever apply created the view, every later one kept its timestamp
        let stored = registry.load("driver_activity", "project").unwrap();
        for view in &saved {
            assert_eq!(view.meta.created_at, stored.meta.created_at);
        }
        assert!(saved.contains(&stored));
    }
}
