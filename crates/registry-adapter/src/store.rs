//! Registry Store Implementations

use crate::error::RegistryError;
use crate::record::OnDemandFeatureViewRecord;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::info;

/// External persistence for view records
pub trait RegistryStore: Send + Sync {
    fn get(&self, name: &str, project: &str)
        -> Result<Option<OnDemandFeatureViewRecord>, RegistryError>;

    fn put(&self, record: &OnDemandFeatureViewRecord) -> Result<(), RegistryError>;

    /// Records of a project, ordered by name
    fn list(&self, project: &str) -> Result<Vec<OnDemandFeatureViewRecord>, RegistryError>;

    /// Remove a record; returns whether it existed
    fn delete(&self, name: &str, project: &str) -> Result<bool, RegistryError>;
}

/// In-memory store keeping records as JSON documents
pub struct InMemoryStore {
    /// (project, name) -> JSON record
    records: Mutex<BTreeMap<(String, String), String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        info!("Creating in-memory registry store");
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of stored records across projects
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryStore for InMemoryStore {
    fn get(
        &self,
        name: &str,
        project: &str,
    ) -> Result<Option<OnDemandFeatureViewRecord>, RegistryError> {
        let records = self
            .records
            .lock()
            .map_err(|e| RegistryError::StorageError(format!("Lock error: {}", e)))?;

        records
            .get(&(project.to_string(), name.to_string()))
            .map(|json| OnDemandFeatureViewRecord::from_json(json))
            .transpose()
    }

    fn put(&self, record: &OnDemandFeatureViewRecord) -> Result<(), RegistryError> {
        let json = record.to_json()?;
        let mut records = self
            .records
            .lock()
            .map_err(|e| RegistryError::StorageError(format!("Lock error: {}", e)))?;

        records.insert(
            (record.spec.project.clone(), record.spec.name.clone()),
            json,
        );
        Ok(())
    }

    fn list(&self, project: &str) -> Result<Vec<OnDemandFeatureViewRecord>, RegistryError> {
        let records = self
            .records
            .lock()
            .map_err(|e| RegistryError::StorageError(format!("Lock error: {}", e)))?;

        records
            .iter()
            .filter(|((p, _), _)| p == project)
            .map(|(_, json)| OnDemandFeatureViewRecord::from_json(json))
            .collect()
    }

    fn delete(&self, name: &str, project: &str) -> Result<bool, RegistryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| RegistryError::StorageError(format!("Lock error: {}", e)))?;

        Ok(records
            .remove(&(project.to_string(), name.to_string()))
            .is_some())
    }
}
