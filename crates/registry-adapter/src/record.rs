//! Persisted Registry Records
//!
//! Every field added after the first record layout carries a serde default so
//! older records keep decoding; unknown fields are ignored.

use crate::codec::{decode_body, encode_body};
use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use feature_model::{
    FeatureSpec, FeatureViewMeta, FeatureViewProjection, FeatureViewSource, OnDemandFeatureView,
    RequestSource, SourceBinding, TransformationSpec,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted on-demand feature view: spec plus registry metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnDemandFeatureViewRecord {
    pub spec: OnDemandFeatureViewSpecRecord,
    #[serde(default)]
    pub meta: FeatureViewMetaRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnDemandFeatureViewSpecRecord {
    pub name: String,
    pub project: String,
    #[serde(default)]
    pub features: Vec<FeatureSpec>,
    #[serde(default)]
    pub sources: BTreeMap<String, OnDemandSourceRecord>,
    pub user_defined_function: UserDefinedFunction,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub owner: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureViewMetaRecord {
    #[serde(default)]
    pub created_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated_timestamp: Option<DateTime<Utc>>,
}

/// Source record; exactly one member is populated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnDemandSourceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_view: Option<FeatureViewSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_view_projection: Option<FeatureViewProjection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data_source: Option<RequestSource>,
}

/// Serialized transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDefinedFunction {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Format byte followed by the encoded body
    pub body: Vec<u8>,
}

fn default_version() -> u32 {
    1
}

impl From<&SourceBinding> for OnDemandSourceRecord {
    fn from(binding: &SourceBinding) -> Self {
        let mut record = Self::default();
        match binding {
            SourceBinding::FeatureView(fv) => record.feature_view = Some(fv.clone()),
            SourceBinding::FeatureViewProjection(p) => {
                record.feature_view_projection = Some(p.clone())
            }
            SourceBinding::Request(r) => record.request_data_source = Some(r.clone()),
        }
        record
    }
}

impl OnDemandSourceRecord {
    /// Decode into the closed in-memory source enum
    pub fn into_binding(self, alias: &str) -> Result<SourceBinding, RegistryError> {
        match (
            self.feature_view,
            self.feature_view_projection,
            self.request_data_source,
        ) {
            (Some(fv), None, None) => Ok(SourceBinding::FeatureView(fv)),
            (None, Some(p), None) => Ok(SourceBinding::FeatureViewProjection(p)),
            (None, None, Some(r)) => Ok(SourceBinding::Request(r)),
            (None, None, None) => Err(RegistryError::SerializationError(format!(
                "Source {} populates no member",
                alias
            ))),
            _ => Err(RegistryError::SerializationError(format!(
                "Source {} populates more than one member",
                alias
            ))),
        }
    }
}

impl OnDemandFeatureViewRecord {
    pub fn from_view(view: &OnDemandFeatureView) -> Result<Self, RegistryError> {
        Ok(Self {
            spec: OnDemandFeatureViewSpecRecord {
                name: view.name.clone(),
                project: view.project.clone(),
                features: view.features.clone(),
                sources: view
                    .sources
                    .iter()
                    .map(|(alias, binding)| (alias.clone(), binding.into()))
                    .collect(),
                user_defined_function: UserDefinedFunction {
                    name: view.transformation.name.clone(),
                    version: view.transformation.version,
                    body: encode_body(&view.transformation.body)?,
                },
                description: view.description.clone(),
                tags: view.tags.clone(),
                owner: view.owner.clone(),
            },
            meta: FeatureViewMetaRecord {
                created_timestamp: view.meta.created_at,
                last_updated_timestamp: view.meta.last_updated_at,
            },
        })
    }

    pub fn into_view(self) -> Result<OnDemandFeatureView, RegistryError> {
        let spec = self.spec;
        let sources = spec
            .sources
            .into_iter()
            .map(|(alias, record)| {
                let binding = record.into_binding(&alias)?;
                Ok((alias, binding))
            })
            .collect::<Result<BTreeMap<_, _>, RegistryError>>()?;
        let udf = spec.user_defined_function;

        Ok(OnDemandFeatureView {
            name: spec.name,
            project: spec.project,
            features: spec.features,
            sources,
            transformation: TransformationSpec {
                name: udf.name,
                version: udf.version,
                body: decode_body(&udf.body)?,
            },
            description: spec.description,
            tags: spec.tags,
            owner: spec.owner,
            meta: FeatureViewMeta {
                created_at: self.meta.created_timestamp,
                last_updated_at: self.meta.last_updated_timestamp,
            },
        })
    }

    pub fn to_json(&self) -> Result<String, RegistryError> {
        serde_json::to_string(self).map_err(|e| RegistryError::SerializationError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        serde_json::from_str(json).map_err(|e| RegistryError::SerializationError(e.to_string()))
    }
}
