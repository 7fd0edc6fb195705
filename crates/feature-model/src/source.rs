//! Source Bindings for On-Demand Feature Views

use crate::value::ValueType;
use crate::view::FeatureSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator between view name and feature name in full feature names
pub const FULL_NAME_SEPARATOR: &str = "__";

/// Build a full feature name (`view__feature`)
pub fn full_feature_name(view: &str, feature: &str) -> String {
    format!("{}{}{}", view, FULL_NAME_SEPARATOR, feature)
}

/// A materializable feature view referenced as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureViewSource {
    /// Feature view name
    pub name: String,
    /// Entity join-key columns
    #[serde(default)]
    pub entity_columns: Vec<FeatureSpec>,
    /// Every feature of the view
    pub features: Vec<FeatureSpec>,
}

/// A named, possibly aliased subset of a feature view's features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureViewProjection {
    /// Name of the projected feature view
    pub feature_view_name: String,
    /// Alias replacing the view name in full feature names
    #[serde(default)]
    pub name_alias: Option<String>,
    /// Entity join-key columns, before `join_key_map` is applied
    #[serde(default)]
    pub entity_columns: Vec<FeatureSpec>,
    /// Projected features
    pub features: Vec<FeatureSpec>,
    /// Join key renames (view key -> caller column)
    #[serde(default)]
    pub join_key_map: BTreeMap<String, String>,
}

impl FeatureViewProjection {
    /// Name used to prefix full feature names
    pub fn name_to_use(&self) -> &str {
        self.name_alias.as_deref().unwrap_or(&self.feature_view_name)
    }
}

/// Fields supplied only at request time, never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSource {
    pub name: String,
    pub schema: Vec<FeatureSpec>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub owner: String,
}

/// Where a source column comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    FeatureView,
    FeatureViewProjection,
    Request,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::FeatureView => "feature_view",
            SourceKind::FeatureViewProjection => "feature_view_projection",
            SourceKind::Request => "request_data_source",
        }
    }
}

/// A column a binding contributes to the transformation's input
#[derive(Debug, Clone, PartialEq)]
pub struct SourceColumn {
    /// Name the transformation sees
    pub name: String,
    pub value_type: ValueType,
    /// Alternative names the caller may supply the column under
    pub aliases: Vec<String>,
    pub is_entity_key: bool,
}

/// One input source of an on-demand feature view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceBinding {
    FeatureView(FeatureViewSource),
    FeatureViewProjection(FeatureViewProjection),
    Request(RequestSource),
}

impl SourceBinding {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceBinding::FeatureView(_) => SourceKind::FeatureView,
            SourceBinding::FeatureViewProjection(_) => SourceKind::FeatureViewProjection,
            SourceBinding::Request(_) => SourceKind::Request,
        }
    }

    /// Name of the referenced view or request source
    pub fn name(&self) -> &str {
        match self {
            SourceBinding::FeatureView(fv) => &fv.name,
            SourceBinding::FeatureViewProjection(p) => &p.feature_view_name,
            SourceBinding::Request(r) => &r.name,
        }
    }

    /// Columns this binding contributes, entity keys first
    pub fn columns(&self) -> Vec<SourceColumn> {
        match self {
            SourceBinding::FeatureView(fv) => {
                let keys = fv.entity_columns.iter().map(|k| SourceColumn {
                    name: k.name.clone(),
                    value_type: k.value_type,
                    aliases: Vec::new(),
                    is_entity_key: true,
                });
                let features = fv.features.iter().map(|f| SourceColumn {
                    name: f.name.clone(),
                    value_type: f.value_type,
                    aliases: vec![full_feature_name(&fv.name, &f.name)],
                    is_entity_key: false,
                });
                keys.chain(features).collect()
            }
            SourceBinding::FeatureViewProjection(p) => {
                let keys = p.entity_columns.iter().map(|k| SourceColumn {
                    name: p.join_key_map.get(&k.name).cloned().unwrap_or_else(|| k.name.clone()),
                    value_type: k.value_type,
                    aliases: Vec::new(),
                    is_entity_key: true,
                });
                let prefix = p.name_to_use();
                let features = p.features.iter().map(|f| SourceColumn {
                    name: f.name.clone(),
                    value_type: f.value_type,
                    aliases: vec![full_feature_name(prefix, &f.name)],
                    is_entity_key: false,
                });
                keys.chain(features).collect()
            }
            SourceBinding::Request(r) => r
                .schema
                .iter()
                .map(|f| SourceColumn {
                    name: f.name.clone(),
                    value_type: f.value_type,
                    aliases: Vec::new(),
                    is_entity_key: false,
                })
                .collect(),
        }
    }
}

impl From<FeatureViewSource> for SourceBinding {
    fn from(source: FeatureViewSource) -> Self {
        SourceBinding::FeatureView(source)
    }
}

impl From<FeatureViewProjection> for SourceBinding {
    fn from(source: FeatureViewProjection) -> Self {
        SourceBinding::FeatureViewProjection(source)
    }
}

impl From<RequestSource> for SourceBinding {
    fn from(source: RequestSource) -> Self {
        SourceBinding::Request(source)
    }
}
