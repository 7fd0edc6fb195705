//! On-Demand Feature View Definition

use crate::source::{full_feature_name, SourceBinding};
use crate::transformation::TransformationSpec;
use crate::value::ValueType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name and type of a feature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub value_type: ValueType,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// Registry timestamps, stamped by the registry adapter only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureViewMeta {
    pub created_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// Feature view whose features are computed at read time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnDemandFeatureView {
    pub name: String,
    pub project: String,
    /// Declared outputs, in output column order
    pub features: Vec<FeatureSpec>,
    /// Input sources keyed by local alias
    pub sources: BTreeMap<String, SourceBinding>,
    pub transformation: TransformationSpec,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub meta: FeatureViewMeta,
}

impl OnDemandFeatureView {
    pub fn new(
        name: impl Into<String>,
        project: impl Into<String>,
        transformation: TransformationSpec,
    ) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
            features: Vec::new(),
            sources: BTreeMap::new(),
            transformation,
            description: String::new(),
            tags: BTreeMap::new(),
            owner: String::new(),
            meta: FeatureViewMeta::default(),
        }
    }

    /// Declare an output feature (builder style)
    pub fn with_feature(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.features.push(FeatureSpec::new(name, value_type));
        self
    }

    /// Bind a source under a local alias (builder style)
    pub fn with_source(mut self, alias: impl Into<String>, source: impl Into<SourceBinding>) -> Self {
        self.sources.insert(alias.into(), source.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Name under which an output feature is returned to the caller
    pub fn output_column_name(&self, feature: &str, full_feature_names: bool) -> String {
        if full_feature_names {
            full_feature_name(&self.name, feature)
        } else {
            feature.to_string()
        }
    }

    /// Whether any source is supplied at request time
    pub fn has_request_sources(&self) -> bool {
        self.sources
            .values()
            .any(|s| matches!(s, SourceBinding::Request(_)))
    }

    /// Fields the caller must supply at request time, with their types
    pub fn request_data_schema(&self) -> BTreeMap<String, ValueType> {
        self.sources
            .values()
            .filter_map(|s| match s {
                SourceBinding::Request(r) => Some(&r.schema),
                _ => None,
            })
            .flatten()
            .map(|f| (f.name.clone(), f.value_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RequestSource;
    use crate::transformation::ExpressionBody;

    fn sample_view() -> OnDemandFeatureView {
        OnDemandFeatureView::new(
            "conv_rate_plus_100",
            "project",
            TransformationSpec::expression(
                "conv_rate_plus_100",
                ExpressionBody::new().with_output("conv_rate_plus_val_to_add", "conv_rate + val_to_add"),
            ),
        )
        .with_feature("conv_rate_plus_val_to_add", ValueType::Float64)
        .with_source(
            "vals",
            RequestSource {
                name: "vals_to_add".to_string(),
                schema: vec![FeatureSpec::new("val_to_add", ValueType::Int64)],
                description: String::new(),
                tags: BTreeMap::new(),
                owner: String::new(),
            },
        )
    }

    #[test]
    fn test_output_column_name() {
        let view = sample_view();
        assert_eq!(
            view.output_column_name("conv_rate_plus_val_to_add", true),
            "conv_rate_plus_100__conv_rate_plus_val_to_add"
        );
        assert_eq!(
            view.output_column_name("conv_rate_plus_val_to_add", false),
            "conv_rate_plus_val_to_add"
        );
    }

    #[test]
    fn test_serde_json_round_trip() {
        let view = sample_view().with_tag("team", "risk");
        let json = serde_json::to_string(&view).unwrap();
        let decoded: OnDemandFeatureView = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, view);
        assert!(decoded.has_request_sources());
    }

    #[test]
    fn test_request_data_schema() {
        let view = sample_view().with_source(
            "driver",
            crate::source::FeatureViewSource {
                name: "driver_stats".to_string(),
                entity_columns: vec![FeatureSpec::new("driver_id", ValueType::Int64)],
                features: vec![FeatureSpec::new("conv_rate", ValueType::Float32)],
            },
        );

        let schema = view.request_data_schema();
        assert_eq!(
            schema,
            BTreeMap::from([("val_to_add".to_string(), ValueType::Int64)])
        );

        let mut no_requests = view;
        no_requests.sources.remove("vals");
        assert!(no_requests.request_data_schema().is_empty());
    }
}
