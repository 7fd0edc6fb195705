//! Merged Input Schema of an On-Demand Feature View

use crate::error::ValidationError;
use feature_model::{FeatureSpec, OnDemandFeatureView, SourceColumn, SourceKind, ValueType};
use std::collections::BTreeMap;

/// One column available to the transformation
#[derive(Debug, Clone, PartialEq)]
pub struct InputColumn {
    /// Name the transformation reads
    pub name: String,
    pub value_type: ValueType,
    /// Other names the caller may supply it under (full feature names)
    pub aliases: Vec<String>,
    /// Alias of the first source that contributes this column
    pub source_alias: String,
    /// Name of that source's feature view or request source
    pub source_name: String,
    pub source_kind: SourceKind,
    pub is_entity_key: bool,
}

impl InputColumn {
    /// Names to look for in a caller context, preferred first
    pub fn lookup_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Union of all columns contributed by a view's sources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    columns: Vec<InputColumn>,
    /// Bare names shared by several sources' features, with the full names
    /// the transformation must use instead
    ambiguous: BTreeMap<String, Vec<String>>,
}

impl InputSchema {
    /// Merge the columns of every source of `view`.
    ///
    /// Entity keys shared between feature views collapse into one column and
    /// must agree on type. Features that share a bare name across sources are
    /// only exposed under their full names (`view__feature`); a collision
    /// involving a column without a full name is rejected.
    pub fn resolve(view: &OnDemandFeatureView) -> Result<Self, ValidationError> {
        let mut columns: Vec<InputColumn> = Vec::new();
        let mut index: BTreeMap<String, usize> = BTreeMap::new();
        let mut ambiguous: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (alias, binding) in &view.sources {
            let contributed = binding.columns();
            if contributed.is_empty() {
                return Err(ValidationError::EmptySource(alias.clone()));
            }

            for column in contributed {
                let bare = column.name.clone();
                let column = if let Some(full_names) = ambiguous.get_mut(&bare) {
                    let column = qualify(column, alias)?;
                    full_names.push(column.name.clone());
                    column
                } else if let Some(&pos) = index.get(&bare) {
                    let existing = &mut columns[pos];
                    if existing.is_entity_key && column.is_entity_key {
                        if existing.value_type != column.value_type {
                            return Err(ValidationError::ConflictingInput {
                                column: bare,
                                first: existing.value_type,
                                second: column.value_type,
                            });
                        }
                        continue;
                    }

                    let existing_full = existing.aliases.first().cloned().ok_or_else(|| {
                        ValidationError::AmbiguousInput {
                            column: bare.clone(),
                            source_alias: existing.source_alias.clone(),
                        }
                    })?;
                    let column = qualify(column, alias)?;
                    existing.aliases.retain(|a| *a != existing_full);
                    existing.name = existing_full.clone();

                    index.remove(&bare);
                    index.insert(existing_full.clone(), pos);
                    ambiguous.insert(bare, vec![existing_full, column.name.clone()]);
                    column
                } else {
                    column
                };

                if index.contains_key(&column.name) {
                    return Err(ValidationError::AmbiguousInput {
                        column: column.name,
                        source_alias: alias.clone(),
                    });
                }
                index.insert(column.name.clone(), columns.len());
                columns.push(InputColumn {
                    name: column.name,
                    value_type: column.value_type,
                    aliases: column.aliases,
                    source_alias: alias.clone(),
                    source_name: binding.name().to_string(),
                    source_kind: binding.kind(),
                    is_entity_key: column.is_entity_key,
                });
            }
        }

        Ok(Self { columns, ambiguous })
    }

    pub fn columns(&self) -> &[InputColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&InputColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Full names to use for a bare name several sources provide
    pub fn ambiguous(&self, name: &str) -> Option<&[String]> {
        self.ambiguous.get(name).map(Vec::as_slice)
    }

    /// Column name to type map, as used for expression type checking
    pub fn types(&self) -> BTreeMap<String, ValueType> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.value_type))
            .collect()
    }

    pub fn to_feature_specs(&self) -> Vec<FeatureSpec> {
        self.columns
            .iter()
            .map(|c| FeatureSpec::new(c.name.clone(), c.value_type))
            .collect()
    }
}

/// Expose a column under its full feature name
fn qualify(mut column: SourceColumn, source_alias: &str) -> Result<SourceColumn, ValidationError> {
    if column.aliases.is_empty() {
        return Err(ValidationError::AmbiguousInput {
            column: column.name,
            source_alias: source_alias.to_string(),
        });
    }
    column.name = column.aliases.remove(0);
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_model::{
        ExpressionBody, FeatureViewProjection, FeatureViewSource, RequestSource, TransformationSpec,
    };

    fn driver_stats() -> FeatureViewSource {
        FeatureViewSource {
            name: "driver_stats".to_string(),
            entity_columns: vec![FeatureSpec::new("driver_id", ValueType::Int64)],
            features: vec![
                FeatureSpec::new("conv_rate", ValueType::Float32),
                FeatureSpec::new("acc_rate", ValueType::Float32),
            ],
        }
    }

    fn view() -> OnDemandFeatureView {
        OnDemandFeatureView::new(
            "conv_rate_plus_100",
            "project",
            TransformationSpec::expression("t", ExpressionBody::new()),
        )
    }

    #[test]
    fn test_merges_sources() {
        let view = view().with_source("driver", driver_stats()).with_source(
            "vals",
            RequestSource {
                name: "vals_to_add".to_string(),
                schema: vec![FeatureSpec::new("val_to_add", ValueType::Int64)],
                description: String::new(),
                tags: Default::default(),
                owner: String::new(),
            },
        );

        let schema = InputSchema::resolve(&view).unwrap();
        assert_eq!(schema.len(), 4);

        let conv = schema.column("conv_rate").unwrap();
        assert_eq!(conv.aliases, vec!["driver_stats__conv_rate".to_string()]);
        assert_eq!(conv.source_kind, SourceKind::FeatureView);

        let val = schema.column("val_to_add").unwrap();
        assert_eq!(val.source_name, "vals_to_add");
        assert_eq!(val.source_kind, SourceKind::Request);
    }

    #[test]
    fn test_shared_entity_key_collapses() {
        let projection = FeatureViewProjection {
            feature_view_name: "driver_profile".to_string(),
            name_alias: None,
            entity_columns: vec![FeatureSpec::new("driver_id", ValueType::Int64)],
            features: vec![FeatureSpec::new("rating", ValueType::Float64)],
            join_key_map: Default::default(),
        };
        let view = view()
            .with_source("a", driver_stats())
            .with_source("b", projection);

        let schema = InputSchema::resolve(&view).unwrap();
        assert_eq!(
            schema.columns().iter().filter(|c| c.name == "driver_id").count(),
            1
        );
    }

    #[test]
    fn test_conflicting_entity_key_types_rejected() {
        let projection = FeatureViewProjection {
            feature_view_name: "driver_profile".to_string(),
            name_alias: None,
            entity_columns: vec![FeatureSpec::new("driver_id", ValueType::Int32)],
            features: vec![FeatureSpec::new("rating", ValueType::Float64)],
            join_key_map: Default::default(),
        };
        let view = view()
            .with_source("a", driver_stats())
            .with_source("b", projection);

        assert_eq!(
            InputSchema::resolve(&view).unwrap_err(),
            ValidationError::ConflictingInput {
                column: "driver_id".to_string(),
                first: ValueType::Int64,
                second: ValueType::Int32,
            }
        );
    }

    #[test]
    fn test_shared_feature_name_split_by_full_name() {
        let customer = FeatureViewProjection {
            feature_view_name: "customer_stats".to_string(),
            name_alias: None,
            entity_columns: Vec::new(),
            features: vec![FeatureSpec::new("conv_rate", ValueType::Float64)],
            join_key_map: Default::default(),
        };
        let view = view()
            .with_source("a", driver_stats())
            .with_source("b", customer);

        let schema = InputSchema::resolve(&view).unwrap();
        assert!(schema.column("conv_rate").is_none());

        let driver = schema.column("driver_stats__conv_rate").unwrap();
        assert_eq!(driver.value_type, ValueType::Float32);
        assert!(driver.aliases.is_empty());
        assert_eq!(driver.source_alias, "a");

        let customer = schema.column("customer_stats__conv_rate").unwrap();
        assert_eq!(customer.value_type, ValueType::Float64);
        assert_eq!(customer.source_alias, "b");

        assert_eq!(
            schema.ambiguous("conv_rate"),
            Some(
                &[
                    "driver_stats__conv_rate".to_string(),
                    "customer_stats__conv_rate".to_string()
                ][..]
            )
        );
        // Unrelated columns keep their bare names
        assert!(schema.column("acc_rate").is_some());
    }

    #[test]
    fn test_request_field_colliding_with_feature_rejected() {
        let view = view().with_source("a", driver_stats()).with_source(
            "b",
            RequestSource {
                name: "overrides".to_string(),
                schema: vec![FeatureSpec::new("conv_rate", ValueType::Float32)],
                description: String::new(),
                tags: Default::default(),
                owner: String::new(),
            },
        );

        assert_eq!(
            InputSchema::resolve(&view).unwrap_err(),
            ValidationError::AmbiguousInput {
                column: "conv_rate".to_string(),
                source_alias: "b".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_source_rejected() {
        let view = view().with_source(
            "empty",
            RequestSource {
                name: "nothing".to_string(),
                schema: Vec::new(),
                description: String::new(),
                tags: Default::default(),
                owner: String::new(),
            },
        );
        assert_eq!(
            InputSchema::resolve(&view).unwrap_err(),
            ValidationError::EmptySource("empty".to_string())
        );
    }
}
