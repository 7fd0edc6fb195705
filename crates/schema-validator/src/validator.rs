//! Registration-time Validator for On-Demand Feature Views

use crate::compiled::{CompiledBody, CompiledTransform, ViewDefinition};
use crate::error::ValidationError;
use crate::schema::InputSchema;
use expression::{ExprError, Program, ProgramError};
use feature_model::{
    ExpressionBody, FeatureSpec, OnDemandFeatureView, Row, TransformBody, TransformRef,
    TransformRegistry, Value, ValueType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Reject transformations that produce outputs the view does not declare
    pub reject_undeclared_outputs: bool,
    /// Run registered transforms on a sample row to check their output types
    pub probe_registered_transforms: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            reject_undeclared_outputs: true,
            probe_registered_transforms: true,
        }
    }
}

/// Validates views and compiles their transformations
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidationConfig,
    registry: Arc<TransformRegistry>,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig, registry: Arc<TransformRegistry>) -> Self {
        Self { config, registry }
    }

    /// Validate a view and return its compiled transformation.
    ///
    /// Every check that depends only on the definition happens here, so a
    /// view that passes cannot fail resolution for schema reasons later.
    pub fn validate(&self, view: &OnDemandFeatureView) -> Result<CompiledTransform, ValidationError> {
        self.check_identity(view)?;
        self.check_declared_outputs(view)?;

        let inputs = InputSchema::resolve(view)?;
        let (body, inferred) = self.compile_body(view, &inputs)?;
        self.cross_check(view, &inferred)?;

        info!(
            "Validated on-demand view {}/{}: {} inputs, {} outputs",
            view.project,
            view.name,
            inputs.len(),
            view.features.len()
        );

        Ok(CompiledTransform {
            name: view.transformation.name.clone(),
            version: view.transformation.version,
            inputs,
            outputs: view.features.clone(),
            body,
            definition: ViewDefinition::of(view),
        })
    }

    /// Output schema the transformation actually produces, before cross-checking
    pub fn infer_output_schema(
        &self,
        view: &OnDemandFeatureView,
    ) -> Result<Vec<FeatureSpec>, ValidationError> {
        let inputs = InputSchema::resolve(view)?;
        let (_, inferred) = self.compile_body(view, &inputs)?;
        Ok(inferred)
    }

    fn check_identity(&self, view: &OnDemandFeatureView) -> Result<(), ValidationError> {
        if view.name.trim().is_empty() {
            return Err(ValidationError::InvalidName("view name is empty".to_string()));
        }
        if view.project.trim().is_empty() {
            return Err(ValidationError::InvalidName(format!(
                "view {} has an empty project",
                view.name
            )));
        }
        if view.sources.is_empty() {
            return Err(ValidationError::NoSources(view.name.clone()));
        }
        Ok(())
    }

    fn check_declared_outputs(&self, view: &OnDemandFeatureView) -> Result<(), ValidationError> {
        if view.features.is_empty() {
            return Err(ValidationError::EmptyOutputSchema(view.name.clone()));
        }

        let mut seen = BTreeSet::new();
        for feature in &view.features {
            if !seen.insert(feature.name.as_str()) {
                return Err(ValidationError::DuplicateFeature(feature.name.clone()));
            }
            if !feature.value_type.is_declarable() {
                return Err(ValidationError::UnsupportedValueType {
                    feature: feature.name.clone(),
                    value_type: feature.value_type,
                });
            }
        }
        Ok(())
    }

    fn compile_body(
        &self,
        view: &OnDemandFeatureView,
        inputs: &InputSchema,
    ) -> Result<(CompiledBody, Vec<FeatureSpec>), ValidationError> {
        match &view.transformation.body {
            TransformBody::Expression(body) => compile_expression(body, inputs),
            TransformBody::Registered(reference) => self.compile_registered(reference, inputs),
        }
    }

    fn compile_registered(
        &self,
        reference: &TransformRef,
        inputs: &InputSchema,
    ) -> Result<(CompiledBody, Vec<FeatureSpec>), ValidationError> {
        let transform = self
            .registry
            .get(reference)
            .ok_or_else(|| ValidationError::UnknownTransform(reference.to_string()))?;

        for input in transform.inputs() {
            if inputs.column(&input).is_none() {
                return Err(unsatisfied(input, inputs));
            }
        }

        if !self.config.probe_registered_transforms {
            return Ok((CompiledBody::Registered(transform), Vec::new()));
        }

        let sample: Row = inputs
            .columns()
            .iter()
            .map(|c| (c.name.clone(), Value::sample(c.value_type)))
            .collect();
        let produced = transform
            .apply(&sample)
            .map_err(|e| ValidationError::ProbeFailed {
                transform: reference.to_string(),
                message: e.message,
            })?;
        debug!("Probed transform {} -> {} outputs", reference, produced.len());

        let inferred = produced
            .iter()
            .map(|(name, value)| FeatureSpec::new(name.clone(), value.value_type()))
            .collect();
        Ok((CompiledBody::Registered(transform), inferred))
    }

    fn cross_check(
        &self,
        view: &OnDemandFeatureView,
        inferred: &[FeatureSpec],
    ) -> Result<(), ValidationError> {
        // Unprobed registered transforms report nothing to check against
        if inferred.is_empty() && matches!(view.transformation.body, TransformBody::Registered(_)) {
            return Ok(());
        }

        for declared in &view.features {
            let produced = inferred
                .iter()
                .find(|f| f.name == declared.name)
                .ok_or_else(|| ValidationError::MissingOutput(declared.name.clone()))?;
            // A null sample value carries no type information
            if produced.value_type != ValueType::Null && produced.value_type != declared.value_type {
                return Err(ValidationError::OutputTypeMismatch {
                    feature: declared.name.clone(),
                    declared: declared.value_type,
                    inferred: produced.value_type,
                });
            }
        }

        if self.config.reject_undeclared_outputs {
            if let Some(extra) = inferred.iter().find(|f| view.feature(&f.name).is_none()) {
                return Err(ValidationError::UndeclaredOutput(extra.name.clone()));
            }
        }
        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default(), Arc::new(TransformRegistry::new()))
    }
}

fn compile_expression(
    body: &ExpressionBody,
    inputs: &InputSchema,
) -> Result<(CompiledBody, Vec<FeatureSpec>), ValidationError> {
    let program = Program::compile(body, &inputs.types()).map_err(|err| match err {
        ProgramError {
            source: ExprError::UnknownColumn(input),
            ..
        } => unsatisfied(input, inputs),
        other => ValidationError::Expression(other),
    })?;
    let inferred = program.output_schema();
    Ok((CompiledBody::Program(program), inferred))
}

fn unsatisfied(input: String, inputs: &InputSchema) -> ValidationError {
    match inputs.ambiguous(&input) {
        Some(candidates) => ValidationError::AmbiguousReference {
            candidates: candidates.to_vec(),
            input,
        },
        None => ValidationError::UnsatisfiedInput { input },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_model::{
        FeatureViewProjection, RequestSource, Transform, TransformError, TransformationSpec,
    };

    fn conv_rate_projection() -> FeatureViewProjection {
        FeatureViewProjection {
            feature_view_name: "driver_stats".to_string(),
            name_alias: None,
            entity_columns: Vec::new(),
            features: vec![FeatureSpec::new("conv_rate", ValueType::Float32)],
            join_key_map: Default::default(),
        }
    }

    fn driver_activity(source: &str, declared: ValueType) -> OnDemandFeatureView {
        OnDemandFeatureView::new(
            "driver_activity",
            "project",
            TransformationSpec::expression(
                "driver_activity",
                ExpressionBody::new().with_output("conv_rate_percent", source),
            ),
        )
        .with_feature("conv_rate_percent", declared)
        .with_source("driver", conv_rate_projection())
    }

    #[test]
    fn test_valid_view() {
        let compiled = Validator::default()
            .validate(&driver_activity("conv_rate * 100", ValueType::Float32))
            .unwrap();
        assert_eq!(
            compiled.output_schema(),
            &[FeatureSpec::new("conv_rate_percent", ValueType::Float32)]
        );
        assert_eq!(compiled.input_schema().len(), 1);
    }

    #[test]
    fn test_unsatisfied_input() {
        let err = Validator::default()
            .validate(&driver_activity("conv_rate * val_to_add", ValueType::Float32))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsatisfiedInput {
                input: "val_to_add".to_string()
            }
        );
    }

    #[test]
    fn test_declared_type_must_match() {
        let err = Validator::default()
            .validate(&driver_activity("conv_rate * 100", ValueType::Float64))
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutputTypeMismatch { .. }));

        // Widening is the transformation's job
        assert!(Validator::default()
            .validate(&driver_activity("to_float64(conv_rate * 100)", ValueType::Float64))
            .is_ok());
    }

    #[test]
    fn test_duplicate_and_empty_outputs() {
        let dup = driver_activity("conv_rate", ValueType::Float32)
            .with_feature("conv_rate_percent", ValueType::Float32);
        assert_eq!(
            Validator::default().validate(&dup).unwrap_err(),
            ValidationError::DuplicateFeature("conv_rate_percent".to_string())
        );

        let mut empty = driver_activity("conv_rate", ValueType::Float32);
        empty.features.clear();
        assert!(matches!(
            Validator::default().validate(&empty),
            Err(ValidationError::EmptyOutputSchema(_))
        ));
    }

    #[test]
    fn test_unsupported_type() {
        let view = driver_activity("conv_rate", ValueType::Unknown);
        assert!(matches!(
            Validator::default().validate(&view),
            Err(ValidationError::UnsupportedValueType { .. })
        ));
    }

    #[test]
    fn test_no_sources() {
        let mut view = driver_activity("conv_rate", ValueType::Float32);
        view.sources.clear();
        assert_eq!(
            Validator::default().validate(&view).unwrap_err(),
            ValidationError::NoSources("driver_activity".to_string())
        );
    }

    #[test]
    fn test_missing_and_undeclared_outputs() {
        let mut view = driver_activity("conv_rate", ValueType::Float32);
        view.features.push(FeatureSpec::new("other", ValueType::Float32));
        assert_eq!(
            Validator::default().validate(&view).unwrap_err(),
            ValidationError::MissingOutput("other".to_string())
        );

        let mut view = driver_activity("conv_rate", ValueType::Float32);
        view.transformation = TransformationSpec::expression(
            "driver_activity",
            ExpressionBody::new()
                .with_output("conv_rate_percent", "conv_rate")
                .with_output("extra", "conv_rate * 2"),
        );
        assert_eq!(
            Validator::default().validate(&view).unwrap_err(),
            ValidationError::UndeclaredOutput("extra".to_string())
        );

        let lenient = Validator::new(
            ValidationConfig {
                reject_undeclared_outputs: false,
                ..Default::default()
            },
            Arc::new(TransformRegistry::new()),
        );
        assert!(lenient.validate(&view).is_ok());
    }

    #[test]
    fn test_infer_output_schema_ignores_declarations() {
        let view = driver_activity("conv_rate * 100", ValueType::Float64);
        assert_eq!(
            Validator::default().infer_output_schema(&view).unwrap(),
            vec![FeatureSpec::new("conv_rate_percent", ValueType::Float32)]
        );
    }

    #[test]
    fn test_parse_error_surfaces_as_expression_error() {
        let view = driver_activity("conv_rate *", ValueType::Float32);
        assert!(matches!(
            Validator::default().validate(&view),
            Err(ValidationError::Expression(_))
        ));
    }

    struct AddValue;

    impl Transform for AddValue {
        fn name(&self) -> &str {
            "add_value"
        }

        fn inputs(&self) -> Vec<String> {
            vec!["conv_rate".to_string(), "val_to_add".to_string()]
        }

        fn apply(&self, inputs: &Row) -> Result<Row, TransformError> {
            match (inputs.get("conv_rate"), inputs.get("val_to_add")) {
                (Some(Value::Float32(c)), Some(Value::Int64(v))) => Ok(Row::from_iter([(
                    "conv_rate_plus_val_to_add",
                    Value::Float64(*c as f64 + *v as f64),
                )])),
                _ => Err(TransformError::new("add_value", "unexpected inputs")),
            }
        }
    }

    fn registered_view(declared: ValueType) -> OnDemandFeatureView {
        OnDemandFeatureView::new(
            "conv_rate_plus_val",
            "project",
            TransformationSpec::registered(
                "conv_rate_plus_val",
                TransformRef {
                    name: "add_value".to_string(),
                    version: 1,
                },
            ),
        )
        .with_feature("conv_rate_plus_val_to_add", declared)
        .with_source("driver", conv_rate_projection())
        .with_source(
            "vals",
            RequestSource {
                name: "vals_to_add".to_string(),
                schema: vec![FeatureSpec::new("val_to_add", ValueType::Int64)],
                description: String::new(),
                tags: Default::default(),
                owner: String::new(),
            },
        )
    }

    fn registry_validator() -> Validator {
        Validator::new(
            ValidationConfig::default(),
            Arc::new(TransformRegistry::new().with(Arc::new(AddValue))),
        )
    }

    fn customer_stats() -> FeatureViewProjection {
        FeatureViewProjection {
            feature_view_name: "customer_stats".to_string(),
            ..conv_rate_projection()
        }
    }

    #[test]
    fn test_bare_name_shared_by_two_sources_is_ambiguous() {
        let view = driver_activity("conv_rate * 100", ValueType::Float32)
            .with_source("customer", customer_stats());

        assert_eq!(
            Validator::default().validate(&view).unwrap_err(),
            ValidationError::AmbiguousReference {
                input: "conv_rate".to_string(),
                candidates: vec![
                    "customer_stats__conv_rate".to_string(),
                    "driver_stats__conv_rate".to_string(),
                ],
            }
        );
    }

    #[test]
    fn test_shared_feature_usable_by_full_name() {
        let view = driver_activity(
            "customer_stats__conv_rate - driver_stats__conv_rate",
            ValueType::Float32,
        )
        .with_source("customer", customer_stats());

        let compiled = Validator::default().validate(&view).unwrap();
        assert!(compiled.input_schema().column("conv_rate").is_none());
        assert_eq!(compiled.input_schema().len(), 2);
    }

    #[test]
    fn test_registered_transform_probed() {
        assert!(registry_validator()
            .validate(&registered_view(ValueType::Float64))
            .is_ok());
        assert!(matches!(
            registry_validator().validate(&registered_view(ValueType::Float32)),
            Err(ValidationError::OutputTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_registered_transform() {
        assert_eq!(
            Validator::default()
                .validate(&registered_view(ValueType::Float64))
                .unwrap_err(),
            ValidationError::UnknownTransform("add_value@v1".to_string())
        );
    }

    #[test]
    fn test_registered_transform_inputs_checked() {
        let mut view = registered_view(ValueType::Float64);
        view.sources.remove("vals");
        assert_eq!(
            registry_validator().validate(&view).unwrap_err(),
            ValidationError::UnsatisfiedInput {
                input: "val_to_add".to_string()
            }
        );
    }
}
