//! Every validated view yields exactly its declared outputs, in order

use feature_model::{
    ExpressionBody, FeatureSpec, FeatureViewProjection, OnDemandFeatureView, TransformationSpec,
    ValueType,
};
use proptest::prelude::*;
use schema_validator::{ValidationError, Validator};

fn view_with(outputs: &[(String, i64)]) -> OnDemandFeatureView {
    let body = outputs.iter().fold(ExpressionBody::new(), |body, (name, k)| {
        body.with_output(name.clone(), format!("to_float64(conv_rate) * {}", k))
    });
    let view = OnDemandFeatureView::new(
        "scaled",
        "project",
        TransformationSpec::expression("scaled", body),
    )
    .with_source(
        "driver",
        FeatureViewProjection {
            feature_view_name: "driver_stats".to_string(),
            name_alias: None,
            entity_columns: Vec::new(),
            features: vec![FeatureSpec::new("conv_rate", ValueType::Float32)],
            join_key_map: Default::default(),
        },
    );
    outputs
        .iter()
        .fold(view, |view, (name, _)| view.with_feature(name.clone(), ValueType::Float64))
}

proptest! {
    #[test]
    fn declared_outputs_survive_validation(
        names in prop::collection::btree_set("[a-z][a-z0-9_]{0,8}", 1..8),
        factor in -100i64..100,
    ) {
        // Reverse order so declared order differs from name order
        let outputs: Vec<(String, i64)> = names.into_iter().rev().map(|n| (n, factor)).collect();
        let view = view_with(&outputs);

        let compiled = Validator::default().validate(&view).unwrap();
        prop_assert_eq!(compiled.output_schema(), view.features.as_slice());
    }

    #[test]
    fn undeclared_output_always_rejected(
        names in prop::collection::btree_set("[a-z][a-z0-9_]{0,8}", 2..8),
    ) {
        let outputs: Vec<(String, i64)> = names.into_iter().map(|n| (n, 2)).collect();
        let mut view = view_with(&outputs);
        let dropped = view.features.pop().unwrap();

        prop_assert_eq!(
            Validator::default().validate(&view).unwrap_err(),
            ValidationError::UndeclaredOutput(dropped.name)
        );
    }
}
