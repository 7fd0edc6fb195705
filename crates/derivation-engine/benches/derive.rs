use criterion::{black_box, criterion_group, criterion_main, Criterion};
use derivation_engine::DerivationEngine;
use feature_model::{
    Column, ExpressionBody, FeatureSpec, FeatureViewProjection, OnDemandFeatureView, Row, Table,
    TransformationSpec, Value, ValueType,
};

fn driver_activity() -> OnDemandFeatureView {
    OnDemandFeatureView::new(
        "driver_activity",
        "bench",
        TransformationSpec::expression(
            "driver_activity",
            ExpressionBody::new()
                .with_output("conv_rate_percent", "conv_rate * 100")
                .with_output("conv_bucket", "floor(to_float64(conv_rate) * 10)"),
        ),
    )
    .with_feature("conv_rate_percent", ValueType::Float32)
    .with_feature("conv_bucket", ValueType::Float64)
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

fn bench_derivation(c: &mut Criterion) {
    let engine = DerivationEngine::default();
    let view = driver_activity();

    let row = Row::from_iter([("conv_rate", Value::Float32(0.42))]);
    c.bench_function("derive_online_single_row", |b| {
        b.iter(|| engine.derive_online(black_box(&view), black_box(&row)))
    });

    let table = Table::new(vec![Column::new(
        "conv_rate",
        ValueType::Float32,
        (0..10_000).map(|i| Value::Float32(i as f32 / 10_000.0)).collect(),
    )])
    .unwrap();
    c.bench_function("derive_batch_10k_rows", |b| {
        b.iter(|| engine.derive_batch(black_box(&view), black_box(&table)))
    });
}

criterion_group!(benches, bench_derivation);
criterion_main!(benches);
