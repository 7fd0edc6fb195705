//! Feature Model
//!
//! Shared types for on-demand feature derivation: values, rows and tables,
//! source bindings, transformation definitions and the feature view itself.

mod source;
mod table;
mod transformation;
mod value;
mod view;

pub use source::{
    full_feature_name, FeatureViewProjection, FeatureViewSource, RequestSource, SourceBinding,
    SourceColumn, SourceKind, FULL_NAME_SEPARATOR,
};
pub use table::{Column, Row, Table, TableError};
pub use transformation::{
    ExpressionBody, OutputExpr, Transform, TransformBody, TransformError, TransformRef,
    TransformRegistry, TransformationSpec,
};
pub use value::{Value, ValueType};
pub use view::{FeatureSpec, FeatureViewMeta, OnDemandFeatureView};
