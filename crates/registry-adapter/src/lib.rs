//! Registry Adapter
//!
//! Persisted representation of on-demand feature views and the registry
//! operations built on it.

mod codec;
mod error;
mod record;
mod registry;
mod store;

pub use codec::{decode_body, encode_body, FORMAT_POSTCARD};
pub use error::RegistryError;
pub use record::{
    FeatureViewMetaRecord, OnDemandFeatureViewRecord, OnDemandFeatureViewSpecRecord,
    OnDemandSourceRecord, UserDefinedFunction,
};
pub use registry::SpecRegistry;
pub use store::{InMemoryStore, RegistryStore};
