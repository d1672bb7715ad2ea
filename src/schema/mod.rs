pub mod local;
pub mod registry;
pub mod types;

pub use local::{derive_local_types, map_local_type};
pub use registry::SchemaRegistry;
pub use types::{Column, LocalColumn, LocalType, TableSchema};
