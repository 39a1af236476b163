//! Codec preference registry: ranks audio and video encodings by priority,
//! persists the ranking and orders codec lists for SDP negotiation.

pub mod catalog;
pub mod codec;
pub mod engine;
pub mod format;
pub mod negotiation;
pub mod registry;
pub mod store;

pub use catalog::{AvailableCatalog, StaticCatalog};
pub use format::{MediaFormat, MediaKind};
pub use registry::{DEFAULT_PROPERTY_PREFIX, EncodingConfiguration, MoveDirection, PluginRegistry};
pub use store::{KeyValueStore, MemoryStore, JsonFileStore, StoreError};
