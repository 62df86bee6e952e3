//! # courier-store
//!
//! Concrete collaborators for the importer:
//!
//! - [`MemoryRepository`] / [`JsonStore`]: entity storage
//! - [`HalCodec`]: HAL JSON snapshot codec
//! - [`HalLinkTypes`]: HAL type-link resolution
//! - [`FileWatermarkStore`]: `~/.courier/watermarks.json`

pub mod hal;
pub mod json_store;
pub mod link_types;
pub mod memory;
pub mod watermark;

pub use hal::HalCodec;
pub use json_store::JsonStore;
pub use link_types::HalLinkTypes;
pub use memory::MemoryRepository;
pub use watermark::FileWatermarkStore;
