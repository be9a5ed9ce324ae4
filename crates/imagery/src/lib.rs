//! # BAPcomp Imagery
//!
//! The [`ImageryService`] capability through which the pipeline obtains
//! satellite scenes and static auxiliary layers.
//!
//! ## Implementations
//!
//! - [`InMemoryImageryService`]: registered fixtures, with a query log
//! - [`CatalogImageryService`]: JSON catalog of per-band GeoTIFFs on disk
//! - [`CachedImageryService`]: LRU cache of auxiliary layers over another service

pub mod cache;
pub mod catalog;
pub mod error;
pub mod memory;
pub mod query;
pub mod service;

pub use cache::CachedImageryService;
pub use catalog::{CatalogImageryService, CatalogManifest, SceneEntry};
pub use error::{ImageryError, Result};
pub use memory::InMemoryImageryService;
pub use query::{AuxiliaryDataset, ImageQuery};
pub use service::ImageryService;
