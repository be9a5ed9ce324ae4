//! Multi-band, timestamped, masked imagery

mod collection;
mod raster_image;

pub use collection::{stack_layout, RasterCollection, StackLayout};
pub use raster_image::{Band, RasterImage};
