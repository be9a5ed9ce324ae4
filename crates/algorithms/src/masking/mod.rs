//! Image masking and scaling
//!
//! Harmonizes raw Landsat Collection 2 Level-2 scenes to the six-band
//! `B1 B2 B3 B4 B5 B7` layout, rescales to u16 fixed-point reflectance and
//! masks clouds, shadows, snow and water from the QA_PIXEL bits plus two
//! ancillary layers.

mod category;
mod prepare;

pub use category::{MaskCategory, MaskSpec};
pub use prepare::{
    prepare_image, quantize_u16, scale_reflectance, AuxiliaryLayers, FOREST_TYPE_BAND,
    WATER_RECURRENCE_BAND, WATER_RECURRENCE_THRESHOLD,
};
