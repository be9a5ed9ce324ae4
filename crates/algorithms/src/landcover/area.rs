//! Area per land cover class

use std::collections::BTreeMap;

use bapcomp_core::{RasterImage, Result, CRS};

/// Radius of the sphere with the WGS84 ellipsoid's surface area, in metres
const AUTHALIC_RADIUS: f64 = 6_371_007.2;

/// Total area per class of `class_image` (first band), in km².
///
/// Masked and non-finite pixels are ignored. Projected grids use the
/// transform's pixel area in squared metres; WGS84 grids use the spherical
/// area of each row's cells.
pub fn class_area(class_image: &RasterImage) -> Result<BTreeMap<u16, f64>> {
    let classes = &class_image.bands()[0].data;
    let transform = classes.transform();
    let geographic = classes.crs().is_some_and(|crs| crs.is_equivalent(&CRS::wgs84()));

    let (rows, cols) = class_image.shape();
    let mut areas: BTreeMap<u16, f64> = BTreeMap::new();

    for row in 0..rows {
        let cell_m2 = if geographic {
            let lat_top = transform.origin_y + row as f64 * transform.pixel_height;
            let lat_bottom = lat_top + transform.pixel_height;
            let d_lon = transform.pixel_width.abs().to_radians();
            AUTHALIC_RADIUS
                * AUTHALIC_RADIUS
                * d_lon
                * (lat_top.to_radians().sin() - lat_bottom.to_radians().sin()).abs()
        } else {
            transform.pixel_area()
        };

        for col in 0..cols {
            if !class_image.is_valid(row, col) {
                continue;
            }
            let value = unsafe { classes.get_unchecked(row, col) };
            if !value.is_finite() || value < 0.0 || value > u16::MAX as f64 {
                continue;
            }
            *areas.entry(value.round() as u16).or_insert(0.0) += cell_m2 / 1e6;
        }
    }
    Ok(areas)
}
