//! Landsat tasseled-cap transformation
//!
//! Coefficients apply to the harmonized `B1 B2 B3 B4 B5 B7` bands.

pub const BRIGHTNESS: [f64; 6] = [0.2043, 0.4158, 0.5524, 0.5741, 0.3124, 0.2303];
pub const GREENNESS: [f64; 6] = [-0.1603, -0.2819, -0.4934, 0.7940, -0.0002, -0.1446];
pub const WETNESS: [f64; 6] = [0.0315, 0.2021, 0.3102, 0.1594, -0.6806, -0.6109];

#[inline]
fn weighted_sum(bands: &[f64; 6], coeffs: &[f64; 6]) -> f64 {
    bands.iter().zip(coeffs).map(|(b, c)| b * c).sum()
}

pub fn tc_brightness(bands: &[f64; 6]) -> f64 {
    weighted_sum(bands, &BRIGHTNESS)
}

pub fn tc_greenness(bands: &[f64; 6]) -> f64 {
    weighted_sum(bands, &GREENNESS)
}

pub fn tc_wetness(bands: &[f64; 6]) -> f64 {
    weighted_sum(bands, &WETNESS)
}

/// atan(greenness / brightness) in degrees, ×100
pub fn tc_angle(bands: &[f64; 6]) -> f64 {
    (tc_greenness(bands) / tc_brightness(bands)).atan().to_degrees() * 100.0
}
