//! Target grid description used for imagery queries

use serde::{Deserialize, Serialize};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::GeoTransform;

/// Shape and georeferencing of a raster grid.
///
/// Every image that takes part in a pixel-wise reduction must sit on the
/// same `GridSpec`; queries carry one so the imagery service can deliver
/// scenes already resampled to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<CRS>,
}

impl GridSpec {
    /// Grid without an explicit CRS
    pub fn new(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs: None,
        }
    }

    /// Attach a CRS
    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }

    /// Same shape, aligned transform and equivalent (or unknown) CRS
    pub fn is_compatible(&self, other: &GridSpec) -> bool {
        let crs_ok = match (&self.crs, &other.crs) {
            (Some(a), Some(b)) => a.is_equivalent(b),
            _ => true,
        };
        self.shape() == other.shape() && self.transform.is_aligned_with(&other.transform) && crs_ok
    }

    /// Error unless `other` has this grid's shape
    pub fn check_shape(&self, rows: usize, cols: usize) -> Result<()> {
        if (rows, cols) != self.shape() {
            return Err(Error::SizeMismatch {
                er: self.rows,
                ec: self.cols,
                ar: rows,
                ac: cols,
            });
        }
        Ok(())
    }
}
