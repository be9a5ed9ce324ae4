//! Query types sent to an imagery service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ImageryError;
use bapcomp_algorithms::masking::{FOREST_TYPE_BAND, WATER_RECURRENCE_BAND};
use bapcomp_core::{DateRange, GridSpec};

/// Scenes of one dataset acquired within a closed date range, delivered on
/// a target grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageQuery {
    /// Dataset identifier, e.g. `LANDSAT/LC08/C02/T1_L2`
    pub dataset: String,
    pub grid: GridSpec,
    pub range: DateRange,
}

impl ImageQuery {
    pub fn new(dataset: impl Into<String>, grid: GridSpec, range: DateRange) -> Self {
        Self {
            dataset: dataset.into(),
            grid,
            range,
        }
    }
}

impl fmt::Display for ImageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({}x{})", self.dataset, self.range, self.grid.rows, self.grid.cols)
    }
}

/// Static layers used by masking and land cover helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxiliaryDataset {
    /// Forest type classes; negative or masked where there is no forest
    ForestType,
    /// Surface water recurrence in percent
    SurfaceWaterRecurrence,
    /// Elevation in metres
    Elevation,
}

impl AuxiliaryDataset {
    pub const ALL: [AuxiliaryDataset; 3] = [
        AuxiliaryDataset::ForestType,
        AuxiliaryDataset::SurfaceWaterRecurrence,
        AuxiliaryDataset::Elevation,
    ];

    /// Catalog key
    pub fn key(&self) -> &'static str {
        match self {
            AuxiliaryDataset::ForestType => "forest_type",
            AuxiliaryDataset::SurfaceWaterRecurrence => "surface_water_recurrence",
            AuxiliaryDataset::Elevation => "elevation",
        }
    }

    /// Name of the single band the service delivers
    pub fn band_name(&self) -> &'static str {
        match self {
            AuxiliaryDataset::ForestType => FOREST_TYPE_BAND,
            AuxiliaryDataset::SurfaceWaterRecurrence => WATER_RECURRENCE_BAND,
            AuxiliaryDataset::Elevation => "elevation",
        }
    }
}

impl fmt::Display for AuxiliaryDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for AuxiliaryDataset {
    type Err = ImageryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuxiliaryDataset::ALL
            .into_iter()
            .find(|d| d.key() == s.trim())
            .ok_or_else(|| ImageryError::DatasetUnavailable(s.to_string()))
    }
}
