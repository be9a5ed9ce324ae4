//! RasterImage: named bands on one grid with a shared validity mask

use chrono::NaiveDateTime;
use ndarray::{Array2, Zip};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::raster::{GridSpec, Raster};
use crate::sensor::Sensor;

/// A named band
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub data: Raster<f64>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Raster<f64>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Multi-band image acquired at one instant.
///
/// All bands and the mask share the same `(rows, cols)`; `mask[(r, c)]` is
/// `true` where the pixel holds a usable observation. Band names are unique.
#[derive(Debug, Clone)]
pub struct RasterImage {
    bands: Vec<Band>,
    mask: Array2<bool>,
    acquired: NaiveDateTime,
    sensor: Option<Sensor>,
    scene_id: String,
    properties: BTreeMap<String, String>,
}

impl RasterImage {
    /// Build an image from bands; every pixel starts valid.
    pub fn new(bands: Vec<Band>, acquired: NaiveDateTime) -> Result<Self> {
        let first = bands.first().ok_or_else(|| Error::InvalidParameter {
            name: "bands",
            value: "[]".into(),
            reason: "an image needs at least one band".into(),
        })?;
        let (rows, cols) = first.data.shape();

        for (i, band) in bands.iter().enumerate() {
            let (ar, ac) = band.data.shape();
            if (ar, ac) != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar,
                    ac,
                });
            }
            if bands[..i].iter().any(|b| b.name == band.name) {
                return Err(Error::DuplicateBand(band.name.clone()));
            }
        }

        Ok(Self {
            bands,
            mask: Array2::from_elem((rows, cols), true),
            acquired,
            sensor: None,
            scene_id: String::new(),
            properties: BTreeMap::new(),
        })
    }

    /// Fully masked image with every band zero, standing in for years with
    /// no observations.
    pub fn placeholder(band_names: &[&str], grid: &GridSpec, acquired: NaiveDateTime) -> Result<Self> {
        let bands = band_names
            .iter()
            .map(|name| Band::new(*name, Raster::on_grid(grid)))
            .collect();
        let image = Self::new(bands, acquired)?;
        let shape = image.shape();
        image.with_mask(Array2::from_elem(shape, false))
    }

    // ── Builders ──────────────────────────────────────────────────────

    /// Replace the validity mask
    pub fn with_mask(mut self, mask: Array2<bool>) -> Result<Self> {
        self.check_shape(mask.dim())?;
        self.mask = mask;
        Ok(self)
    }

    /// AND `mask` into the current validity mask
    pub fn update_mask(mut self, mask: &Array2<bool>) -> Result<Self> {
        self.check_shape(mask.dim())?;
        Zip::from(&mut self.mask).and(mask).for_each(|m, &v| *m = *m && v);
        Ok(self)
    }

    /// Fill invalid pixels with `fill` in every band and mark all pixels valid
    pub fn unmasked(mut self, fill: f64) -> Self {
        for band in &mut self.bands {
            Zip::from(band.data.data_mut())
                .and(&self.mask)
                .for_each(|v, &valid| {
                    if !valid {
                        *v = fill;
                    }
                });
        }
        self.mask.fill(true);
        self
    }

    pub fn with_timestamp(mut self, acquired: NaiveDateTime) -> Self {
        self.acquired = acquired;
        self
    }

    pub fn with_sensor(mut self, sensor: Sensor) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn with_scene_id(mut self, scene_id: impl Into<String>) -> Self {
        self.scene_id = scene_id.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Copy timestamp, sensor, scene id and properties from `other`
    pub fn with_metadata_of(mut self, other: &RasterImage) -> Self {
        self.acquired = other.acquired;
        self.sensor = other.sensor;
        self.scene_id = other.scene_id.clone();
        self.properties = other.properties.clone();
        self
    }

    /// Append a band on the same grid
    pub fn add_band(mut self, band: Band) -> Result<Self> {
        self.check_shape(band.data.shape())?;
        if self.band_index(&band.name).is_some() {
            return Err(Error::DuplicateBand(band.name));
        }
        self.bands.push(band);
        Ok(self)
    }

    /// Keep the bands named in `pairs[i].0`, renamed to `pairs[i].1`, in that order
    pub fn select_renamed(&self, pairs: &[(&str, &str)]) -> Result<Self> {
        let bands = pairs
            .iter()
            .map(|(from, to)| Ok(Band::new(*to, self.band(from)?.clone())))
            .collect::<Result<Vec<_>>>()?;
        let image = Self::new(bands, self.acquired)?.with_metadata_of(self);
        image.with_mask(self.mask.clone())
    }

    /// Keep the named bands, in the order given
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let pairs: Vec<(&str, &str)> = names.iter().map(|n| (*n, *n)).collect();
        self.select_renamed(&pairs)
    }

    // ── Accessors ─────────────────────────────────────────────────────

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.bands.iter().position(|b| b.name == name)
    }

    /// Band data by name
    pub fn band(&self, name: &str) -> Result<&Raster<f64>> {
        self.band_index(name)
            .map(|i| &self.bands[i].data)
            .ok_or_else(|| Error::MissingBand {
                band: name.to_string(),
                available: self.band_names().join(", "),
            })
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    /// Whether pixel `(row, col)` holds a valid observation
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.mask.get((row, col)).copied().unwrap_or(false)
    }

    /// Number of valid pixels
    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|v| **v).count()
    }

    pub fn acquired(&self) -> NaiveDateTime {
        self.acquired
    }

    pub fn sensor(&self) -> Option<Sensor> {
        self.sensor
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn shape(&self) -> (usize, usize) {
        self.mask.dim()
    }

    pub fn rows(&self) -> usize {
        self.mask.nrows()
    }

    pub fn cols(&self) -> usize {
        self.mask.ncols()
    }

    /// Grid of the first band
    pub fn grid_spec(&self) -> GridSpec {
        self.bands[0].data.grid_spec()
    }

    fn check_shape(&self, (ar, ac): (usize, usize)) -> Result<()> {
        let (er, ec) = self.shape();
        if (ar, ac) != (er, ec) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(())
    }
}
