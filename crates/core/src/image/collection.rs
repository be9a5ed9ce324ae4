//! Ordered collections of images

use crate::error::{Error, Result};
use crate::image::RasterImage;

/// Ordered list of images. Order is significant: reductions that break
/// ties keep the first image encountered.
#[derive(Debug, Clone, Default)]
pub struct RasterCollection {
    images: Vec<RasterImage>,
}

impl RasterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_images(images: Vec<RasterImage>) -> Self {
        Self { images }
    }

    pub fn push(&mut self, image: RasterImage) {
        self.images.push(image);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[RasterImage] {
        &self.images
    }

    pub fn into_images(self) -> Vec<RasterImage> {
        self.images
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RasterImage> {
        self.images.iter()
    }

    pub fn first(&self) -> Option<&RasterImage> {
        self.images.first()
    }

    /// Append every image of `other` after the images of `self`
    pub fn merge(mut self, other: RasterCollection) -> Self {
        self.images.extend(other.images);
        self
    }

    /// Keep images for which `keep` returns true
    pub fn filter<F: FnMut(&RasterImage) -> bool>(self, mut keep: F) -> Self {
        Self {
            images: self.images.into_iter().filter(|img| keep(img)).collect(),
        }
    }

    /// Apply a fallible transform to every image, in order
    pub fn try_map<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(&RasterImage) -> Result<RasterImage>,
    {
        Ok(Self {
            images: self.images.iter().map(f).collect::<Result<Vec<_>>>()?,
        })
    }

    /// Stable sort by acquisition time
    pub fn sort_by_time(mut self) -> Self {
        self.images.sort_by_key(|img| img.acquired());
        self
    }

    /// Common `(rows, cols)` and band names of all members, `None` when empty
    pub fn layout(&self) -> Result<Option<StackLayout>> {
        stack_layout(&self.images)
    }
}

/// Shape and band names shared by a stack of images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackLayout {
    pub shape: (usize, usize),
    pub bands: Vec<String>,
}

/// Check that every image has the first image's shape and band names.
///
/// Returns `None` for an empty stack.
pub fn stack_layout(images: &[RasterImage]) -> Result<Option<StackLayout>> {
    let Some(first) = images.first() else {
        return Ok(None);
    };
    let (er, ec) = first.shape();
    let names = first.band_names();

    for img in &images[1..] {
        let (ar, ac) = img.shape();
        if (ar, ac) != (er, ec) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        if img.band_names() != names {
            return Err(Error::BandLayoutMismatch(format!(
                "expected [{}], scene '{}' has [{}]",
                names.join(", "),
                img.scene_id(),
                img.band_names().join(", ")
            )));
        }
    }
    Ok(Some(StackLayout {
        shape: (er, ec),
        bands: names.into_iter().map(String::from).collect(),
    }))
}

impl IntoIterator for RasterCollection {
    type Item = RasterImage;
    type IntoIter = std::vec::IntoIter<RasterImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.into_iter()
    }
}

impl<'a> IntoIterator for &'a RasterCollection {
    type Item = &'a RasterImage;
    type IntoIter = std::slice::Iter<'a, RasterImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

impl FromIterator<RasterImage> for RasterCollection {
    fn from_iter<I: IntoIterator<Item = RasterImage>>(iter: I) -> Self {
        Self {
            images: iter.into_iter().collect(),
        }
    }
}
