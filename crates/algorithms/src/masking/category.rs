//! Mask categories and validated mask selections

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use bapcomp_core::{Error, Result};

/// A class of pixels that can be masked out before compositing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaskCategory {
    Cloud,
    Shadow,
    Snow,
    Water,
    /// Persistent water from the surface-water recurrence layer
    WaterPlus,
    /// Pixels outside the forest-type layer
    NonForest,
}

impl MaskCategory {
    pub const ALL: [MaskCategory; 6] = [
        MaskCategory::Cloud,
        MaskCategory::Shadow,
        MaskCategory::Snow,
        MaskCategory::Water,
        MaskCategory::WaterPlus,
        MaskCategory::NonForest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MaskCategory::Cloud => "cloud",
            MaskCategory::Shadow => "shadow",
            MaskCategory::Snow => "snow",
            MaskCategory::Water => "water",
            MaskCategory::WaterPlus => "waterplus",
            MaskCategory::NonForest => "nonforest",
        }
    }

    /// QA_PIXEL bit flagging this category, if it is QA-based
    pub fn qa_bit(&self) -> Option<u8> {
        match self {
            MaskCategory::Cloud => Some(3),
            MaskCategory::Shadow => Some(4),
            MaskCategory::Snow => Some(5),
            MaskCategory::Water => Some(7),
            MaskCategory::WaterPlus | MaskCategory::NonForest => None,
        }
    }
}

impl FromStr for MaskCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        MaskCategory::ALL
            .into_iter()
            .find(|c| c.name() == lower)
            .ok_or_else(|| Error::UnknownMaskCategory(s.to_string()))
    }
}

impl fmt::Display for MaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validated set of mask categories.
///
/// The default selection masks cloud, shadow, snow and water. An empty
/// selection disables masking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskSpec {
    categories: BTreeSet<MaskCategory>,
}

impl Default for MaskSpec {
    fn default() -> Self {
        Self::from_categories([
            MaskCategory::Cloud,
            MaskCategory::Shadow,
            MaskCategory::Snow,
            MaskCategory::Water,
        ])
    }
}

impl MaskSpec {
    /// No masking at all
    pub fn none() -> Self {
        Self {
            categories: BTreeSet::new(),
        }
    }

    pub fn from_categories<I: IntoIterator<Item = MaskCategory>>(categories: I) -> Self {
        Self {
            categories: categories.into_iter().collect(),
        }
    }

    /// Parse category names; the first unknown name fails the whole list.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let categories = names
            .iter()
            .map(|n| n.as_ref().parse::<MaskCategory>())
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self { categories })
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn contains(&self, category: MaskCategory) -> bool {
        self.categories.contains(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = MaskCategory> + '_ {
        self.categories.iter().copied()
    }

    /// OR of the QA bits selected by this spec
    pub fn qa_bits(&self) -> u16 {
        self.categories
            .iter()
            .filter_map(|c| c.qa_bit())
            .fold(0u16, |acc, bit| acc | (1 << bit))
    }

    pub fn needs_water_recurrence(&self) -> bool {
        self.contains(MaskCategory::WaterPlus)
    }

    pub fn needs_forest_type(&self) -> bool {
        self.contains(MaskCategory::NonForest)
    }
}

impl fmt::Display for MaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.categories.iter().map(|c| c.name()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
