//! Name/value metadata attached to frames.
//!
//! Frames carry an [`AttributeList`] that is propagated by copy and convert.
//! The only keys this crate interprets are [`COLOR_MODE`] and
//! [`BAYER_PATTERN`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::element::ElementType;

/// Attribute key holding a [`ColorMode`] code.
pub const COLOR_MODE: &str = "ColorMode";
/// Attribute key holding a [`BayerPattern`] code.
pub const BAYER_PATTERN: &str = "BayerPattern";

/// Typed scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// `bool`
    Bool(bool),
    /// `i8`
    Int8(i8),
    /// `u8`
    UInt8(u8),
    /// `i16`
    Int16(i16),
    /// `u16`
    UInt16(u16),
    /// `i32`
    Int32(i32),
    /// `u32`
    UInt32(u32),
    /// `i64`
    Int64(i64),
    /// `u64`
    UInt64(u64),
    /// `f32`
    Float32(f32),
    /// `f64`
    Float64(f64),
    /// Dynamic-length string
    String(String),
}

impl AttributeValue {
    /// Element type tag of this value.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        match self {
            AttributeValue::Bool(_) => ElementType::Bool,
            AttributeValue::Int8(_) => ElementType::Int8,
            AttributeValue::UInt8(_) => ElementType::UInt8,
            AttributeValue::Int16(_) => ElementType::Int16,
            AttributeValue::UInt16(_) => ElementType::UInt16,
            AttributeValue::Int32(_) => ElementType::Int32,
            AttributeValue::UInt32(_) => ElementType::UInt32,
            AttributeValue::Int64(_) => ElementType::Int64,
            AttributeValue::UInt64(_) => ElementType::UInt64,
            AttributeValue::Float32(_) => ElementType::Float32,
            AttributeValue::Float64(_) => ElementType::Float64,
            AttributeValue::String(_) => ElementType::String,
        }
    }

    /// Integer view of the value. Floats truncate; strings parse if they can.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Bool(v) => Some(i64::from(*v)),
            AttributeValue::Int8(v) => Some(i64::from(*v)),
            AttributeValue::UInt8(v) => Some(i64::from(*v)),
            AttributeValue::Int16(v) => Some(i64::from(*v)),
            AttributeValue::UInt16(v) => Some(i64::from(*v)),
            AttributeValue::Int32(v) => Some(i64::from(*v)),
            AttributeValue::UInt32(v) => Some(i64::from(*v)),
            AttributeValue::Int64(v) => Some(*v),
            AttributeValue::UInt64(v) => i64::try_from(*v).ok(),
            AttributeValue::Float32(v) => Some(*v as i64),
            AttributeValue::Float64(v) => Some(*v as i64),
            AttributeValue::String(s) => s.trim().parse().ok(),
        }
    }

    /// Floating-point view of the value.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float32(v) => Some(f64::from(*v)),
            AttributeValue::Float64(v) => Some(*v),
            AttributeValue::String(s) => s.trim().parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }
}

/// Where an attribute's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttributeSource {
    /// Set directly by the driver.
    #[default]
    Driver,
    /// Read from a driver parameter.
    Param,
    /// Read from a process variable.
    EpicsPv,
    /// Computed by a user-supplied function.
    Function,
    /// Unknown origin.
    Undefined,
}

/// One named attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Unique (case-sensitive) name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Origin of the value.
    pub source: AttributeSource,
    /// Current value.
    pub value: AttributeValue,
}

impl Attribute {
    /// A driver-sourced attribute with an empty description.
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            source: AttributeSource::Driver,
            value,
        }
    }

    /// Builder-style description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder-style source.
    #[must_use]
    pub fn with_source(mut self, source: AttributeSource) -> Self {
        self.source = source;
        self
    }
}

/// Name-keyed attribute map carried by every frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeList {
    map: HashMap<String, Attribute>,
}

impl AttributeList {
    /// Empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute, replacing any attribute of the same name.
    pub fn add(&mut self, attribute: Attribute) {
        self.map.insert(attribute.name.clone(), attribute);
    }

    /// Set the value of `name`, creating a driver attribute if it is absent.
    pub fn set(&mut self, name: &str, value: AttributeValue) {
        match self.map.get_mut(name) {
            Some(existing) => existing.value = value,
            None => self.add(Attribute::new(name, value)),
        }
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Attribute> {
        self.map.get(name)
    }

    /// Remove an attribute; returns it if it was present.
    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.map.remove(name)
    }

    /// Remove every attribute, keeping the map's allocation.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of attributes.
    #[must_use]
    pub fn count(&self) -> usize {
        self.map.len()
    }

    /// True when no attributes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over attributes in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.map.values()
    }

    /// Merge every attribute into `out`.
    ///
    /// An attribute already present in `out` keeps its slot, description and
    /// source; only its value is overwritten. Missing names are inserted.
    /// Attributes in `out` that are not in `self` are left alone.
    pub fn copy_into(&self, out: &mut AttributeList) {
        for (name, attribute) in &self.map {
            match out.map.get_mut(name) {
                Some(existing) => existing.value.clone_from(&attribute.value),
                None => {
                    out.map.insert(name.clone(), attribute.clone());
                }
            }
        }
    }
}

/// Interpretation of a frame's axes as color data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorMode {
    /// Monochromatic image.
    #[default]
    Mono,
    /// Bayer pattern image, one value per pixel behind a color filter.
    Bayer,
    /// Pixel interleave, `[3, NX, NY]`.
    Rgb1,
    /// Row interleave, `[NX, 3, NY]`.
    Rgb2,
    /// Plane interleave, `[NX, NY, 3]`.
    Rgb3,
    /// YUV, 3 bytes per pixel.
    Yuv444,
    /// YUV, 4 bytes per 2 pixels.
    Yuv422,
    /// YUV, 6 bytes per 4 pixels.
    Yuv411,
}

impl ColorMode {
    /// Integer code stored in the `ColorMode` attribute.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            ColorMode::Mono => 0,
            ColorMode::Bayer => 1,
            ColorMode::Rgb1 => 2,
            ColorMode::Rgb2 => 3,
            ColorMode::Rgb3 => 4,
            ColorMode::Yuv444 => 5,
            ColorMode::Yuv422 => 6,
            ColorMode::Yuv411 => 7,
        }
    }

    /// Decode an attribute code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ColorMode::Mono),
            1 => Some(ColorMode::Bayer),
            2 => Some(ColorMode::Rgb1),
            3 => Some(ColorMode::Rgb2),
            4 => Some(ColorMode::Rgb3),
            5 => Some(ColorMode::Yuv444),
            6 => Some(ColorMode::Yuv422),
            7 => Some(ColorMode::Yuv411),
            _ => None,
        }
    }

    /// Physical index of the color axis for the interleaved RGB layouts.
    #[must_use]
    pub const fn color_axis(self) -> Option<usize> {
        match self {
            ColorMode::Rgb1 => Some(0),
            ColorMode::Rgb2 => Some(1),
            ColorMode::Rgb3 => Some(2),
            _ => None,
        }
    }

    /// Attribute value for this mode.
    #[must_use]
    pub const fn to_attribute(self) -> AttributeValue {
        AttributeValue::Int32(self.code())
    }
}

/// Filter layout for [`ColorMode::Bayer`] frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BayerPattern {
    /// First line RGRG, second line GBGB.
    #[default]
    Rggb,
    /// First line GBGB, second line RGRG.
    Gbrg,
    /// First line GRGR, second line BGBG.
    Grbg,
    /// First line BGBG, second line GRGR.
    Bggr,
}

impl BayerPattern {
    /// Decode an attribute code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(BayerPattern::Rggb),
            1 => Some(BayerPattern::Gbrg),
            2 => Some(BayerPattern::Grbg),
            3 => Some(BayerPattern::Bggr),
            _ => None,
        }
    }
}
