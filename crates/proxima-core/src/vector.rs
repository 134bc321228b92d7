//! Typed vector values and borrowed views.
//!
//! A [`Vector`] owns its components in the index's element encoding; a
//! [`VectorView`] borrows them. Both carry their encoding in the type so that
//! distance kernels never reinterpret raw bytes, and both know their length
//! so a dimension check is a single comparison.

use crate::error::{Error, Result};
use crate::property::ObjectType;

/// An owned vector in one of the supported element encodings.
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    /// Single-precision components.
    Float(Vec<f32>),
    /// Unsigned byte components.
    Uint8(Vec<u8>),
}

impl Vector {
    /// Encodes host values into `object_type`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a value is not finite, or, for `Uint8`,
    /// is not an integer in `0..=255`. Nothing is allocated on failure.
    pub fn encode(values: &[f64], object_type: ObjectType) -> Result<Self> {
        match object_type {
            ObjectType::Float => {
                let mut out = Vec::new();
                out.try_reserve_exact(values.len())?;
                for (i, &value) in values.iter().enumerate() {
                    let component = value as f32;
                    if !component.is_finite() {
                        return Err(Error::InvalidArgument(format!(
                            "component {i} ({value}) is not a finite f32"
                        )));
                    }
                    out.push(component);
                }
                Ok(Self::Float(out))
            }
            ObjectType::Uint8 => {
                let mut out = Vec::new();
                out.try_reserve_exact(values.len())?;
                for (i, &value) in values.iter().enumerate() {
                    if !(0.0..=255.0).contains(&value) || value.fract() != 0.0 {
                        return Err(Error::InvalidArgument(format!(
                            "component {i} ({value}) is not an integer in 0..=255"
                        )));
                    }
                    out.push(value as u8);
                }
                Ok(Self::Uint8(out))
            }
        }
    }

    /// Returns the element encoding.
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        match self {
            Self::Float(_) => ObjectType::Float,
            Self::Uint8(_) => ObjectType::Uint8,
        }
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Uint8(v) => v.len(),
        }
    }

    /// Returns true if the vector has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the vector.
    #[must_use]
    pub fn view(&self) -> VectorView<'_> {
        match self {
            Self::Float(v) => VectorView::Float(v),
            Self::Uint8(v) => VectorView::Uint8(v),
        }
    }

    /// Returns the components as `f32`, if this is a float vector.
    #[must_use]
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::Float(v) => Some(v),
            Self::Uint8(_) => None,
        }
    }

    /// Returns the components as bytes, if this is a byte vector.
    #[must_use]
    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            Self::Uint8(v) => Some(v),
            Self::Float(_) => None,
        }
    }

    /// Components widened to `f64`, the host-side representation.
    #[must_use]
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Self::Float(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::Uint8(v) => v.iter().map(|&x| f64::from(x)).collect(),
        }
    }

    /// Checks encoding and length against the index configuration.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` on a length mismatch, `InvalidArgument` on an
    /// encoding mismatch.
    pub fn check(&self, dimension: usize, object_type: ObjectType) -> Result<()> {
        self.view().check(dimension, object_type)
    }
}

impl From<Vec<f32>> for Vector {
    fn from(v: Vec<f32>) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<u8>> for Vector {
    fn from(v: Vec<u8>) -> Self {
        Self::Uint8(v)
    }
}

/// Borrowed, encoding-tagged view of a vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VectorView<'a> {
    /// Single-precision components.
    Float(&'a [f32]),
    /// Unsigned byte components.
    Uint8(&'a [u8]),
}

impl VectorView<'_> {
    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Uint8(v) => v.len(),
        }
    }

    /// Returns true if the view has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the element encoding.
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        match self {
            Self::Float(_) => ObjectType::Float,
            Self::Uint8(_) => ObjectType::Uint8,
        }
    }

    /// Copies the view into an owned vector.
    #[must_use]
    pub fn to_owned_vector(&self) -> Vector {
        match self {
            Self::Float(v) => Vector::Float(v.to_vec()),
            Self::Uint8(v) => Vector::Uint8(v.to_vec()),
        }
    }

    /// See [`Vector::check`].
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` or `InvalidArgument`.
    pub fn check(&self, dimension: usize, object_type: ObjectType) -> Result<()> {
        if self.object_type() != object_type {
            return Err(Error::InvalidArgument(format!(
                "object type mismatch: index stores {:?}, got {:?}",
                object_type,
                self.object_type()
            )));
        }
        if self.len() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: self.len(),
            });
        }
        Ok(())
    }
}
