//! Element widths and the integer types that can be stored in a payload
//!
//! Every payload element is a signed integer of one of four standard
//! widths. The squeeze step moves between them, always towards the
//! narrower end, and only when no element changes value.

use crate::error::{RecordError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit width of each payload element
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ElementWidth {
    W8 = 8,
    W16 = 16,
    W32 = 32,
    W64 = 64,
}

impl ElementWidth {
    /// All widths, narrowest first
    pub const ALL: [ElementWidth; 4] = [
        ElementWidth::W8,
        ElementWidth::W16,
        ElementWidth::W32,
        ElementWidth::W64,
    ];

    /// Width in bits; also the on-wire width code
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Size of one element in bytes
    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    /// Parse a width code (8, 16, 32 or 64)
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            8 => Ok(ElementWidth::W8),
            16 => Ok(ElementWidth::W16),
            32 => Ok(ElementWidth::W32),
            64 => Ok(ElementWidth::W64),
            other => Err(RecordError::InvalidWidthCode(other)),
        }
    }

    /// The next smaller standard width, if any
    pub fn narrower(self) -> Option<Self> {
        match self {
            ElementWidth::W8 => None,
            ElementWidth::W16 => Some(ElementWidth::W8),
            ElementWidth::W32 => Some(ElementWidth::W16),
            ElementWidth::W64 => Some(ElementWidth::W32),
        }
    }

    /// Whether `value` survives a narrow-then-widen round trip at this width
    pub fn fits(self, value: i64) -> bool {
        match self {
            ElementWidth::W8 => i8::try_from(value).is_ok(),
            ElementWidth::W16 => i16::try_from(value).is_ok(),
            ElementWidth::W32 => i32::try_from(value).is_ok(),
            ElementWidth::W64 => true,
        }
    }

    /// Narrowest width that holds `value` exactly
    pub fn minimal_for(value: i64) -> Self {
        Self::ALL
            .into_iter()
            .find(|w| w.fits(value))
            .unwrap_or(ElementWidth::W64)
    }
}

impl TryFrom<u8> for ElementWidth {
    type Error = RecordError;

    fn try_from(bits: u8) -> Result<Self> {
        Self::from_bits(bits)
    }
}

impl From<ElementWidth> for u8 {
    fn from(width: ElementWidth) -> u8 {
        width.bits()
    }
}

impl fmt::Display for ElementWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i8 {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
}

/// Signed integer type usable as a payload element
///
/// Implemented for `i8`, `i16`, `i32` and `i64`. The associated width is
/// the source width handed to the width selector.
pub trait Element: Copy + Default + Into<i64> + sealed::Sealed + 'static {
    const WIDTH: ElementWidth;

    /// Convert from `i64`, wrapping like an `as` cast when narrowing
    fn wrap_from(value: i64) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $width:expr) => {
        impl Element for $ty {
            const WIDTH: ElementWidth = $width;

            #[inline]
            fn wrap_from(value: i64) -> Self {
                value as $ty
            }
        }
    };
}

impl_element!(i8, ElementWidth::W8);
impl_element!(i16, ElementWidth::W16);
impl_element!(i32, ElementWidth::W32);
impl_element!(i64, ElementWidth::W64);
