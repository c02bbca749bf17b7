//! Inline-or-external payload storage and the width selector
//!
//! A payload holds up to 65535 signed integers of one width. When the
//! payload fits in [`INLINE_CAPACITY`] bytes it lives inside the record
//! itself; otherwise it is placed in an owned heap buffer.
//!
//! # Width selection
//!
//! ```text
//! source width W, len elements
//!   ├─ len * W/8 <= 8          → inline at W (no further shrinking)
//!   ├─ all elements fit in W/2 → retry at W/2
//!   └─ otherwise               → external buffer at W
//! ```
//!
//! Narrowing is only ever lossless: an element moves to a smaller width
//! only when every element of the payload keeps its exact value.

use crate::config::TruncationPolicy;
use crate::error::{RecordError, Result};
use crate::width::{Element, ElementWidth};

/// Bytes available for payload data inside the record
pub const INLINE_CAPACITY: usize = 8;

/// Maximum number of payload elements
pub const MAX_LEN: usize = u16::MAX as usize;

/// Typed backing of a payload
///
/// Inline variants carry a fixed array whose slots beyond the payload
/// length are zero. External variants own a boxed slice of exactly the
/// payload length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    Inline8([i8; INLINE_CAPACITY]),
    Inline16([i16; INLINE_CAPACITY / 2]),
    Inline32([i32; INLINE_CAPACITY / 4]),
    Inline64([i64; INLINE_CAPACITY / 8]),
    External8(Box<[i8]>),
    External16(Box<[i16]>),
    External32(Box<[i32]>),
    External64(Box<[i64]>),
}

/// Payload of an event record: element count plus typed storage
///
/// Equality compares logical values, not the stored width or placement.
#[derive(Debug, Clone)]
pub struct VariantStore {
    len: u16,
    storage: Storage,
}

impl PartialEq for VariantStore {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl Eq for VariantStore {}

impl Default for VariantStore {
    fn default() -> Self {
        VariantStore {
            len: 0,
            storage: Storage::Inline8([0; INLINE_CAPACITY]),
        }
    }
}

impl VariantStore {
    /// Build a store from a homogeneous slice, squeezing when it overflows
    ///
    /// ```
    /// use tracepack::config::TruncationPolicy;
    /// use tracepack::store::VariantStore;
    /// use tracepack::width::ElementWidth;
    ///
    /// let store = VariantStore::from_elements(&[1000i32, -5, 130_000], TruncationPolicy::Reject)?;
    /// assert_eq!(store.width(), ElementWidth::W32);
    /// assert!(!store.is_inline());
    /// # Ok::<(), tracepack::RecordError>(())
    /// ```
    pub fn from_elements<N: Element>(items: &[N], policy: TruncationPolicy) -> Result<Self> {
        Self::from_values(
            items.iter().map(|&item| item.into()),
            items.len(),
            N::WIDTH,
            policy,
        )
    }

    /// Build a store from the bytes of a string (8-bit path)
    pub fn from_bytes(bytes: &[u8], policy: TruncationPolicy) -> Result<Self> {
        Self::from_values(
            bytes.iter().map(|&b| b as i8 as i64),
            bytes.len(),
            ElementWidth::W8,
            policy,
        )
    }

    /// A single inline 8-bit element
    pub fn single_byte(value: i8) -> Self {
        let mut slots = [0i8; INLINE_CAPACITY];
        slots[0] = value;
        VariantStore {
            len: 1,
            storage: Storage::Inline8(slots),
        }
    }

    /// Build a store from values already known to fit `source`
    pub(crate) fn from_values<I>(
        values: I,
        count: usize,
        source: ElementWidth,
        policy: TruncationPolicy,
    ) -> Result<Self>
    where
        I: Iterator<Item = i64> + Clone,
    {
        let len = checked_len(count, policy)?;
        let values = values.take(len);
        let width = select_width(values.clone(), len, source);
        Self::build(values, len, width)
    }

    fn build<I: Iterator<Item = i64>>(values: I, len: usize, width: ElementWidth) -> Result<Self> {
        let storage = match (width, fits_inline(len, width)) {
            (ElementWidth::W8, true) => Storage::Inline8(fill_inline(values)),
            (ElementWidth::W16, true) => Storage::Inline16(fill_inline(values)),
            (ElementWidth::W32, true) => Storage::Inline32(fill_inline(values)),
            (ElementWidth::W64, true) => Storage::Inline64(fill_inline(values)),
            (ElementWidth::W8, false) => Storage::External8(fill_external(values, len)?),
            (ElementWidth::W16, false) => Storage::External16(fill_external(values, len)?),
            (ElementWidth::W32, false) => Storage::External32(fill_external(values, len)?),
            (ElementWidth::W64, false) => Storage::External64(fill_external(values, len)?),
        };

        Ok(VariantStore {
            len: len as u16,
            storage,
        })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stored element width
    pub fn width(&self) -> ElementWidth {
        match self.storage {
            Storage::Inline8(_) | Storage::External8(_) => ElementWidth::W8,
            Storage::Inline16(_) | Storage::External16(_) => ElementWidth::W16,
            Storage::Inline32(_) | Storage::External32(_) => ElementWidth::W32,
            Storage::Inline64(_) | Storage::External64(_) => ElementWidth::W64,
        }
    }

    /// Whether the payload lives inside the record
    pub fn is_inline(&self) -> bool {
        matches!(
            self.storage,
            Storage::Inline8(_) | Storage::Inline16(_) | Storage::Inline32(_) | Storage::Inline64(_)
        )
    }

    /// Bytes of payload data at the stored width
    pub fn payload_bytes(&self) -> usize {
        self.len() * self.width().bytes()
    }

    /// Bytes owned on the heap (zero for inline payloads)
    pub fn heap_bytes(&self) -> usize {
        if self.is_inline() {
            0
        } else {
            self.payload_bytes()
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Element `index` from the active backing, widened to `i64`
    ///
    /// No check against the payload length; `index` must be below
    /// [`len`](Self::len).
    pub fn read_raw(&self, index: usize) -> i64 {
        match &self.storage {
            Storage::Inline8(slots) => slots[index] as i64,
            Storage::Inline16(slots) => slots[index] as i64,
            Storage::Inline32(slots) => slots[index] as i64,
            Storage::Inline64(slots) => slots[index],
            Storage::External8(buf) => buf[index] as i64,
            Storage::External16(buf) => buf[index] as i64,
            Storage::External32(buf) => buf[index] as i64,
            Storage::External64(buf) => buf[index],
        }
    }

    /// Element `index`, or 0 past the end of the payload
    pub fn get(&self, index: usize) -> i64 {
        if index >= self.len() {
            0
        } else {
            self.read_raw(index)
        }
    }

    /// All elements in order, widened to `i64`
    pub fn iter(&self) -> impl Iterator<Item = i64> + Clone + '_ {
        (0..self.len()).map(move |i| self.read_raw(i))
    }

    /// The raw 8-bit elements, if the payload is stored at 8 bits
    pub fn bytes(&self) -> Option<&[i8]> {
        match &self.storage {
            Storage::Inline8(slots) => Some(&slots[..self.len()]),
            Storage::External8(buf) => Some(&buf[..]),
            _ => None,
        }
    }
}

/// Pick the element width for `len` values starting from `source`
///
/// Returns the first width on the narrowing chain that fits inline, or the
/// narrowest lossless width when every level needs the heap.
pub fn select_width<I>(values: I, len: usize, source: ElementWidth) -> ElementWidth
where
    I: Iterator<Item = i64> + Clone,
{
    let mut width = source;
    loop {
        if fits_inline(len, width) {
            return width;
        }
        match width.narrower() {
            Some(narrower) if values.clone().all(|v| narrower.fits(v)) => width = narrower,
            _ => return width,
        }
    }
}

fn fits_inline(len: usize, width: ElementWidth) -> bool {
    len * width.bytes() <= INLINE_CAPACITY
}

fn checked_len(count: usize, policy: TruncationPolicy) -> Result<usize> {
    if count <= MAX_LEN {
        return Ok(count);
    }
    match policy {
        TruncationPolicy::Reject => Err(RecordError::TooManyElements {
            len: count,
            max: MAX_LEN,
        }),
        TruncationPolicy::Clamp => {
            tracing::warn!(
                "Payload of {} elements clamped to {}; {} trailing elements dropped",
                count,
                MAX_LEN,
                count - MAX_LEN
            );
            Ok(MAX_LEN)
        }
    }
}

fn fill_inline<N: Element, const CAP: usize>(values: impl Iterator<Item = i64>) -> [N; CAP] {
    let mut slots = [N::default(); CAP];
    for (slot, value) in slots.iter_mut().zip(values) {
        *slot = N::wrap_from(value);
    }
    slots
}

fn fill_external<N: Element>(values: impl Iterator<Item = i64>, len: usize) -> Result<Box<[N]>> {
    let mut buf: Vec<N> = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| RecordError::Allocation {
            bytes: len * N::WIDTH.bytes(),
        })?;
    buf.extend(values.map(N::wrap_from));
    Ok(buf.into_boxed_slice())
}
