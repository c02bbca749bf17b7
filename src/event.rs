//! Timestamped trace event record
//!
//! An [`EventRecord`] carries a timestamp, a duration, an index into an
//! external type table and a small payload. The payload is either a
//! sequence of integers, a UTF-8 string, or a single [`Stage`] byte, and is
//! stored by a [`VariantStore`] so that short payloads never allocate.
//!
//! # Example
//!
//! ```
//! use tracepack::event::EventRecord;
//! use tracepack::width::ElementWidth;
//!
//! # fn main() -> tracepack::Result<()> {
//! let record = EventRecord::from_numbers(1_000, 250, 3, &[1i32, 2, 3, 4])?;
//! assert!(record.is_valid());
//! assert_eq!(record.width(), ElementWidth::W8);
//! assert!(record.is_inline());
//! assert_eq!(record.element_at(2), 3);
//! assert_eq!(record.element_at(9), 0);
//! # Ok(())
//! # }
//! ```

use crate::config::TruncationPolicy;
use crate::error::{RecordError, Result};
use crate::store::{VariantStore, MAX_LEN};
use crate::width::{Element, ElementWidth};
use serde::{Deserialize, Serialize};

/// Timestamp marking an invalid (default) record
pub const INVALID_TIMESTAMP: i64 = -1;

/// Stage of a ranged profiler event, stored as a single payload byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Stage {
    Event = 0,
    RangeStart = 1,
    RangeData = 2,
    RangeLocation = 3,
    RangeEnd = 4,
    Complete = 5,
    PixmapCacheEvent = 6,
    SceneGraphFrame = 7,
    MemoryAllocation = 8,
    DebugMessage = 9,
    Quick3DEvent = 10,
}

impl TryFrom<u8> for Stage {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Stage::Event,
            1 => Stage::RangeStart,
            2 => Stage::RangeData,
            3 => Stage::RangeLocation,
            4 => Stage::RangeEnd,
            5 => Stage::Complete,
            6 => Stage::PixmapCacheEvent,
            7 => Stage::SceneGraphFrame,
            8 => Stage::MemoryAllocation,
            9 => Stage::DebugMessage,
            10 => Stage::Quick3DEvent,
            other => return Err(RecordError::UnknownStage(other)),
        })
    }
}

/// A single trace event
///
/// Cloning deep-copies any external payload buffer; two records never
/// share storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    timestamp: i64,
    duration: i64,
    type_index: i32,
    payload: VariantStore,
}

impl Default for EventRecord {
    fn default() -> Self {
        EventRecord {
            timestamp: INVALID_TIMESTAMP,
            duration: 0,
            type_index: -1,
            payload: VariantStore::default(),
        }
    }
}

impl EventRecord {
    /// Create a record from a homogeneous integer sequence
    ///
    /// Sequences longer than 65535 elements are rejected.
    pub fn from_numbers<N: Element>(
        timestamp: i64,
        duration: i64,
        type_index: i32,
        numbers: &[N],
    ) -> Result<Self> {
        Ok(Self::with_payload(
            timestamp,
            duration,
            type_index,
            VariantStore::from_elements(numbers, TruncationPolicy::Reject)?,
        ))
    }

    /// Create a record whose payload is the UTF-8 bytes of `text`
    pub fn from_text(timestamp: i64, duration: i64, type_index: i32, text: &str) -> Result<Self> {
        Ok(Self::with_payload(
            timestamp,
            duration,
            type_index,
            VariantStore::from_bytes(text.as_bytes(), TruncationPolicy::Reject)?,
        ))
    }

    /// Create a record carrying a single stage byte
    pub fn from_stage(timestamp: i64, duration: i64, type_index: i32, stage: Stage) -> Self {
        Self::with_payload(
            timestamp,
            duration,
            type_index,
            VariantStore::single_byte(stage as i8),
        )
    }

    /// Create a record around an already built payload
    pub fn with_payload(
        timestamp: i64,
        duration: i64,
        type_index: i32,
        payload: VariantStore,
    ) -> Self {
        EventRecord {
            timestamp,
            duration,
            type_index,
            payload,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: i64) {
        self.duration = duration;
    }

    pub fn type_index(&self) -> i32 {
        self.type_index
    }

    pub fn set_type_index(&mut self, type_index: i32) {
        self.type_index = type_index;
    }

    /// A record is valid unless its timestamp is the `-1` sentinel
    pub fn is_valid(&self) -> bool {
        self.timestamp != INVALID_TIMESTAMP
    }

    pub fn payload(&self) -> &VariantStore {
        &self.payload
    }

    /// Move the payload out, leaving an empty inline payload behind
    pub fn take_payload(&mut self) -> VariantStore {
        std::mem::take(&mut self.payload)
    }

    /// Number of payload elements
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn width(&self) -> ElementWidth {
        self.payload.width()
    }

    pub fn is_inline(&self) -> bool {
        self.payload.is_inline()
    }

    pub fn heap_bytes(&self) -> usize {
        self.payload.heap_bytes()
    }

    /// Element `index` widened to `i64`; 0 past the end of the payload
    ///
    /// Trailing zeroes can be omitted from a payload since reads past the
    /// end are defined as zero.
    pub fn element_at(&self, index: usize) -> i64 {
        self.payload.get(index)
    }

    /// Element `index` converted to `N`, wrapping if `N` is narrower than
    /// the value
    pub fn number<N: Element>(&self, index: usize) -> N {
        N::wrap_from(self.element_at(index))
    }

    /// All payload elements converted to `N`
    pub fn numbers<N: Element>(&self) -> Vec<N> {
        self.payload.iter().map(N::wrap_from).collect()
    }

    /// All payload elements widened to `i64`
    pub fn elements(&self) -> impl Iterator<Item = i64> + Clone + '_ {
        self.payload.iter()
    }

    /// Overwrite element `index`, zero-extending the payload if needed
    ///
    /// The whole payload is re-run through the width selector starting at
    /// the wider of `N`'s width and the stored width, so existing elements
    /// keep their values while storage may grow or shrink.
    pub fn set_number<N: Element>(&mut self, index: usize, value: N) -> Result<()> {
        if index >= MAX_LEN {
            return Err(RecordError::IndexOutOfRange {
                index,
                max: MAX_LEN,
            });
        }

        let mut values: Vec<i64> = self.elements().collect();
        if index >= values.len() {
            values.resize(index + 1, 0);
        }
        values[index] = value.into();

        let source = N::WIDTH.max(self.width());
        self.payload = VariantStore::from_values(
            values.iter().copied(),
            values.len(),
            source,
            TruncationPolicy::Reject,
        )?;
        Ok(())
    }

    /// Replace the payload with `numbers`, rejecting oversized input
    pub fn set_numbers<N: Element>(&mut self, numbers: &[N]) -> Result<()> {
        self.set_numbers_with(numbers, TruncationPolicy::Reject)
    }

    /// Replace the payload with `numbers` under the given truncation policy
    ///
    /// On error the record is left unchanged.
    pub fn set_numbers_with<N: Element>(
        &mut self,
        numbers: &[N],
        policy: TruncationPolicy,
    ) -> Result<()> {
        self.payload = VariantStore::from_elements(numbers, policy)?;
        Ok(())
    }

    /// Interpret the payload as UTF-8 text
    ///
    /// Requires 8-bit storage. Invalid UTF-8 sequences are replaced with
    /// U+FFFD.
    pub fn as_string(&self) -> Result<String> {
        let bytes = self.payload.bytes().ok_or(RecordError::NotText {
            width: self.width().bits(),
        })?;
        let bytes: Vec<u8> = bytes.iter().map(|&b| b as u8).collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Replace the payload with the bytes of `text`
    pub fn set_text(&mut self, text: &str) -> Result<()> {
        self.set_text_with(text, TruncationPolicy::Reject)
    }

    pub fn set_text_with(&mut self, text: &str, policy: TruncationPolicy) -> Result<()> {
        self.payload = VariantStore::from_bytes(text.as_bytes(), policy)?;
        Ok(())
    }

    /// The stage byte; requires a single inline 8-bit element
    pub fn stage(&self) -> Result<Stage> {
        match self.payload.bytes() {
            Some([byte]) if self.payload.is_inline() => Stage::try_from(*byte as u8),
            _ => Err(RecordError::NotStage {
                width: self.width().bits(),
                len: self.len() as u16,
            }),
        }
    }

    pub fn set_stage(&mut self, stage: Stage) {
        self.payload = VariantStore::single_byte(stage as i8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_invalid() {
        let record = EventRecord::default();
        assert!(!record.is_valid());
        assert_eq!(record.timestamp(), -1);
        assert_eq!(record.duration(), 0);
        assert_eq!(record.type_index(), -1);
        assert!(record.is_empty());
        assert!(record.is_inline());
    }

    #[test]
    fn test_negative_timestamps_other_than_sentinel_are_valid() {
        let record = EventRecord::from_numbers::<i8>(-2, 0, 0, &[]).unwrap();
        assert!(record.is_valid());
    }

    #[test]
    fn test_three_wide_values_go_external() {
        let record = EventRecord::from_numbers(10, 5, 1, &[1000i32, -5, 130_000]).unwrap();
        assert_eq!(record.width(), ElementWidth::W32);
        assert!(!record.is_inline());
        assert_eq!(record.element_at(0), 1000);
        assert_eq!(record.element_at(1), -5);
        assert_eq!(record.element_at(2), 130_000);
        assert_eq!(record.element_at(3), 0);
    }

    #[test]
    fn test_small_values_inline() {
        let record = EventRecord::from_numbers(10, 5, 1, &[1i8, 2, 3, 4]).unwrap();
        assert_eq!(record.width(), ElementWidth::W8);
        assert!(record.is_inline());
        assert_eq!(record.heap_bytes(), 0);
        assert_eq!(record.numbers::<i64>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_text_roundtrip() {
        let record = EventRecord::from_text(1, 2, 3, "abc").unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.width(), ElementWidth::W8);
        assert_eq!(record.as_string().unwrap(), "abc");
    }

    #[test]
    fn test_long_text_is_external() {
        let text = "a considerably longer string with ünïcödé";
        let record = EventRecord::from_text(1, 2, 3, text).unwrap();
        assert!(!record.is_inline());
        assert_eq!(record.len(), text.len());
        assert_eq!(record.as_string().unwrap(), text);
    }

    #[test]
    fn test_as_string_rejects_wide_payload() {
        let record = EventRecord::from_numbers(1, 2, 3, &[1i32, 70_000]).unwrap();
        assert!(matches!(
            record.as_string(),
            Err(RecordError::NotText { width: 32 })
        ));
    }

    #[test]
    fn test_as_string_replaces_invalid_utf8() {
        let record = EventRecord::from_numbers(1, 2, 3, &[0x61i8, -1, 0x62]).unwrap();
        assert_eq!(record.as_string().unwrap(), "a\u{FFFD}b");
    }

    #[test]
    fn test_stage_roundtrip() {
        let mut record = EventRecord::from_stage(1, 0, 7, Stage::RangeEnd);
        assert_eq!(record.stage().unwrap(), Stage::RangeEnd);
        assert_eq!(record.len(), 1);

        record.set_stage(Stage::Quick3DEvent);
        assert_eq!(record.stage().unwrap(), Stage::Quick3DEvent);
    }

    #[test]
    fn test_stage_on_wrong_payload() {
        let record = EventRecord::from_numbers(1, 0, 0, &[1i8, 2]).unwrap();
        assert!(matches!(
            record.stage(),
            Err(RecordError::NotStage { width: 8, len: 2 })
        ));

        let record = EventRecord::from_numbers(1, 0, 0, &[1i16]).unwrap();
        assert!(matches!(
            record.stage(),
            Err(RecordError::NotStage { width: 16, len: 1 })
        ));

        let record = EventRecord::from_numbers(1, 0, 0, &[42i8]).unwrap();
        assert!(matches!(record.stage(), Err(RecordError::UnknownStage(42))));
    }

    #[test]
    fn test_set_number_extends_with_zeroes() {
        let mut record = EventRecord::from_numbers(1, 0, 0, &[5i8]).unwrap();
        record.set_number(3, 9i8).unwrap();
        assert_eq!(record.numbers::<i8>(), vec![5, 0, 0, 9]);
        assert!(record.is_inline());
    }

    #[test]
    fn test_set_number_grows_width() {
        let mut record = EventRecord::from_numbers(1, 0, 0, &[1i8, 2, 3]).unwrap();
        record.set_number(1, 100_000i64).unwrap();
        assert_eq!(record.width(), ElementWidth::W32);
        assert!(!record.is_inline());
        assert_eq!(record.numbers::<i64>(), vec![1, 100_000, 3]);
    }

    #[test]
    fn test_set_narrow_number_into_wide_payload() {
        let mut record = EventRecord::from_numbers(1, 0, 0, &[1000i32, 70_000, 5]).unwrap();
        record.set_number(2, 7i8).unwrap();

        assert_eq!(record.width(), ElementWidth::W32);
        assert!(!record.is_inline());
        assert_eq!(record.numbers::<i64>(), vec![1000, 70_000, 7]);
    }

    #[test]
    fn test_set_narrow_number_past_end_of_wide_payload() {
        let mut record = EventRecord::from_numbers(1, 0, 0, &[-40_000i32]).unwrap();
        record.set_number(2, -1i8).unwrap();
        assert_eq!(record.numbers::<i64>(), vec![-40_000, 0, -1]);
    }

    #[test]
    fn test_set_number_shrinks_back() {
        let mut record = EventRecord::from_numbers(1, 0, 0, &[1i64, 1 << 40, 3]).unwrap();
        assert_eq!(record.width(), ElementWidth::W64);
        assert!(!record.is_inline());

        record.set_number(1, 2i64).unwrap();
        assert_eq!(record.width(), ElementWidth::W16);
        assert!(record.is_inline());
        assert_eq!(record.numbers::<i64>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_set_number_index_limit() {
        let mut record = EventRecord::default();
        let err = record.set_number(MAX_LEN, 1i8).unwrap_err();
        assert!(matches!(err, RecordError::IndexOutOfRange { .. }));
        assert!(record.is_empty());
    }

    #[test]
    fn test_number_narrowing_wraps() {
        let record = EventRecord::from_numbers(1, 0, 0, &[300i16]).unwrap();
        assert_eq!(record.number::<i16>(0), 300);
        assert_eq!(record.number::<i8>(0), 44);
        assert_eq!(record.number::<i64>(5), 0);
    }

    #[test]
    fn test_failed_set_leaves_record_unchanged() {
        let mut record = EventRecord::from_numbers(1, 0, 0, &[1i8, 2]).unwrap();
        let too_long = vec![0i8; MAX_LEN + 1];
        assert!(record.set_numbers(&too_long).is_err());
        assert_eq!(record.numbers::<i8>(), vec![1, 2]);
    }

    #[test]
    fn test_clone_is_deep() {
        let original = EventRecord::from_numbers(1, 0, 0, &[1000i32, -5, 130_000]).unwrap();
        let mut copy = original.clone();
        copy.set_number(0, 7i32).unwrap();

        assert_eq!(original.element_at(0), 1000);
        assert_eq!(copy.element_at(0), 7);
    }

    #[test]
    fn test_take_payload_moves_buffer() {
        let mut record = EventRecord::from_text(1, 0, 0, "moved out of the record").unwrap();
        let payload = record.take_payload();
        assert!(record.is_empty());
        assert!(record.is_inline());
        assert_eq!(payload.len(), 23);
        assert!(!payload.is_inline());
    }

    #[test]
    fn test_record_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EventRecord>();
    }
}
