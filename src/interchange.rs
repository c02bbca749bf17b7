//! JSON interchange form of event records
//!
//! Used to author records by hand and to dump trace files in a readable
//! form. A record looks like:
//!
//! ```json
//! {"timestamp": 1000, "duration": 250, "type_index": 3,
//!  "numbers": {"width": 32, "values": [1000, -5, 130000]}}
//! ```
//!
//! with `"text": "..."` or `"stage": "range_start"` in place of
//! `"numbers"`. An omitted `width` means 64-bit source values.

use crate::config::TruncationPolicy;
use crate::error::{RecordError, Result};
use crate::event::{EventRecord, Stage};
use crate::store::VariantStore;
use crate::width::ElementWidth;
use serde::{Deserialize, Serialize};

/// Serializable view of an [`EventRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRepr {
    pub timestamp: i64,
    pub duration: i64,
    pub type_index: i32,
    #[serde(flatten)]
    pub payload: PayloadRepr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadRepr {
    Numbers {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<ElementWidth>,
        values: Vec<i64>,
    },
    Text(String),
    Stage(Stage),
}

impl RecordRepr {
    /// Build the record, running numbers through the width selector
    ///
    /// Every value must fit the declared width.
    pub fn to_record(&self, policy: TruncationPolicy) -> Result<EventRecord> {
        let payload = match &self.payload {
            PayloadRepr::Numbers { width, values } => {
                let width = width.unwrap_or(ElementWidth::W64);
                if let Some(&value) = values.iter().find(|&&v| !width.fits(v)) {
                    return Err(RecordError::ValueOutOfRange {
                        value,
                        width: width.bits(),
                    });
                }
                VariantStore::from_values(values.iter().copied(), values.len(), width, policy)?
            }
            PayloadRepr::Text(text) => VariantStore::from_bytes(text.as_bytes(), policy)?,
            PayloadRepr::Stage(stage) => VariantStore::single_byte(*stage as i8),
        };

        Ok(EventRecord::with_payload(
            self.timestamp,
            self.duration,
            self.type_index,
            payload,
        ))
    }
}

impl From<&EventRecord> for RecordRepr {
    /// Numbers at the stored width; text and stages are not distinguished
    /// from 8-bit numbers once stored
    fn from(record: &EventRecord) -> Self {
        RecordRepr {
            timestamp: record.timestamp(),
            duration: record.duration(),
            type_index: record.type_index(),
            payload: PayloadRepr::Numbers {
                width: Some(record.width()),
                values: record.elements().collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbers() {
        let json = r#"{"timestamp":1000,"duration":250,"type_index":3,
                       "numbers":{"width":32,"values":[1000,-5,130000]}}"#;
        let repr: RecordRepr = serde_json::from_str(json).unwrap();
        let record = repr.to_record(TruncationPolicy::Reject).unwrap();

        assert_eq!(record.timestamp(), 1000);
        assert_eq!(record.duration(), 250);
        assert_eq!(record.type_index(), 3);
        assert_eq!(record.width(), ElementWidth::W32);
        assert!(!record.is_inline());
        assert_eq!(record.numbers::<i32>(), vec![1000, -5, 130_000]);
    }

    #[test]
    fn test_parse_numbers_default_width() {
        let json = r#"{"timestamp":1,"duration":0,"type_index":0,"numbers":{"values":[1,2,3]}}"#;
        let repr: RecordRepr = serde_json::from_str(json).unwrap();
        let record = repr.to_record(TruncationPolicy::Reject).unwrap();
        // 24 bytes at 64 bits squeezes down to 6 bytes at 16 bits
        assert_eq!(record.width(), ElementWidth::W16);
        assert!(record.is_inline());
    }

    #[test]
    fn test_parse_text_and_stage() {
        let json = r#"{"timestamp":1,"duration":0,"type_index":0,"text":"abc"}"#;
        let repr: RecordRepr = serde_json::from_str(json).unwrap();
        let record = repr.to_record(TruncationPolicy::Reject).unwrap();
        assert_eq!(record.as_string().unwrap(), "abc");

        let json = r#"{"timestamp":1,"duration":0,"type_index":0,"stage":"range_end"}"#;
        let repr: RecordRepr = serde_json::from_str(json).unwrap();
        let record = repr.to_record(TruncationPolicy::Reject).unwrap();
        assert_eq!(record.stage().unwrap(), Stage::RangeEnd);
    }

    #[test]
    fn test_value_out_of_declared_width() {
        let json = r#"{"timestamp":1,"duration":0,"type_index":0,
                       "numbers":{"width":8,"values":[1,200]}}"#;
        let repr: RecordRepr = serde_json::from_str(json).unwrap();
        let err = repr.to_record(TruncationPolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            RecordError::ValueOutOfRange {
                value: 200,
                width: 8
            }
        ));
    }

    #[test]
    fn test_missing_payload_is_rejected() {
        let json = r#"{"timestamp":1,"duration":0,"type_index":0}"#;
        assert!(serde_json::from_str::<RecordRepr>(json).is_err());
    }

    #[test]
    fn test_from_record() {
        let record = EventRecord::from_numbers(7, 8, 9, &[1000i32, -5, 130_000]).unwrap();
        let repr = RecordRepr::from(&record);
        let json = serde_json::to_string(&repr).unwrap();
        assert_eq!(
            json,
            r#"{"timestamp":7,"duration":8,"type_index":9,"numbers":{"width":32,"values":[1000,-5,130000]}}"#
        );

        let back = repr.to_record(TruncationPolicy::Reject).unwrap();
        assert_eq!(back, record);
    }
}
