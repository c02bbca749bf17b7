//! Tracepack - compact, allocation-minimizing trace event records
//!
//! This library provides the event record used to capture high volumes of
//! timestamped profiler events. Short payloads are stored inside the record
//! itself; longer ones are squeezed to the narrowest lossless integer width
//! before falling back to a single owned heap buffer. Records encode to a
//! fixed little-endian layout and can be streamed into trace files.

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod interchange;
pub mod ring_buffer;
pub mod stats;
pub mod store;
pub mod trace_file;
pub mod width;

pub use error::{RecordError, Result};
pub use event::{EventRecord, Stage};
pub use width::{Element, ElementWidth};
