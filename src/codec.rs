//! Binary encoding of event records
//!
//! # Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! offset  size  field
//! 0       8     timestamp   (i64)
//! 8       8     duration    (i64)
//! 16      4     type_index  (i32)
//! 20      1     width code  (8, 16, 32 or 64)
//! 21      2     len         (u16)
//! 23      len * width/8 bytes of elements
//! ```
//!
//! Elements are written at the canonical width: the narrowest standard
//! width that holds every element exactly. The in-memory width and the
//! inline/external choice never leak into the encoding, so equal logical
//! payloads encode to identical bytes.

use crate::config::TruncationPolicy;
use crate::error::{RecordError, Result};
use crate::event::EventRecord;
use crate::store::VariantStore;
use crate::width::ElementWidth;
use std::io::{self, Read, Write};

/// Size of the fixed record header
pub const HEADER_LEN: usize = 23;

const WIDTH_OFFSET: usize = 20;
const LEN_OFFSET: usize = 21;

/// Narrowest width that represents every payload element exactly
pub fn canonical_width(payload: &VariantStore) -> ElementWidth {
    payload
        .iter()
        .map(ElementWidth::minimal_for)
        .max()
        .unwrap_or(ElementWidth::W8)
}

/// Number of bytes [`encode`] appends for `record`
pub fn encoded_len(record: &EventRecord) -> usize {
    HEADER_LEN + record.len() * canonical_width(record.payload()).bytes()
}

/// Append the encoding of `record` to `out`
pub fn encode(record: &EventRecord, out: &mut Vec<u8>) {
    let width = canonical_width(record.payload());
    out.reserve(HEADER_LEN + record.len() * width.bytes());

    out.extend_from_slice(&record.timestamp().to_le_bytes());
    out.extend_from_slice(&record.duration().to_le_bytes());
    out.extend_from_slice(&record.type_index().to_le_bytes());
    out.push(width.bits());
    out.extend_from_slice(&(record.len() as u16).to_le_bytes());

    for value in record.elements() {
        match width {
            ElementWidth::W8 => out.push(value as i8 as u8),
            ElementWidth::W16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
            ElementWidth::W32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
            ElementWidth::W64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Encode `record` into a fresh buffer
pub fn encode_to_vec(record: &EventRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(record));
    encode(record, &mut out);
    out
}

/// Decode one record from the front of `input`
///
/// Returns the record and the number of bytes consumed. The payload is
/// rebuilt through the width selector, so it may come back squeezed.
///
/// ```
/// use tracepack::codec::{decode, encode_to_vec};
/// use tracepack::event::EventRecord;
///
/// # fn main() -> tracepack::Result<()> {
/// let record = EventRecord::from_numbers(5, 6, 7, &[1000i32, -5, 130_000])?;
/// let bytes = encode_to_vec(&record);
/// let (decoded, consumed) = decode(&bytes)?;
/// assert_eq!(consumed, bytes.len());
/// assert_eq!(decoded.numbers::<i32>(), vec![1000, -5, 130_000]);
/// # Ok(())
/// # }
/// ```
pub fn decode(input: &[u8]) -> Result<(EventRecord, usize)> {
    let mut reader = SliceReader::new(input);

    let timestamp = i64::from_le_bytes(reader.array()?);
    let duration = i64::from_le_bytes(reader.array()?);
    let type_index = i32::from_le_bytes(reader.array()?);
    let code = reader.array::<1>()?[0];
    let width = ElementWidth::from_bits(code)?;
    let len = u16::from_le_bytes(reader.array()?) as usize;

    let body = reader.take(len * width.bytes())?;
    let values = body
        .chunks_exact(width.bytes())
        .map(move |chunk| read_element(chunk, width));
    let payload = VariantStore::from_values(values, len, width, TruncationPolicy::Reject)?;

    Ok((
        EventRecord::with_payload(timestamp, duration, type_index, payload),
        reader.position(),
    ))
}

/// Write one encoded record to `writer`
pub fn write_record<W: Write>(writer: &mut W, record: &EventRecord) -> Result<()> {
    writer.write_all(&encode_to_vec(record))?;
    Ok(())
}

/// Read one record from `reader`
///
/// Returns `Ok(None)` on a clean end of input at a record boundary; a
/// partial record is an [`RecordError::UnexpectedEof`].
pub fn read_record<R: Read>(reader: &mut R) -> Result<Option<EventRecord>> {
    let mut header = [0u8; HEADER_LEN];
    let filled = read_fully(reader, &mut header)?;
    if filled == 0 {
        return Ok(None);
    }
    if filled < HEADER_LEN {
        return Err(RecordError::UnexpectedEof {
            needed: HEADER_LEN,
            available: filled,
        });
    }

    let width = ElementWidth::from_bits(header[WIDTH_OFFSET])?;
    let len = u16::from_le_bytes([header[LEN_OFFSET], header[LEN_OFFSET + 1]]) as usize;
    let body_len = len * width.bytes();

    let mut buf = Vec::with_capacity(HEADER_LEN + body_len);
    buf.extend_from_slice(&header);
    buf.resize(HEADER_LEN + body_len, 0);
    let filled = read_fully(reader, &mut buf[HEADER_LEN..])?;
    if filled < body_len {
        return Err(RecordError::UnexpectedEof {
            needed: body_len,
            available: filled,
        });
    }

    let (record, _) = decode(&buf)?;
    Ok(Some(record))
}

fn read_element(chunk: &[u8], width: ElementWidth) -> i64 {
    match width {
        ElementWidth::W8 => chunk[0] as i8 as i64,
        ElementWidth::W16 => i16::from_le_bytes(le_array(chunk)) as i64,
        ElementWidth::W32 => i32::from_le_bytes(le_array(chunk)) as i64,
        ElementWidth::W64 => i64::from_le_bytes(le_array(chunk)),
    }
}

fn le_array<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&chunk[..N]);
    bytes
}

/// Like `read_exact`, but reports how many bytes were read before EOF
pub(crate) fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

struct SliceReader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    fn new(input: &'a [u8]) -> Self {
        SliceReader { input, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.input.len() - self.pos;
        if available < n {
            return Err(RecordError::UnexpectedEof {
                needed: n,
                available,
            });
        }
        let bytes = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.take(N).map(le_array)
    }

    fn position(&self) -> usize {
        self.pos
    }
}
