//! Trace files: a short header followed by encoded records
//!
//! ```text
//! "TPAK"  u16 version  record  record  record ...
//! ```
//!
//! Records are laid out back-to-back using the [`codec`](crate::codec)
//! encoding; the file ends at the end of the last record.

use crate::codec::{self, read_record, write_record};
use crate::error::{RecordError, Result};
use crate::event::EventRecord;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// File signature
pub const MAGIC: [u8; 4] = *b"TPAK";

/// Current format version
pub const FORMAT_VERSION: u16 = 1;

/// Size of the file header
pub const FILE_HEADER_LEN: usize = 6;

fn check_header(header: &[u8]) -> Result<()> {
    if header.len() < FILE_HEADER_LEN {
        return Err(RecordError::UnexpectedEof {
            needed: FILE_HEADER_LEN,
            available: header.len(),
        });
    }

    let magic = [header[0], header[1], header[2], header[3]];
    if magic != MAGIC {
        return Err(RecordError::BadMagic(magic));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(RecordError::UnsupportedVersion {
            expected: FORMAT_VERSION,
            found: version,
        });
    }
    Ok(())
}

/// Streaming trace file writer
pub struct TraceFileWriter<W: Write> {
    inner: W,
    records_written: u64,
}

impl TraceFileWriter<BufWriter<File>> {
    /// Create (or truncate) a trace file at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Creating trace file {}", path.display());
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> TraceFileWriter<W> {
    /// Wrap `inner`, writing the file header immediately
    pub fn new(mut inner: W) -> Result<Self> {
        inner.write_all(&MAGIC)?;
        inner.write_all(&FORMAT_VERSION.to_le_bytes())?;
        Ok(TraceFileWriter {
            inner,
            records_written: 0,
        })
    }

    pub fn write(&mut self, record: &EventRecord) -> Result<()> {
        write_record(&mut self.inner, record)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        tracing::debug!("Trace file closed after {} records", self.records_written);
        Ok(self.inner)
    }
}

/// Streaming trace file reader
///
/// Iterating yields records until the end of input; iteration stops after
/// the first error.
pub struct TraceFileReader<R: Read> {
    inner: R,
    records_read: u64,
    failed: bool,
}

impl TraceFileReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read> TraceFileReader<R> {
    /// Wrap `inner`, validating the file header
    pub fn new(mut inner: R) -> Result<Self> {
        let mut header = [0u8; FILE_HEADER_LEN];
        let filled = codec::read_fully(&mut inner, &mut header)?;
        check_header(&header[..filled])?;

        Ok(TraceFileReader {
            inner,
            records_read: 0,
            failed: false,
        })
    }

    /// Read the next record, or `None` at end of file
    pub fn next_record(&mut self) -> Result<Option<EventRecord>> {
        let record = read_record(&mut self.inner)?;
        if record.is_some() {
            self.records_read += 1;
        }
        Ok(record)
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

impl<R: Read> Iterator for TraceFileReader<R> {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.next_record().transpose();
        if matches!(next, Some(Err(_))) {
            self.failed = true;
        }
        next
    }
}

/// A trace file mapped into memory
///
/// Decoding reads straight from the mapping without buffering the file.
pub struct MappedTraceFile {
    mmap: Mmap,
}

impl MappedTraceFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // The mapping is read-only and only read through decode().
        let mmap = unsafe { Mmap::map(&file) }?;
        check_header(&mmap)?;
        tracing::debug!("Mapped trace file {} ({} bytes)", path.display(), mmap.len());
        Ok(MappedTraceFile { mmap })
    }

    /// Size of the file in bytes, header included
    pub fn len_bytes(&self) -> usize {
        self.mmap.len()
    }

    pub fn records(&self) -> MappedRecords<'_> {
        MappedRecords {
            remaining: &self.mmap[FILE_HEADER_LEN..],
            failed: false,
        }
    }
}

/// Iterator over the records of a [`MappedTraceFile`]
pub struct MappedRecords<'a> {
    remaining: &'a [u8],
    failed: bool,
}

impl Iterator for MappedRecords<'_> {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.is_empty() {
            return None;
        }
        match codec::decode(self.remaining) {
            Ok((record, consumed)) => {
                self.remaining = &self.remaining[consumed..];
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Stage;
    use std::io::Cursor;

    fn sample_records() -> Vec<EventRecord> {
        vec![
            EventRecord::from_numbers(100, 10, 0, &[1i64, 2, 3]).unwrap(),
            EventRecord::from_text(200, 0, 1, "Component.onCompleted").unwrap(),
            EventRecord::from_stage(300, 0, 2, Stage::RangeStart),
            EventRecord::default(),
        ]
    }

    #[test]
    fn test_writer_emits_header() {
        let writer = TraceFileWriter::new(Vec::new()).unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(bytes, b"TPAK\x01\x00");
    }

    #[test]
    fn test_roundtrip_in_memory() {
        let mut writer = TraceFileWriter::new(Vec::new()).unwrap();
        for record in &sample_records() {
            writer.write(record).unwrap();
        }
        assert_eq!(writer.records_written(), 4);

        let bytes = writer.into_inner().unwrap();
        let reader = TraceFileReader::new(Cursor::new(bytes)).unwrap();
        let decoded: Vec<EventRecord> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(decoded, sample_records());
    }

    #[test]
    fn test_bad_magic() {
        let err = TraceFileReader::new(Cursor::new(b"NOPE\x01\x00".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(err, RecordError::BadMagic(m) if &m == b"NOPE"));
    }

    #[test]
    fn test_unsupported_version() {
        let err = TraceFileReader::new(Cursor::new(b"TPAK\x02\x00".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RecordError::UnsupportedVersion {
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_short_header() {
        let err = TraceFileReader::new(Cursor::new(b"TP".to_vec())).err().unwrap();
        assert!(matches!(err, RecordError::UnexpectedEof { .. }));
    }

    /// Delivers one byte per read and is interrupted before every read
    struct StutteringReader {
        data: Vec<u8>,
        pos: usize,
        interrupt_next: bool,
    }

    impl Read for StutteringReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.interrupt_next = !self.interrupt_next;
            if self.interrupt_next {
                return Err(std::io::ErrorKind::Interrupted.into());
            }
            if self.pos >= self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn test_reader_retries_interrupted_reads() {
        let mut writer = TraceFileWriter::new(Vec::new()).unwrap();
        for record in &sample_records() {
            writer.write(record).unwrap();
        }
        let data = writer.into_inner().unwrap();

        let reader = TraceFileReader::new(StutteringReader {
            data,
            pos: 0,
            interrupt_next: false,
        })
        .unwrap();
        let decoded: Vec<EventRecord> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(decoded, sample_records());
    }

    #[test]
    fn test_truncated_record_stops_iteration() {
        let mut writer = TraceFileWriter::new(Vec::new()).unwrap();
        for record in &sample_records() {
            writer.write(record).unwrap();
        }
        let mut bytes = writer.into_inner().unwrap();
        bytes.truncate(bytes.len() - 5);

        let mut reader = TraceFileReader::new(Cursor::new(bytes)).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
        assert_eq!(reader.records_read(), 3);
    }

    #[test]
    fn test_mapped_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.tpk");

        let mut writer = TraceFileWriter::create(&path).unwrap();
        for record in &sample_records() {
            writer.write(record).unwrap();
        }
        writer.into_inner().unwrap();

        let mapped = MappedTraceFile::open(&path).unwrap();
        let decoded: Vec<EventRecord> = mapped.records().collect::<Result<_>>().unwrap();
        assert_eq!(decoded, sample_records());
        assert!(mapped.len_bytes() > FILE_HEADER_LEN);
    }
}
