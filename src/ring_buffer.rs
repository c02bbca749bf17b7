//! Lock-free hand-off queue between record producers and a writer thread
//!
//! Capture threads build records and move them into the ring buffer; a
//! sidecar thread drains the buffer in batches and hands them to a
//! [`RecordSink`] such as a [`TraceFileWriter`].
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ CAPTURE THREAD (hot path)                  │
//! │   EventRecord::from_numbers() → push()     │
//! └────────────────────────────────────────────┘
//!                      │  ArrayQueue (moves, never copies)
//!                      ▼
//! ┌────────────────────────────────────────────┐
//! │ SIDECAR THREAD (cold path)                 │
//! │   loop { drain(batch); sink.write_batch() }│
//! └────────────────────────────────────────────┘
//! ```
//!
//! The producer never blocks: when the buffer is full the record is
//! dropped and counted.

use crate::config::RingBufferConfig;
use crate::error::{RecordError, Result};
use crate::event::EventRecord;
use crate::trace_file::TraceFileWriter;
use crossbeam::queue::ArrayQueue;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Destination for records drained by the sidecar thread
pub trait RecordSink: Send + 'static {
    /// Consume every record in `batch`, leaving it empty
    fn write_batch(&mut self, batch: &mut Vec<EventRecord>) -> Result<()>;

    /// Called once after the last batch
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<EventRecord> {
    fn write_batch(&mut self, batch: &mut Vec<EventRecord>) -> Result<()> {
        self.append(batch);
        Ok(())
    }
}

impl<W: Write + Send + 'static> RecordSink for TraceFileWriter<W> {
    fn write_batch(&mut self, batch: &mut Vec<EventRecord>) -> Result<()> {
        for record in batch.drain(..) {
            self.write(&record)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()
    }
}

type SidecarOutcome<S> = (S, Option<RecordError>);

struct SidecarCounters {
    delivered: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

/// Bounded record queue with a sidecar thread feeding a sink
///
/// # Example
///
/// ```
/// use tracepack::config::RingBufferConfig;
/// use tracepack::event::EventRecord;
/// use tracepack::ring_buffer::RecordRingBuffer;
///
/// # fn main() -> tracepack::Result<()> {
/// let buffer = RecordRingBuffer::new(Vec::<EventRecord>::new(), RingBufferConfig::default());
/// buffer.push(EventRecord::from_numbers(1, 2, 3, &[4i32, 5])?);
///
/// let (sink, stats) = buffer.shutdown()?;
/// assert_eq!(sink.len(), 1);
/// assert_eq!(stats.total_delivered, 1);
/// # Ok(())
/// # }
/// ```
pub struct RecordRingBuffer<S: RecordSink> {
    queue: Arc<ArrayQueue<EventRecord>>,
    sidecar_handle: Option<JoinHandle<SidecarOutcome<S>>>,
    shutdown: Arc<AtomicBool>,
    total_pushed: AtomicU64,
    total_dropped: Arc<AtomicU64>,
    total_delivered: Arc<AtomicU64>,
}

impl<S: RecordSink> RecordRingBuffer<S> {
    /// Create a ring buffer and start its sidecar thread
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity` or `config.batch_size` is 0.
    pub fn new(sink: S, config: RingBufferConfig) -> Self {
        assert!(config.capacity > 0, "Ring buffer capacity must be > 0");
        assert!(config.batch_size > 0, "Ring buffer batch size must be > 0");

        let queue = Arc::new(ArrayQueue::new(config.capacity));
        let shutdown = Arc::new(AtomicBool::new(false));
        let total_dropped = Arc::new(AtomicU64::new(0));
        let total_delivered = Arc::new(AtomicU64::new(0));

        let queue_clone = queue.clone();
        let shutdown_clone = shutdown.clone();
        let counters = SidecarCounters {
            delivered: total_delivered.clone(),
            dropped: total_dropped.clone(),
        };
        let sidecar_handle = thread::spawn(move || {
            Self::sidecar_worker(queue_clone, shutdown_clone, counters, sink, config)
        });

        tracing::debug!(
            "Record ring buffer started (capacity {}, batch size {})",
            config.capacity,
            config.batch_size
        );

        Self {
            queue,
            sidecar_handle: Some(sidecar_handle),
            shutdown,
            total_pushed: AtomicU64::new(0),
            total_dropped,
            total_delivered,
        }
    }

    /// Move a record into the buffer (hot path)
    ///
    /// Returns `false` if the buffer was full and the record was dropped.
    pub fn push(&self, record: EventRecord) -> bool {
        self.total_pushed.fetch_add(1, Ordering::Relaxed);

        match self.queue.push(record) {
            Ok(()) => true,
            Err(_dropped) => {
                let dropped = self.total_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    "Ring buffer full - record dropped ({} dropped so far)",
                    dropped
                );
                false
            }
        }
    }

    /// Move a record into the buffer, handing it back if the buffer is full
    ///
    /// Unlike [`push`](Self::push) nothing is dropped or counted on failure,
    /// so the caller can retry with the returned record.
    pub fn try_push(&self, record: EventRecord) -> std::result::Result<(), EventRecord> {
        self.queue.push(record)?;
        self.total_pushed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stop the sidecar after it drains the buffer, returning the sink
    ///
    /// Fails with the first error the sink reported, if any.
    pub fn shutdown(mut self) -> Result<(S, BufferStats)> {
        self.shutdown.store(true, Ordering::SeqCst);

        let handle = self.sidecar_handle.take().ok_or_else(|| {
            RecordError::Io(std::io::Error::other("sidecar thread already stopped"))
        })?;
        let (sink, error) = handle
            .join()
            .map_err(|_| RecordError::Io(std::io::Error::other("sidecar thread panicked")))?;

        let stats = self.stats();
        tracing::debug!(
            "Record ring buffer stopped: {} pushed, {} delivered, {} dropped",
            stats.total_pushed,
            stats.total_delivered,
            stats.total_dropped
        );

        match error {
            Some(e) => Err(e),
            None => Ok((sink, stats)),
        }
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            total_pushed: self.total_pushed.load(Ordering::Relaxed),
            total_dropped: self.total_dropped.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            current_size: self.queue.len(),
            capacity: self.queue.capacity(),
        }
    }

    fn sidecar_worker(
        queue: Arc<ArrayQueue<EventRecord>>,
        shutdown: Arc<AtomicBool>,
        counters: SidecarCounters,
        mut sink: S,
        config: RingBufferConfig,
    ) -> SidecarOutcome<S> {
        let idle = Duration::from_millis(config.idle_sleep_ms);
        let mut batch = Vec::with_capacity(config.batch_size);
        let mut error = None;

        loop {
            // Read the flag before draining so nothing pushed earlier is missed
            let stopping = shutdown.load(Ordering::SeqCst);

            while let Some(record) = queue.pop() {
                batch.push(record);
                if batch.len() >= config.batch_size {
                    break;
                }
            }

            if batch.is_empty() {
                if stopping {
                    break;
                }
                thread::sleep(idle);
                continue;
            }

            let count = batch.len() as u64;
            if error.is_some() {
                // The sink is in an unknown state; keep draining but discard
                counters.dropped.fetch_add(count, Ordering::Relaxed);
            } else {
                match sink.write_batch(&mut batch) {
                    Ok(()) => {
                        counters.delivered.fetch_add(count, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Record sink failed on a batch of {}, discarding further records: {}",
                            count,
                            e
                        );
                        counters.dropped.fetch_add(count, Ordering::Relaxed);
                        error = Some(e);
                    }
                }
            }
            batch.clear();
        }

        if error.is_none() {
            if let Err(e) = sink.finish() {
                error = Some(e);
            }
        }
        (sink, error)
    }
}

impl<S: RecordSink> Drop for RecordRingBuffer<S> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(handle) = self.sidecar_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Ring buffer statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub total_pushed: u64,
    pub total_dropped: u64,
    pub total_delivered: u64,
    pub current_size: usize,
    pub capacity: usize,
}

impl BufferStats {
    /// Calculate drop rate (0.0 to 1.0)
    pub fn drop_rate(&self) -> f64 {
        if self.total_pushed == 0 {
            0.0
        } else {
            self.total_dropped as f64 / self.total_pushed as f64
        }
    }

    /// Calculate buffer utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        self.current_size as f64 / self.capacity as f64
    }
}
