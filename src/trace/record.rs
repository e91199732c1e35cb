//! Decode the fixed-width binary event trace.
//!
//! The instrumented server appends one 40-byte record per event with no header,
//! footer or length prefix:
//!
//! ```text
//! offset  size  field
//!      0     4  event_type   (u32, see EventKind)
//!      4     4  ts_sec       (u32)
//!      8     4  ts_nsec      (u32)
//!     12     4  thread_id    (u32)
//!     16     8  arg1         (u64)
//!     24     8  arg2         (u64)
//!     32     8  arg3         (u64)
//! ```
//!
//! All fields are little-endian. End of file is the only terminator, and a
//! trailing partial record is dropped as end-of-trace rather than reported.

use std::io::{self, ErrorKind, Read};

use serde::Serialize;

/// Size in bytes of one encoded [`TraceRecord`].
pub const RECORD_SIZE: usize = 40;

/// The kind of event a record describes.
///
/// Codes outside `1..=12` are not representable; [`TraceRecord::kind`] returns
/// `None` for them and consumers skip the record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum EventKind {
    /// arg1 = sample latency in ns, arg2 = return address, arg3 = generation
    StackSample = 1,
    /// arg1 = tag
    TagSet = 2,
    /// arg1 = tag
    TagBlock = 3,
    /// arg1 = tag
    TagUnset = 4,
    /// arg1 = tag (ignored: clears whatever tag the thread carries)
    TagClear = 5,
    /// arg1 = mutex address
    MutexWait = 6,
    /// arg1 = mutex address
    MutexLock = 7,
    /// arg1 = mutex address
    MutexUnlock = 8,
    /// arg1 = joined thread handle
    JoinWait = 9,
    /// arg1 = joined thread handle
    JoinJoined = 10,
    /// arg1 = child thread id
    ThreadCreate = 11,
    ThreadExit = 12,
}

impl EventKind {
    pub fn from_code(code: u32) -> Option<Self> {
        use EventKind::*;
        Some(match code {
            1 => StackSample,
            2 => TagSet,
            3 => TagBlock,
            4 => TagUnset,
            5 => TagClear,
            6 => MutexWait,
            7 => MutexLock,
            8 => MutexUnlock,
            9 => JoinWait,
            10 => JoinJoined,
            11 => ThreadCreate,
            12 => ThreadExit,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

/// One raw trace record, exactly as stored on disk.
///
/// `event_type` is kept as the raw code so that records with unknown kinds
/// still round-trip; use [`TraceRecord::kind`] to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TraceRecord {
    pub event_type: u32,
    pub ts_sec: u32,
    pub ts_nsec: u32,
    pub thread_id: u32,
    pub arg1: u64,
    pub arg2: u64,
    pub arg3: u64,
}

impl TraceRecord {
    /// Build a record of `kind` at `timestamp_us` whole microseconds.
    ///
    /// Arguments default to zero; chain [`TraceRecord::args`] to set them.
    pub fn new(kind: EventKind, timestamp_us: u64, thread_id: u32) -> Self {
        Self {
            event_type: kind.code(),
            ts_sec: (timestamp_us / 1_000_000) as u32,
            ts_nsec: ((timestamp_us % 1_000_000) * 1_000) as u32,
            thread_id,
            arg1: 0,
            arg2: 0,
            arg3: 0,
        }
    }

    pub fn args(mut self, arg1: u64, arg2: u64, arg3: u64) -> Self {
        self.arg1 = arg1;
        self.arg2 = arg2;
        self.arg3 = arg3;
        self
    }

    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_code(self.event_type)
    }

    /// Wall-clock timestamp in (fractional) microseconds.
    pub fn timestamp_us(&self) -> f64 {
        self.ts_sec as f64 * 1_000_000.0 + self.ts_nsec as f64 / 1_000.0
    }

    /// Stack-sample latency in microseconds (`arg1` is nanoseconds).
    ///
    /// Only meaningful for [`EventKind::StackSample`].
    pub fn sample_latency_us(&self) -> f64 {
        self.arg1 as f64 / 1_000.0
    }

    pub fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let u64_at = |at: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(bytes)
        };

        Self {
            event_type: u32_at(0),
            ts_sec: u32_at(4),
            ts_nsec: u32_at(8),
            thread_id: u32_at(12),
            arg1: u64_at(16),
            arg2: u64_at(24),
            arg3: u64_at(32),
        }
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.event_type.to_le_bytes());
        buf[4..8].copy_from_slice(&self.ts_sec.to_le_bytes());
        buf[8..12].copy_from_slice(&self.ts_nsec.to_le_bytes());
        buf[12..16].copy_from_slice(&self.thread_id.to_le_bytes());
        buf[16..24].copy_from_slice(&self.arg1.to_le_bytes());
        buf[24..32].copy_from_slice(&self.arg2.to_le_bytes());
        buf[32..40].copy_from_slice(&self.arg3.to_le_bytes());
        buf
    }
}

/// Lazy record iterator over any byte source.
///
/// Holds at most one record in memory. A short final chunk ends iteration
/// without an error; any other I/O failure is yielded once and then the
/// iterator is exhausted.
pub struct TraceReader<R> {
    inner: R,
    done: bool,
}

impl<R: Read> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, done: false }
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = io::Result<TraceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = [0u8; RECORD_SIZE];
        let mut filled = 0;
        while filled < RECORD_SIZE {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        if filled < RECORD_SIZE {
            self.done = true;
            if filled > 0 {
                log::warn!("Dropping {filled}-byte partial record at end of trace");
            }
            return None;
        }

        Some(Ok(TraceRecord::decode(&buf)))
    }
}

/// Decode every complete record in an in-memory buffer.
pub fn decode_all(bytes: &[u8]) -> Vec<TraceRecord> {
    bytes
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| {
            let mut buf = [0u8; RECORD_SIZE];
            buf.copy_from_slice(chunk);
            TraceRecord::decode(&buf)
        })
        .collect()
}

/// Encode records back-to-back, as the instrumentation library writes them.
pub fn encode_all<'a>(records: impl IntoIterator<Item = &'a TraceRecord>) -> Vec<u8> {
    records.into_iter().flat_map(|r| r.encode()).collect()
}
