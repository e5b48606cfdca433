//! Raw notification record wire format
//!
//! A completed read fills the caller's buffer with zero or more records laid
//! out like `FILE_NOTIFY_INFORMATION`:
//!
//! ```text
//! offset  size  field
//! 0       4     next_entry_offset (LE u32, 0 = last record)
//! 4       4     action code       (LE u32)
//! 8       4     name_length       (LE u32, bytes)
//! 12      n     name              (UTF-16LE)
//! ```
//!
//! Every record starts on a 4-byte boundary.

use std::fmt;

/// Size of the fixed record header
pub const HEADER_LEN: usize = 12;

const ALIGN: usize = 4;

/// Action codes carried by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Added,
    Removed,
    Modified,
    RenamedOldName,
    RenamedNewName,
}

impl Action {
    /// Wire code for this action
    pub const fn code(self) -> u32 {
        match self {
            Action::Added => 1,
            Action::Removed => 2,
            Action::Modified => 3,
            Action::RenamedOldName => 4,
            Action::RenamedNewName => 5,
        }
    }

    /// Parse a wire code; unknown codes return `None`
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Action::Added),
            2 => Some(Action::Removed),
            3 => Some(Action::Modified),
            4 => Some(Action::RenamedOldName),
            5 => Some(Action::RenamedNewName),
            _ => None,
        }
    }
}

/// A single record encoded on its own, ready to be packed into a buffer
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    bytes: Vec<u8>,
}

impl EncodedRecord {
    /// Encode a record with an arbitrary action code
    pub fn new(code: u32, name: &str) -> Self {
        let name_units: Vec<u16> = name.encode_utf16().collect();
        let name_len = name_units.len() * 2;
        let mut bytes = Vec::with_capacity(padded(HEADER_LEN + name_len));

        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&code.to_le_bytes());
        bytes.extend_from_slice(&(name_len as u32).to_le_bytes());
        for unit in name_units {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes.resize(padded(bytes.len()), 0);

        Self { bytes }
    }

    /// Encode a record with a known action
    pub fn action(action: Action, name: &str) -> Self {
        Self::new(action.code(), name)
    }

    /// Encoded length including alignment padding
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; a record has at least a header
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for EncodedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedRecord")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Packs encoded records into a caller-owned buffer, chaining their
/// `next_entry_offset` fields.
pub struct RecordWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    last: Option<usize>,
}

impl<'a> RecordWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            last: None,
        }
    }

    /// Append a record if it fits. Returns false (and writes nothing) when
    /// the remaining space is too small.
    pub fn try_push(&mut self, record: &EncodedRecord) -> bool {
        let start = self.len;
        let end = start + record.len();
        if end > self.buf.len() {
            return false;
        }

        self.buf[start..end].copy_from_slice(record.as_bytes());
        write_u32(&mut self.buf[start..], 0, 0);
        if let Some(prev) = self.last {
            write_u32(&mut self.buf[prev..], 0, (start - prev) as u32);
        }

        self.last = Some(start);
        self.len = end;
        true
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A record decoded from a completed buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Wire action code, possibly unknown
    pub code: u32,
    /// Relative path name
    pub name: String,
}

impl RawRecord {
    pub fn action(&self) -> Option<Action> {
        Action::from_code(self.code)
    }
}

/// Structural damage found while walking a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// Fewer than [`HEADER_LEN`] bytes remain at `offset`
    TruncatedHeader { offset: usize },
    /// The name runs past the end of the buffer
    NameOutOfBounds { offset: usize, name_len: usize },
    /// The next-entry offset overlaps this record or leaves the buffer
    BadNextOffset { offset: usize, next: usize },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::TruncatedHeader { offset } => {
                write!(f, "truncated record header at offset {}", offset)
            }
            Anomaly::NameOutOfBounds { offset, name_len } => write!(
                f,
                "record at offset {} has a {}-byte name past the end of the buffer",
                offset, name_len
            ),
            Anomaly::BadNextOffset { offset, next } => write!(
                f,
                "record at offset {} has invalid next-entry offset {}",
                offset, next
            ),
        }
    }
}

/// Iterator over the records of a completed buffer.
///
/// Yields records in buffer order. After an [`Anomaly`] the walk cannot
/// continue safely, so the iterator is fused.
pub struct Records<'a> {
    buf: &'a [u8],
    pos: Option<usize>,
    pending: Option<Anomaly>,
}

impl<'a> Records<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        let pos = if buf.is_empty() { None } else { Some(0) };
        Self {
            buf,
            pos,
            pending: None,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<RawRecord, Anomaly>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(anomaly) = self.pending.take() {
            return Some(Err(anomaly));
        }
        let offset = self.pos.take()?;
        let rest = &self.buf[offset..];

        if rest.len() < HEADER_LEN {
            return Some(Err(Anomaly::TruncatedHeader { offset }));
        }

        let next = read_u32(rest, 0) as usize;
        let code = read_u32(rest, 4);
        let name_len = read_u32(rest, 8) as usize;

        let name_end = HEADER_LEN.saturating_add(name_len);
        if name_end > rest.len() {
            return Some(Err(Anomaly::NameOutOfBounds { offset, name_len }));
        }

        let units: Vec<u16> = rest[HEADER_LEN..name_end]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let name = String::from_utf16_lossy(&units);

        if next != 0 {
            if next < name_end || next >= rest.len() {
                // Hand out this record; the walk ends with the anomaly.
                self.pos = None;
                self.pending = Some(Anomaly::BadNextOffset { offset, next });
            } else {
                self.pos = Some(offset + next);
            }
        }

        Some(Ok(RawRecord { code, name }))
    }
}

fn padded(len: usize) -> usize {
    (len + ALIGN - 1) & !(ALIGN - 1)
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn write_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}
