//! Append-only journal for durable order / trade state
//!
//! Every mutation of the store is framed, checksummed, and appended before
//! the call returns. On startup the journal is replayed to rebuild tables.
//!
//! # Binary format (per entry)
//! ```text
//! [body_len:  u32]
//! [sequence:  u64]
//! [timestamp: i64]   // Unix millis of the commit
//! [tag_len: u16][tag: bytes]       // record type
//! [payload_len: u32][payload: bytes]  // JSON-encoded record
//! [checksum: u32]    // CRC32C over sequence+timestamp+tag+payload
//! ```

use crc32c::crc32c;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::records::StoreRecord;

/// Smallest possible body: empty tag and payload.
const MIN_BODY_LEN: usize = 8 + 8 + 2 + 4 + 4;
/// Bodies past this are treated as corruption, not data.
const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

/// One framed journal entry.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub sequence: u64,
    pub timestamp_ms: i64,
    pub tag: String,
    pub payload: Vec<u8>,
    pub checksum: u32,
}

impl JournalEntry {
    pub fn new(sequence: u64, timestamp_ms: i64, tag: String, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, timestamp_ms, &tag, &payload);
        Self {
            sequence,
            timestamp_ms,
            tag,
            payload,
            checksum,
        }
    }

    fn compute_checksum(sequence: u64, timestamp_ms: i64, tag: &str, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(16 + tag.len() + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp_ms.to_le_bytes());
        buf.extend_from_slice(tag.as_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum
            == Self::compute_checksum(self.sequence, self.timestamp_ms, &self.tag, &self.payload)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let tag = self.tag.as_bytes();
        let body_len = 8 + 8 + 2 + tag.len() + 4 + self.payload.len() + 4;
        let mut buf = Vec::with_capacity(4 + body_len);
        buf.extend_from_slice(&(body_len as u32).to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        buf.extend_from_slice(&(tag.len() as u16).to_le_bytes());
        buf.extend_from_slice(tag);
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Decode one entry from `data`, returning it and the bytes consumed.
    /// `None` means the buffer ends mid-entry (a torn tail).
    pub fn from_bytes(data: &[u8]) -> Result<Option<(Self, usize)>, StoreError> {
        if data.len() < 4 {
            return Ok(None);
        }
        let body_len = u32::from_le_bytes(data[..4].try_into().unwrap()) as usize;
        if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&body_len) {
            return Err(StoreError::Corrupt {
                sequence: 0,
                detail: format!("implausible body length {}", body_len),
            });
        }
        if data.len() < 4 + body_len {
            return Ok(None);
        }

        let body = &data[4..4 + body_len];
        let mut pos = 0;
        let sequence = u64::from_le_bytes(body[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let timestamp_ms = i64::from_le_bytes(body[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let tag_len = u16::from_le_bytes(body[pos..pos + 2].try_into().unwrap()) as usize;
        pos += 2;
        if pos + tag_len + 4 + 4 > body.len() {
            return Err(StoreError::Corrupt {
                sequence,
                detail: "tag overruns body".into(),
            });
        }
        let tag = String::from_utf8(body[pos..pos + tag_len].to_vec()).map_err(|e| {
            StoreError::Corrupt {
                sequence,
                detail: e.to_string(),
            }
        })?;
        pos += tag_len;
        let payload_len = u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + payload_len + 4 > body.len() {
            return Err(StoreError::Corrupt {
                sequence,
                detail: "payload overruns body".into(),
            });
        }
        let payload = body[pos..pos + payload_len].to_vec();
        pos += payload_len;
        let checksum = u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap());

        Ok(Some((
            Self {
                sequence,
                timestamp_ms,
                tag,
                payload,
                checksum,
            },
            4 + body_len,
        )))
    }
}

/// Append-only writer; one file, flushed on every append, fsynced on
/// records the caller marks durable (trade commits).
pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
    next_sequence: u64,
}

impl Journal {
    pub fn open(path: impl Into<PathBuf>, next_sequence: u64) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            next_sequence,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Append one record. `durable` forces an fsync before returning.
    pub fn append(
        &mut self,
        record: &StoreRecord,
        timestamp_ms: i64,
        durable: bool,
    ) -> Result<u64, StoreError> {
        let payload =
            serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let entry = JournalEntry::new(
            self.next_sequence,
            timestamp_ms,
            record.tag().to_string(),
            payload,
        );
        self.writer.write_all(&entry.to_bytes())?;
        self.writer.flush()?;
        if durable {
            self.writer.get_ref().sync_data()?;
        }
        let seq = self.next_sequence;
        self.next_sequence += 1;
        Ok(seq)
    }
}

/// Replay result: the decoded records and the next sequence to write.
pub struct Replay {
    pub records: Vec<StoreRecord>,
    pub next_sequence: u64,
}

/// Read a journal back, verifying checksums.
///
/// A torn tail (incomplete final entry) is tolerated and ignored; a failed
/// checksum or malformed interior entry is an error.
pub fn replay(path: &Path) -> Result<Replay, StoreError> {
    let mut data = Vec::new();
    match File::open(path) {
        Ok(mut f) => {
            f.read_to_end(&mut data)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Replay {
                records: Vec::new(),
                next_sequence: 0,
            });
        }
        Err(e) => return Err(e.into()),
    }

    let mut records = Vec::new();
    let mut next_sequence = 0;
    let mut pos = 0;
    while pos < data.len() {
        match JournalEntry::from_bytes(&data[pos..])? {
            Some((entry, consumed)) => {
                if !entry.verify_checksum() {
                    return Err(StoreError::Corrupt {
                        sequence: entry.sequence,
                        detail: "checksum mismatch".into(),
                    });
                }
                if entry.sequence != next_sequence {
                    return Err(StoreError::Corrupt {
                        sequence: entry.sequence,
                        detail: format!("sequence gap, expected {}", next_sequence),
                    });
                }
                let record: StoreRecord = serde_json::from_slice(&entry.payload)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                next_sequence = entry.sequence + 1;
                records.push(record);
                pos += consumed;
            }
            None => {
                tracing::warn!(offset = pos, "journal has a torn tail, ignoring");
                break;
            }
        }
    }

    Ok(Replay {
        records,
        next_sequence,
    })
}
