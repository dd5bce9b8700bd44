use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::{Context, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Log sequence number. Records are numbered from 1.
pub type Lsn = u64;

pub const INVALID_LSN: Lsn = 0;

// len: u32 | lsn: u64 | crc32: u32
const HEADER_SIZE: usize = 4 + 8 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub lsn: Lsn,
    pub payload: Bytes,
}

/// Append-only log file.
///
/// The buffer pool only keeps a handle to it; recovery is a separate layer.
pub struct LogManager {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
    next_lsn: AtomicU64,
    persistent_lsn: AtomicU64,
}

impl LogManager {
    /// Opens the log at `path`, creating it if needed.
    ///
    /// A torn or corrupt tail left by a crash is cut off, and numbering
    /// continues after the last intact record.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let (records, valid_len) = if path.exists() {
            let buf = std::fs::read(&path).context("failed to read the log")?;
            let (records, valid_len) = decode(&buf);
            if valid_len < buf.len() {
                warn!(
                    path = %path.display(),
                    dropped = buf.len() - valid_len,
                    "discarding torn log tail"
                );
            }
            (records, valid_len)
        } else {
            (Vec::new(), 0)
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("failed to open the log")?;
        file.set_len(valid_len as u64)
            .context("failed to truncate the log")?;

        let last_lsn = records.last().map_or(INVALID_LSN, |record| record.lsn);
        debug!(path = %path.display(), last_lsn, "opened log");

        Ok(Self {
            path,
            file: Mutex::new(BufWriter::new(file)),
            next_lsn: AtomicU64::new(last_lsn + 1),
            persistent_lsn: AtomicU64::new(last_lsn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffers one record and returns its LSN. Durable after `flush`.
    pub fn append(&self, payload: &[u8]) -> Result<Lsn> {
        let len = u32::try_from(payload.len()).context("log record too large")?;

        let mut file = self.file.lock();
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_u32(len);
        buf.put_u64(lsn);
        buf.put_u32(checksum(lsn, payload));
        buf.put_slice(payload);

        file.write_all(&buf)
            .with_context(|| format!("failed to append log record {lsn}"))?;
        Ok(lsn)
    }

    /// Forces every appended record to disk and returns the last durable LSN.
    pub fn flush(&self) -> Result<Lsn> {
        let mut file = self.file.lock();

        file.flush().context("failed to flush the log")?;
        file.get_ref().sync_data().context("failed to sync the log")?;

        let lsn = self.next_lsn.load(Ordering::SeqCst) - 1;
        self.persistent_lsn.store(lsn, Ordering::SeqCst);
        Ok(lsn)
    }

    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn.load(Ordering::SeqCst)
    }

    pub fn persistent_lsn(&self) -> Lsn {
        self.persistent_lsn.load(Ordering::SeqCst)
    }

    /// Every intact record in the log at `path`, in order.
    pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<LogRecord>> {
        let buf = std::fs::read(path).context("failed to read the log")?;
        Ok(decode(&buf).0)
    }
}

fn checksum(lsn: Lsn, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_be_bytes());
    hasher.update(payload);
    hasher.finalize()
}

// Returns the records and the length of the intact prefix
fn decode(buf: &[u8]) -> (Vec<LogRecord>, usize) {
    let mut records = Vec::new();
    let mut rbuf = buf;
    let mut valid_len = 0;

    while rbuf.remaining() >= HEADER_SIZE {
        let mut header = &rbuf[..HEADER_SIZE];
        let len = header.get_u32() as usize;
        let lsn = header.get_u64();
        let crc = header.get_u32();

        if rbuf.remaining() < HEADER_SIZE + len {
            break;
        }

        let payload = &rbuf[HEADER_SIZE..HEADER_SIZE + len];
        if checksum(lsn, payload) != crc {
            break;
        }

        records.push(LogRecord {
            lsn,
            payload: Bytes::copy_from_slice(payload),
        });
        rbuf.advance(HEADER_SIZE + len);
        valid_len += HEADER_SIZE + len;
    }

    (records, valid_len)
}
