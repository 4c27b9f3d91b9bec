//! Write-ahead log of committed batches.
//!
//! Each committed batch is one frame: a little-endian `u32` length followed by
//! the bincode encoding of `(sequence, mutations)`. Frames are `fsync`ed before
//! the commit is acknowledged, so a crash loses at most the window that was
//! being written. A torn frame at the tail is dropped on replay.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use taxograph_pathdb::{CommitLog, Mutation, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("WAL I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("WAL frame could not be encoded: {0}")]
    Encode(#[from] bincode::Error),
    #[error("WAL {path} is corrupt at byte {offset}: {reason}")]
    Corrupt {
        path: PathBuf,
        offset: u64,
        reason: String,
    },
}

/// One committed batch as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WalFrame {
    pub sequence: u64,
    pub mutations: Vec<Mutation>,
}

#[derive(Serialize)]
struct FrameRef<'a> {
    sequence: u64,
    mutations: &'a [Mutation],
}

/// Write-ahead log for crash recovery
pub struct WriteAheadLog {
    file: Mutex<File>,
    path: PathBuf,
}

impl WriteAheadLog {
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|source| WalError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io(&self, source: std::io::Error) -> WalError {
        WalError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Append one committed batch and sync it to disk. Returns bytes written.
    pub fn append_frame(&self, sequence: u64, mutations: &[Mutation]) -> Result<u64, WalError> {
        let data = bincode::serialize(&FrameRef {
            sequence,
            mutations,
        })?;
        let len = u32::try_from(data.len()).map_err(|_| WalError::Corrupt {
            path: self.path.clone(),
            offset: 0,
            reason: format!("frame of {} bytes exceeds the u32 length prefix", data.len()),
        })?;

        let mut file = self.file.lock();
        file.write_all(&len.to_le_bytes()).map_err(|e| self.io(e))?;
        file.write_all(&data).map_err(|e| self.io(e))?;
        file.sync_data().map_err(|e| self.io(e))?;

        Ok(len as u64 + 4)
    }

    /// Read every complete frame in order. A torn trailing frame (crash during
    /// append) is cut off so later appends start on a frame boundary.
    pub fn replay(&self) -> Result<Vec<WalFrame>, WalError> {
        let mut file = self.file.lock();
        let total = file.seek(SeekFrom::End(0)).map_err(|e| self.io(e))?;
        file.seek(SeekFrom::Start(0)).map_err(|e| self.io(e))?;

        let mut frames = Vec::new();
        let mut offset = 0u64;
        loop {
            if offset == total {
                break;
            }

            let mut len_bytes = [0u8; 4];
            if total - offset < 4 {
                drop_torn_tail(&mut file, &self.path, offset, total)?;
                break;
            }
            file.read_exact(&mut len_bytes).map_err(|e| self.io(e))?;
            let len = u32::from_le_bytes(len_bytes) as u64;

            if total - offset - 4 < len {
                drop_torn_tail(&mut file, &self.path, offset, total)?;
                break;
            }
            let mut data = vec![0u8; len as usize];
            file.read_exact(&mut data).map_err(|e| self.io(e))?;

            let frame: WalFrame = bincode::deserialize(&data).map_err(|e| WalError::Corrupt {
                path: self.path.clone(),
                offset,
                reason: e.to_string(),
            })?;
            frames.push(frame);
            offset += 4 + len;
        }

        Ok(frames)
    }

    /// Truncate WAL after checkpoint
    pub fn truncate(&self) -> Result<(), WalError> {
        let mut file = self.file.lock();
        file.set_len(0).map_err(|e| self.io(e))?;
        file.seek(SeekFrom::Start(0)).map_err(|e| self.io(e))?;
        file.sync_data().map_err(|e| self.io(e))?;
        Ok(())
    }
}

fn drop_torn_tail(file: &mut File, path: &Path, offset: u64, total: u64) -> Result<(), WalError> {
    tracing::warn!(
        path = %path.display(),
        offset,
        dropped_bytes = total - offset,
        "dropping torn frame at the end of the WAL"
    );
    let io = |source| WalError::Io {
        path: path.to_path_buf(),
        source,
    };
    file.set_len(offset).map_err(io)?;
    file.sync_data().map_err(io)?;
    Ok(())
}

impl CommitLog for WriteAheadLog {
    fn append(&mut self, sequence: u64, mutations: &[Mutation]) -> Result<(), StoreError> {
        self.append_frame(sequence, mutations)
            .map(|_| ())
            .map_err(|e| StoreError::CommitLog(e.to_string()))
    }
}
