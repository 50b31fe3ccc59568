//! WAL Entry definitions
//!
//! One entry is one atomic unit: every operation in it is replayed or none is.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Operations applied together
    pub operations: Vec<Operation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

impl WalEntry {
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operations,
            timestamp,
        }
    }

    /// Header followed by the bincode payload
    pub fn serialize(&self) -> Result<Vec<u8>, EngineError> {
        let payload =
            bincode::serialize(self).map_err(|e| EngineError::Serialization(e.to_string()))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| EngineError::Serialization(format!("entry of {} bytes", payload.len())))?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&Self::compute_crc(&payload).to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Parse one entry from the front of `bytes`.
    ///
    /// Returns the entry and the number of bytes it occupied. A short buffer,
    /// a checksum mismatch or an undecodable payload is reported as
    /// corruption.
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize), EngineError> {
        if bytes.len() < HEADER_SIZE {
            return Err(EngineError::WalCorruption(format!(
                "partial header: {} of {} bytes",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let lsn = u64::from_le_bytes(header_field(bytes, 0..8)?);
        let crc = u32::from_le_bytes(header_field(bytes, 8..12)?);
        let len = u32::from_le_bytes(header_field(bytes, 12..16)?) as usize;

        let end = HEADER_SIZE + len;
        if bytes.len() < end {
            return Err(EngineError::WalCorruption(format!(
                "partial entry at lsn {}: {} of {} bytes",
                lsn,
                bytes.len() - HEADER_SIZE,
                len
            )));
        }

        let payload = &bytes[HEADER_SIZE..end];
        if Self::compute_crc(payload) != crc {
            return Err(EngineError::WalCorruption(format!("CRC mismatch at lsn {}", lsn)));
        }

        let entry: WalEntry = bincode::deserialize(payload)
            .map_err(|e| EngineError::WalCorruption(format!("undecodable entry at lsn {}: {}", lsn, e)))?;
        if entry.lsn != lsn {
            return Err(EngineError::WalCorruption(format!(
                "header lsn {} does not match entry lsn {}",
                lsn, entry.lsn
            )));
        }
        Ok((entry, end))
    }

    pub fn compute_crc(payload: &[u8]) -> u32 {
        crc32fast::hash(payload)
    }
}

fn header_field<const N: usize>(bytes: &[u8], range: std::ops::Range<usize>) -> Result<[u8; N], EngineError> {
    bytes[range]
        .try_into()
        .map_err(|_| EngineError::WalCorruption("malformed header".to_string()))
}
