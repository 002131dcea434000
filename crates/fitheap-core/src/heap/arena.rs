//! Owned byte arena with bounds-checked header access.

use crate::heap::check::ChainViolation;
use crate::heap::header::{BlockHeader, HEADER_SIZE};

/// Fixed-size backing store for one allocator instance.
///
/// All header traffic goes through offset-checked reads and writes; there
/// is no pointer arithmetic anywhere above this type.
#[derive(Debug, Clone)]
pub(crate) struct Arena {
    bytes: Vec<u8>,
}

impl Arena {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Decodes the header record stored at `offset`.
    pub(crate) fn read_header(&self, offset: usize) -> Result<BlockHeader, ChainViolation> {
        let end = self.record_end(offset)?;
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&self.bytes[offset..end]);
        BlockHeader::from_bytes(&raw).map_err(|source| ChainViolation::CorruptHeader {
            offset,
            reason: source.to_string(),
        })
    }

    /// Encodes `header` into the record slot at `offset`.
    pub(crate) fn write_header(
        &mut self,
        offset: usize,
        header: &BlockHeader,
    ) -> Result<(), ChainViolation> {
        let end = self.record_end(offset)?;
        self.bytes[offset..end].copy_from_slice(&header.to_bytes());
        Ok(())
    }

    fn record_end(&self, offset: usize) -> Result<usize, ChainViolation> {
        match offset.checked_add(HEADER_SIZE) {
            Some(end) if end <= self.bytes.len() => Ok(end),
            _ => Err(ChainViolation::HeaderOutOfBounds {
                offset,
                arena_len: self.bytes.len(),
            }),
        }
    }

    /// Test-only raw byte mutation, for staging corrupt records.
    #[cfg(test)]
    pub(crate) fn poke(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
    }
}
