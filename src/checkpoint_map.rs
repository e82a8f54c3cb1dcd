//! Checkpoint Map decode and the Ephemeral Object Loader (spec §4.7).

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek};

use crate::error::{BootstrapError, Result};
use crate::fletcher;
use crate::object::{self, ObjectHeader};

/// One entry of a checkpoint-map object: an ephemeral oid and the physical
/// address this checkpoint stores it at (spec §6).
#[derive(Debug, Clone, Copy)]
pub struct CheckpointMapEntry {
    pub obj_type: u32,
    pub subtype: u32,
    pub size: u32,
    pub fs_oid: u64,
    pub oid: u64,
    pub paddr: u64,
}

/// A parsed checkpoint-map object (`cp_obj_type == OBJECT_TYPE_CHECKPOINT_MAP`).
#[derive(Debug, Clone)]
pub struct CheckpointMap {
    pub header: ObjectHeader,
    pub flags: u32,
    pub entries: Vec<CheckpointMapEntry>,
}

impl CheckpointMap {
    /// Parse a checkpoint-map block: object header (32B) + flags(4) +
    /// cpm_count(4) + cpm_count entries of 32 bytes each (spec §6).
    pub fn parse(block: &[u8]) -> Result<Self> {
        let header = ObjectHeader::parse(block)?;
        let mut cursor = Cursor::new(&block[ObjectHeader::SIZE..]);

        let flags = cursor.read_u32::<LittleEndian>()?;
        let count = cursor.read_u32::<LittleEndian>()?;

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let obj_type = cursor.read_u32::<LittleEndian>()?;
            let subtype = cursor.read_u32::<LittleEndian>()?;
            let size = cursor.read_u32::<LittleEndian>()?;
            let _pad = cursor.read_u32::<LittleEndian>()?;
            let fs_oid = cursor.read_u64::<LittleEndian>()?;
            let oid = cursor.read_u64::<LittleEndian>()?;
            let paddr = cursor.read_u64::<LittleEndian>()?;
            entries.push(CheckpointMapEntry { obj_type, subtype, size, fs_oid, oid, paddr });
        }

        Ok(CheckpointMap { header, flags, entries })
    }
}

/// Walk every checkpoint-map block in an assembled checkpoint and read each
/// referenced ephemeral object (spec §4.7, property P4).
///
/// Validates every loaded ephemeral block's checksum; the first failure is
/// reported as the index of the failing entry (0-based, in overall read
/// order) so the orchestrator can decide how to rewind.
pub struct EphemeralLoadResult {
    pub blocks: Vec<Vec<u8>>,
    /// Index into `blocks` of the first checksum failure, if any.
    pub first_invalid: Option<usize>,
}

pub fn load_ephemeral_objects<R: Read + Seek>(
    reader: &mut R,
    checkpoint_maps: &[CheckpointMap],
    block_size: u32,
    block_count: u64,
) -> Result<EphemeralLoadResult> {
    let expected: usize = checkpoint_maps.iter().map(|m| m.entries.len()).sum();

    let mut blocks = Vec::with_capacity(expected);
    for map in checkpoint_maps {
        for entry in &map.entries {
            if entry.paddr >= block_count {
                return Err(BootstrapError::Structural(format!(
                    "ephemeral entry paddr {} is outside the container ({} blocks)",
                    entry.paddr, block_count
                )));
            }
            let block = object::read_block(reader, entry.paddr, block_size)?;
            blocks.push(block);
        }
    }

    // The spec's `assert(num_read = xp_obj_len)` typo is resolved as `==`,
    // surfaced as a structural error rather than a panic (see DESIGN.md).
    if blocks.len() != expected {
        return Err(BootstrapError::Structural(format!(
            "ephemeral read count mismatch: read {}, expected {}",
            blocks.len(),
            expected
        )));
    }

    let first_invalid = blocks.iter().position(|b| !fletcher::verify_object(b));

    Ok(EphemeralLoadResult { blocks, first_invalid })
}
