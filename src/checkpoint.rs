//! Checkpoint Assembler (spec §4.6): extracts the selected checkpoint's
//! logically contiguous sub-range from the descriptor ring, handling wrap.

use crate::checkpoint_map::CheckpointMap;
use crate::descriptor::DescriptorArea;
use crate::error::{BootstrapError, Result};
use crate::object::ObjectHeader;

/// The assembled checkpoint, `xp[0..L)`, in logical order.
pub struct Checkpoint {
    pub blocks: Vec<Vec<u8>>,
    pub checkpoint_maps: Vec<CheckpointMap>,
}

/// Assemble the checkpoint named by `start`/`len` out of the ring `area`.
///
/// Handles ring wrap (property P3): if `start + len` overflows `D`, segment
/// one is `xp_desc[start..D)` and segment two is `xp_desc[0..len-(D-start))`.
///
/// Enforces the structural invariant that exactly one slot is the container
/// superblock matching `expected_xid` and every other slot is a
/// checkpoint-map; any other shape is a malformed checkpoint.
pub fn assemble_checkpoint(
    area: &DescriptorArea,
    start: usize,
    len: usize,
    expected_xid: u64,
) -> Result<Checkpoint> {
    let d = area.len();
    if d == 0 || len == 0 || len > d || start >= d {
        return Err(BootstrapError::Structural(format!(
            "invalid checkpoint bounds: start={start}, len={len}, D={d}"
        )));
    }

    let mut blocks = Vec::with_capacity(len);
    if start + len <= d {
        blocks.extend(area.blocks[start..start + len].iter().cloned());
    } else {
        let first_segment_len = d - start;
        blocks.extend(area.blocks[start..d].iter().cloned());
        let remaining = len - first_segment_len;
        blocks.extend(area.blocks[0..remaining].iter().cloned());
    }

    let mut checkpoint_maps = Vec::new();
    let mut superblock_count = 0usize;

    for block in &blocks {
        let header = ObjectHeader::parse(block)?;
        if header.is_nx_superblock() {
            if header.xid != expected_xid {
                return Err(BootstrapError::Structural(format!(
                    "checkpoint contains a superblock with xid {} but expected {}",
                    header.xid, expected_xid
                )));
            }
            superblock_count += 1;
        } else if header.is_checkpoint_map() {
            checkpoint_maps.push(CheckpointMap::parse(block)?);
        } else {
            return Err(BootstrapError::Structural(format!(
                "checkpoint slot is neither a superblock nor a checkpoint-map (type {:#x})",
                header.object_type()
            )));
        }
    }

    if superblock_count != 1 {
        return Err(BootstrapError::Structural(format!(
            "checkpoint must contain exactly one superblock, found {superblock_count}"
        )));
    }

    Ok(Checkpoint { blocks, checkpoint_maps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fletcher::write_checksum;
    use crate::object::{OBJECT_TYPE_CHECKPOINT_MAP, OBJECT_TYPE_NX_SUPERBLOCK};
    use crate::superblock::NX_MAGIC;

    fn nxsb_slot(block_size: u32, xid: u64) -> Vec<u8> {
        let mut block = vec![0u8; block_size as usize];
        block[16..24].copy_from_slice(&xid.to_le_bytes());
        block[24..28].copy_from_slice(&OBJECT_TYPE_NX_SUPERBLOCK.to_le_bytes());
        block[32..36].copy_from_slice(&NX_MAGIC.to_le_bytes());
        block[36..40].copy_from_slice(&block_size.to_le_bytes());
        write_checksum(&mut block);
        block
    }

    fn cpm_slot(block_size: u32) -> Vec<u8> {
        let mut block = vec![0u8; block_size as usize];
        block[24..28].copy_from_slice(&OBJECT_TYPE_CHECKPOINT_MAP.to_le_bytes());
        block[36..40].copy_from_slice(&0u32.to_le_bytes()); // cpm_count = 0
        write_checksum(&mut block);
        block
    }

    fn ring(slots: Vec<Vec<u8>>) -> DescriptorArea {
        DescriptorArea { blocks: slots }
    }

    #[test]
    fn assembles_non_wrapped_checkpoint() {
        let area = ring(vec![
            cpm_slot(4096),
            nxsb_slot(4096, 100),
            cpm_slot(4096),
            cpm_slot(4096),
        ]);
        let checkpoint = assemble_checkpoint(&area, 1, 3, 100).unwrap();
        assert_eq!(checkpoint.blocks.len(), 3);
        assert_eq!(checkpoint.checkpoint_maps.len(), 2);
    }

    #[test]
    fn assembles_wrapped_checkpoint() {
        // D=8, latest at index 6, len=4 → logical order 6,7,0,1.
        let mut slots = vec![cpm_slot(4096); 8];
        slots[1] = cpm_slot(4096);
        slots[6] = nxsb_slot(4096, 7);
        slots[7] = cpm_slot(4096);
        slots[0] = cpm_slot(4096);
        let area = ring(slots);

        let checkpoint = assemble_checkpoint(&area, 6, 4, 7).unwrap();
        assert_eq!(checkpoint.blocks.len(), 4);
        // Exactly one of the four logical slots is the superblock.
        let sb_count = checkpoint.blocks.iter()
            .filter(|b| ObjectHeader::parse(b).unwrap().is_nx_superblock())
            .count();
        assert_eq!(sb_count, 1);
    }

    #[test]
    fn rejects_wrong_superblock_count() {
        let area = ring(vec![nxsb_slot(4096, 1), nxsb_slot(4096, 1)]);
        let result = assemble_checkpoint(&area, 0, 2, 1);
        assert!(matches!(result, Err(BootstrapError::Structural(_))));
    }

    #[test]
    fn rejects_foreign_object_in_checkpoint() {
        let mut other = vec![0u8; 4096];
        other[24..28].copy_from_slice(&crate::object::OBJECT_TYPE_OMAP.to_le_bytes());
        write_checksum(&mut other);
        let area = ring(vec![nxsb_slot(4096, 1), other]);
        let result = assemble_checkpoint(&area, 0, 2, 1);
        assert!(matches!(result, Err(BootstrapError::Structural(_))));
    }
}
