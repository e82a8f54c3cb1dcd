//! Checkpoint-Descriptor Loader (spec §4.4): reads the checkpoint-descriptor
//! ring buffer into memory.

use std::io::{Read, Seek};

use crate::error::{BootstrapError, Result};
use crate::object;
use crate::superblock::NxSuperblock;

/// The loaded descriptor ring, `xp_desc[0..D)`, each slot a full raw block.
pub struct DescriptorArea {
    pub blocks: Vec<Vec<u8>>,
}

impl DescriptorArea {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Load the checkpoint-descriptor area named by `nxsb`.
///
/// The non-contiguous (B-tree-backed) layout is a recognized but
/// deliberately unimplemented shape (spec §4.4, §9): it returns
/// `BootstrapError::Unimplemented` rather than attempting resolution.
pub fn load_descriptor_area<R: Read + Seek>(
    reader: &mut R,
    nxsb: &NxSuperblock,
) -> Result<DescriptorArea> {
    if nxsb.xp_desc_is_noncontiguous() {
        return Err(BootstrapError::Unimplemented(
            "checkpoint-descriptor area is B-tree-backed (non-contiguous); resolution via nx_xp_desc_base as a physical OID is not implemented".into(),
        ));
    }

    let d = nxsb.xp_desc_block_count();
    if d == 0 {
        return Err(BootstrapError::Structural("empty checkpoint-descriptor area".into()));
    }

    let mut blocks = Vec::with_capacity(d as usize);
    for i in 0..d as u64 {
        let block = object::read_block(reader, nxsb.xp_desc_base + i, nxsb.block_size)
            .map_err(|_| BootstrapError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("short read loading descriptor slot {i}"),
            )))?;
        blocks.push(block);
    }

    Ok(DescriptorArea { blocks })
}
