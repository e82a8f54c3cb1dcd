//! Object-Map Loader (spec §4.8): reads the container object map and its
//! B-tree root, validating both.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek};

use crate::btree::BTreeRootNode;
use crate::error::{BootstrapError, Result};
use crate::fletcher;
use crate::object::{self, OBJ_STORAGE_TYPE_MASK, OBJ_PHYSICAL};

/// Decoded `omap_phys_t` fields relevant to locating the B-tree root
/// (spec §3, §6). `om_snap_count` and the snapshot-tree fields are not
/// needed by this crate's scope and are not carried.
pub struct ObjectMap {
    pub tree_type: u32,
    pub tree_oid: u64,
}

impl ObjectMap {
    /// Parse an omap block's fields following the 32-byte object header.
    pub fn parse(block: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(&block[object::ObjectHeader::SIZE..]);
        let _om_flags = cursor.read_u32::<LittleEndian>()?;
        let _om_snap_count = cursor.read_u32::<LittleEndian>()?;
        let tree_type = cursor.read_u32::<LittleEndian>()?;
        let _om_snapshot_tree_type = cursor.read_u32::<LittleEndian>()?;
        let tree_oid = cursor.read_u64::<LittleEndian>()?;
        Ok(ObjectMap { tree_type, tree_oid })
    }

    pub fn tree_is_physical(&self) -> bool {
        self.tree_type & OBJ_STORAGE_TYPE_MASK == OBJ_PHYSICAL
    }
}

/// Load the container object map at `omap_oid` (a physical address) and its
/// B-tree root (spec §4.8).
///
/// The omap block's checksum failing is reported via `Err` so the caller
/// (Orchestrator) can trigger the same rewind policy as ephemeral object
/// validation failures. A non-physical tree type is reported distinctly
/// since it is an `Unimplemented` terminal state, not a rewind trigger: the
/// B-tree root is not directly addressable under this design. The root
/// node's own checksum failing is non-fatal (warn-only) — the node layout
/// is still presentable even if its checksum is stale.
pub fn load_object_map<R: Read + Seek>(
    reader: &mut R,
    omap_oid: u64,
    block_size: u32,
) -> Result<ObjectMap> {
    let block = object::read_block(reader, omap_oid, block_size)?;
    if !fletcher::verify_object(&block) {
        return Err(BootstrapError::InvalidChecksum(omap_oid));
    }

    ObjectMap::parse(&block)
}

/// Load the omap's B-tree root node. Returns the parsed node and whether
/// its own checksum validated (non-fatal if not — see module docs).
pub fn load_omap_root<R: Read + Seek>(
    reader: &mut R,
    tree_oid: u64,
    block_size: u32,
) -> Result<(BTreeRootNode, bool)> {
    let block = object::read_block(reader, tree_oid, block_size)?;
    let valid = fletcher::verify_object(&block);
    let root = BTreeRootNode::parse(&block)?;
    Ok((root, valid))
}
