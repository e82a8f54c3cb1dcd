//! B-tree root-node introspection, trimmed to what the Object-Map Loader
//! needs (spec §4.8): enough to report a root node's shape, not to
//! traverse it. Full B-tree traversal is out of this crate's scope (spec §1).

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{BootstrapError, Result};
use crate::object::ObjectHeader;

pub const BTNODE_ROOT: u16 = 0x0001;
pub const BTNODE_LEAF: u16 = 0x0002;
pub const BTNODE_FIXED_KV_SIZE: u16 = 0x0004;

/// B-tree node header — 24 bytes immediately after the object header.
#[derive(Debug, Clone)]
pub struct BTreeNodeHeader {
    pub btn_flags: u16,
    pub btn_level: u16,
    pub btn_nkeys: u32,
    pub btn_table_space_off: u16,
    pub btn_table_space_len: u16,
    pub btn_free_space_off: u16,
    pub btn_free_space_len: u16,
    pub btn_free_list_off: u16,
    pub btn_free_list_len: u16,
    pub btn_key_free_list_off: u16,
    pub btn_key_free_list_len: u16,
    pub btn_val_free_list_off: u16,
    pub btn_val_free_list_len: u16,
}

impl BTreeNodeHeader {
    pub const SIZE: usize = 24;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(BootstrapError::Structural("btree node header too short".into()));
        }
        let mut cursor = Cursor::new(data);
        Ok(BTreeNodeHeader {
            btn_flags: cursor.read_u16::<LittleEndian>()?,
            btn_level: cursor.read_u16::<LittleEndian>()?,
            btn_nkeys: cursor.read_u32::<LittleEndian>()?,
            btn_table_space_off: cursor.read_u16::<LittleEndian>()?,
            btn_table_space_len: cursor.read_u16::<LittleEndian>()?,
            btn_free_space_off: cursor.read_u16::<LittleEndian>()?,
            btn_free_space_len: cursor.read_u16::<LittleEndian>()?,
            btn_free_list_off: cursor.read_u16::<LittleEndian>()?,
            btn_free_list_len: cursor.read_u16::<LittleEndian>()?,
            btn_key_free_list_off: cursor.read_u16::<LittleEndian>()?,
            btn_key_free_list_len: cursor.read_u16::<LittleEndian>()?,
            btn_val_free_list_off: cursor.read_u16::<LittleEndian>()?,
            btn_val_free_list_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.btn_flags & BTNODE_LEAF != 0
    }

    pub fn is_root(&self) -> bool {
        self.btn_flags & BTNODE_ROOT != 0
    }

    pub fn is_fixed_kv(&self) -> bool {
        self.btn_flags & BTNODE_FIXED_KV_SIZE != 0
    }
}

/// BTreeInfo — 40 bytes at the end of a root node, after the key/value area.
#[derive(Debug, Clone)]
pub struct BTreeInfo {
    pub bt_flags: u32,
    pub bt_node_size: u32,
    pub bt_key_size: u32,
    pub bt_val_size: u32,
    pub bt_longest_key: u32,
    pub bt_longest_val: u32,
    pub bt_key_count: u64,
    pub bt_node_count: u64,
}

impl BTreeInfo {
    pub const SIZE: usize = 40;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(BootstrapError::Structural("btree info too short".into()));
        }
        let mut cursor = Cursor::new(data);
        Ok(BTreeInfo {
            bt_flags: cursor.read_u32::<LittleEndian>()?,
            bt_node_size: cursor.read_u32::<LittleEndian>()?,
            bt_key_size: cursor.read_u32::<LittleEndian>()?,
            bt_val_size: cursor.read_u32::<LittleEndian>()?,
            bt_longest_key: cursor.read_u32::<LittleEndian>()?,
            bt_longest_val: cursor.read_u32::<LittleEndian>()?,
            bt_key_count: cursor.read_u64::<LittleEndian>()?,
            bt_node_count: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// A root B-tree node's header plus its footer info, if present.
pub struct BTreeRootNode {
    pub header: ObjectHeader,
    pub node_header: BTreeNodeHeader,
    pub info: Option<BTreeInfo>,
}

impl BTreeRootNode {
    /// Parse just enough of a block to report the root node's shape:
    /// the object header, the node header, and (if this is in fact a root
    /// node) the trailing `BTreeInfo` footer.
    pub fn parse(block: &[u8]) -> Result<Self> {
        let header = ObjectHeader::parse(block)?;
        let node_header = BTreeNodeHeader::parse(&block[ObjectHeader::SIZE..])?;

        let info = if node_header.is_root() {
            if block.len() < BTreeInfo::SIZE {
                return Err(BootstrapError::Structural("block too short for btree info footer".into()));
            }
            let info_start = block.len() - BTreeInfo::SIZE;
            Some(BTreeInfo::parse(&block[info_start..])?)
        } else {
            None
        };

        Ok(BTreeRootNode { header, node_header, info })
    }
}
