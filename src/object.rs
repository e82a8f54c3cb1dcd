//! Object Classifier (spec §4.3) and the 32-byte object header shared by
//! every on-disk object.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek};

use crate::error::{BootstrapError, Result};
use crate::fletcher;

// Object type constants (lower 16 bits of type_and_flags)
pub const OBJECT_TYPE_NX_SUPERBLOCK: u32 = 0x01;
pub const OBJECT_TYPE_BTREE: u32 = 0x02;
pub const OBJECT_TYPE_BTREE_NODE: u32 = 0x03;
pub const OBJECT_TYPE_SPACEMAN: u32 = 0x05;
pub const OBJECT_TYPE_OMAP: u32 = 0x0B;
pub const OBJECT_TYPE_CHECKPOINT_MAP: u32 = 0x0C;
pub const OBJECT_TYPE_FS: u32 = 0x0D;

// Object flag masks (upper 2 bits of type_and_flags)
pub const OBJ_PHYSICAL: u32 = 0x00000000;
pub const OBJ_VIRTUAL: u32 = 0x80000000;
pub const OBJ_EPHEMERAL: u32 = 0x40000000;
pub const OBJ_STORAGE_TYPE_MASK: u32 = 0xC0000000;
pub const OBJECT_TYPE_MASK: u32 = 0x0000FFFF;

/// Storage class of an object, derived from the upper two bits of the type
/// word (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Physical,
    Virtual,
    Ephemeral,
}

/// 32-byte header present on every APFS on-disk object. All fields are little-endian.
#[derive(Debug, Clone)]
pub struct ObjectHeader {
    pub checksum: u64,       // 0x00
    pub oid: u64,            // 0x08
    pub xid: u64,            // 0x10
    pub type_and_flags: u32, // 0x18
    pub subtype: u32,        // 0x1C
}

impl ObjectHeader {
    /// Size of the on-disk header in bytes
    pub const SIZE: usize = 32;

    /// Parse an object header from the first 32 bytes of a block
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(BootstrapError::Structural(format!(
                "object header too short: {} bytes",
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);
        Ok(ObjectHeader {
            checksum: cursor.read_u64::<LittleEndian>()?,
            oid: cursor.read_u64::<LittleEndian>()?,
            xid: cursor.read_u64::<LittleEndian>()?,
            type_and_flags: cursor.read_u32::<LittleEndian>()?,
            subtype: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Get the object type (lower 16 bits, no flags)
    pub fn object_type(&self) -> u32 {
        self.type_and_flags & OBJECT_TYPE_MASK
    }

    /// Get the storage type flags (upper 2 bits)
    pub fn storage_type(&self) -> u32 {
        self.type_and_flags & OBJ_STORAGE_TYPE_MASK
    }

    /// Classify the object's storage class.
    pub fn storage_class(&self) -> StorageClass {
        match self.storage_type() {
            OBJ_VIRTUAL => StorageClass::Virtual,
            OBJ_EPHEMERAL => StorageClass::Ephemeral,
            _ => StorageClass::Physical,
        }
    }

    /// Whether this is a physical object (address = block number)
    pub fn is_physical(&self) -> bool {
        self.storage_class() == StorageClass::Physical
    }

    /// Whether the low 16 bits identify this as a container superblock.
    pub fn is_nx_superblock(&self) -> bool {
        self.object_type() == OBJECT_TYPE_NX_SUPERBLOCK
    }

    /// Whether the low 16 bits identify this as a checkpoint-map object.
    pub fn is_checkpoint_map(&self) -> bool {
        self.object_type() == OBJECT_TYPE_CHECKPOINT_MAP
    }
}

/// Read a full block at the given block number, verify its checksum, and parse the header.
pub fn read_object<R: Read + Seek>(
    reader: &mut R,
    block_number: u64,
    block_size: u32,
) -> Result<(ObjectHeader, Vec<u8>)> {
    let block = read_block(reader, block_number, block_size)?;

    if !fletcher::verify_object(&block) {
        return Err(BootstrapError::InvalidChecksum(block_number));
    }

    let header = ObjectHeader::parse(&block)?;
    Ok((header, block))
}

/// Read a block at the given block number without checksum verification.
///
/// Goes through `BlockDevice::read_blocks` (spec §4.1): a count short of the
/// single block requested is a failure for this caller, surfaced as an I/O
/// error rather than a silently short buffer.
pub fn read_block<R: Read + Seek>(
    reader: &mut R,
    block_number: u64,
    block_size: u32,
) -> Result<Vec<u8>> {
    let mut block = vec![0u8; block_size as usize];
    let read = crate::block::BlockDevice::read_blocks(reader, &mut block, block_number, block_size, 1)?;
    if read != 1 {
        return Err(BootstrapError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("short read at block {block_number}: got {read} of 1 block"),
        )));
    }
    Ok(block)
}
