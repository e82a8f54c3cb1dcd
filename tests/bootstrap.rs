//! End-to-end bootstrap scenarios against synthetic, hand-built container
//! images. No external fixture file is needed or used.

use std::io::Cursor;

use apfs::btree::{BTNODE_LEAF, BTNODE_ROOT};
use apfs::diag::Severity;
use apfs::error::BootstrapError;
use apfs::fletcher::write_checksum;
use apfs::object::{
    OBJECT_TYPE_BTREE_NODE, OBJECT_TYPE_CHECKPOINT_MAP, OBJECT_TYPE_NX_SUPERBLOCK, OBJECT_TYPE_OMAP,
};
use apfs::superblock::NX_MAGIC;

const BS: u32 = 4096;

fn nxsb_block(
    xid: u64,
    desc_base: u64,
    desc_blocks: u32,
    desc_index: u32,
    desc_len: u32,
    omap_oid: u64,
    block_count: u64,
) -> Vec<u8> {
    let mut block = vec![0u8; BS as usize];
    block[16..24].copy_from_slice(&xid.to_le_bytes());
    block[24..28].copy_from_slice(&OBJECT_TYPE_NX_SUPERBLOCK.to_le_bytes());
    block[32..36].copy_from_slice(&NX_MAGIC.to_le_bytes());
    block[36..40].copy_from_slice(&BS.to_le_bytes());
    block[40..48].copy_from_slice(&block_count.to_le_bytes());
    block[104..108].copy_from_slice(&desc_blocks.to_le_bytes());
    block[112..120].copy_from_slice(&desc_base.to_le_bytes());
    block[136..140].copy_from_slice(&desc_index.to_le_bytes());
    block[140..144].copy_from_slice(&desc_len.to_le_bytes());
    block[160..168].copy_from_slice(&omap_oid.to_le_bytes());
    write_checksum(&mut block);
    block
}

fn cpm_block(entries: &[(u64, u64)]) -> Vec<u8> {
    let mut block = vec![0u8; BS as usize];
    block[24..28].copy_from_slice(&OBJECT_TYPE_CHECKPOINT_MAP.to_le_bytes());
    block[36..40].copy_from_slice(&(entries.len() as u32).to_le_bytes());
    let mut off = 40;
    for (oid, paddr) in entries {
        block[off + 24..off + 32].copy_from_slice(&oid.to_le_bytes());
        block[off + 32..off + 40].copy_from_slice(&paddr.to_le_bytes());
        off += 40;
    }
    write_checksum(&mut block);
    block
}

fn omap_block(tree_oid: u64) -> Vec<u8> {
    let mut block = vec![0u8; BS as usize];
    block[24..28].copy_from_slice(&OBJECT_TYPE_OMAP.to_le_bytes());
    block[32 + 16..32 + 24].copy_from_slice(&tree_oid.to_le_bytes());
    write_checksum(&mut block);
    block
}

fn root_node_block() -> Vec<u8> {
    let mut block = vec![0u8; BS as usize];
    block[24..28].copy_from_slice(&OBJECT_TYPE_BTREE_NODE.to_le_bytes());
    let flags = BTNODE_ROOT | BTNODE_LEAF;
    block[32..34].copy_from_slice(&flags.to_le_bytes());
    write_checksum(&mut block);
    block
}

fn ephemeral_block() -> Vec<u8> {
    let mut block = vec![0u8; BS as usize];
    write_checksum(&mut block);
    block
}

fn place(image: &mut [u8], slot: u64, block: &[u8]) {
    let start = (slot * BS as u64) as usize;
    image[start..start + BS as usize].copy_from_slice(block);
}

fn blank_image(total_blocks: u64) -> Vec<u8> {
    vec![0u8; BS as usize * total_blocks as usize]
}

/// Scenario 1: happy path. D=8, latest superblock at index 5, xid 100,
/// checkpoint (index=5, len=3), every checksum valid, omap tree physical.
#[test]
fn happy_path_resolves_latest_checkpoint() {
    // D=8 at desc_base=1 (ring idx i ↔ block 1+i). Latest superblock at ring
    // idx 5 (block 6), checkpoint (index=5, len=3): ring[5,6,7] = blocks[6,7,8].
    let total_blocks = 20u64;
    let mut image = blank_image(total_blocks);

    let block0 = nxsb_block(1, 1, 8, 5, 3, 16, total_blocks);
    place(&mut image, 0, &block0);

    place(&mut image, 1, &cpm_block(&[])); // ring idx 0
    place(&mut image, 2, &cpm_block(&[])); // ring idx 1
    place(&mut image, 3, &cpm_block(&[])); // ring idx 2
    place(&mut image, 4, &cpm_block(&[])); // ring idx 3
    place(&mut image, 5, &cpm_block(&[])); // ring idx 4
    let sb100 = nxsb_block(100, 1, 8, 5, 3, 16, total_blocks);
    place(&mut image, 6, &sb100); // ring idx 5
    place(&mut image, 7, &cpm_block(&[(1, 17), (2, 18)])); // ring idx 6
    place(&mut image, 8, &cpm_block(&[])); // ring idx 7

    place(&mut image, 16, &omap_block(19));
    place(&mut image, 17, &ephemeral_block());
    place(&mut image, 18, &ephemeral_block());
    place(&mut image, 19, &root_node_block());

    let mut cursor = Cursor::new(image);
    let report = apfs::bootstrap(&mut cursor).unwrap();

    assert_eq!(report.checkpoint_index, 5);
    assert_eq!(report.superblock.header.xid, 100);
    assert_eq!(report.ephemeral_object_count, 2);
}

/// Scenario 2: wrapped checkpoint. D=8, latest at index 6, len=4 — the
/// assembled order must be logical slots 6,7,0,1.
#[test]
fn wrapped_checkpoint_preserves_logical_order() {
    let total_blocks = 30u64;
    let mut image = blank_image(total_blocks);

    let block0 = nxsb_block(1, 1, 8, 0, 0, 0, total_blocks);
    place(&mut image, 0, &block0);

    for i in 0..6u64 {
        place(&mut image, 1 + i, &cpm_block(&[])); // ring idx 0..5
    }
    let sb = nxsb_block(7, 1, 8, 6, 4, 20, total_blocks);
    place(&mut image, 7, &sb); // ring idx 6
    place(&mut image, 8, &cpm_block(&[])); // ring idx 7

    place(&mut image, 20, &omap_block(21));
    place(&mut image, 21, &root_node_block());

    let mut cursor = Cursor::new(image);
    let report = apfs::bootstrap(&mut cursor).unwrap();

    assert_eq!(report.checkpoint_index, 6);
    assert_eq!(report.checkpoint.blocks.len(), 4);
    let sb_position = report
        .checkpoint
        .blocks
        .iter()
        .position(|b| apfs::object::ObjectHeader::parse(b).unwrap().is_nx_superblock())
        .unwrap();
    assert_eq!(sb_position, 0, "superblock should be the first logical slot (ring idx 6)");
}

/// Scenario 3: block 0's checksum is invalid but the descriptor area is
/// healthy. A warning is emitted and the pipeline still succeeds.
#[test]
fn stale_block_zero_checksum_is_warn_only() {
    let total_blocks = 20u64;
    let mut image = blank_image(total_blocks);

    let mut block0 = nxsb_block(1, 1, 4, 0, 1, 10, total_blocks);
    block0[0] ^= 0xFF; // break block 0's checksum without touching its fields
    place(&mut image, 0, &block0);

    let sb = nxsb_block(5, 1, 4, 0, 1, 10, total_blocks);
    place(&mut image, 1, &sb); // ring idx 0
    place(&mut image, 2, &cpm_block(&[]));
    place(&mut image, 3, &cpm_block(&[]));
    place(&mut image, 4, &cpm_block(&[]));

    place(&mut image, 10, &omap_block(11));
    place(&mut image, 11, &root_node_block());

    let mut cursor = Cursor::new(image);
    let report = apfs::bootstrap(&mut cursor).unwrap();

    assert_eq!(report.superblock.header.xid, 5);
    assert!(report
        .diagnostics
        .entries
        .iter()
        .any(|d| d.severity == Severity::Warning && d.message.contains("block 0")));
}

/// Scenario 4: one descriptor slot between two valid superblocks has a bad
/// checksum. The slot is skipped with a warning; selection still finds the
/// newest valid superblock.
#[test]
fn corrupt_descriptor_slot_is_skipped() {
    let total_blocks = 20u64;
    let mut image = blank_image(total_blocks);

    let block0 = nxsb_block(1, 1, 4, 2, 1, 10, total_blocks);
    place(&mut image, 0, &block0);

    let older = nxsb_block(3, 1, 4, 0, 1, 10, total_blocks);
    place(&mut image, 1, &older); // ring idx 0

    let mut corrupt = cpm_block(&[]);
    corrupt[0] ^= 0xFF;
    place(&mut image, 2, &corrupt); // ring idx 1, corrupt

    let newest = nxsb_block(9, 1, 4, 2, 1, 10, total_blocks);
    place(&mut image, 3, &newest); // ring idx 2
    place(&mut image, 4, &cpm_block(&[]));

    place(&mut image, 10, &omap_block(11));
    place(&mut image, 11, &root_node_block());

    let mut cursor = Cursor::new(image);
    let report = apfs::bootstrap(&mut cursor).unwrap();

    assert_eq!(report.superblock.header.xid, 9);
    assert!(report
        .diagnostics
        .entries
        .iter()
        .any(|d| d.severity == Severity::Warning && d.message.contains("descriptor slot 1")));
}

/// Scenario 5: high bit of `nx_xp_desc_blocks` set — a non-contiguous,
/// B-tree-backed descriptor area. Graceful unimplemented termination.
#[test]
fn noncontiguous_descriptor_is_unimplemented() {
    const XP_DESC_NONCONTIGUOUS_FLAG: u32 = 0x8000_0000;
    let total_blocks = 10u64;
    let mut image = blank_image(total_blocks);

    let block0 = nxsb_block(1, 1, 4 | XP_DESC_NONCONTIGUOUS_FLAG, 0, 1, 0, total_blocks);
    place(&mut image, 0, &block0);

    let mut cursor = Cursor::new(image);
    let result = apfs::bootstrap(&mut cursor);
    assert!(matches!(result, Err(BootstrapError::Unimplemented(_))));
}

/// Scenario 6: one referenced ephemeral block fails checksum. The pipeline
/// reports a validation failure and rewinds to the next-older checkpoint.
#[test]
fn bad_ephemeral_object_rewinds_to_older_checkpoint() {
    let total_blocks = 50u64;
    let mut image = blank_image(total_blocks);

    let block0 = nxsb_block(1, 1, 8, 0, 0, 0, total_blocks);
    place(&mut image, 0, &block0);

    let sb_old = nxsb_block(50, 1, 8, 0, 2, 30, total_blocks);
    place(&mut image, 1, &sb_old); // ring idx 0
    place(&mut image, 2, &cpm_block(&[(1, 21)])); // ring idx 1, valid ephemeral

    let sb_new = nxsb_block(100, 1, 8, 2, 2, 40, total_blocks);
    place(&mut image, 3, &sb_new); // ring idx 2
    place(&mut image, 4, &cpm_block(&[(2, 22)])); // ring idx 3, bad ephemeral

    for i in 4..8u64 {
        place(&mut image, 1 + i, &cpm_block(&[]));
    }

    place(&mut image, 21, &ephemeral_block());
    // block 22 left all-zero: fails checksum.

    place(&mut image, 30, &omap_block(31));
    place(&mut image, 31, &root_node_block());

    let mut cursor = Cursor::new(image);
    let report = apfs::bootstrap(&mut cursor).unwrap();

    assert_eq!(report.superblock.header.xid, 50);
    assert!(report.diagnostics.entries.iter().any(|d| {
        d.severity == Severity::Error && d.message.contains("FAILED") && d.message.contains("Going back")
    }));
}
