//! Bootstrap Orchestrator (spec §4.9): drives the pipeline end to end and
//! owns the one failure-recovery decision — rewinding to the next-older
//! well-formed checkpoint when ephemeral or omap validation fails.

use std::collections::HashSet;
use std::io::{Read, Seek};

use crate::checkpoint::{self, Checkpoint};
use crate::checkpoint_map;
use crate::descriptor;
use crate::diag::{DiagnosticLog, Severity};
use crate::error::{BootstrapError, Result};
use crate::fletcher;
use crate::object;
use crate::omap;
use crate::selector;
use crate::superblock::NxSuperblock;

/// Everything the Orchestrator resolved about the container's most recent
/// consistent mount point.
pub struct BootstrapReport {
    pub superblock: NxSuperblock,
    pub checkpoint_index: usize,
    pub checkpoint: Checkpoint,
    pub ephemeral_object_count: usize,
    pub omap_tree_oid: u64,
    pub omap_root_nkeys: u32,
    pub omap_root_is_leaf: bool,
    pub live_volume_oids: Vec<u64>,
    pub diagnostics: DiagnosticLog,
}

/// Default provisional block size used for the very first read of block 0,
/// before the real `nx_block_size` is known (spec §4.1).
const PROVISIONAL_BLOCK_SIZE: u32 = 4096;

/// Run the full checkpoint-resolution and metadata-bootstrap pipeline
/// (spec §4.9's S0–S7 state machine) against `reader`.
pub fn bootstrap<R: Read + Seek>(reader: &mut R) -> Result<BootstrapReport> {
    let mut log = DiagnosticLog::new();

    // S0 Open: read block 0, validate warn-only (spec §7 — block 0 is a
    // stale creation-time snapshot and known to drift).
    let block0 = object::read_block(reader, 0, PROVISIONAL_BLOCK_SIZE)?;
    if !fletcher::verify_object(&block0) {
        log.push(Severity::Warning, "block 0: invalid checksum (stale creation-time snapshot, continuing)");
    }

    let provisional = match NxSuperblock::parse(&block0) {
        Ok(sb) => sb,
        Err(e) => {
            log.push(Severity::Warning, format!("block 0: {e} (continuing with provisional block size)"));
            // Block 0 must still decode enough to learn the real block size;
            // if it can't even do that, there is nothing left to bootstrap from.
            return Err(BootstrapError::Structural(format!("block 0 is unreadable as a superblock: {e}")));
        }
    };

    // The first read used a provisional block size; once the real
    // `nx_block_size` is known, re-read and re-parse block 0 at its true
    // size (spec §4.1) so every field downstream — not just `block_size` —
    // reflects the correctly-sized block.
    let provisional = if provisional.block_size != PROVISIONAL_BLOCK_SIZE {
        let block0 = object::read_block(reader, 0, provisional.block_size)?;
        NxSuperblock::parse(&block0)?
    } else {
        provisional
    };
    let block_size = provisional.block_size;

    // S1 LoadDesc
    let area = descriptor::load_descriptor_area(reader, &provisional)?;

    // S2..S6 with rewind on ephemeral/omap validation failure.
    let mut excluded_xids: HashSet<u64> = HashSet::new();

    loop {
        // S2 Select
        let selection = selector::select_checkpoint(&area, &excluded_xids, &mut log)
            .ok_or_else(|| BootstrapError::Structural("no well-formed checkpoint superblock found".into()))?;

        let sb = selection.superblock;
        let start = sb.xp_desc_index as usize;
        let len = sb.xp_desc_len as usize;

        // S3 Assemble
        let assembled = match checkpoint::assemble_checkpoint(&area, start, len, sb.header.xid) {
            Ok(c) => c,
            Err(e) => {
                log.push(Severity::Warning, format!("checkpoint at index {}: {e}, rewinding", selection.index));
                excluded_xids.insert(sb.header.xid);
                continue;
            }
        };

        // S4 LoadEphem
        let ephemeral = checkpoint_map::load_ephemeral_objects(
            reader,
            &assembled.checkpoint_maps,
            block_size,
            sb.block_count,
        )?;

        // S5 ValidateEphem
        if let Some(bad_index) = ephemeral.first_invalid {
            log.push(Severity::Error, format!(
                "ephemeral object {bad_index} FAILED checksum validation. Going back to look at the previous checkpoint"
            ));
            excluded_xids.insert(sb.header.xid);
            continue;
        }

        // S6 LoadOmap
        let om = match omap::load_object_map(reader, sb.omap_oid, block_size) {
            Ok(v) => v,
            Err(BootstrapError::InvalidChecksum(_)) => {
                log.push(Severity::Error, "object map FAILED checksum validation. Going back to look at the previous checkpoint");
                excluded_xids.insert(sb.header.xid);
                continue;
            }
            Err(e) => return Err(e),
        };

        if !om.tree_is_physical() {
            return Err(BootstrapError::Unimplemented(
                "object-map B-tree root is not physical; not directly addressable under this design".into(),
            ));
        }

        let (root, root_valid) = omap::load_omap_root(reader, om.tree_oid, block_size)?;
        if !root_valid {
            log.push(Severity::Warning, "object-map B-tree root: invalid checksum (presenting anyway)");
        }

        // S7 ReportFS
        let live_volume_oids = sb.live_fs_oids().to_vec();

        log.push(Severity::Info, format!("bootstrap complete: checkpoint lies at index {}", selection.index));

        return Ok(BootstrapReport {
            checkpoint_index: selection.index,
            ephemeral_object_count: ephemeral.blocks.len(),
            omap_tree_oid: om.tree_oid,
            omap_root_nkeys: root.node_header.btn_nkeys,
            omap_root_is_leaf: root.node_header.is_leaf(),
            live_volume_oids,
            superblock: sb,
            checkpoint: assembled,
            diagnostics: log,
        });
    }
}
