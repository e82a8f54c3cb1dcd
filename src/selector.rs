//! Checkpoint Selector (spec §4.5): scans the loaded descriptor area and
//! chooses the newest well-formed superblock by transaction id.

use std::collections::HashSet;

use crate::descriptor::DescriptorArea;
use crate::diag::{DiagnosticLog, Severity};
use crate::fletcher;
use crate::object::ObjectHeader;
use crate::superblock::NxSuperblock;

/// The Selector's pick: the ring index of the winning superblock slot and
/// its parsed contents.
pub struct Selection {
    pub index: usize,
    pub superblock: NxSuperblock,
}

/// Scan `area` for the newest well-formed container superblock.
///
/// `excluded_xids` supports the Orchestrator's rewind policy (spec §4.7,
/// §4.9 S5/S6): superblocks whose xid is in this set are treated as if
/// they did not pass validation, so a second call after an ephemeral/omap
/// failure naturally picks the next-older candidate.
///
/// Tie-break is strict greater-than with `i_latest` initialized to 0 (spec
/// §4.5): the scan is left-to-right and only strict xid improvements move
/// the pick, so the earliest index at the maximum xid wins and a corrupt
/// slot 0 does not prevent a later strictly-greater candidate from being
/// surfaced.
pub fn select_checkpoint(
    area: &DescriptorArea,
    excluded_xids: &HashSet<u64>,
    log: &mut DiagnosticLog,
) -> Option<Selection> {
    if area.is_empty() {
        return None;
    }

    let mut best: Option<Selection> = None;
    let mut best_xid: u64 = 0;
    let mut have_best = false;

    for (i, block) in area.blocks.iter().enumerate() {
        if !fletcher::verify_object(block) {
            log.push(Severity::Warning, format!("descriptor slot {i}: invalid checksum, skipping"));
            continue;
        }

        let header = match ObjectHeader::parse(block) {
            Ok(h) => h,
            Err(e) => {
                log.push(Severity::Warning, format!("descriptor slot {i}: malformed header ({e}), skipping"));
                continue;
            }
        };

        if header.is_nx_superblock() {
            let sb = match NxSuperblock::parse(block) {
                Ok(sb) => sb,
                Err(e) => {
                    log.push(Severity::Warning, format!("descriptor slot {i}: bad superblock ({e}), skipping"));
                    continue;
                }
            };

            if excluded_xids.contains(&sb.header.xid) {
                log.push(Severity::Warning, format!("descriptor slot {i}: xid {} excluded by rewind, skipping", sb.header.xid));
                continue;
            }

            let xid = sb.header.xid;
            let improves = if have_best { xid > best_xid } else { true };
            if improves {
                best_xid = xid;
                have_best = true;
                best = Some(Selection { index: i, superblock: sb });
            }
        } else if header.is_checkpoint_map() {
            // Accepted silently; the Assembler is what actually cares about
            // checkpoint-map slots.
        } else {
            log.push(Severity::Warning, format!(
                "descriptor slot {i}: object type {:#x} is neither a superblock nor a checkpoint-map, skipping",
                header.object_type()
            ));
        }
    }

    best
}
