//! bootstrap-cli — resolves an APFS container's latest consistent checkpoint
//! and reports what it finds.
//!
//! ```text
//! bootstrap-cli <container-image>
//! ```

use std::io::BufReader;
use std::process;

use apfs::{BootstrapError, FileBlockDevice};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: bootstrap-cli <container-image>");
        process::exit(1);
    }

    let path = std::path::Path::new(&args[1]);
    let device = match FileBlockDevice::open(path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("ABORT {e}");
            process::exit(exit_code_for(&e));
        }
    };
    let mut reader = BufReader::new(device);

    match apfs::bootstrap(&mut reader) {
        Ok(report) => {
            for d in &report.diagnostics.entries {
                eprintln!("{d}");
            }

            println!("container block size: {}", report.superblock.block_size);
            println!("selected checkpoint: descriptor slot {}", report.checkpoint_index);
            println!("transaction id: {}", report.superblock.header.xid);
            println!("ephemeral objects loaded: {}", report.ephemeral_object_count);
            println!("object map tree oid: {}", report.omap_tree_oid);
            println!(
                "object map root: {} keys, {}",
                report.omap_root_nkeys,
                if report.omap_root_is_leaf { "leaf" } else { "non-leaf" }
            );
            println!("live volume oids: {:?}", report.live_volume_oids);
            println!("END bootstrap resolved checkpoint at slot {}", report.checkpoint_index);
        }
        Err(e) => {
            eprintln!("ABORT {e}");
            process::exit(exit_code_for(&e));
        }
    }
}

/// Map a fatal `BootstrapError` to a process exit code (spec §6).
///
/// Argument errors are user mistakes (exit 1). I/O and allocation failures
/// are reported as a distinguishable negative code on platforms that
/// support it; `std::process::exit` truncates to a byte, so "negative" is
/// rendered as 255 rather than a literal negative value. `Unimplemented`
/// is a graceful termination, not a failure, and exits 0 like success.
fn exit_code_for(err: &BootstrapError) -> i32 {
    match err {
        BootstrapError::Argument(_) => 1,
        BootstrapError::Io(_) | BootstrapError::Allocation(_) => {
            if cfg!(unix) {
                255
            } else {
                1
            }
        }
        BootstrapError::Unimplemented(_) => 0,
        _ => 1,
    }
}
