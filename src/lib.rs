pub mod block;
pub mod btree;
pub mod checkpoint;
pub mod checkpoint_map;
pub mod descriptor;
pub mod diag;
pub mod error;
pub mod fletcher;
pub mod object;
pub mod omap;
pub mod orchestrator;
pub mod selector;
pub mod superblock;

pub use block::{BlockDevice, FileBlockDevice};
pub use diag::{Diagnostic, DiagnosticLog, Severity};
pub use error::{BootstrapError, Result};
pub use orchestrator::{bootstrap, BootstrapReport};
pub use superblock::NxSuperblock;
