use thiserror::Error;

/// The five error kinds a bootstrap attempt can fail with (see spec §7).
///
/// `Argument` and `Io`/`Allocation` are fatal for the whole process.
/// `Structural` failures discovered while validating ephemeral objects or
/// the object map are recoverable: the orchestrator rewinds to the
/// next-older well-formed checkpoint. `Unimplemented` marks a recognized
/// but deliberately unhandled on-disk shape.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("argument error: {0}")]
    Argument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("allocation refused: {0}")]
    Allocation(String),

    #[error("invalid magic: 0x{0:08X}")]
    InvalidMagic(u32),

    #[error("invalid checksum at paddr {0}")]
    InvalidChecksum(u64),

    #[error("structural error: {0}")]
    Structural(String),

    #[error("unimplemented: {0}")]
    Unimplemented(String),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
