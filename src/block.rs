//! Block Reader (spec §4.1): random-access, fixed-granularity reads over a
//! container image, addressed by physical block number.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;

/// Random-access block-granular reader over a container image.
///
/// `read_blocks` returns the number of blocks actually read; anything short
/// of `count` is a failure for the caller (see spec §4.1). A short read is
/// not itself an error here — the caller decides whether a shortfall is
/// fatal, matching spec's separation between the Block Reader surfacing a
/// count and the Orchestrator deciding what to do with it.
pub trait BlockDevice {
    fn read_blocks(&mut self, dst: &mut [u8], paddr: u64, block_size: u32, count: u32) -> Result<u32>;
}

impl<T: Read + Seek> BlockDevice for T {
    fn read_blocks(&mut self, dst: &mut [u8], paddr: u64, block_size: u32, count: u32) -> Result<u32> {
        let offset = paddr * block_size as u64;
        self.seek(SeekFrom::Start(offset))?;

        let want = (block_size as u64 * count as u64) as usize;
        if dst.len() < want {
            return Err(crate::error::BootstrapError::Argument(format!(
                "destination buffer too small: have {}, need {}",
                dst.len(),
                want
            )));
        }

        let mut read_bytes = 0usize;
        while read_bytes < want {
            match self.read(&mut dst[read_bytes..want]) {
                Ok(0) => break,
                Ok(n) => read_bytes += n,
                Err(e) => return Err(e.into()),
            }
        }

        Ok((read_bytes / block_size as usize) as u32)
    }
}

/// Thin adapter over `std::fs::File`, the usual entry point for the CLI.
pub struct FileBlockDevice {
    file: File,
}

impl FileBlockDevice {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        Ok(FileBlockDevice { file: File::open(path)? })
    }
}

impl Read for FileBlockDevice {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for FileBlockDevice {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}
