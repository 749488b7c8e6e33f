//! Decoder adapters shipped with vectorcheck.

mod command;
mod dummy;

pub use command::{ChecksumSource, CommandDecoder};
pub use dummy::Dummy;

use std::fs::File;
use std::io;
use std::path::Path;

/// Lower-case hex MD5 of a file's contents
pub fn file_md5(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    io::copy(&mut file, &mut context)?;
    Ok(format!("{:x}", context.compute()))
}
