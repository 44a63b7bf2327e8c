pub mod extract;
pub mod reader;

pub use extract::{split_games, Extracted, Extractor};
pub use reader::{BlockReader, DEFAULT_BLOCK_SIZE};

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Opens a PGN file, transparently decompressing `.bz2` and `.zst` archives.
pub fn open_source(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    let extension = path.extension();
    Ok(if extension == Some("bz2".as_ref()) {
        Box::new(bzip2::read::MultiBzDecoder::new(file))
    } else if extension == Some("zst".as_ref()) {
        Box::new(zstd::Decoder::new(file)?)
    } else {
        Box::new(file)
    })
}
