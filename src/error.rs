use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("missing required tag {0}")]
    MissingTag(&'static str),

    #[error("invalid FEN tag: {0}")]
    InvalidFen(String),

    #[error("illegal move {san} at ply {ply}")]
    IllegalMove { san: String, ply: u32 },

    #[error("{0}")]
    Usage(String),
}
