use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{source_name}:{line}: {reason}")]
    Malformed {
        source_name: String,
        line: u64,
        reason: &'static str,
    },

    #[error("{source_name}:{line}: input is not sorted")]
    OutOfOrder { source_name: String, line: u64 },

    #[error("token trie is full ({slots} slots)")]
    TrieFull { slots: usize },

    #[error("duplicate n-gram found while sorting")]
    DuplicateNgram,

    #[error("too many output files (limit {limit})")]
    TooManyOutputFiles { limit: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
