pub mod bit_set;
pub mod error;
pub mod file;
pub mod heap_queue;
pub mod multikey_sort;
pub mod ngram;
pub mod token_map;

pub use error::{Error, Result};

/// Prefix format for spill files when none is given.
pub const DEFAULT_PREFIX_FORMAT: &str = "ngms-%Y%m%d-%H%M%S";

/// Spill-file prefix built from the local time, e.g. `ngms-20240131-235959`.
pub fn default_output_prefix() -> String {
    chrono::Local::now().format(DEFAULT_PREFIX_FORMAT).to_string()
}
