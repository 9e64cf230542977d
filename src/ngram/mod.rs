pub mod counter;
pub mod merge;
pub mod sentence;
pub mod tracer;
pub mod trie;

pub use counter::{CountSession, CounterConfig, NgramCounter, SpillFiles};
pub use merge::{MergeStats, Merger, merge};
pub use sentence::{InputFormat, SentenceReader};
pub use tracer::TrieTracer;
pub use trie::TokenTrie;
