//! Counting orchestrator: interns tokens, feeds sentences into the trie,
//! decides when to spill and writes spill files.

use std::io::{BufRead, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::file::{LineBuffer, OutputFile};
use crate::multikey_sort::{self, KeyHandler, RejectDuplicates};
use crate::ngram::sentence::{InputFormat, SentenceReader};
use crate::ngram::tracer::TrieTracer;
use crate::ngram::trie::{self, TokenTrie};
use crate::token_map::{TokenId, TokenMap};

pub const MIN_MEMORY_LIMIT: usize = 2 << 20;
pub const DEFAULT_MEMORY_LIMIT: usize = 1024 << 20;
pub const MIN_MAX_NGRAM_LENGTH: usize = trie::MIN_MAX_DEPTH;
pub const DEFAULT_MAX_NGRAM_LENGTH: usize = trie::DEFAULT_MAX_DEPTH;

pub const START_TOKEN: &[u8] = b"<S>";
pub const END_TOKEN: &[u8] = b"</S>";
pub const START_TOKEN_ID: TokenId = 0;
pub const END_TOKEN_ID: TokenId = 1;

/// In sorted mode the trie gets `memory_limit / (BASE + PER_TOKEN * n) * 100`
/// bytes, leaving the rest for the sort buffers. Empirical, not a bound.
pub const SORTED_TRIE_DIVISOR_BASE: usize = 164;
pub const SORTED_TRIE_DIVISOR_PER_TOKEN: usize = 13;

/// Spill before any frequency can overflow an `i32`.
const MAX_FREQ_LIMIT: i32 = i32::MAX / 2;
/// Spill once this share of the trie's slots is occupied.
const MAX_LOAD_FACTOR: f64 = 0.8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterConfig {
    pub max_ngram_length: usize,
    /// Memory budget in bytes.
    pub memory_limit: usize,
    pub format: InputFormat,
    /// Wrap every sentence in `<S>` ... `</S>`.
    pub boundary: bool,
    /// Sort each spill by n-gram text.
    pub sort: bool,
}

impl Default for CounterConfig {
    fn default() -> Self {
        CounterConfig {
            max_ngram_length: DEFAULT_MAX_NGRAM_LENGTH,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            format: InputFormat::default(),
            boundary: false,
            sort: false,
        }
    }
}

impl CounterConfig {
    /// Applies defaults for zero values and raises values below the minimum.
    fn normalized(mut self) -> Self {
        self.max_ngram_length = match self.max_ngram_length {
            0 => DEFAULT_MAX_NGRAM_LENGTH,
            n => n.max(MIN_MAX_NGRAM_LENGTH),
        };
        self.memory_limit = match self.memory_limit {
            0 => DEFAULT_MEMORY_LIMIT,
            m => m.max(MIN_MEMORY_LIMIT),
        };
        self
    }

    /// Bytes handed to the trie table.
    pub fn trie_memory(&self) -> usize {
        if self.sort {
            self.memory_limit
                / (SORTED_TRIE_DIVISOR_BASE + SORTED_TRIE_DIVISOR_PER_TOKEN * self.max_ngram_length)
                * 100
        } else {
            self.memory_limit
        }
    }
}

/// Unit extractor for the ids of one n-gram inside the flat sort buffer.
/// Keys are offsets; any negative value ends a key.
struct SequenceKeys<'a>(&'a [i32]);

impl KeyHandler<usize> for SequenceKeys<'_> {
    type Unit = i32;

    #[inline]
    fn unit(&self, key: &usize, depth: usize) -> i32 {
        let v = self.0[key + depth];
        if v >= 0 { v } else { -1 }
    }

    #[inline]
    fn is_terminal(&self, unit: i32) -> bool {
        unit == -1
    }
}

/// Unit extractor ordering token ids by their text.
struct TokenKeys<'a>(&'a TokenMap);

impl KeyHandler<TokenId> for TokenKeys<'_> {
    type Unit = u8;

    #[inline]
    fn unit(&self, key: &TokenId, depth: usize) -> u8 {
        self.0.text(*key).get(depth).copied().unwrap_or(0)
    }

    #[inline]
    fn is_terminal(&self, unit: u8) -> bool {
        unit == 0
    }
}

pub struct NgramCounter {
    config: CounterConfig,
    token_map: TokenMap,
    trie: TokenTrie,
    tokens: Vec<TokenId>,
    token_count: u64,
    sentence_count: u64,
    max_freq_limit: i32,
}

impl NgramCounter {
    pub fn new(config: CounterConfig) -> Self {
        let config = config.normalized();
        let trie = TokenTrie::new(config.max_ngram_length, config.trie_memory());
        let mut counter = NgramCounter {
            config,
            token_map: TokenMap::new(),
            trie,
            tokens: Vec::new(),
            token_count: 0,
            sentence_count: 0,
            max_freq_limit: MAX_FREQ_LIMIT,
        };
        counter.clear();
        counter
    }

    #[cfg(test)]
    fn with_max_freq_limit(mut self, limit: i32) -> Self {
        self.max_freq_limit = limit;
        self
    }

    pub fn max_ngram_length(&self) -> usize {
        self.trie.max_depth()
    }

    pub fn memory_limit(&self) -> usize {
        self.config.memory_limit
    }

    /// Tokens counted so far, boundary tokens included.
    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    pub fn sentence_count(&self) -> u64 {
        self.sentence_count
    }

    pub fn vocabulary_size(&self) -> usize {
        self.token_map.len()
    }

    pub fn trie(&self) -> &TokenTrie {
        &self.trie
    }

    /// True if nothing has been counted since the last spill.
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Discards all counts and the vocabulary.
    pub fn clear(&mut self) {
        self.token_map.clear();
        if self.config.boundary {
            self.token_map.intern(START_TOKEN);
            self.token_map.intern(END_TOKEN);
        }
        self.trie.clear();
    }

    /// Reads one sentence from `reader` and counts it. Returns `false` at end
    /// of input.
    pub fn count<R: BufRead>(&mut self, reader: &mut SentenceReader<R>) -> Result<bool> {
        let mut tokens = mem::take(&mut self.tokens);
        tokens.clear();
        if self.config.boundary {
            tokens.push(START_TOKEN_ID);
        }
        let token_map = &mut self.token_map;
        let found = reader.read_sentence(|t| tokens.push(token_map.intern(t)))?;
        let result = if found {
            self.insert_tokens(&mut tokens)
        } else {
            Ok(())
        };
        self.tokens = tokens;
        result.map(|()| found)
    }

    /// Counts one already tokenized sentence. Empty sentences are ignored.
    pub fn add_sentence<I, T>(&mut self, sentence: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut tokens = mem::take(&mut self.tokens);
        tokens.clear();
        if self.config.boundary {
            tokens.push(START_TOKEN_ID);
        }
        let start = tokens.len();
        tokens.extend(sentence.into_iter().map(|t| self.token_map.intern(t.as_ref())));
        let result = if tokens.len() > start {
            self.insert_tokens(&mut tokens)
        } else {
            Ok(())
        };
        self.tokens = tokens;
        result
    }

    fn insert_tokens(&mut self, tokens: &mut Vec<TokenId>) -> Result<()> {
        if self.config.boundary {
            tokens.push(END_TOKEN_ID);
        }
        self.trie.insert(tokens)?;
        self.token_count += tokens.len() as u64;
        self.sentence_count += 1;
        Ok(())
    }

    /// Whether the trie should be spilled before counting more.
    pub fn needs_flush(&self) -> bool {
        if self.trie.max_freq() >= self.max_freq_limit {
            debug!("flush: max frequency {} near overflow", self.trie.max_freq());
            return true;
        }
        if !self.trie.is_empty() {
            let load = self.trie.num_nodes() as f64 / self.trie.table_size() as f64;
            if load >= MAX_LOAD_FACTOR {
                debug!("flush: trie load factor {:.3}", load);
                return true;
            }
        }
        if self.config.sort {
            let list_usage = (self.trie.total_length() + self.trie.num_nodes()) * mem::size_of::<i32>();
            if list_usage + self.trie.memory_usage() > self.config.memory_limit {
                debug!("flush: sort buffer would need {} bytes", list_usage);
                return true;
            }
        }
        false
    }

    /// Writes every counted n-gram to `out` as `tokens\tfreq` lines and
    /// clears the counter. Returns the number of lines written.
    pub fn flush<W: Write>(&mut self, out: W) -> Result<u64> {
        let started = Instant::now();
        let num_nodes = self.trie.num_nodes();
        let total_length = self.trie.total_length();
        let result = if self.config.sort {
            self.flush_sorted(out)
        } else {
            self.flush_unsorted(out)
        };
        self.clear();
        let lines = result?;
        debug!(
            "flushed {} n-grams ({} nodes, total length {}) in {:.2?}",
            lines,
            num_nodes,
            total_length,
            started.elapsed()
        );
        Ok(lines)
    }

    fn flush_unsorted<W: Write>(&mut self, out: W) -> Result<u64> {
        let mut lb = LineBuffer::new(out);
        let mut tracer = TrieTracer::new(&self.trie);
        let mut tokens = Vec::new();
        while let Some(freq) = tracer.next_into(&mut tokens) {
            let token_map = &self.token_map;
            lb.write_ngram(tokens.iter().map(|&id| token_map.text(id)), freq as u64)?;
            tokens.clear();
        }
        let lines = lb.lines();
        lb.finish()?;
        Ok(lines)
    }

    /// Sorted spill. All n-grams go into one flat buffer, each stored as its
    /// ids followed by the negated frequency; the buffer starts with a
    /// negative sentinel so every key is preceded by a negative value. Ids are
    /// relabelled so that id order equals text order, then the keys (buffer
    /// offsets) are multikey-sorted.
    fn flush_sorted<W: Write>(&mut self, out: W) -> Result<u64> {
        let mut records: Vec<i32> = Vec::with_capacity(self.trie.total_length() + self.trie.num_nodes());
        records.push(-1);
        {
            let mut tracer = TrieTracer::new(&self.trie);
            let mut path = Vec::new();
            while let Some(freq) = tracer.next_into(&mut path) {
                records.extend(path.drain(..).map(|id| id as i32));
                records.push(-freq);
            }
        }
        let num_keys = self.trie.num_nodes().saturating_sub(1);
        // The table is no longer needed; free it before sorting.
        self.trie.clear();

        let mut order: Vec<TokenId> = (0..self.token_map.len() as TokenId).collect();
        multikey_sort::sort(&mut order, &TokenKeys(&self.token_map));
        let mut rank = vec![0i32; order.len()];
        for (i, &id) in order.iter().enumerate() {
            rank[id as usize] = i as i32;
        }
        for v in records.iter_mut() {
            if *v >= 0 {
                *v = rank[*v as usize];
            }
        }
        drop(rank);

        let mut keys: Vec<usize> = Vec::with_capacity(num_keys);
        for i in 1..records.len() {
            if records[i - 1] < 0 {
                keys.push(i);
            }
        }
        if !multikey_sort::sort_with(&mut keys, 0, &SequenceKeys(&records), &mut RejectDuplicates) {
            return Err(Error::DuplicateNgram);
        }

        let mut lb = LineBuffer::new(out);
        for &key in &keys {
            let end = key + records[key..].iter().position(|&v| v < 0).unwrap_or(0);
            let freq = -(records[end] as i64);
            let token_map = &self.token_map;
            lb.write_ngram(
                records[key..end].iter().map(|&r| token_map.text(order[r as usize])),
                freq as u64,
            )?;
        }
        let lines = lb.lines();
        lb.finish()?;
        Ok(lines)
    }
}

/// Names spill files `<prefix>.<NNNN>[.<extension>]`.
#[derive(Clone, Debug)]
pub struct SpillFiles {
    prefix: String,
    extension: String,
    max_files: usize,
    next_id: usize,
}

impl SpillFiles {
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>, max_files: usize) -> Self {
        SpillFiles {
            prefix: prefix.into(),
            extension: extension.into(),
            max_files,
            next_id: 0,
        }
    }

    pub fn path(&self, id: usize) -> PathBuf {
        let mut name = format!("{}.{:04}", self.prefix, id);
        if !self.extension.is_empty() {
            name.push('.');
            name.push_str(&self.extension);
        }
        PathBuf::from(name)
    }

    /// Reserves the next file name.
    pub fn next_path(&mut self) -> Result<PathBuf> {
        if self.next_id >= self.max_files {
            return Err(Error::TooManyOutputFiles {
                limit: self.max_files,
            });
        }
        let path = self.path(self.next_id);
        self.next_id += 1;
        Ok(path)
    }
}

/// Runs a counter over any number of inputs, spilling into numbered files.
pub struct CountSession {
    counter: NgramCounter,
    spills: SpillFiles,
    written: Vec<PathBuf>,
    progress: Option<Box<dyn FnMut(&NgramCounter)>>,
}

/// Sentences between two progress callbacks.
pub const PROGRESS_INTERVAL: u64 = 10_000;

impl CountSession {
    pub fn new(counter: NgramCounter, spills: SpillFiles) -> Self {
        CountSession {
            counter,
            spills,
            written: Vec::new(),
            progress: None,
        }
    }

    /// Called every [`PROGRESS_INTERVAL`] sentences and before each spill.
    pub fn on_progress(&mut self, f: impl FnMut(&NgramCounter) + 'static) {
        self.progress = Some(Box::new(f));
    }

    pub fn counter(&self) -> &NgramCounter {
        &self.counter
    }

    /// Counts every sentence in `input`, spilling as needed.
    pub fn count<R: BufRead>(&mut self, input: R) -> Result<()> {
        let mut reader = SentenceReader::new(input, self.counter.config.format);
        while self.counter.count(&mut reader)? {
            if self.counter.needs_flush() {
                self.spill()?;
            }
            if self.counter.sentence_count() % PROGRESS_INTERVAL == 0 {
                self.report();
            }
        }
        Ok(())
    }

    /// Spills whatever is left and returns every file written.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        if !self.counter.is_empty() {
            self.spill()?;
        }
        Ok(self.written)
    }

    fn report(&mut self) {
        if let Some(f) = self.progress.as_mut() {
            f(&self.counter);
        }
    }

    fn spill(&mut self) -> Result<()> {
        self.report();
        let path = self.spills.next_path()?;
        info!(
            "output: {} ({} nodes, total length {})",
            path.display(),
            self.counter.trie().num_nodes(),
            self.counter.trie().total_length()
        );
        write_spill(&mut self.counter, &path)?;
        self.written.push(path);
        Ok(())
    }
}

fn write_spill(counter: &mut NgramCounter, path: &Path) -> Result<()> {
    let mut file = OutputFile::create(Some(path))?;
    counter.flush(&mut file)?;
    file.finish()?;
    Ok(())
}
