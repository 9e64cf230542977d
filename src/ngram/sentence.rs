//! Sentence readers for the supported token formats.
//!
//! * `Spaced`: one sentence per line, tokens separated by spaces.
//! * `Mecab` / `Chasen`: one token per line, the token being the text before
//!   the first tab; a line reading `EOS` ends the sentence. Tokens left
//!   over at end of input without a closing `EOS` are discarded.
//!
//! Empty sentences are skipped in every format.

use std::io::{self, BufRead};

use clap::ValueEnum;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    #[default]
    Spaced,
    Mecab,
    Chasen,
}

const END_OF_SENTENCE: &[u8] = b"EOS";

fn strip_right(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &line[..end]
}

pub struct SentenceReader<R> {
    reader: R,
    format: InputFormat,
    line: Vec<u8>,
    line_no: u64,
}

impl<R: BufRead> SentenceReader<R> {
    pub fn new(reader: R, format: InputFormat) -> Self {
        SentenceReader {
            reader,
            format,
            line: Vec::new(),
            line_no: 0,
        }
    }

    /// Lines consumed so far.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    /// Reads the next non-empty sentence, passing each token to `sink` in
    /// order. Returns `false` at end of input.
    pub fn read_sentence<F>(&mut self, sink: F) -> io::Result<bool>
    where
        F: FnMut(&[u8]),
    {
        match self.format {
            InputFormat::Spaced => self.read_spaced(sink),
            InputFormat::Mecab | InputFormat::Chasen => self.read_tagged(sink),
        }
    }

    /// Convenience wrapper collecting the tokens of the next sentence.
    pub fn next_sentence(&mut self) -> io::Result<Option<Vec<Vec<u8>>>> {
        let mut tokens = Vec::new();
        if self.read_sentence(|t| tokens.push(t.to_vec()))? {
            Ok(Some(tokens))
        } else {
            Ok(None)
        }
    }

    fn read_line(&mut self) -> io::Result<bool> {
        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        Ok(true)
    }

    fn read_spaced<F>(&mut self, mut sink: F) -> io::Result<bool>
    where
        F: FnMut(&[u8]),
    {
        while self.read_line()? {
            let mut found = false;
            for token in strip_right(&self.line).split(|&b| b == b' ') {
                if !token.is_empty() {
                    sink(token);
                    found = true;
                }
            }
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_tagged<F>(&mut self, mut sink: F) -> io::Result<bool>
    where
        F: FnMut(&[u8]),
    {
        let mut found = false;
        while self.read_line()? {
            let line = strip_right(&self.line);
            if line == END_OF_SENTENCE {
                if found {
                    return Ok(true);
                }
                continue;
            }
            let token = line.split(|&b| b == b'\t').next().unwrap_or_default();
            if !token.is_empty() {
                sink(token);
                found = true;
            }
        }
        if found {
            log::warn!(
                "line {}: input ended without EOS, dropping the last sentence",
                self.line_no
            );
        }
        Ok(false)
    }
}
