//! k-way merge of sorted `tokens\tfreq` files.
//!
//! Every input must be sorted by its key, the line up to and including the
//! last tab. Heads of all inputs sit in a [`HeapQueue`]; equal keys are summed
//! and each key is written once, if its total reaches the threshold.

use std::io::{BufRead, Write};
use std::time::Instant;

use log::info;

use crate::error::{Error, Result};
use crate::file::LineBuffer;
use crate::heap_queue::HeapQueue;

/// Input lines between two progress callbacks.
pub const PROGRESS_INTERVAL: u64 = 1_000_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub input_lines: u64,
    pub output_lines: u64,
}

impl MergeStats {
    /// Share of input lines that made it to the output, in percent.
    pub fn output_ratio(&self) -> f64 {
        if self.input_lines == 0 {
            0.0
        } else {
            100.0 * self.output_lines as f64 / self.input_lines as f64
        }
    }
}

struct Source<R> {
    name: String,
    reader: R,
    line_no: u64,
}

/// Current line of one input.
struct Head {
    /// Line bytes up to and including the last tab.
    key: Vec<u8>,
    freq: u64,
    source: usize,
    line_no: u64,
}

impl<R: BufRead> Source<R> {
    /// Reads the next line into `buf` and splits it. `None` at end of input.
    fn read_head(&mut self, index: usize, mut buf: Vec<u8>) -> Result<Option<Head>> {
        buf.clear();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        let Some(tab) = buf.iter().rposition(|&b| b == b'\t') else {
            return Err(self.malformed("missing tab delimiter"));
        };
        let digits = &buf[tab + 1..];
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(self.malformed("invalid frequency"));
        }
        let freq = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| self.malformed("frequency out of range"))?;
        buf.truncate(tab + 1);
        Ok(Some(Head {
            key: buf,
            freq,
            source: index,
            line_no: self.line_no,
        }))
    }

    fn malformed(&self, reason: &'static str) -> Error {
        Error::Malformed {
            source_name: self.name.clone(),
            line: self.line_no,
            reason,
        }
    }
}

pub struct Merger {
    threshold: u64,
    progress: Option<Box<dyn FnMut(&MergeStats)>>,
}

impl Merger {
    /// Keys whose summed frequency is below `threshold` are dropped.
    pub fn new(threshold: u64) -> Self {
        Merger {
            threshold,
            progress: None,
        }
    }

    /// Called every [`PROGRESS_INTERVAL`] input lines.
    pub fn on_progress(&mut self, f: impl FnMut(&MergeStats) + 'static) {
        self.progress = Some(Box::new(f));
    }

    /// Merges `inputs`, each a display name and a sorted reader, into `out`.
    pub fn merge<R, W>(&mut self, inputs: Vec<(String, R)>, out: W) -> Result<MergeStats>
    where
        R: BufRead,
        W: Write,
    {
        let started = Instant::now();
        let mut sources: Vec<Source<R>> = inputs
            .into_iter()
            .map(|(name, reader)| Source {
                name,
                reader,
                line_no: 0,
            })
            .collect();

        let mut queue = HeapQueue::with_order(|lhs: &Head, rhs: &Head| {
            (&lhs.key, lhs.source) < (&rhs.key, rhs.source)
        });
        for (i, source) in sources.iter_mut().enumerate() {
            if let Some(head) = source.read_head(i, Vec::new())? {
                queue.enqueue(head);
            }
        }

        let mut lb = LineBuffer::new(out);
        let mut stats = MergeStats::default();
        let mut last_key: Vec<u8> = Vec::new();
        let mut last_freq: Option<u64> = None;
        let mut spare = Vec::new();

        while let Some(head) = queue.top() {
            stats.input_lines += 1;
            match last_freq {
                Some(sum) if head.key == last_key => {
                    last_freq = Some(sum.saturating_add(head.freq));
                }
                Some(_) if head.key < last_key => {
                    return Err(Error::OutOfOrder {
                        source_name: sources[head.source].name.clone(),
                        line: head.line_no,
                    });
                }
                _ => {
                    if let Some(sum) = last_freq
                        && sum >= self.threshold
                    {
                        lb.write_keyed(&last_key, sum)?;
                    }
                    last_key.clear();
                    last_key.extend_from_slice(&head.key);
                    last_freq = Some(head.freq);
                }
            }

            let source = head.source;
            match sources[source].read_head(source, spare)? {
                Some(next) => {
                    spare = queue.replace(next).map(|old| old.key).unwrap_or_default();
                }
                None => {
                    spare = queue.dequeue().map(|old| old.key).unwrap_or_default();
                }
            }

            if stats.input_lines % PROGRESS_INTERVAL == 0 {
                stats.output_lines = lb.lines();
                if let Some(f) = self.progress.as_mut() {
                    f(&stats);
                }
            }
        }
        if let Some(sum) = last_freq
            && sum >= self.threshold
        {
            lb.write_keyed(&last_key, sum)?;
        }
        stats.output_lines = lb.lines();
        lb.finish()?;

        info!(
            "input: {}, output: {} ({:.2}%) ({:.2?})",
            stats.input_lines,
            stats.output_lines,
            stats.output_ratio(),
            started.elapsed()
        );
        Ok(stats)
    }
}

/// Merges `inputs` into `out` with no progress reporting.
pub fn merge<R, W>(threshold: u64, inputs: Vec<(String, R)>, out: W) -> Result<MergeStats>
where
    R: BufRead,
    W: Write,
{
    Merger::new(threshold).merge(inputs, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(threshold: u64, inputs: &[&str]) -> Result<(String, MergeStats)> {
        let inputs = inputs
            .iter()
            .enumerate()
            .map(|(i, text)| (format!("in{}", i), text.as_bytes()))
            .collect();
        let mut out = Vec::new();
        let stats = merge(threshold, inputs, &mut out)?;
        Ok((String::from_utf8(out).unwrap(), stats))
    }

    #[test]
    fn sums_equal_keys() {
        let (out, stats) = run(0, &["a\t1\nb c\t3\n", "b c\t5\nd\t2\n"]).unwrap();
        assert_eq!(out, "a\t1\nb c\t8\nd\t2\n");
        assert_eq!(
            stats,
            MergeStats {
                input_lines: 4,
                output_lines: 3
            }
        );
    }

    #[test]
    fn threshold_drops_rare_keys() {
        let (out, stats) = run(2, &["x\t2\nx y\t1\n", "x\t1\ny\t2\n"]).unwrap();
        assert_eq!(out, "x\t3\ny\t2\n");
        assert_eq!(stats.output_lines, 2);
        assert!((stats.output_ratio() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn split_does_not_change_result() {
        let whole = "a\t1\na\t2\na b\t4\nb\t1\nc\t9\nc\t1\n";
        let (one, _) = run(3, &[whole]).unwrap();
        let (three, _) = run(3, &["a\t1\nb\t1\n", "a\t2\nc\t9\n", "a b\t4\nc\t1\n"]).unwrap();
        assert_eq!(one, three);
        assert_eq!(one, "a\t3\na b\t4\nc\t10\n");
    }

    #[test]
    fn key_is_split_at_last_tab() {
        let (out, _) = run(0, &["a\tb\t2\r\n", "a\tb\t3\n"]).unwrap();
        assert_eq!(out, "a\tb\t5\n");
    }

    #[test]
    fn empty_inputs() {
        let (out, stats) = run(0, &["", ""]).unwrap();
        assert!(out.is_empty());
        assert_eq!(stats, MergeStats::default());
        assert_eq!(stats.output_ratio(), 0.0);
        let (out, _) = run(0, &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn unsorted_input_is_rejected() {
        match run(0, &["a\t1\nc\t1\n", "b\t1\na\t1\n"]) {
            Err(Error::OutOfOrder { source_name, line }) => {
                assert_eq!(source_name, "in1");
                assert_eq!(line, 2);
            }
            other => panic!("expected OutOfOrder, got {:?}", other.map(|(o, _)| o)),
        }
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(matches!(
            run(0, &["a\t1\nno tab here\n"]),
            Err(Error::Malformed { line: 2, reason: "missing tab delimiter", .. })
        ));
        assert!(matches!(
            run(0, &["a\tx\n"]),
            Err(Error::Malformed { line: 1, reason: "invalid frequency", .. })
        ));
        for line in ["a\t-1\n", "a\t+5\n", "a\t 5\n", "a\t\n", "a\t5x\n"] {
            assert!(
                matches!(
                    run(0, &[line]),
                    Err(Error::Malformed { reason: "invalid frequency", .. })
                ),
                "{:?}",
                line
            );
        }
        assert!(matches!(
            run(0, &["a\t99999999999999999999\n"]),
            Err(Error::Malformed { reason: "frequency out of range", .. })
        ));
    }
}
