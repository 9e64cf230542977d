use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Stdout, Write};
use std::path::Path;

use flate2::Compression;
use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;

const IO_BUF_SIZE: usize = 256 * 1024;

/// Lines are handed to the underlying writer once this many bytes are queued.
pub const FLUSH_THRESHOLD: usize = (1 << 16) - (1 << 10);

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// `None` for stdin/stdout: no path, an empty path or `-`.
fn file_path(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty() && p.as_os_str() != "-")
}

/// Opens `path` for line reading. `None`, an empty path or `-` read stdin;
/// `.gz` files are decompressed on the fly.
pub fn open_input(path: Option<&Path>) -> io::Result<Box<dyn BufRead>> {
    let Some(path) = file_path(path) else {
        return Ok(Box::new(BufReader::with_capacity(IO_BUF_SIZE, io::stdin())));
    };
    let file = BufReader::with_capacity(IO_BUF_SIZE, File::open(path)?);
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(file))
    }
}

pub enum OutputFile {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Stdout(BufWriter<Stdout>),
}

impl OutputFile {
    /// Creates (or truncates) `path`. `None`, an empty path or `-` write to
    /// stdout; `.gz` files are compressed.
    pub fn create(path: Option<&Path>) -> io::Result<Self> {
        let Some(path) = file_path(path) else {
            return Ok(OutputFile::Stdout(BufWriter::with_capacity(
                IO_BUF_SIZE,
                io::stdout(),
            )));
        };
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let writer = BufWriter::with_capacity(IO_BUF_SIZE, file);
        if is_gzip(path) {
            Ok(OutputFile::Gzip(GzEncoder::new(writer, Compression::default())))
        } else {
            Ok(OutputFile::Plain(writer))
        }
    }

    /// Flushes everything and writes the gzip trailer if any. Dropping an
    /// `OutputFile` without calling this loses write errors.
    pub fn finish(self) -> io::Result<()> {
        match self {
            OutputFile::Plain(mut w) => w.flush(),
            OutputFile::Gzip(w) => w.finish()?.flush(),
            OutputFile::Stdout(mut w) => w.flush(),
        }
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputFile::Plain(w) => w.write(buf),
            OutputFile::Gzip(w) => w.write(buf),
            OutputFile::Stdout(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputFile::Plain(w) => w.flush(),
            OutputFile::Gzip(w) => w.flush(),
            OutputFile::Stdout(w) => w.flush(),
        }
    }
}

/// Accumulates `tokens\tfreq\n` lines and hands them to `writer` in chunks
/// of at least [`FLUSH_THRESHOLD`] bytes.
pub struct LineBuffer<W: Write> {
    writer: W,
    buf: Vec<u8>,
    lines: u64,
}

impl<W: Write> LineBuffer<W> {
    pub fn new(writer: W) -> Self {
        LineBuffer {
            writer,
            buf: Vec::with_capacity(FLUSH_THRESHOLD + 1024),
            lines: 0,
        }
    }

    /// Writes the tokens separated by single spaces, then a tab and `freq`.
    pub fn write_ngram<'t, I>(&mut self, tokens: I, freq: u64) -> io::Result<()>
    where
        I: IntoIterator<Item = &'t [u8]>,
    {
        for (i, token) in tokens.into_iter().enumerate() {
            if i > 0 {
                self.buf.push(b' ');
            }
            self.buf.extend_from_slice(token);
        }
        self.buf.push(b'\t');
        self.finish_line(freq)
    }

    /// Writes `key` verbatim (it already ends with the tab) followed by `freq`.
    pub fn write_keyed(&mut self, key: &[u8], freq: u64) -> io::Result<()> {
        self.buf.extend_from_slice(key);
        self.finish_line(freq)
    }

    fn finish_line(&mut self, freq: u64) -> io::Result<()> {
        // write! into a Vec<u8> cannot fail
        let _ = writeln!(self.buf, "{}", freq);
        self.lines += 1;
        if self.buf.len() > FLUSH_THRESHOLD {
            self.flush_buf()?;
        }
        Ok(())
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.writer.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Writes out anything still queued and returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.flush_buf()?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}
