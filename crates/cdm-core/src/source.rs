//! Buffered random access over a backing file.
//!
//! [`RandomSource`] is the only I/O capability the decoders need: absolute
//! seeks, exact reads, line reads for text formats, and fixed-width
//! little-endian scalar reads for binary formats. It carries its own path so
//! a plugin can locate companion files next to the primary one.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::CdmResult;

/// A seekable, buffered byte source bound to one open file handle.
#[derive(Debug)]
pub struct RandomSource {
    reader: BufReader<File>,
    path: PathBuf,
    len: u64,
}

impl RandomSource {
    /// Open a file for random access.
    pub fn open(path: impl AsRef<Path>) -> CdmResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        Ok(RandomSource {
            reader: BufReader::new(file),
            path,
            len,
        })
    }

    /// The path this source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total length of the backing file in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Seek to an absolute byte offset.
    pub fn seek(&mut self, offset: u64) -> CdmResult<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Current absolute byte offset.
    pub fn position(&mut self) -> CdmResult<u64> {
        Ok(self.reader.stream_position()?)
    }

    /// Fill `buf` completely from the current position.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> CdmResult<()> {
        self.reader.read_exact(buf)?;
        Ok(())
    }

    /// Fill `buf` completely starting at `offset`.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> CdmResult<()> {
        self.seek(offset)?;
        self.read_exact(buf)
    }

    /// Read one line including its terminator into `buf`, returning the
    /// number of bytes consumed; 0 means end of file. The caller trims the
    /// trailing `\n`/`\r\n` — keeping the raw byte count lets offset
    /// bookkeeping stay exact.
    pub fn read_line(&mut self, buf: &mut String) -> CdmResult<usize> {
        Ok(self.reader.read_line(buf)?)
    }

    pub fn read_u8(&mut self) -> CdmResult<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_i16_le(&mut self) -> CdmResult<i16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    pub fn read_u16_le(&mut self) -> CdmResult<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_i32_le(&mut self) -> CdmResult<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_u32_le(&mut self) -> CdmResult<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_i64_le(&mut self) -> CdmResult<i64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_f32_le(&mut self) -> CdmResult<f32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    /// Read `n` bytes as a NUL/space-trimmed ASCII string.
    pub fn read_string(&mut self, n: usize) -> CdmResult<String> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        let s: String = buf
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { ' ' })
            .collect();
        Ok(s.trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string())
    }
}

// Varint and bulk readers operate through the standard Read trait.
impl Read for RandomSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}
