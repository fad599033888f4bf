//! Byte streams over remote files, and `copy_bytes` between streams.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{HdfsError, Result};
use crate::filesystem::{CreateOptions, FileSystem};
use crate::path::HdfsPath;

/// Called once per `write` on an output stream.
pub type Progress = Box<dyn FnMut() + Send>;

/// Encode `s` the way Java's `DataOutput.writeUTF` does: a big-endian u16
/// length followed by modified UTF-8.
pub fn encode_modified_utf8(s: &str) -> Result<Vec<u8>> {
    let mut encoded = Vec::with_capacity(s.len() + 2);
    encoded.extend_from_slice(&[0, 0]);

    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007f => encoded.push(unit as u8),
            // NUL is two bytes so the encoding never contains a zero byte.
            0x0000 | 0x0080..=0x07ff => {
                encoded.push(0xc0 | (unit >> 6) as u8);
                encoded.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                encoded.push(0xe0 | (unit >> 12) as u8);
                encoded.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                encoded.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }

    let length = encoded.len() - 2;
    if length > u16::MAX as usize {
        return Err(HdfsError::UtfTooLong(length));
    }
    encoded[..2].copy_from_slice(&(length as u16).to_be_bytes());
    Ok(encoded)
}

/// Buffered writer onto a remote file.
///
/// The first batch sent creates the file; later batches append to it.
pub struct FsDataOutputStream {
    fs: Arc<dyn FileSystem>,
    path: HdfsPath,
    options: CreateOptions,
    buffer: Vec<u8>,
    threshold: usize,
    /// Whether the remote file exists yet.
    created: bool,
    closed: bool,
    written: u64,
    progress: Option<Progress>,
}

impl FsDataOutputStream {
    /// A stream that creates `path` on first flush.
    pub fn create(fs: Arc<dyn FileSystem>, path: HdfsPath, options: CreateOptions, threshold: usize) -> Self {
        FsDataOutputStream {
            fs,
            path,
            options,
            buffer: Vec::new(),
            threshold: threshold.max(1),
            created: false,
            closed: false,
            written: 0,
            progress: None,
        }
    }

    /// A stream that appends to the existing file `path`.
    pub fn append(fs: Arc<dyn FileSystem>, path: HdfsPath, threshold: usize) -> Self {
        let mut stream = FsDataOutputStream::create(fs, path, CreateOptions::default(), threshold);
        stream.created = true;
        stream
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn path(&self) -> &HdfsPath {
        &self.path
    }

    /// Bytes accepted by `write` so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(HdfsError::StreamClosed);
        }
        self.buffer.extend_from_slice(data);
        self.written += data.len() as u64;
        if let Some(progress) = self.progress.as_mut() {
            progress();
        }
        if self.buffer.len() >= self.threshold {
            self.send_buffer().await?;
        }
        Ok(())
    }

    pub async fn write_utf(&mut self, s: &str) -> Result<()> {
        let encoded = encode_modified_utf8(s)?;
        self.write(&encoded).await
    }

    /// Send buffered data to the service.
    pub async fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(HdfsError::StreamClosed);
        }
        self.send_buffer().await
    }

    /// Flush and close. A stream that never wrote creates an empty file.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.send_buffer().await?;
        if !self.created {
            self.fs.create(&self.path, Bytes::new(), &self.options).await?;
            self.created = true;
        }
        self.closed = true;
        debug!(path = %self.path, bytes = self.written, "closed output stream");
        Ok(())
    }

    async fn send_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let data = Bytes::from(std::mem::take(&mut self.buffer));
        if self.created {
            self.fs.append(&self.path, data).await
        } else {
            self.fs.create(&self.path, data, &self.options).await?;
            self.created = true;
            Ok(())
        }
    }
}

impl Drop for FsDataOutputStream {
    fn drop(&mut self) {
        if !self.closed && !self.buffer.is_empty() {
            warn!(path = %self.path, pending = self.buffer.len(), "output stream dropped without close, buffered data lost");
        }
    }
}

/// Sequential reader over a remote file, fetching in windows.
pub struct FsDataInputStream {
    fs: Arc<dyn FileSystem>,
    path: HdfsPath,
    len: u64,
    pos: u64,
    window: Bytes,
    window_start: u64,
    window_size: usize,
}

impl FsDataInputStream {
    pub fn new(fs: Arc<dyn FileSystem>, path: HdfsPath, len: u64, window_size: usize) -> Self {
        FsDataInputStream {
            fs,
            path,
            len,
            pos: 0,
            window: Bytes::new(),
            window_start: 0,
            window_size: window_size.max(1),
        }
    }

    pub fn path(&self) -> &HdfsPath {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(HdfsError::SeekPastEof { pos, len: self.len });
        }
        self.pos = pos;
        Ok(())
    }

    /// Read into `buf`, returning 0 at end of file.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pos >= self.len || buf.is_empty() {
            return Ok(0);
        }

        let window_end = self.window_start + self.window.len() as u64;
        if self.pos < self.window_start || self.pos >= window_end {
            let want = std::cmp::max(self.window_size, buf.len()) as u64;
            let length = std::cmp::min(want, self.len - self.pos);
            self.window = self.fs.read_range(&self.path, self.pos, length).await?;
            self.window_start = self.pos;
            if self.window.is_empty() {
                // The file shrank underneath us.
                return Ok(0);
            }
        }

        let start = (self.pos - self.window_start) as usize;
        let n = std::cmp::min(buf.len(), self.window.len() - start);
        buf[..n].copy_from_slice(&self.window[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

/// Anything `copy_bytes` can read from.
#[async_trait]
pub trait ByteSource: Send {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;
}

#[async_trait]
impl ByteSource for FsDataInputStream {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read(buf).await
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ByteSource for R {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.read(buf).await?)
    }
}

/// Anything `copy_bytes` can write to.
#[async_trait]
pub trait ByteSink: Send {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()>;

    /// Called once the copy is complete.
    async fn finish(&mut self) -> Result<()>;
}

#[async_trait]
impl ByteSink for FsDataOutputStream {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.write(data).await
    }

    async fn finish(&mut self) -> Result<()> {
        self.close().await
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ByteSink for W {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.write_all(data).await?)
    }

    async fn finish(&mut self) -> Result<()> {
        Ok(self.flush().await?)
    }
}

/// Copy `input` to `output` in `buffer_size` pieces until end of input, then
/// finish the output (closing it if it is a remote stream). Returns the
/// number of bytes copied.
pub async fn copy_bytes<S, K>(input: &mut S, output: &mut K, buffer_size: usize) -> Result<u64>
where
    S: ByteSource + ?Sized,
    K: ByteSink + ?Sized,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut copied = 0u64;
    loop {
        let n = input.read_chunk(&mut buf).await?;
        if n == 0 {
            break;
        }
        output.write_chunk(&buf[..n]).await?;
        copied += n as u64;
    }
    output.finish().await?;
    Ok(copied)
}
