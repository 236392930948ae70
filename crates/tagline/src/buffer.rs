//! Line accumulation and buffer pooling.
//!
//! Every request renders into a [`LineBuffer`] drawn from a [`BufferPool`].
//! The pool hands buffers out as [`PooledBuffer`] guards, which return the
//! buffer on drop, so every exit path of the request pipeline (including a
//! failed sink write) gives the buffer back.
//!
//! A `LineBuffer` has a hard size limit. Growing past it is the one way a
//! write into the accumulator can fail, and that failure aborts the render.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crossbeam_queue::ArrayQueue;

use crate::error::{RenderError, Result};

/// Default hard limit for a single rendered line.
pub const DEFAULT_LINE_LIMIT: usize = 64 * 1024;

/// Initial capacity of freshly allocated buffers.
const INITIAL_CAPACITY: usize = 256;

/// Capacity a released buffer is shrunk back to if it grew past it.
const RETAINED_CAPACITY: usize = 16 * 1024;

/// Byte accumulator for one log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    bytes: Vec<u8>,
    limit: usize,
}

impl LineBuffer {
    /// Creates an empty buffer with the default limit.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_LINE_LIMIT)
    }

    /// Creates an empty buffer that refuses to grow past `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(INITIAL_CAPACITY.min(limit)),
            limit,
        }
    }

    /// The hard size limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Appends raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::BufferFull`] if the bytes do not fit; the
    /// buffer is left unchanged in that case.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize> {
        if bytes.len() > self.remaining() {
            return Err(RenderError::BufferFull { limit: self.limit });
        }
        self.bytes.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Appends a string.
    pub fn write_str(&mut self, s: &str) -> Result<usize> {
        self.write_bytes(s.as_bytes())
    }

    /// Appends formatted output. This is what `write!(buf, ...)` calls.
    ///
    /// On failure the partial output is removed again.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<usize> {
        let start = self.bytes.len();
        let mut adapter = FmtAdapter {
            buf: self,
            error: None,
        };
        match fmt::write(&mut adapter, args) {
            Ok(()) => Ok(self.bytes.len() - start),
            Err(_) => {
                let error = adapter.error.take().unwrap_or(RenderError::Format);
                self.bytes.truncate(start);
                Err(error)
            }
        }
    }

    /// Appends formatted output right-aligned to `width` bytes.
    ///
    /// Padding is inserted in place, so no intermediate string is allocated.
    pub fn write_padded(&mut self, width: usize, args: fmt::Arguments<'_>) -> Result<usize> {
        let start = self.bytes.len();
        let written = self.write_fmt(args)?;
        if written >= width {
            return Ok(written);
        }

        let pad = width - written;
        if pad > self.remaining() {
            self.bytes.truncate(start);
            return Err(RenderError::BufferFull { limit: self.limit });
        }
        self.bytes
            .splice(start..start, std::iter::repeat(b' ').take(pad));
        Ok(width)
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Allocated capacity.
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Shortens the content to `len` bytes. No effect if it is already
    /// shorter.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    /// Discards the content, keeping the allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.bytes.len())
    }

    fn recycle(&mut self) {
        self.bytes.clear();
        if self.bytes.capacity() > RETAINED_CAPACITY {
            self.bytes.shrink_to(RETAINED_CAPACITY);
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for LineBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

struct FmtAdapter<'a> {
    buf: &'a mut LineBuffer,
    error: Option<RenderError>,
}

impl fmt::Write for FmtAdapter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match self.buf.write_str(s) {
            Ok(_) => Ok(()),
            Err(err) => {
                self.error = Some(err);
                Err(fmt::Error)
            }
        }
    }
}

/// A bounded pool of reusable line buffers.
///
/// The free list is a lock-free [`ArrayQueue`]. Acquiring pops a buffer (or
/// allocates one when the queue is empty); releasing pushes it back (or drops
/// it when the queue is full). A buffer is moved out of the queue on acquire,
/// so two holders can never share one.
#[derive(Debug)]
pub struct BufferPool {
    free: ArrayQueue<LineBuffer>,
    line_limit: usize,
}

impl BufferPool {
    /// Creates a pool retaining at most `slots` idle buffers, each limited
    /// to `line_limit` bytes.
    pub fn new(slots: usize, line_limit: usize) -> Self {
        Self {
            free: ArrayQueue::new(slots.max(1)),
            line_limit,
        }
    }

    /// Takes a buffer out of the pool.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .free
            .pop()
            .unwrap_or_else(|| LineBuffer::with_limit(self.line_limit));
        PooledBuffer { pool: self, buf }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    /// Maximum number of idle buffers held.
    pub fn slots(&self) -> usize {
        self.free.capacity()
    }

    fn release(&self, mut buf: LineBuffer) {
        buf.recycle();
        // A full queue means enough idle buffers already exist
        let _ = self.free.push(buf);
    }
}

/// A buffer on loan from a [`BufferPool`], returned on drop.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: LineBuffer,
}

impl Deref for PooledBuffer<'_> {
    type Target = LineBuffer;

    fn deref(&self) -> &LineBuffer {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut LineBuffer {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        // The placeholder holds an unallocated Vec
        let placeholder = LineBuffer {
            bytes: Vec::new(),
            limit: self.buf.limit,
        };
        let buf = std::mem::replace(&mut self.buf, placeholder);
        self.pool.release(buf);
    }
}
