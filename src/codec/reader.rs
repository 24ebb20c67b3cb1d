// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::{HoraceError, Result};

/// Default internal buffer size, chosen to balance syscall frequency
/// against latency.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Source of raw octets for an [`OctetReader`].
///
/// Anything implementing [`AsyncRead`] qualifies automatically. The spool
/// reader provides its own implementation whose end-of-file answer depends
/// on whether a successor spoolfile has been observed.
pub trait RawRead: Send {
    /// Append up to the buffer's spare capacity of octets, returning the
    /// number appended. A return of zero means the stream is exhausted.
    fn read_chunk(
        &mut self,
        buf: &mut BytesMut,
    ) -> impl Future<Output = Result<usize>> + Send;
}

impl<R: AsyncRead + Unpin + Send> RawRead for R {
    async fn read_chunk(&mut self, buf: &mut BytesMut) -> Result<usize> {
        Ok(self.read_buf(buf).await?)
    }
}

/// A buffered reader decoding the primitive types of the record protocol
/// from an octet stream.
///
/// All read operations block until the requested octets are available, or
/// fail with `EndOfStream` when the stream is exhausted exactly at the
/// requested position. Callers decode a frame by mapping `EndOfStream`
/// anywhere after the first octet to a malformed-input error.
pub struct OctetReader<R> {
    inner: R,
    buf: BytesMut,
    capacity: usize,
}

impl<R: RawRead> OctetReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Consume the reader, returning the underlying stream.
    ///
    /// Any octets still buffered are discarded.
    pub fn into_inner(self) -> R {
        self.inner
    }

    async fn refill(&mut self) -> Result<()> {
        self.buf.reserve(self.capacity);
        let n = self.inner.read_chunk(&mut self.buf).await?;
        if n == 0 {
            return Err(HoraceError::EndOfStream);
        }
        Ok(())
    }

    pub async fn read_byte(&mut self) -> Result<u8> {
        if self.buf.is_empty() {
            self.refill().await?;
        }
        Ok(self.buf.get_u8())
    }

    /// Read exactly `nbyte` octets.
    ///
    /// Transfers of at least half the internal buffer bypass it once the
    /// buffered remainder has been drained.
    pub async fn read_exact(&mut self, nbyte: usize) -> Result<Bytes> {
        if self.buf.len() >= nbyte {
            return Ok(self.buf.split_to(nbyte).freeze());
        }

        let mut out = BytesMut::with_capacity(nbyte);
        out.extend_from_slice(&self.buf.split());
        while out.len() < nbyte {
            let missing = nbyte - out.len();
            if missing * 2 >= self.capacity {
                // Half a buffer-full or more outstanding: read directly
                // into the destination.
                let n = self.inner.read_chunk(&mut out).await?;
                if n == 0 {
                    return Err(HoraceError::EndOfStream);
                }
            } else {
                self.refill().await?;
                let take = self.buf.len().min(missing);
                out.extend_from_slice(&self.buf.split_to(take));
            }
        }
        if out.len() > nbyte {
            // A direct read may have appended past the request; keep the
            // excess buffered.
            self.buf.unsplit(out.split_off(nbyte));
        }
        Ok(out.freeze())
    }

    pub async fn read_unsigned(&mut self, width: usize) -> Result<u64> {
        let mut result: u64 = 0;
        for _ in 0..width {
            if result >> 56 != 0 {
                return Err(HoraceError::malformed("integer overflow"));
            }
            result = (result << 8) | u64::from(self.read_byte().await?);
        }
        Ok(result)
    }

    pub async fn read_signed(&mut self, width: usize) -> Result<i64> {
        let mut width = width;
        let mut result: i64 = 0;
        if width > 0 {
            let byte = self.read_byte().await?;
            result = i64::from(byte & 0x7f) - i64::from(byte & 0x80);
            width -= 1;
        }
        for _ in 0..width {
            if ((result >> 55) + 1) >> 1 != 0 {
                return Err(HoraceError::malformed("integer overflow"));
            }
            result = (result << 8) | i64::from(self.read_byte().await?);
        }
        Ok(result)
    }

    pub async fn read_unsigned_base128(&mut self) -> Result<u64> {
        let mut byte = self.read_byte().await?;
        let mut result = u64::from(byte & 0x7f);
        while byte & 0x80 != 0 {
            if result >> 57 != 0 {
                return Err(HoraceError::malformed("integer overflow"));
            }
            byte = self.read_byte().await?;
            result = (result << 7) | u64::from(byte & 0x7f);
        }
        Ok(result)
    }

    pub async fn read_signed_base128(&mut self) -> Result<i64> {
        let mut byte = self.read_byte().await?;
        let mut result = i64::from(byte & 0x3f) - i64::from(byte & 0x40);
        while byte & 0x80 != 0 {
            if ((result >> 56) + 1) >> 1 != 0 {
                return Err(HoraceError::malformed("integer overflow"));
            }
            byte = self.read_byte().await?;
            result = (result << 7) | i64::from(byte & 0x7f);
        }
        Ok(result)
    }
}
