// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{
    codec::{reader::DEFAULT_BUFFER_SIZE, varint},
    errors::Result,
};

/// A buffered writer encoding the primitive types of the record protocol
/// onto an octet stream.
///
/// Octets accumulate in an internal buffer until it fills or [`flush`] is
/// called; writes of at least half the buffer bypass it. Nothing reaches
/// the underlying stream durably until a flush.
///
/// [`flush`]: OctetWriter::flush
pub struct OctetWriter<W> {
    inner: W,
    buf: BytesMut,
    capacity: usize,
}

impl<W: AsyncWrite + Unpin> OctetWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: W, capacity: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Consume the writer, returning the underlying stream.
    ///
    /// The caller is expected to have flushed first; buffered octets are
    /// discarded.
    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    async fn flush_buf(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            let pending = self.buf.split();
            self.inner.write_all(&pending).await?;
        }
        Ok(())
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.buf.len() + data.len() > self.capacity {
            self.flush_buf().await?;
        }
        if data.len() * 2 >= self.capacity {
            self.inner.write_all(data).await?;
        } else {
            self.buf.put_slice(data);
        }
        Ok(())
    }

    pub async fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.buf.len() >= self.capacity {
            self.flush_buf().await?;
        }
        self.buf.put_u8(byte);
        Ok(())
    }

    pub async fn write_unsigned(&mut self, value: u64, width: usize) -> Result<()> {
        let mut tmp = [0u8; 8];
        let mut slice = &mut tmp[..];
        varint::put_unsigned(&mut slice, value, width);
        self.write(&tmp[..width]).await
    }

    pub async fn write_signed(&mut self, value: i64, width: usize) -> Result<()> {
        let mut tmp = [0u8; 8];
        let mut slice = &mut tmp[..];
        varint::put_signed(&mut slice, value, width);
        self.write(&tmp[..width]).await
    }

    pub async fn write_unsigned_base128(&mut self, value: u64) -> Result<()> {
        let mut tmp = [0u8; 10];
        let len = varint::unsigned_base128_length(value);
        let mut slice = &mut tmp[..];
        varint::put_unsigned_base128(&mut slice, value);
        self.write(&tmp[..len]).await
    }

    pub async fn write_signed_base128(&mut self, value: i64) -> Result<()> {
        let mut tmp = [0u8; 10];
        let len = varint::signed_base128_length(value);
        let mut slice = &mut tmp[..];
        varint::put_signed_base128(&mut slice, value);
        self.write(&tmp[..len]).await
    }

    /// Flush buffered octets through to the underlying stream.
    pub async fn flush(&mut self) -> Result<()> {
        self.flush_buf().await?;
        self.inner.flush().await?;
        Ok(())
    }
}
