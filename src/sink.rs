//! Output sink abstraction.
//!
//! The encoder streams bytes strictly in order. Duplicate-frame discarding
//! additionally rewrites the previous frame's graphic control extension in
//! place, which needs a positioned sink; anything implementing
//! [`std::io::Seek`] qualifies. Non-seekable sinks (sockets, pipes) can be
//! wrapped in [`StreamSink`], which refuses duplicate discarding up front.

use std::io::{self, Seek, SeekFrom, Write};

use crate::error::{EncodeError, Result};

/// Byte sink for the encoder. Position tracking is always available;
/// seeking is only exercised when duplicate discarding is enabled.
pub trait OutputSink: Write {
    /// Whether [`set_position`](Self::set_position) can succeed.
    fn is_seekable(&self) -> bool;

    /// Current byte offset from the start of the stream.
    fn position(&mut self) -> Result<u64>;

    /// Move the write cursor to an absolute offset.
    fn set_position(&mut self, pos: u64) -> Result<()>;
}

impl<W: Write + Seek> OutputSink for W {
    fn is_seekable(&self) -> bool {
        true
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.stream_position()?)
    }

    fn set_position(&mut self, pos: u64) -> Result<()> {
        self.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
}

/// Adapter for forward-only sinks. Tracks the stream position itself and
/// reports [`EncodeError::SeekUnsupported`] on any attempt to move it.
#[derive(Debug)]
pub struct StreamSink<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> StreamSink<W> {
    /// Wrap a forward-only writer.
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for StreamSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> OutputSink for StreamSink<W> {
    fn is_seekable(&self) -> bool {
        false
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.written)
    }

    fn set_position(&mut self, _pos: u64) -> Result<()> {
        Err(EncodeError::SeekUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_seekable_sink_reports_position() {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(b"abc").unwrap();
        assert!(cursor.is_seekable());
        assert_eq!(OutputSink::position(&mut cursor).unwrap(), 3);
        OutputSink::set_position(&mut cursor, 1).unwrap();
        assert_eq!(OutputSink::position(&mut cursor).unwrap(), 1);
    }

    #[test]
    fn test_stream_sink_tracks_but_refuses_seeks() {
        let mut sink = StreamSink::new(Vec::new());
        sink.write_all(b"hello").unwrap();
        assert!(!sink.is_seekable());
        assert_eq!(sink.position().unwrap(), 5);
        assert!(matches!(
            sink.set_position(0),
            Err(EncodeError::SeekUnsupported)
        ));
        assert_eq!(sink.into_inner(), b"hello");
    }
}
