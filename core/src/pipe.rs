//! Bounded in-process pipe between a blocking body encoder and a transport.
//!
//! The writer half hands chunks to the reader half over a fixed-capacity
//! channel, so at most `capacity` chunks are in flight. A writer dropped
//! without `finish` makes the reader fail instead of reporting a clean end
//! of stream, so a transport never sends a truncated body as if complete.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;

use bytes::{Buf, Bytes};

enum Chunk {
    Data(Bytes),
    End,
}

pub(crate) fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = sync_channel(capacity);
    let broken = Arc::new(AtomicBool::new(false));
    (
        PipeWriter { tx, broken },
        PipeReader {
            rx,
            current: Bytes::new(),
            done: false,
        },
    )
}

pub(crate) struct PipeWriter {
    tx: SyncSender<Chunk>,
    broken: Arc<AtomicBool>,
}

impl PipeWriter {
    /// Reports whether a write failed because the reader was dropped.
    pub(crate) fn status(&self) -> PipeStatus {
        PipeStatus(self.broken.clone())
    }

    /// Mark the end of the body.
    pub(crate) fn finish(self) -> io::Result<()> {
        self.send(Chunk::End)
    }

    fn send(&self, chunk: Chunk) -> io::Result<()> {
        self.tx.send(chunk).map_err(|_| {
            self.broken.store(true, Ordering::Release);
            io::Error::new(io::ErrorKind::BrokenPipe, "request body reader dropped")
        })
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.send(Chunk::Data(Bytes::copy_from_slice(buf)))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub(crate) struct PipeStatus(Arc<AtomicBool>);

impl PipeStatus {
    pub(crate) fn is_broken(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub(crate) struct PipeReader {
    rx: Receiver<Chunk>,
    current: Bytes,
    done: bool,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.current.is_empty() {
            if self.done {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Chunk::Data(data)) => self.current = data,
                Ok(Chunk::End) => self.done = true,
                Err(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "request body aborted before completion",
                    ))
                }
            }
        }

        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}
