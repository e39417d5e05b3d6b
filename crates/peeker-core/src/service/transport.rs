//! Byte channels the service talks over

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};

use super::ShutdownSignal;

/// A bidirectional, byte-oriented channel.
///
/// Reads never block. Every written line is flushed before `write_line`
/// returns.
pub trait Transport {
    /// Next pending input byte, or `None` if nothing has arrived
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Write `line` followed by `\n` and flush
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// In-memory transport: queued input, captured output lines
#[derive(Debug, Default)]
pub struct BufferTransport {
    input: VecDeque<u8>,
    output: Vec<String>,
}

impl BufferTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(bytes: impl AsRef<[u8]>) -> Self {
        let mut transport = Self::new();
        transport.push_input(bytes);
        transport
    }

    pub fn push_input(&mut self, bytes: impl AsRef<[u8]>) {
        self.input.extend(bytes.as_ref());
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    pub fn lines(&self) -> &[String] {
        &self.output
    }

    /// Drain the captured output
    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }
}

impl Transport for BufferTransport {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(self.input.pop_front())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.output.push(line.to_string());
        Ok(())
    }
}

/// Input from a channel fed by a reader thread, output to any writer.
///
/// A disconnected channel reads as "no input". With
/// [`stop_on_disconnect`](Self::stop_on_disconnect) it also triggers a
/// shutdown once every queued byte has been read.
#[derive(Debug)]
pub struct ChannelTransport<W> {
    input: Receiver<u8>,
    output: W,
    on_disconnect: Option<Arc<ShutdownSignal>>,
}

impl<W: Write> ChannelTransport<W> {
    pub fn new(input: Receiver<u8>, output: W) -> Self {
        Self {
            input,
            output,
            on_disconnect: None,
        }
    }

    pub fn stop_on_disconnect(mut self, shutdown: Arc<ShutdownSignal>) -> Self {
        self.on_disconnect = Some(shutdown);
        self
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write> Transport for ChannelTransport<W> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        match self.input.try_recv() {
            Ok(byte) => Ok(Some(byte)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                if let Some(shutdown) = &self.on_disconnect {
                    shutdown.trigger();
                }
                Ok(None)
            }
        }
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.output, "{}", line)?;
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_buffer_transport() {
        let mut transport = BufferTransport::with_input("AB");
        assert_eq!(transport.read_byte().unwrap(), Some(b'A'));
        assert_eq!(transport.pending_input(), 1);
        assert_eq!(transport.read_byte().unwrap(), Some(b'B'));
        assert_eq!(transport.read_byte().unwrap(), None);

        transport.write_line("hello").unwrap();
        assert_eq!(transport.take_lines(), vec!["hello".to_string()]);
        assert!(transport.lines().is_empty());
    }

    #[test]
    fn test_channel_transport() {
        let (tx, rx) = mpsc::channel();
        let mut transport = ChannelTransport::new(rx, Vec::new());

        assert_eq!(transport.read_byte().unwrap(), None);
        tx.send(b'x').unwrap();
        assert_eq!(transport.read_byte().unwrap(), Some(b'x'));
        drop(tx);
        assert_eq!(transport.read_byte().unwrap(), None);

        transport.write_line("one").unwrap();
        transport.write_line("two").unwrap();
        assert_eq!(transport.into_inner(), b"one\ntwo\n");
    }

    #[test]
    fn test_disconnect_triggers_shutdown_after_drain() {
        let (tx, rx) = mpsc::channel();
        let shutdown = Arc::new(ShutdownSignal::new());
        let mut transport =
            ChannelTransport::new(rx, Vec::new()).stop_on_disconnect(Arc::clone(&shutdown));

        tx.send(b'L').unwrap();
        drop(tx);
        assert_eq!(transport.read_byte().unwrap(), Some(b'L'));
        assert!(!shutdown.is_shutdown());
        assert_eq!(transport.read_byte().unwrap(), None);
        assert!(shutdown.is_shutdown());
    }
}
