//! Line-oriented access to the sensor station.
//!
//! The underlying stream is expected to carry its own read timeout (a serial
//! port opened with `serialport` does). A timed-out read yields `Ok(None)` and
//! keeps any partial line so the next read can complete it.

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};

pub struct DeviceLink<S> {
    reader: BufReader<S>,
    pending: Vec<u8>,
}

impl<S: Read + Write> DeviceLink<S> {
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
            pending: Vec::new(),
        }
    }

    /// Reads one line, trimmed of surrounding whitespace.
    ///
    /// Returns `Ok(None)` when the read timed out before a full line arrived.
    /// A closed stream is reported as `UnexpectedEof`.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) => Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "serial stream closed",
            )),
            // Either a full line, or the stream ended mid-line and this is the
            // last fragment we will ever see.
            Ok(_) => Ok(Some(self.take_pending())),
            Err(err) if is_timeout(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Writes `line` followed by a newline and flushes.
    pub fn send_line(&mut self, line: &str) -> io::Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()
    }

    pub fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(bytes)?;
        stream.flush()
    }

    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    fn take_pending(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        line
    }
}

pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}
