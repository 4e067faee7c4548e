//! In-memory stand-in for a serial port.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};

enum Chunk {
    Data(Vec<u8>),
    Timeout,
}

/// Replays scripted chunks, one per `read` call. Once the script runs out the
/// port either keeps timing out (a silent device) or reports end of stream.
#[derive(Default)]
pub struct ScriptedPort {
    script: VecDeque<Chunk>,
    hang_up: bool,
    fail_writes: bool,
    written: Vec<u8>,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines<I, L>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: AsRef<str>,
    {
        for line in lines {
            let mut bytes = line.as_ref().as_bytes().to_vec();
            bytes.push(b'\n');
            self.script.push_back(Chunk::Data(bytes));
        }
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.script.push_back(Chunk::Data(bytes.to_vec()));
        self
    }

    pub fn timeout(mut self) -> Self {
        self.script.push_back(Chunk::Timeout);
        self
    }

    pub fn hang_up(mut self) -> Self {
        self.hang_up = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.script.pop_front() {
            Some(Chunk::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.script.push_front(Chunk::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
            Some(Chunk::Timeout) => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
            None if self.hang_up => Ok(0),
            None => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
        }
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "port unplugged"));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
