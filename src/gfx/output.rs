//! Byte sinks for the vector writers and PNG export.
//!
//! An `Output` is a file, an in-memory buffer, or a caller-supplied
//! closure (the stream-writer callback convention). Any write failure is
//! fatal for the surrounding render call.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::error::{Error, Result};

enum Sink {
    File(File),
    Buffer(Vec<u8>),
    Writer(Box<dyn FnMut(&[u8]) -> Result<()>>),
}

pub struct Output {
    sink: Sink,
}

impl Output {
    pub fn to_path(path: impl AsRef<Path>) -> Result<Output> {
        let file = File::create(path.as_ref()).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("cannot open {}: {e}", path.as_ref().display()),
            ))
        })?;
        Ok(Output { sink: Sink::File(file) })
    }

    pub fn to_buffer() -> Output {
        Output { sink: Sink::Buffer(Vec::new()) }
    }

    /// Wrap a caller-supplied write callback.
    pub fn to_writer(writer: impl FnMut(&[u8]) -> Result<()> + 'static) -> Output {
        Output { sink: Sink::Writer(Box::new(writer)) }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.sink {
            Sink::File(f) => f.write_all(data).map_err(Error::Io),
            Sink::Buffer(b) => {
                b.extend_from_slice(data);
                Ok(())
            }
            Sink::Writer(w) => w(data),
        }
    }

    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write(s.as_bytes())
    }

    /// Bytes written so far; only meaningful for buffer outputs.
    pub fn buffer(&self) -> &[u8] {
        match &self.sink {
            Sink::Buffer(b) => b,
            _ => &[],
        }
    }

    pub fn into_buffer(self) -> Vec<u8> {
        match self.sink {
            Sink::Buffer(b) => b,
            _ => Vec::new(),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Sink::File(f) = &mut self.sink {
            f.flush()?;
        }
        Ok(())
    }
}
