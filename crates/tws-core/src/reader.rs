//! Line framing for a streaming response body.

use std::io::{self, BufRead, BufReader, Read};

/// Splits a body into newline-delimited lines.
///
/// Each call to `read_next` yields one line with the `\n` (and a preceding
/// `\r`) stripped. An empty line is a keep-alive; callers skip it. The reader
/// is one-directional: once it returns `Ok(None)` or an error it is done.
pub struct BodyReader<R> {
    inner: BufReader<R>,
    done: bool,
}

impl<R: Read> BodyReader<R> {
    pub fn new(body: R) -> Self {
        Self {
            inner: BufReader::new(body),
            done: false,
        }
    }

    /// Next line, `Ok(None)` at end of stream.
    pub fn read_next(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        let mut line = Vec::new();
        let n = match self.inner.read_until(b'\n', &mut line) {
            Ok(n) => n,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };
        if n == 0 {
            self.done = true;
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}
