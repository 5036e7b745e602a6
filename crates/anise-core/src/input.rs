use std::io::Read;

use crate::error::AniseError;

pub type PullFn = Box<dyn FnMut() -> Option<Vec<u8>> + Send>;

/// Byte-addressable view over a string or a pull-based chunk source.
/// Absolute indices are 1-based; `offset` counts bytes already released, so
/// absolute index `i` lives at `buf[i - offset - 1]`. `offset` only grows.
pub struct Input {
    buf: Vec<u8>,
    offset: usize,
    more: Option<PullFn>,
    done: bool,
}

impl Input {
    pub fn from_string(source: impl Into<String>) -> Self {
        Self {
            buf: source.into().into_bytes(),
            offset: 0,
            more: None,
            done: true,
        }
    }

    /// A streaming input: `pull` is invoked whenever a byte past the buffered
    /// suffix is requested, until it returns `None`.
    pub fn from_pull(pull: PullFn) -> Self {
        Self {
            buf: Vec::new(),
            offset: 0,
            more: Some(pull),
            done: false,
        }
    }

    /// Streaming input over any reader, pulled in fixed-size chunks.
    pub fn from_reader<R: Read + Send + 'static>(mut reader: R) -> Self {
        Self::from_pull(Box::new(move || {
            let mut chunk = vec![0u8; 4096];
            match reader.read(&mut chunk) {
                Ok(0) | Err(_) => None,
                Ok(n) => {
                    chunk.truncate(n);
                    Some(chunk)
                }
            }
        }))
    }

    /// Total byte count when bounded; a pull-backed input has no length
    /// until its source is exhausted.
    pub fn len(&self) -> Option<usize> {
        if self.done {
            Some(self.offset + self.buf.len())
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// The byte at absolute index `i`, pulling more chunks as needed.
    /// `Ok(None)` signals end of input; indices at or below the released
    /// prefix are errors.
    pub fn byte(&mut self, i: usize) -> Result<Option<u8>, AniseError> {
        if i <= self.offset {
            return Err(AniseError::parse(format!(
                "byte index {} was already released",
                i
            )));
        }
        let rel = i - self.offset - 1;
        while rel >= self.buf.len() {
            if !self.pull_more() {
                return Ok(None);
            }
        }
        Ok(Some(self.buf[rel]))
    }

    /// Inclusive byte range `[a, b]`. Both bounds must be positive, beyond
    /// the released prefix, and already buffered or pullable.
    pub fn sub(&mut self, a: usize, b: usize) -> Result<Vec<u8>, AniseError> {
        if a == 0 || b < a {
            return Err(AniseError::parse(format!("invalid byte range {}..{}", a, b)));
        }
        if a <= self.offset {
            return Err(AniseError::parse(format!(
                "byte range {}..{} reaches into released input",
                a, b
            )));
        }
        if self.byte(b)?.is_none() {
            return Err(AniseError::parse(format!(
                "byte range {}..{} runs past end of input",
                a, b
            )));
        }
        let lo = a - self.offset - 1;
        let hi = b - self.offset;
        Ok(self.buf[lo..hi].to_vec())
    }

    /// Release every byte strictly below absolute index `i`. Calls at or
    /// below the current offset are no-ops.
    pub fn free(&mut self, i: usize) {
        if i <= self.offset + 1 {
            return;
        }
        let keep_from = i - 1 - self.offset;
        if keep_from >= self.buf.len() {
            self.offset += self.buf.len();
            self.buf.clear();
        } else {
            self.buf.drain(..keep_from);
            self.offset = i - 1;
        }
    }

    fn pull_more(&mut self) -> bool {
        if self.done {
            return false;
        }
        let Some(pull) = self.more.as_mut() else {
            self.done = true;
            return false;
        };
        match pull() {
            Some(chunk) if !chunk.is_empty() => {
                self.buf.extend_from_slice(&chunk);
                true
            }
            Some(_) | None => {
                self.done = true;
                self.more = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_input_is_one_indexed() {
        let mut input = Input::from_string("abc");
        assert_eq!(input.byte(1).unwrap(), Some(b'a'));
        assert_eq!(input.byte(3).unwrap(), Some(b'c'));
        assert_eq!(input.byte(4).unwrap(), None);
        assert_eq!(input.len(), Some(3));
    }

    #[test]
    fn sub_is_inclusive() {
        let mut input = Input::from_string("hello");
        assert_eq!(input.sub(2, 4).unwrap(), b"ell".to_vec());
        assert!(input.sub(0, 2).is_err());
        assert!(input.sub(3, 9).is_err());
    }

    #[test]
    fn free_releases_prefix_and_rejects_freed_reads() {
        let mut input = Input::from_string("abcdef");
        input.free(4);
        assert_eq!(input.byte(4).unwrap(), Some(b'd'));
        assert!(input.byte(3).is_err());
        // idempotent below the current offset
        input.free(2);
        assert_eq!(input.byte(5).unwrap(), Some(b'e'));
    }

    #[test]
    fn pull_input_extends_on_demand() {
        let mut chunks = vec![b"(+ ".to_vec(), b"1 2)".to_vec()].into_iter();
        let mut input = Input::from_pull(Box::new(move || chunks.next()));
        assert_eq!(input.len(), None);
        assert_eq!(input.byte(1).unwrap(), Some(b'('));
        assert_eq!(input.byte(7).unwrap(), Some(b')'));
        assert_eq!(input.byte(8).unwrap(), None);
        assert_eq!(input.len(), Some(7));
    }

    #[test]
    fn reader_backed_input_streams() {
        let mut input = Input::from_reader(std::io::Cursor::new("xy".as_bytes().to_vec()));
        assert_eq!(input.byte(2).unwrap(), Some(b'y'));
        assert_eq!(input.byte(3).unwrap(), None);
    }
}
