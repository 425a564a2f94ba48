use std::io::{BufRead, BufReader};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("cannot open log {}: {source}", .path.display())]
    Open { path: PathBuf, source: std::io::Error },
    #[error("log read failed after line {line}: {source}")]
    Read { line: usize, source: std::io::Error },
}

/// Newline-stripped lines of a log. Invalid UTF-8 is replaced, not rejected.
pub struct LineSource {
    reader: Box<dyn BufRead>,
    buf: Vec<u8>,
    read: usize,
    failed: bool,
}

impl LineSource {
    pub fn new(reader: Box<dyn BufRead>) -> Self {
        Self { reader, buf: Vec::new(), read: 0, failed: false }
    }

    /// `-` reads standard input.
    pub fn open(path: &str) -> Result<Self, InputError> {
        if path == "-" {
            return Ok(Self::new(Box::new(BufReader::new(std::io::stdin()))));
        }
        let f = std::fs::File::open(path).map_err(|source| InputError::Open { path: PathBuf::from(path), source })?;
        Ok(Self::new(Box::new(BufReader::new(f))))
    }
}

impl Iterator for LineSource {
    type Item = Result<String, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed { return None; }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') { self.buf.pop(); }
                if self.buf.last() == Some(&b'\r') { self.buf.pop(); }
                self.read += 1;
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(source) => {
                self.failed = true;
                Some(Err(InputError::Read { line: self.read, source }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn strips_crlf_and_keeps_blank_lines() {
        let src = LineSource::new(Box::new(Cursor::new(b"a\r\n\nb".to_vec())));
        let got: Vec<String> = src.map(|r| r.unwrap()).collect();
        assert_eq!(got, vec!["a", "", "b"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let src = LineSource::new(Box::new(Cursor::new(vec![b'o', b'k', 0xff, b'\n'])));
        let got: Vec<String> = src.map(|r| r.unwrap()).collect();
        assert_eq!(got, vec!["ok\u{fffd}"]);
    }

    #[test]
    fn missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nope.txt");
        let err = LineSource::open(&p.to_string_lossy()).err().unwrap();
        assert!(matches!(err, InputError::Open { .. }));
    }

    #[test]
    fn reads_file_from_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, b"one\ntwo\n").unwrap();
        let got: Vec<String> = LineSource::open(&f.path().to_string_lossy()).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(got, vec!["one", "two"]);
    }

    struct Flaky(usize);

    impl Read for Flaky {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            if self.0 == 0 { return Err(std::io::Error::other("device lost")); }
            self.0 -= 1;
            out[0] = b'\n';
            Ok(1)
        }
    }

    #[test]
    fn read_failure_ends_the_stream() {
        let mut src = LineSource::new(Box::new(BufReader::with_capacity(1, Flaky(2))));
        assert!(src.next().unwrap().is_ok());
        assert!(src.next().unwrap().is_ok());
        assert!(matches!(src.next(), Some(Err(InputError::Read { line: 2, .. }))));
        assert!(src.next().is_none());
    }
}
