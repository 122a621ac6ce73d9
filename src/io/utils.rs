use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;

/// A writable stream that keeps a running SHA-1 checksum and a count of all
/// bytes written through it
#[derive(Clone)]
pub struct SHA1HashingStream<T: io::Write> {
    pub stream: T,
    pub context: Sha1,
    bytes_written: u64,
}

impl<T: io::Write> SHA1HashingStream<T> {
    pub fn new(file: T) -> SHA1HashingStream<T> {
        Self {
            stream: file,
            context: Sha1::new(),
            bytes_written: 0,
        }
    }

    /// The lowercase hexadecimal digest of everything written so far
    pub fn compute(&self) -> String {
        base16ct::lower::encode_string(&self.context.clone().finalize())
    }

    /// The number of bytes that have passed through the stream
    pub fn position(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.stream
    }

    pub fn into_inner(self) -> T {
        self.stream
    }
}

impl<T: io::Write> io::Write for SHA1HashingStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.stream.write(buf)?;
        self.context.update(&buf[..n]);
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// The lowercase hexadecimal SHA-1 digest of a file's contents
pub fn checksum_file(path: &Path) -> io::Result<String> {
    let mut reader = io::BufReader::new(fs::File::open(path)?);
    let mut context = Sha1::new();
    let mut buffer = vec![0u8; 2usize.pow(16)];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        context.update(&buffer[..n]);
    }
    Ok(base16ct::lower::encode_string(&context.finalize()))
}

/// Write `path` through a temporary file in the same directory. The file
/// only replaces `path` once `write` succeeded, otherwise it is removed.
pub fn write_atomically<T, E, F>(path: &Path, write: F) -> Result<T, E>
where
    F: FnOnce(&mut fs::File) -> Result<T, E>,
    E: From<io::Error>,
{
    let directory = match path.parent() {
        Some(dir) if dir.as_os_str().is_empty() => Path::new("."),
        Some(dir) => dir,
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Cannot write output to {}", path.display()),
            )
            .into())
        }
    };
    let mut temp = NamedTempFile::new_in(directory)?;
    let value = write(temp.as_file_mut())?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hashing_stream() -> io::Result<()> {
        let mut stream = SHA1HashingStream::new(Vec::new());
        stream.write_all(b"ab")?;
        stream.write_all(b"c")?;
        assert_eq!(stream.position(), 3);
        assert_eq!(stream.compute(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        // Computing the digest does not consume the running state
        stream.write_all(b"")?;
        assert_eq!(stream.compute(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(stream.into_inner(), b"abc");
        Ok(())
    }

    #[test]
    fn test_checksum_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("input.raw");
        fs::write(&path, b"abc")?;
        assert_eq!(checksum_file(&path)?, "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert!(checksum_file(&dir.path().join("missing.raw")).is_err());
        Ok(())
    }

    #[test]
    fn test_write_atomically() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.txt");
        let n = write_atomically(&path, |file| -> io::Result<usize> {
            file.write_all(b"done")?;
            Ok(4)
        })?;
        assert_eq!(n, 4);
        assert_eq!(fs::read_to_string(&path)?, "done");

        let failed = write_atomically(&dir.path().join("failed.txt"), |file| -> io::Result<()> {
            file.write_all(b"partial")?;
            Err(io::Error::new(io::ErrorKind::Other, "interrupted"))
        });
        assert!(failed.is_err());
        let names: Vec<_> = fs::read_dir(dir.path())?.map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec!["out.txt"]);

        assert!(write_atomically(Path::new("/"), |_| Ok::<_, io::Error>(())).is_err());
        Ok(())
    }
}
