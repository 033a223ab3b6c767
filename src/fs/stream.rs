//! Chunked stream copy
//!
//! Moves bytes from a reader to a writer through one caller-owned buffer, so
//! a transfer never stages more than a single buffer-sized chunk.

use crate::fs::BandwidthLimiter;
use std::io::{self, Read, Write};

/// Trait for hash writers that can receive streaming data
pub trait HashWriter {
    /// Update the hash with more data
    fn update(&mut self, data: &[u8]);
}

/// Which side of a copy failed
#[derive(Debug)]
pub enum CopyError {
    /// Reading from the source failed
    Read(io::Error),
    /// Writing to the destination failed
    Write(io::Error),
}

impl CopyError {
    /// The underlying I/O error
    pub fn into_inner(self) -> io::Error {
        match self {
            Self::Read(e) | Self::Write(e) => e,
        }
    }
}

/// Optional work done for every chunk
#[derive(Default)]
pub struct ChunkHooks<'a> {
    /// Digest fed with every chunk
    pub hasher: Option<&'a mut dyn HashWriter>,
    /// Shared throughput cap
    pub limiter: Option<&'a BandwidthLimiter>,
    /// Called with the size of every chunk written
    pub on_chunk: Option<&'a dyn Fn(u64)>,
}

/// Copy until the reader is exhausted, returning the bytes moved
///
/// On error `copied` holds the bytes written before the failure.
pub fn copy_stream<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut [u8],
    hooks: ChunkHooks<'_>,
    copied: &mut u64,
) -> Result<u64, CopyError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let ChunkHooks {
        mut hasher,
        limiter,
        on_chunk,
    } = hooks;

    loop {
        let bytes_read = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };

        if let Some(limiter) = limiter {
            limiter.wait_for_capacity_blocking(bytes_read);
        }

        let chunk = &buffer[..bytes_read];
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(chunk);
        }

        writer.write_all(chunk).map_err(CopyError::Write)?;
        *copied += bytes_read as u64;

        if let Some(on_chunk) = on_chunk {
            on_chunk(bytes_read as u64);
        }
    }

    writer.flush().map_err(CopyError::Write)?;
    Ok(*copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Collect(Vec<u8>);

    impl HashWriter for Collect {
        fn update(&mut self, data: &[u8]) {
            self.0.extend_from_slice(data);
        }
    }

    #[test]
    fn test_copy_in_buffer_sized_chunks() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut reader = io::Cursor::new(data.clone());
        let mut out = Vec::new();
        let mut buffer = vec![0u8; 1024];
        let mut seen = Collect(Vec::new());
        let chunks = Cell::new(0usize);
        let largest = Cell::new(0u64);
        let on_chunk = |n: u64| {
            chunks.set(chunks.get() + 1);
            largest.set(largest.get().max(n));
        };

        let mut copied = 0;
        let total = copy_stream(
            &mut reader,
            &mut out,
            &mut buffer,
            ChunkHooks {
                hasher: Some(&mut seen),
                limiter: None,
                on_chunk: Some(&on_chunk),
            },
            &mut copied,
        )
        .unwrap();

        assert_eq!(total, 10_000);
        assert_eq!(out, data);
        assert_eq!(seen.0, data);
        assert_eq!(chunks.get(), 10);
        assert!(largest.get() <= 1024);
    }

    #[test]
    fn test_write_failure_reports_partial_count() {
        struct FailAfter(usize);
        impl Write for FailAfter {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                if self.0 == 0 {
                    return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
                }
                let n = buf.len().min(self.0);
                self.0 -= n;
                Ok(n)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut reader = io::Cursor::new(vec![1u8; 4096]);
        let mut writer = FailAfter(1024);
        let mut buffer = vec![0u8; 512];
        let mut copied = 0;

        let err = copy_stream(&mut reader, &mut writer, &mut buffer, ChunkHooks::default(), &mut copied)
            .unwrap_err();
        assert!(matches!(err, CopyError::Write(_)));
        assert_eq!(copied, 1024);
    }
}
