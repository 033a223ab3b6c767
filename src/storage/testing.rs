//! Instrumented in-memory storage double for tests

use crate::error::{Result, XferError};
use crate::storage::{BlobId, BlobInfo, ObjectStorage, ObjectWriter, SourceOption, TargetOption};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the double misbehaves
#[derive(Debug, Clone, Default)]
pub(crate) enum Fault {
    #[default]
    None,
    /// `reader()` returns a storage error with this message
    OpenReader(String),
    /// `reader()` panics for the object with this name
    PanicOn(String),
    /// The read stream errors after this many bytes
    MidRead(usize),
    /// `close()` on a writer fails with this message
    Close(String),
}

#[derive(Default)]
struct Counters {
    reader_calls: AtomicUsize,
    writer_calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Counters {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory object store that counts calls and peak stream concurrency
#[derive(Clone, Default)]
pub(crate) struct MemoryStorage {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
    counters: Arc<Counters>,
    fault: Arc<Mutex<Fault>>,
    read_delay: Option<Duration>,
}

impl MemoryStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub(crate) fn with_fault(self, fault: Fault) -> Self {
        *self.fault.lock().unwrap() = fault;
        self
    }

    pub(crate) fn insert(&self, bucket: &str, name: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), name.to_string()), data.to_vec());
    }

    pub(crate) fn get(&self, bucket: &str, name: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
    }

    pub(crate) fn reader_calls(&self) -> usize {
        self.counters.reader_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn writer_calls(&self) -> usize {
        self.counters.writer_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_concurrency(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    fn fault(&self) -> Fault {
        self.fault.lock().unwrap().clone()
    }
}

struct MemoryReader {
    data: io::Cursor<Vec<u8>>,
    counters: Arc<Counters>,
    delay: Option<Duration>,
    fail_after: Option<usize>,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(limit) = self.fail_after {
            if self.data.position() as usize >= limit {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream reset"));
            }
            let room = limit - self.data.position() as usize;
            let len = buf.len().min(room);
            return self.data.read(&mut buf[..len]);
        }
        self.data.read(buf)
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        self.counters.exit();
    }
}

struct MemoryWriter {
    storage: MemoryStorage,
    info: BlobInfo,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.storage.counters.exit();
    }
}

impl ObjectWriter for MemoryWriter {
    fn close(self: Box<Self>) -> Result<BlobInfo> {
        if let Fault::Close(message) = self.storage.fault() {
            return Err(XferError::storage(message));
        }
        let size = self.buffer.len() as u64;
        self.storage.insert(self.info.bucket(), self.info.name(), &self.buffer);
        Ok(BlobInfo {
            id: self.info.id.clone().with_generation(1),
            size: Some(size),
            ..self.info.clone()
        })
    }
}

impl ObjectStorage for MemoryStorage {
    fn reader(&self, id: &BlobId, _options: &[SourceOption]) -> Result<Box<dyn Read + Send>> {
        self.counters.reader_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.fault();
        match &fault {
            Fault::OpenReader(message) => return Err(XferError::storage(message.clone())),
            Fault::PanicOn(name) if *name == id.name => panic!("reader exploded on {}", name),
            _ => {}
        }

        let data = self.get(&id.bucket, &id.name).ok_or_else(|| XferError::NotFound {
            bucket: id.bucket.clone(),
            name: id.name.clone(),
        })?;
        self.counters.enter();
        Ok(Box::new(MemoryReader {
            data: io::Cursor::new(data),
            counters: Arc::clone(&self.counters),
            delay: self.read_delay,
            fail_after: match fault {
                Fault::MidRead(n) => Some(n),
                _ => None,
            },
        }))
    }

    fn writer(&self, info: &BlobInfo, options: &[TargetOption]) -> Result<Box<dyn ObjectWriter>> {
        self.counters.writer_calls.fetch_add(1, Ordering::SeqCst);
        let exists = self.get(info.bucket(), info.name()).is_some();
        if exists && options.contains(&TargetOption::DoesNotExist) {
            return Err(XferError::already_exists(info.bucket(), info.name()));
        }
        self.counters.enter();
        Ok(Box::new(MemoryWriter {
            storage: self.clone(),
            info: info.clone(),
            buffer: Vec::new(),
        }))
    }
}
