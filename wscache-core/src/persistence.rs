//! On-disk snapshots of a generation.
//!
//! A snapshot is a directory:
//!
//! ```text
//! <path>/
//! ├── metadata.bin   magic "WSCM", version u16, max_bytes u64,
//! │                  buckets u32, shards u32, xxh64 footer
//! ├── data.0.bin     magic "WSCD", version u16, shard u32, entries u64,
//! ├── data.1.bin     { key_len u32, value_len u32, key, value }*, xxh64 footer
//! └── ...
//! ```
//!
//! Shard `n` holds the buckets whose index satisfies `bucket % shards == n`,
//! oldest entries first, so restoring them in file order reproduces the
//! eviction order. All integers are little-endian.
//!
//! Every save stages its files in a fresh hidden directory next to `<path>`
//! and renames it over `<path>` once every shard is on disk, so a crash
//! never leaves a half-written snapshot at `<path>` and concurrent saves to
//! the same path never share a staging directory.

use crate::error::{Error, Result};
use crate::generation::{buckets_count_for, Generation};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use tempfile::TempDir;
use tracing::{error, info, warn};
use xxhash_rust::xxh64::xxh64;

/// Magic bytes of `metadata.bin`.
pub const METADATA_MAGIC: [u8; 4] = *b"WSCM";

/// Magic bytes of every `data.<n>.bin` shard.
pub const DATA_MAGIC: [u8; 4] = *b"WSCD";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

const METADATA_FILE: &str = "metadata.bin";
const CHECKSUM_LEN: usize = 8;

/// Attempts to move a staged snapshot into place while other saves race
/// for the same path.
const INSTALL_ATTEMPTS: usize = 8;

impl Generation {
    /// Saves the generation to the directory at `path` using one writer thread.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_to_file_concurrent(path, 1)
    }

    /// Saves the generation to the directory at `path`, writing up to
    /// `concurrency` shard files in parallel.
    ///
    /// Lookups and inserts may continue while the snapshot is written; each
    /// bucket is read-locked only while its own entries are serialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if any file cannot be created, written or
    /// renamed. A previous snapshot at `path` is left in place when a shard
    /// cannot be written.
    pub fn save_to_file_concurrent(&self, path: impl AsRef<Path>, concurrency: usize) -> Result<()> {
        let path = path.as_ref();
        let staging = sibling_dir(path, "tmp")?;
        let tmp = staging.path();

        let shards = concurrency.clamp(1, self.buckets().len());
        let entries = thread::scope(|s| {
            let handles: Vec<_> = (0..shards)
                .map(|n| {
                    s.spawn(move || self.write_shard(tmp, n, shards))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .sum::<Result<u64>>()
        })?;

        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&METADATA_MAGIC);
        buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(self.max_bytes() as u64).to_le_bytes());
        buf.extend_from_slice(&(self.buckets().len() as u32).to_le_bytes());
        buf.extend_from_slice(&(shards as u32).to_le_bytes());
        write_with_checksum(&tmp.join(METADATA_FILE), buf)?;

        install(tmp, path)?;

        info!(
            path = %path.display(),
            entries,
            shards,
            "saved cache snapshot"
        );
        Ok(())
    }

    fn write_shard(&self, dir: &Path, shard: usize, shards: usize) -> Result<u64> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&DATA_MAGIC);
        buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(shard as u32).to_le_bytes());
        let count_offset = buf.len();
        buf.extend_from_slice(&0u64.to_le_bytes());

        let mut count = 0u64;
        for bucket in self.buckets().iter().skip(shard).step_by(shards) {
            let bucket = bucket.read();
            for entry in bucket.entries() {
                buf.extend_from_slice(&(entry.key.len() as u32).to_le_bytes());
                buf.extend_from_slice(&(entry.value.len() as u32).to_le_bytes());
                buf.extend_from_slice(&entry.key);
                buf.extend_from_slice(&entry.value);
                count += 1;
            }
        }
        buf[count_offset..count_offset + 8].copy_from_slice(&count.to_le_bytes());

        write_with_checksum(&dir.join(data_file(shard)), buf)?;
        Ok(count)
    }

    /// Loads a generation of capacity `max_bytes` from the snapshot at `path`.
    ///
    /// A snapshot saved by a generation of at most `max_bytes` is accepted;
    /// its entries are redistributed over the new bucket layout in their
    /// original order.
    ///
    /// # Errors
    ///
    /// * [`Error::Io`] with `NotFound` if there is no snapshot at `path`
    /// * [`Error::CapacityMismatch`] if the snapshot was saved by a larger
    ///   generation
    /// * any other variant if the snapshot is corrupt
    pub fn load_from_file(path: impl AsRef<Path>, max_bytes: usize) -> Result<Generation> {
        let path = path.as_ref();
        let data = fs::read(path.join(METADATA_FILE))?;
        let body = verify_checksum(METADATA_FILE, &data)?;

        let mut r = Reader::new(METADATA_FILE, body);
        r.expect_magic(METADATA_MAGIC)?;
        r.expect_version()?;
        let saved_max_bytes = r.u64()? as usize;
        let buckets = r.u32()? as usize;
        let shards = r.u32()? as usize;
        r.expect_end()?;

        if saved_max_bytes > max_bytes {
            return Err(Error::CapacityMismatch {
                expected: max_bytes,
                actual: saved_max_bytes,
            });
        }
        if buckets != buckets_count_for(saved_max_bytes) {
            return Err(Error::InvalidMetadata(format!(
                "unexpected number of buckets: {} for capacity {}",
                buckets, saved_max_bytes
            )));
        }
        if shards == 0 || shards > buckets {
            return Err(Error::InvalidMetadata(format!(
                "invalid number of shards: {}",
                shards
            )));
        }

        let generation = Generation::new(max_bytes);
        thread::scope(|s| {
            let handles: Vec<_> = (0..shards)
                .map(|n| {
                    let generation = &generation;
                    s.spawn(move || load_shard(generation, path, n))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .sum::<Result<u64>>()
        })?;

        Ok(generation)
    }

    /// Loads a generation from `path`, falling back to an empty one.
    ///
    /// Never fails. The reason for falling back is logged: a missing snapshot
    /// at `info`, a capacity change at `warn`, anything else at `error`.
    pub fn load_from_file_or_new(path: impl AsRef<Path>, max_bytes: usize) -> Generation {
        let path = path.as_ref();
        match Generation::load_from_file(path, max_bytes) {
            Ok(generation) => {
                info!(
                    path = %path.display(),
                    entries = generation.stats().entries_count,
                    max_bytes,
                    "loaded cache snapshot"
                );
                generation
            }
            Err(e) if e.is_not_found() => {
                info!(path = %path.display(), "missing cache snapshot; creating new cache");
                Generation::new(max_bytes)
            }
            Err(e) if e.is_capacity_mismatch() => {
                warn!(
                    path = %path.display(),
                    "{}; the most likely reason: the cache size changed since the last save; creating new cache",
                    e
                );
                Generation::new(max_bytes)
            }
            Err(e) => {
                error!(path = %path.display(), "invalid cache snapshot: {}; creating new cache", e);
                Generation::new(max_bytes)
            }
        }
    }
}

fn load_shard(generation: &Generation, dir: &Path, shard: usize) -> Result<u64> {
    let file = data_file(shard);
    let data = fs::read(dir.join(&file)).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::Truncated(format!("missing shard file {}", file)),
        _ => Error::Io(e),
    })?;
    let body = verify_checksum(&file, &data)?;

    let mut r = Reader::new(&file, body);
    r.expect_magic(DATA_MAGIC)?;
    r.expect_version()?;
    let stored_shard = r.u32()? as usize;
    if stored_shard != shard {
        return Err(Error::InvalidMetadata(format!(
            "{} holds shard {}",
            file, stored_shard
        )));
    }

    let count = r.u64()?;
    for _ in 0..count {
        let key_len = r.u32()? as usize;
        let value_len = r.u32()? as usize;
        let key = r.bytes(key_len)?;
        let value = r.bytes(value_len)?;
        generation.insert(key, value);
    }
    r.expect_end()?;
    Ok(count)
}

fn data_file(shard: usize) -> String {
    format!("data.{}.bin", shard)
}

/// Creates a uniquely named hidden directory next to `path`, removed with
/// its contents when dropped.
fn sibling_dir(path: &Path, kind: &str) -> Result<TempDir> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut prefix = std::ffi::OsString::from(".");
    if let Some(name) = path.file_name() {
        prefix.push(name);
    }
    prefix.push(".");
    prefix.push(kind);
    prefix.push(".");
    Ok(tempfile::Builder::new().prefix(&prefix).tempdir_in(parent)?)
}

/// Renames the staged snapshot at `staged` to `path`.
///
/// The snapshot already at `path` is first moved into a private directory
/// that is removed afterwards. Another save may install its own snapshot in
/// between; the rename then fails and the whole step is retried, so the
/// last save to finish wins.
fn install(staged: &Path, path: &Path) -> Result<()> {
    let mut attempt = 0;
    loop {
        let trash = sibling_dir(path, "old")?;
        match fs::rename(path, trash.path().join("snapshot")) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        match fs::rename(staged, path) {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempt += 1;
                if attempt >= INSTALL_ATTEMPTS {
                    return Err(e.into());
                }
            }
        }
    }
}

fn write_with_checksum(path: &Path, mut buf: Vec<u8>) -> Result<()> {
    let checksum = xxh64(&buf, 0);
    buf.extend_from_slice(&checksum.to_le_bytes());
    let mut file = File::create(path)?;
    file.write_all(&buf)?;
    file.sync_all()?;
    Ok(())
}

fn verify_checksum<'a>(file: &str, data: &'a [u8]) -> Result<&'a [u8]> {
    if data.len() < CHECKSUM_LEN {
        return Err(Error::Truncated(format!("{} is {} bytes long", file, data.len())));
    }
    let (body, footer) = data.split_at(data.len() - CHECKSUM_LEN);
    let mut stored = [0u8; CHECKSUM_LEN];
    stored.copy_from_slice(footer);
    let expected = u64::from_le_bytes(stored);
    let actual = xxh64(body, 0);
    if expected != actual {
        return Err(Error::ChecksumMismatch {
            file: file.to_string(),
            expected,
            actual,
        });
    }
    Ok(body)
}

/// Bounds-checked little-endian cursor over a verified file body.
struct Reader<'a> {
    file: &'a str,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(file: &'a str, buf: &'a [u8]) -> Self {
        Self { file, buf, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.buf.len());
        match end {
            Some(end) => {
                let out = &self.buf[self.pos..end];
                self.pos = end;
                Ok(out)
            }
            None => Err(Error::Truncated(format!(
                "{}: need {} bytes at offset {}, have {}",
                self.file,
                len,
                self.pos,
                self.buf.len() - self.pos
            ))),
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn expect_magic(&mut self, expected: [u8; 4]) -> Result<()> {
        let actual = self.array::<4>()?;
        if actual != expected {
            return Err(Error::InvalidMagic {
                file: self.file.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn expect_version(&mut self) -> Result<()> {
        let version = self.u16()?;
        if version != SNAPSHOT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok(())
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(Error::InvalidMetadata(format!(
                "{}: {} trailing bytes",
                self.file,
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}
