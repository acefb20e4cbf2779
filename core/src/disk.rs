//! Disk-resident, append-only vector store.
//!
//! Every operation opens the store file for its own duration and closes it on
//! all exit paths. Appends that fit in the reserved slots write vectors and
//! identifier records past the committed region, sync, and then commit by
//! rewriting the header. Appends that need more room rebuild the file with a
//! larger slab under a temporary name and rename it into place.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::{grown_capacity, DEFAULT_RESIZE_INCREMENT};
use crate::identifiers::{records_for_batch, IdentifierIndex, Offset};
use crate::index::validate_entries;
use crate::retrieval::{retrieve, Mode, RetrievedVectors};
use crate::{InMemoryIndex, Index, IndexConfig, IndexError, StorageDtype, VectorEntry};

mod format;
mod journal;

pub use format::FORMAT_VERSION;

pub(crate) use format::HEADER_LEN;

use format::Header;

#[derive(Debug)]
pub struct DiskIndex {
    path: PathBuf,
    resize_increment: usize,
    header: Header,
    ids: IdentifierIndex,
}

impl DiskIndex {
    /// Creates an empty store at `path` with `config.initial_capacity` slots.
    pub fn create(path: impl AsRef<Path>, config: &IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        if path.exists() && !config.overwrite {
            return Err(IndexError::AlreadyExists { path });
        }
        ensure_parent_dir(&path)?;

        let header = Header {
            format_version: FORMAT_VERSION,
            dtype: config.dtype,
            strict_finite: config.strict_finite,
            dim: config.dim as u32,
            capacity: config.initial_capacity as u64,
            count: 0,
            journal_len: 0,
        };

        let temp_path = temp_sibling(&path);
        let written = write_empty_store(&temp_path, &header).and_then(|_| {
            fs::rename(&temp_path, &path)?;
            sync_parent_dir(&path)
        });
        if let Err(error) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(error);
        }

        tracing::debug!(
            path = %path.display(),
            dim = config.dim,
            dtype = %config.dtype,
            capacity = config.initial_capacity,
            "created vector store"
        );

        Ok(Self {
            path,
            resize_increment: config.resize_increment,
            header,
            ids: IdentifierIndex::new(),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        Self::open_with_resize_increment(path, DEFAULT_RESIZE_INCREMENT)
    }

    /// Opens an existing store; `resize_increment` applies to later appends.
    pub fn open_with_resize_increment(
        path: impl AsRef<Path>,
        resize_increment: usize,
    ) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();
        let mut file = open_existing(&path, false)?;
        let header = Header::read_from(&mut file)?;
        let ids = load_identifiers(&mut file, &header)?;

        Ok(Self {
            path,
            resize_increment,
            header,
            ids,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.header.capacity as usize
    }

    pub fn dtype(&self) -> StorageDtype {
        self.header.dtype
    }

    pub fn strict_finite(&self) -> bool {
        self.header.strict_finite
    }

    pub fn format_version(&self) -> u16 {
        self.header.format_version
    }

    pub fn resize_increment(&self) -> usize {
        self.resize_increment
    }

    pub fn identifiers(&self) -> &IdentifierIndex {
        &self.ids
    }

    /// Returns the vectors at `offsets`, in request order.
    pub fn get(&self, offsets: &[Offset]) -> Result<Vec<Vec<f32>>, IndexError> {
        let mut file = open_existing(&self.path, false)?;
        let header = Header::read_from(&mut file)?;
        if let Some(offset) = offsets.iter().find(|offset| **offset >= header.count) {
            return Err(IndexError::OutOfRange {
                offset: *offset,
                count: header.count,
            });
        }

        let dim = header.dim as usize;
        let mut vectors = Vec::with_capacity(offsets.len());
        for run in consecutive_runs(offsets) {
            let values = read_rows(&mut file, &header, run.start, run.len)?;
            vectors.extend(values.chunks_exact(dim).map(<[f32]>::to_vec));
        }
        Ok(vectors)
    }

    /// Reloads the header and identifiers if another handle has appended
    /// since this handle last touched the file.
    pub fn refresh(&mut self) -> Result<(), IndexError> {
        let mut file = open_existing(&self.path, false)?;
        let header = Header::read_from(&mut file)?;
        self.refresh_if_changed(&mut file, header)
    }

    /// Loads every vector and identifier into an [`InMemoryIndex`], reading at
    /// most `buffer_size` vectors per I/O. Offsets are preserved.
    pub fn to_memory(&self, buffer_size: usize) -> Result<InMemoryIndex, IndexError> {
        if buffer_size == 0 {
            return Err(IndexError::InvalidConfig(
                "buffer_size must be > 0".to_string(),
            ));
        }

        let mut file = open_existing(&self.path, false)?;
        let header = Header::read_from(&mut file)?;
        let ids = load_identifiers(&mut file, &header)?;

        let mut values = Vec::with_capacity(header.count as usize * header.dim as usize);
        let mut start = 0u64;
        while start < header.count {
            let len = (header.count - start).min(buffer_size as u64);
            values.extend(read_rows(&mut file, &header, start, len)?);
            start += len;
        }

        let config = IndexConfig::new(header.dim as usize)?
            .with_dtype(header.dtype)
            .with_initial_capacity(header.count as usize)
            .with_resize_increment(self.resize_increment)
            .with_strict_finite(header.strict_finite);
        InMemoryIndex::from_parts(config, values, ids)
    }

    fn refresh_if_changed(&mut self, file: &mut File, header: Header) -> Result<(), IndexError> {
        if header != self.header {
            tracing::debug!(
                path = %self.path.display(),
                "store changed since last access, reloading identifiers"
            );
            self.ids = load_identifiers(file, &header)?;
            self.header = header;
        }
        Ok(())
    }

    fn write_in_place(
        &self,
        file: &mut File,
        header: &Header,
        vector_bytes: &[u8],
        journal_bytes: &[u8],
        committed: &Header,
    ) -> Result<(), IndexError> {
        file.seek(SeekFrom::Start(header.row_offset(header.count)))?;
        file.write_all(vector_bytes)?;
        file.seek(SeekFrom::Start(header.file_len()))?;
        file.write_all(journal_bytes)?;
        file.sync_data()?;

        committed.write_to(file)?;
        file.sync_data()?;
        Ok(())
    }

    /// Rebuilds the store with `committed.capacity` slots, carrying over the
    /// existing vectors and journal and adding the new batch.
    fn write_resized(
        &self,
        mut source: File,
        header: &Header,
        vector_bytes: &[u8],
        journal_bytes: &[u8],
        committed: &Header,
    ) -> Result<(), IndexError> {
        tracing::debug!(
            path = %self.path.display(),
            from = header.capacity,
            to = committed.capacity,
            "resizing vector store"
        );

        let temp_path = temp_sibling(&self.path);
        let rebuilt = copy_into_resized(
            &mut source,
            &temp_path,
            header,
            vector_bytes,
            journal_bytes,
            committed,
        );
        drop(source);

        let renamed = rebuilt.and_then(|_| {
            fs::rename(&temp_path, &self.path)?;
            sync_parent_dir(&self.path)
        });
        if renamed.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        renamed
    }
}

impl Index for DiskIndex {
    fn dim(&self) -> usize {
        self.header.dim as usize
    }

    /// Count as of this handle's last access to the file. Appends made
    /// through other handles show up after [`DiskIndex::refresh`].
    fn len(&self) -> usize {
        self.header.count as usize
    }

    fn doc_ids(&self) -> BTreeSet<String> {
        self.ids.doc_ids()
    }

    fn psg_ids(&self) -> BTreeSet<String> {
        self.ids.psg_ids()
    }

    fn append(&mut self, entries: &[VectorEntry]) -> Result<Vec<Offset>, IndexError> {
        validate_entries(entries, self.dim(), self.header.strict_finite)?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut file = open_existing(&self.path, true)?;
        let header = Header::read_from(&mut file)?;
        self.refresh_if_changed(&mut file, header)?;

        let first = header.count;
        let incoming = entries.len() as u64;
        let records = records_for_batch(first, entries.iter().map(VectorEntry::id_pair));
        let journal_bytes = journal::encode_records(&records)?;
        let mut vector_bytes = Vec::with_capacity(entries.len() * header.row_bytes() as usize);
        for entry in entries {
            header.dtype.encode_into(&entry.values, &mut vector_bytes);
        }

        let capacity = grown_capacity(
            header.capacity as usize,
            header.count as usize,
            entries.len(),
            self.resize_increment,
        ) as u64;
        let committed = Header {
            capacity,
            count: first + incoming,
            journal_len: header.journal_len + journal_bytes.len() as u64,
            ..header
        };
        if committed.checked_file_len().is_none() {
            return Err(IndexError::InvalidBatch(format!(
                "growing to {capacity} slots would exceed the addressable file size"
            )));
        }

        if capacity == header.capacity {
            self.write_in_place(&mut file, &header, &vector_bytes, &journal_bytes, &committed)?;
        } else {
            self.write_resized(file, &header, &vector_bytes, &journal_bytes, &committed)?;
        }

        for record in &records {
            self.ids.apply(record);
        }
        self.header = committed;
        Ok((first..first + incoming).collect())
    }

    fn get_vectors(&self, ids: &[&str], mode: Mode) -> Result<RetrievedVectors, IndexError> {
        retrieve(&self.ids, ids, mode, |offsets| self.get(offsets))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowRun {
    start: u64,
    len: u64,
}

/// Splits offsets into maximal runs of consecutive ascending offsets, keeping
/// request order.
fn consecutive_runs(offsets: &[Offset]) -> Vec<RowRun> {
    let mut runs: Vec<RowRun> = Vec::new();
    for offset in offsets {
        match runs.last_mut() {
            Some(run) if run.start + run.len == *offset => run.len += 1,
            _ => runs.push(RowRun {
                start: *offset,
                len: 1,
            }),
        }
    }
    runs
}

fn read_rows(
    file: &mut File,
    header: &Header,
    start: u64,
    len: u64,
) -> Result<Vec<f32>, IndexError> {
    let mut bytes = vec![0u8; (len * header.row_bytes()) as usize];
    file.seek(SeekFrom::Start(header.row_offset(start)))?;
    file.read_exact(&mut bytes).map_err(|error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            IndexError::CorruptFormat(format!("vector slab truncated near row {start}"))
        } else {
            IndexError::Io(error)
        }
    })?;
    Ok(header.dtype.decode(&bytes))
}

fn load_identifiers(file: &mut File, header: &Header) -> Result<IdentifierIndex, IndexError> {
    let file_len = file.metadata()?.len();
    if file_len < header.file_len() {
        return Err(IndexError::CorruptFormat(format!(
            "file is {file_len} bytes but the header describes {}",
            header.file_len()
        )));
    }
    file.seek(SeekFrom::Start(header.journal_start()))?;
    journal::replay(&mut *file, header.journal_len, header.count)
}

fn copy_into_resized(
    source: &mut File,
    temp_path: &Path,
    header: &Header,
    vector_bytes: &[u8],
    journal_bytes: &[u8],
    committed: &Header,
) -> Result<(), IndexError> {
    let mut target = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(temp_path)?;
    target.write_all(&committed.encode())?;

    let slab_len = header.row_offset(header.count) - HEADER_LEN;
    source.seek(SeekFrom::Start(HEADER_LEN))?;
    copy_exact(source, &mut target, slab_len, "vector slab")?;
    target.write_all(vector_bytes)?;

    // Extending the file zero-fills the reserved slots.
    target.set_len(committed.journal_start())?;
    target.seek(SeekFrom::Start(committed.journal_start()))?;
    source.seek(SeekFrom::Start(header.journal_start()))?;
    copy_exact(source, &mut target, header.journal_len, "identifier journal")?;
    target.write_all(journal_bytes)?;

    target.sync_all()?;
    Ok(())
}

fn copy_exact(
    source: &mut File,
    target: &mut File,
    len: u64,
    what: &str,
) -> Result<(), IndexError> {
    let copied = io::copy(&mut (&mut *source).take(len), target)?;
    if copied != len {
        return Err(IndexError::CorruptFormat(format!(
            "{what} truncated: expected {len} bytes, copied {copied}"
        )));
    }
    Ok(())
}

fn write_empty_store(path: &Path, header: &Header) -> Result<(), IndexError> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    file.write_all(&header.encode())?;
    file.set_len(header.file_len())?;
    file.sync_all()?;
    Ok(())
}

fn open_existing(path: &Path, writable: bool) -> Result<File, IndexError> {
    OpenOptions::new()
        .read(true)
        .write(writable)
        .open(path)
        .map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                IndexError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                IndexError::Io(error)
            }
        })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent_dir(path: &Path) -> Result<(), IndexError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn sync_parent_dir(path: &Path) -> Result<(), IndexError> {
    // Directories cannot be opened for syncing outside unix.
    if cfg!(not(unix)) {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}
