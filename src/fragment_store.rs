use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bio::io::{fasta, fastq};
use flate2::read::MultiGzDecoder;

/// Errors returned by FragmentStore implementations.
#[derive(thiserror::Error, Debug)]
pub enum FragmentStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fragment {0} not in store")]
    NotFound(u32),
    #[error("record id {0:?} is not a fragment iid")]
    InvalidId(String),
    #[error("malformed sequence file: {0}")]
    Format(String),
}

/// What the vertex preload needs to know about one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentRecord {
    pub iid: u32,
    /// Clear-range length.
    pub length: u32,
    pub deleted: bool,
}

/// Source of fragment metadata and clear-range bases.
pub trait FragmentStore {
    fn records(&self) -> Result<Vec<FragmentRecord>, FragmentStoreError>;
    fn sequence(&self, iid: u32) -> Result<Cow<'_, str>, FragmentStoreError>;
    /// Per-base quality characters, when the store carries them.
    fn quality(&self, iid: u32) -> Result<Option<Cow<'_, str>>, FragmentStoreError>;
}

#[derive(Debug, Clone)]
struct StoredFragment {
    iid: u32,
    sequence: String,
    quality: Option<String>,
    deleted: bool,
}

/// Fragments held in memory, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFragmentStore {
    fragments: Vec<StoredFragment>,
    by_iid: HashMap<u32, usize>,
}

impl InMemoryFragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, iid: u32, sequence: impl Into<String>) {
        self.insert_with_quality(iid, sequence, None);
    }

    pub fn insert_with_quality(
        &mut self,
        iid: u32,
        sequence: impl Into<String>,
        quality: Option<String>,
    ) {
        let stored = StoredFragment {
            iid,
            sequence: sequence.into().to_ascii_uppercase(),
            quality,
            deleted: false,
        };
        match self.by_iid.get(&iid) {
            Some(&slot) => self.fragments[slot] = stored,
            None => {
                self.by_iid.insert(iid, self.fragments.len());
                self.fragments.push(stored);
            }
        }
    }

    pub fn mark_deleted(&mut self, iid: u32) -> Result<(), FragmentStoreError> {
        let slot = self
            .by_iid
            .get(&iid)
            .ok_or(FragmentStoreError::NotFound(iid))?;
        self.fragments[*slot].deleted = true;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn stored(&self, iid: u32) -> Result<&StoredFragment, FragmentStoreError> {
        self.by_iid
            .get(&iid)
            .map(|&slot| &self.fragments[slot])
            .ok_or(FragmentStoreError::NotFound(iid))
    }
}

impl FragmentStore for InMemoryFragmentStore {
    fn records(&self) -> Result<Vec<FragmentRecord>, FragmentStoreError> {
        Ok(self
            .fragments
            .iter()
            .map(|f| FragmentRecord {
                iid: f.iid,
                length: f.sequence.len() as u32,
                deleted: f.deleted,
            })
            .collect())
    }

    fn sequence(&self, iid: u32) -> Result<Cow<'_, str>, FragmentStoreError> {
        Ok(Cow::Borrowed(self.stored(iid)?.sequence.as_str()))
    }

    fn quality(&self, iid: u32) -> Result<Option<Cow<'_, str>>, FragmentStoreError> {
        Ok(self
            .stored(iid)?
            .quality
            .as_deref()
            .map(Cow::Borrowed))
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("bgz"))
        .unwrap_or(false)
}

fn is_fastq(path: &Path) -> bool {
    let stem_ext = |p: &Path| {
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default()
    };
    let mut ext = stem_ext(path);
    if ext == "gz" || ext == "bgz" {
        ext = path
            .file_stem()
            .map(|stem| stem_ext(Path::new(stem)))
            .unwrap_or_default();
    }
    ext == "fastq" || ext == "fq"
}

fn parse_iid(id: &str) -> Result<u32, FragmentStoreError> {
    id.parse::<u32>()
        .map_err(|_| FragmentStoreError::InvalidId(id.to_string()))
}

/// Load a FASTA or FASTQ file (optionally gzipped) whose record ids are
/// fragment iids. A record description containing `deleted` flags the
/// fragment as deleted.
pub fn load_sequence_file<P: AsRef<Path>>(
    path: P,
) -> Result<InMemoryFragmentStore, FragmentStoreError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let reader = BufReader::new(reader);

    let mut store = InMemoryFragmentStore::new();
    let mut deleted = Vec::new();
    if is_fastq(path) {
        for result in fastq::Reader::new(reader).records() {
            let record = result.map_err(|e| FragmentStoreError::Format(e.to_string()))?;
            let iid = parse_iid(record.id())?;
            let sequence = String::from_utf8_lossy(record.seq()).into_owned();
            let quality = String::from_utf8_lossy(record.qual()).into_owned();
            store.insert_with_quality(iid, sequence, Some(quality));
            if record.desc().is_some_and(|d| d.contains("deleted")) {
                deleted.push(iid);
            }
        }
    } else {
        for result in fasta::Reader::new(reader).records() {
            let record = result.map_err(|e| FragmentStoreError::Format(e.to_string()))?;
            let iid = parse_iid(record.id())?;
            let sequence = String::from_utf8_lossy(record.seq()).into_owned();
            store.insert(iid, sequence);
            if record.desc().is_some_and(|d| d.contains("deleted")) {
                deleted.push(iid);
            }
        }
    }
    for iid in deleted {
        store.mark_deleted(iid)?;
    }
    log::info!("Read {} fragments from {}", store.len(), path.display());
    Ok(store)
}
