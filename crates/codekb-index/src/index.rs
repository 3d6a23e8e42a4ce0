//! Flat L2 vector index.
//!
//! Exhaustive nearest-neighbour search over squared Euclidean distance.
//! Every vector carries the id of the snippet it was built from, so a hit
//! can be joined back to metadata without relying on position alone.
//!
//! File layout (little-endian):
//!
//! ```text
//! magic    "CKBI"
//! version  u16
//! dim      u32
//! count    u64
//! model    u32 length + UTF-8 bytes
//! entries  count x (u32 length + UTF-8 id, dim x f32)
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"CKBI";
const VERSION: u16 = 1;
const MAX_STRING_LEN: u32 = 1 << 16;
/// Largest vector dimension an index file may declare.
pub const MAX_DIMENSION: usize = 1 << 16;

/// Errors from the vector index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt index file: {0}")]
    Corrupt(String),
    #[error("Dimension mismatch: index has {expected}, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// A single nearest-neighbour result.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Position of the vector in build order.
    pub position: usize,
    /// Snippet id stored with the vector.
    pub id: String,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

/// In-memory flat index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    model_id: String,
    ids: Vec<String>,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize, model_id: impl Into<String>) -> Self {
        Self {
            dimension,
            model_id: model_id.into(),
            ids: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Append a vector. Its position is the current length.
    pub fn add(&mut self, id: impl Into<String>, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.ids.push(id.into());
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Return up to `k` nearest vectors, closest first.
    ///
    /// Equal distances are ordered by position so results are stable.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| (position, squared_l2(query, vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| Hit {
                position,
                id: self.ids[position].clone(),
                distance,
            })
            .collect())
    }

    /// Write the index to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        tracing::debug!("Wrote {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    /// Read an index from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;
        w.write_all(&(self.dimension as u32).to_le_bytes())?;
        w.write_all(&(self.len() as u64).to_le_bytes())?;
        write_string(w, &self.model_id)?;
        for (id, vector) in self.ids.iter().zip(self.data.chunks_exact(self.dimension.max(1))) {
            write_string(w, id)?;
            for value in vector {
                w.write_all(&value.to_le_bytes())?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_exact(r, &mut magic)?;
        if &magic != MAGIC {
            return Err(IndexError::Corrupt("bad magic".to_string()));
        }
        let version = u16::from_le_bytes(read_array(r)?);
        if version != VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported version {}",
                version
            )));
        }
        let dimension = u32::from_le_bytes(read_array(r)?) as usize;
        let count = u64::from_le_bytes(read_array(r)?) as usize;
        if dimension == 0 && count > 0 {
            return Err(IndexError::Corrupt("zero dimension".to_string()));
        }
        if dimension > MAX_DIMENSION {
            return Err(IndexError::Corrupt(format!("dimension {}", dimension)));
        }
        let model_id = read_string(r)?;

        let mut index = Self::new(dimension, model_id);
        let mut vector = vec![0.0f32; dimension];
        for _ in 0..count {
            let id = read_string(r)?;
            for value in vector.iter_mut() {
                *value = f32::from_le_bytes(read_array(r)?);
            }
            index.add(id, &vector)?;
        }

        let mut trailing = [0u8; 1];
        if r.read(&mut trailing)? != 0 {
            return Err(IndexError::Corrupt("trailing bytes".to_string()));
        }
        Ok(index)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => IndexError::Corrupt("truncated file".to_string()),
        _ => IndexError::Io(e),
    })
}

fn read_array<R: Read, const N: usize>(r: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    read_exact(r, &mut buf)?;
    Ok(buf)
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    w.write_all(&(s.len() as u32).to_le_bytes())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let len = u32::from_le_bytes(read_array(r)?);
    if len > MAX_STRING_LEN {
        return Err(IndexError::Corrupt(format!("string length {}", len)));
    }
    let mut buf = vec![0u8; len as usize];
    read_exact(r, &mut buf)?;
    String::from_utf8(buf).map_err(|_| IndexError::Corrupt("invalid UTF-8".to_string()))
}
