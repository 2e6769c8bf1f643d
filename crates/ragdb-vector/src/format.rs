//! On-disk shard artifacts.
//!
//! Each document key owns two files in the shard directory:
//!
//! - `{key}.shard`: little-endian vector data
//!   `"RGSH" | version u16 | metric u8 | reserved u8 | dim u32 | rows u64 | rows*dim f32 | blake3 [32]`,
//!   the trailing hash covering every byte before it.
//! - `{key}.shard.ids`: JSON array of chunk ids, one per vector row.
//!
//! Both are written through a temp file in the same directory, fsynced and
//! renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use ragdb_core::error::{Error, Result};
use ragdb_core::types::{ChunkId, Metric};

pub const MAGIC: &[u8; 4] = b"RGSH";
pub const VERSION: u16 = 1;
pub const VECTOR_EXT: &str = "shard";
pub const IDS_SUFFIX: &str = ".shard.ids";

const HEADER_LEN: usize = 4 + 2 + 1 + 1 + 4 + 8;
const CHECKSUM_LEN: usize = 32;

/// Decoded vector artifact: `rows` vectors of `dim` floats, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardData {
    pub metric: Metric,
    pub dim: usize,
    pub rows: usize,
    pub vectors: Vec<f32>,
}

impl ShardData {
    pub fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dim..(i + 1) * self.dim]
    }
}

pub fn vector_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.{VECTOR_EXT}"))
}

pub fn ids_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}{IDS_SUFFIX}"))
}

/// True when both artifacts for `key` are present.
pub fn artifacts_exist(dir: &Path, key: &str) -> bool {
    vector_path(dir, key).is_file() && ids_path(dir, key).is_file()
}

pub fn encode(data: &ShardData) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + data.vectors.len() * 4 + CHECKSUM_LEN);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.push(data.metric.tag());
    buf.push(0);
    buf.extend_from_slice(&(data.dim as u32).to_le_bytes());
    buf.extend_from_slice(&(data.rows as u64).to_le_bytes());
    for x in &data.vectors {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    let checksum = blake3::hash(&buf);
    buf.extend_from_slice(checksum.as_bytes());
    buf
}

pub fn decode(bytes: &[u8]) -> Result<ShardData> {
    let invalid = |reason: &str| Error::InvalidShard(reason.to_string());
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(invalid("truncated header"));
    }
    if &bytes[0..4] != MAGIC {
        return Err(invalid("bad magic"));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(Error::InvalidShard(format!("unsupported version {version}")));
    }
    let metric = Metric::from_tag(bytes[6]).ok_or_else(|| Error::InvalidShard(format!("unknown metric tag {}", bytes[6])))?;
    let dim = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let mut rows_raw = [0u8; 8];
    rows_raw.copy_from_slice(&bytes[12..20]);
    let rows = usize::try_from(u64::from_le_bytes(rows_raw)).map_err(|_| invalid("row count overflows"))?;

    let body_len = rows
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| invalid("vector payload size overflows"))?;
    let expected = HEADER_LEN + body_len + CHECKSUM_LEN;
    if bytes.len() != expected {
        return Err(Error::InvalidShard(format!("expected {expected} bytes, found {}", bytes.len())));
    }
    let (payload, checksum) = bytes.split_at(expected - CHECKSUM_LEN);
    if blake3::hash(payload).as_bytes() != checksum {
        return Err(invalid("checksum mismatch"));
    }
    let vectors = payload[HEADER_LEN..]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(ShardData { metric, dim, rows, vectors })
}

pub fn read_vectors(path: &Path) -> Result<ShardData> {
    decode(&fs::read(path)?)
}

pub fn read_ids(path: &Path) -> Result<Vec<ChunkId>> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| Error::InvalidShard(format!("{}: {e}", path.display())))
}

/// Persist both artifacts for `key`. The id list is written only after the
/// vector file is in place; on any failure neither file is left behind.
///
/// An id list from an earlier build is removed first, so a crash between the
/// two writes leaves a degraded shard rather than new vectors under old ids.
pub fn write_shard(dir: &Path, key: &str, data: &ShardData, ids: &[ChunkId]) -> Result<()> {
    fs::create_dir_all(dir)?;
    let vectors = vector_path(dir, key);
    let id_file = ids_path(dir, key);
    let result = remove_stale(&id_file)
        .and_then(|()| write_atomic(dir, &vectors, &encode(data)))
        .and_then(|()| {
            let json = serde_json::to_vec(ids).map_err(|e| Error::Operation(e.to_string()))?;
            write_atomic(dir, &id_file, &json)
        });
    match &result {
        Ok(()) => debug!(key, rows = data.rows, dim = data.dim, "wrote shard artifacts"),
        Err(e) => {
            warn!(key, error = %e, "shard write failed, removing artifacts");
            let _ = fs::remove_file(&vectors);
            let _ = fs::remove_file(&id_file);
        }
    }
    result
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ShardData {
        ShardData { metric: Metric::L2, dim: 2, rows: 2, vectors: vec![1.0, 2.0, 3.0, 4.0] }
    }

    #[test]
    fn decode_reads_what_encode_writes() {
        let data = sample();
        let decoded = decode(&encode(&data)).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(decoded.row(1), &[3.0, 4.0]);
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut bytes = encode(&sample());
        bytes[HEADER_LEN] ^= 0xff;
        assert!(matches!(decode(&bytes), Err(Error::InvalidShard(m)) if m.contains("checksum")));
    }

    #[test]
    fn truncated_and_foreign_files_are_rejected() {
        let bytes = encode(&sample());
        assert!(decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(decode(&bytes[..10]).is_err());
        let mut foreign = bytes.clone();
        foreign[0] = b'X';
        assert!(matches!(decode(&foreign), Err(Error::InvalidShard(m)) if m == "bad magic"));
    }

    #[test]
    fn write_shard_leaves_both_files() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), "K", &sample(), &["a".into(), "b".into()]).unwrap();
        assert!(artifacts_exist(dir.path(), "K"));
        assert_eq!(read_ids(&ids_path(dir.path(), "K")).unwrap(), vec!["a", "b"]);
        assert_eq!(read_vectors(&vector_path(dir.path(), "K")).unwrap(), sample());
    }
}
