//! Checkpoint file layout (§4.11, §6 "Persisted state layout").
//!
//! Two files per `(time-output-index, processor)` plus one summary file
//! per run:
//! - `<key>_p<p>_nod_<tidx>.<enc>`: `Sol.T, Sol.Y, Sol.Dydt, Sol.D2ydt2`.
//! - `<key>_p<p>_ele_<tidx>.<enc>`: `cids`, then each element's opaque
//!   `Encode()` payload in cell-id order.
//! - `<key>_p0_sum.<enc>`: output times, residual trace, processor count.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::encoding::{
    read_f64, read_f64_vec, read_i64_vec, write_f64, write_f64_vec, write_i64_vec, Encoder,
};
use crate::error::{IoError, Result};

fn ext(encoder: Encoder) -> &'static str {
    match encoder {
        Encoder::Binary => "bin",
        Encoder::Json => "json",
    }
}

fn node_path(dirout: &Path, key: &str, proc: u32, tidx: usize, encoder: Encoder) -> PathBuf {
    dirout.join(format!("{key}_p{proc}_nod_{tidx}.{}", ext(encoder)))
}

fn elem_path(dirout: &Path, key: &str, proc: u32, tidx: usize, encoder: Encoder) -> PathBuf {
    dirout.join(format!("{key}_p{proc}_ele_{tidx}.{}", ext(encoder)))
}

fn summary_path(dirout: &Path, key: &str, encoder: Encoder) -> PathBuf {
    dirout.join(format!("{key}_p0_sum.{}", ext(encoder)))
}

/// The four solution vectors written per time-output-index (§3, `Solution`).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeCheckpoint {
    pub t: f64,
    pub y: Vec<f64>,
    pub dydt: Vec<f64>,
    pub d2ydt2: Vec<f64>,
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn save_node_checkpoint(
    dirout: &Path,
    key: &str,
    proc: u32,
    tidx: usize,
    encoder: Encoder,
    sol: &NodeCheckpoint,
) -> Result<()> {
    let path = node_path(dirout, key, proc, tidx, encoder);
    ensure_parent(&path)?;
    let mut buf = Vec::new();
    write_f64(&mut buf, encoder, sol.t)?;
    write_f64_vec(&mut buf, encoder, &sol.y)?;
    write_f64_vec(&mut buf, encoder, &sol.dydt)?;
    write_f64_vec(&mut buf, encoder, &sol.d2ydt2)?;
    fs::write(&path, buf)?;
    Ok(())
}

pub fn load_node_checkpoint(
    dirout: &Path,
    key: &str,
    proc: u32,
    tidx: usize,
    encoder: Encoder,
) -> Result<NodeCheckpoint> {
    let path = node_path(dirout, key, proc, tidx, encoder);
    let bytes = fs::read(&path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            IoError::FileNotFound(path.display().to_string())
        } else {
            IoError::Io(e)
        }
    })?;
    let mut cur = io::Cursor::new(bytes);
    let t = read_f64(&mut cur, encoder)?;
    let y = read_f64_vec(&mut cur, encoder)?;
    let dydt = read_f64_vec(&mut cur, encoder)?;
    let d2ydt2 = read_f64_vec(&mut cur, encoder)?;
    Ok(NodeCheckpoint {
        t,
        y,
        dydt,
        d2ydt2,
    })
}

/// One element's `Encode()` payload, paired with its owning cell id so
/// decode order can be verified against the file's `cids` list.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementPayload {
    pub cid: i64,
    pub bytes: Vec<u8>,
}

pub fn save_element_checkpoint(
    dirout: &Path,
    key: &str,
    proc: u32,
    tidx: usize,
    encoder: Encoder,
    payloads: &[ElementPayload],
) -> Result<()> {
    let path = elem_path(dirout, key, proc, tidx, encoder);
    ensure_parent(&path)?;
    let mut buf = Vec::new();
    let cids: Vec<i64> = payloads.iter().map(|p| p.cid).collect();
    write_i64_vec(&mut buf, encoder, &cids)?;
    for p in payloads {
        crate::encoding::write_bytes(&mut buf, &p.bytes)?;
    }
    fs::write(&path, buf)?;
    Ok(())
}

/// Decode element payloads in cell-id order (§4.11, "elements are decoded
/// in the order their cell-ids appear in the file").
pub fn load_element_checkpoint(
    dirout: &Path,
    key: &str,
    proc: u32,
    tidx: usize,
    encoder: Encoder,
) -> Result<Vec<ElementPayload>> {
    let path = elem_path(dirout, key, proc, tidx, encoder);
    let bytes = fs::read(&path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            IoError::FileNotFound(path.display().to_string())
        } else {
            IoError::Io(e)
        }
    })?;
    let mut cur = io::Cursor::new(bytes);
    let cids = read_i64_vec(&mut cur, encoder)?;
    let mut payloads = Vec::with_capacity(cids.len());
    for cid in cids {
        let bytes = crate::encoding::read_bytes(&mut cur)?;
        payloads.push(ElementPayload { cid, bytes });
    }
    Ok(payloads)
}

/// Run-level summary (§6, "Summary file").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub dirout: String,
    pub fnkey: String,
    pub nproc: u32,
    pub out_times: Vec<f64>,
    pub resid_vals: Vec<f64>,
    pub resid_ptrs: Vec<usize>,
}

/// Summary files are always JSON regardless of the node/element encoder
/// choice: they are small, human-inspectable run metadata, not hot-path
/// solution data. This mirrors `ccx-io::restart`'s use of `serde_json`
/// for its single checkpoint type.
pub fn save_summary(dirout: &Path, key: &str, summary: &Summary) -> Result<()> {
    let path = summary_path(dirout, key, Encoder::Json);
    ensure_parent(&path)?;
    let bytes = serde_json::to_vec_pretty(summary)?;
    fs::write(&path, bytes)?;
    Ok(())
}

pub fn load_summary(dirout: &Path, key: &str) -> Result<Summary> {
    let path = summary_path(dirout, key, Encoder::Json);
    let bytes = fs::read(&path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            IoError::FileNotFound(path.display().to_string())
        } else {
            IoError::Io(e)
        }
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be valid")
            .as_nanos();
        std::env::temp_dir().join(format!("{prefix}_{pid}_{nanos}"))
    }

    #[test]
    fn node_checkpoint_roundtrips_binary() {
        let dir = unique_temp_dir("gofem_node_bin");
        let sol = NodeCheckpoint {
            t: 1.25,
            y: vec![0.1, -2.3, 9.9],
            dydt: vec![0.0, 0.0, 0.0],
            d2ydt2: vec![0.0, 0.0, 0.0],
        };
        save_node_checkpoint(&dir, "job", 0, 3, Encoder::Binary, &sol).unwrap();
        let back = load_node_checkpoint(&dir, "job", 0, 3, Encoder::Binary).unwrap();
        assert_eq!(back, sol);
    }

    #[test]
    fn node_checkpoint_roundtrips_json() {
        let dir = unique_temp_dir("gofem_node_json");
        let sol = NodeCheckpoint {
            t: 1.25,
            y: vec![0.1, -2.3, 9.9],
            dydt: vec![0.0; 3],
            d2ydt2: vec![0.0; 3],
        };
        save_node_checkpoint(&dir, "job", 0, 3, Encoder::Json, &sol).unwrap();
        let back = load_node_checkpoint(&dir, "job", 0, 3, Encoder::Json).unwrap();
        assert_eq!(back, sol);
    }

    #[test]
    fn element_checkpoint_preserves_cid_order() {
        let dir = unique_temp_dir("gofem_elem");
        let payloads = vec![
            ElementPayload {
                cid: 7,
                bytes: vec![1, 2, 3],
            },
            ElementPayload {
                cid: 2,
                bytes: vec![9],
            },
        ];
        save_element_checkpoint(&dir, "job", 0, 1, Encoder::Binary, &payloads).unwrap();
        let back = load_element_checkpoint(&dir, "job", 0, 1, Encoder::Binary).unwrap();
        assert_eq!(back, payloads);
    }

    #[test]
    fn load_missing_node_checkpoint_fails() {
        let dir = unique_temp_dir("gofem_missing");
        let err = load_node_checkpoint(&dir, "job", 0, 0, Encoder::Binary).unwrap_err();
        assert!(matches!(err, IoError::FileNotFound(_)));
    }

    #[test]
    fn summary_roundtrips() {
        let dir = unique_temp_dir("gofem_summary");
        let summary = Summary {
            dirout: dir.display().to_string(),
            fnkey: "job".to_string(),
            nproc: 1,
            out_times: vec![0.0, 1.0, 2.0],
            resid_vals: vec![1e-3, 1e-6],
            resid_ptrs: vec![0, 1, 2],
        };
        save_summary(&dir, "job", &summary).unwrap();
        let back = load_summary(&dir, "job").unwrap();
        assert_eq!(back, summary);
    }
}
