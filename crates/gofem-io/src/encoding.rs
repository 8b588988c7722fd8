//! Length-prefixed framing for the two checkpoint encoders (§4.11,
//! "encoded in the chosen format (length-prefixed binary or JSON)").
//!
//! Both encoders write a sequence of independently-length-prefixed frames
//! to the same stream, so node/element files can be read back value by
//! value without knowing the whole file's length up front. The binary
//! encoder stores `f64`/`i64` natively (little-endian); the JSON encoder
//! stores one `serde_json` value per frame. Element internal-variable
//! payloads (opaque `Vec<u8>` produced by `Element::Encode`) are always
//! framed the same way regardless of the selected encoder, since their
//! internal schema is the element's own business (§4.3).

use std::io::{self, Read, Write};

pub use gofem_model::config::Encoder;

use crate::error::{IoError, Result};

fn write_len(w: &mut impl Write, len: u64) -> io::Result<()> {
    w.write_all(&len.to_le_bytes())
}

fn read_len(r: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Write one opaque byte payload, length-prefixed. Used for element
/// `Encode()` output and, as a building block, by the scalar helpers
/// below.
pub fn write_bytes(w: &mut impl Write, bytes: &[u8]) -> Result<()> {
    write_len(w, bytes.len() as u64)?;
    w.write_all(bytes)?;
    Ok(())
}

pub fn read_bytes(r: &mut impl Read) -> Result<Vec<u8>> {
    let len = read_len(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn write_f64(w: &mut impl Write, encoder: Encoder, x: f64) -> Result<()> {
    match encoder {
        Encoder::Binary => write_bytes(w, &x.to_le_bytes()),
        Encoder::Json => write_bytes(w, &serde_json::to_vec(&x)?),
    }
}

pub fn read_f64(r: &mut impl Read, encoder: Encoder) -> Result<f64> {
    let bytes = read_bytes(r)?;
    match encoder {
        Encoder::Binary => {
            let arr: [u8; 8] = bytes
                .try_into()
                .map_err(|_| IoError::SchemaError("f64 frame was not 8 bytes".to_string()))?;
            Ok(f64::from_le_bytes(arr))
        }
        Encoder::Json => Ok(serde_json::from_slice(&bytes)?),
    }
}

pub fn write_f64_vec(w: &mut impl Write, encoder: Encoder, v: &[f64]) -> Result<()> {
    match encoder {
        Encoder::Binary => {
            let mut bytes = Vec::with_capacity(v.len() * 8);
            for x in v {
                bytes.extend_from_slice(&x.to_le_bytes());
            }
            write_bytes(w, &bytes)
        }
        Encoder::Json => write_bytes(w, &serde_json::to_vec(v)?),
    }
}

pub fn read_f64_vec(r: &mut impl Read, encoder: Encoder) -> Result<Vec<f64>> {
    let bytes = read_bytes(r)?;
    match encoder {
        Encoder::Binary => {
            if bytes.len() % 8 != 0 {
                return Err(IoError::SchemaError(
                    "f64 vector frame length not a multiple of 8".to_string(),
                ));
            }
            Ok(bytes
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
                .collect())
        }
        Encoder::Json => Ok(serde_json::from_slice(&bytes)?),
    }
}

pub fn write_i64_vec(w: &mut impl Write, encoder: Encoder, v: &[i64]) -> Result<()> {
    match encoder {
        Encoder::Binary => {
            let mut bytes = Vec::with_capacity(v.len() * 8);
            for x in v {
                bytes.extend_from_slice(&x.to_le_bytes());
            }
            write_bytes(w, &bytes)
        }
        Encoder::Json => write_bytes(w, &serde_json::to_vec(v)?),
    }
}

pub fn read_i64_vec(r: &mut impl Read, encoder: Encoder) -> Result<Vec<i64>> {
    let bytes = read_bytes(r)?;
    match encoder {
        Encoder::Binary => {
            if bytes.len() % 8 != 0 {
                return Err(IoError::SchemaError(
                    "i64 vector frame length not a multiple of 8".to_string(),
                ));
            }
            Ok(bytes
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                .collect())
        }
        Encoder::Json => Ok(serde_json::from_slice(&bytes)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn f64_vec_roundtrips_binary() {
        let mut buf = Vec::new();
        let v = vec![1.0, -2.5, 3.0];
        write_f64_vec(&mut buf, Encoder::Binary, &v).unwrap();
        let mut cur = Cursor::new(buf);
        let back = read_f64_vec(&mut cur, Encoder::Binary).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn f64_vec_roundtrips_json() {
        let mut buf = Vec::new();
        let v = vec![1.0, -2.5, 3.0];
        write_f64_vec(&mut buf, Encoder::Json, &v).unwrap();
        let mut cur = Cursor::new(buf);
        let back = read_f64_vec(&mut cur, Encoder::Json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn sequential_frames_are_independent() {
        let mut buf = Vec::new();
        write_f64(&mut buf, Encoder::Binary, 1.5).unwrap();
        write_f64_vec(&mut buf, Encoder::Binary, &[1.0, 2.0]).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(read_f64(&mut cur, Encoder::Binary).unwrap(), 1.5);
        assert_eq!(
            read_f64_vec(&mut cur, Encoder::Binary).unwrap(),
            vec![1.0, 2.0]
        );
    }
}
