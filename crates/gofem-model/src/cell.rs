//! Cell: mesh topology plus the per-tag element data the stage setup
//! consults when building elements (§4.2 `SetStage`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ModelError, Result};

/// Shape-function family handle. The actual shape-function library
/// (values, gradients, integration points) is an external collaborator;
/// this enum only names which one a cell uses, mirroring the teacher's
/// `ElementType` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Line2,
    Tri3,
    Quad4,
    Quad8,
    Hex8,
    Tet4,
}

impl Shape {
    pub fn nverts(&self) -> usize {
        match self {
            Shape::Line2 => 2,
            Shape::Tri3 => 3,
            Shape::Quad4 => 4,
            Shape::Quad8 => 8,
            Shape::Hex8 => 8,
            Shape::Tet4 => 4,
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            Shape::Line2 => 1,
            Shape::Tri3 | Shape::Quad4 | Shape::Quad8 => 2,
            Shape::Hex8 | Shape::Tet4 => 3,
        }
    }
}

/// A mesh cell: geometry + topology + material tag. Read-only input to
/// the Domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: i64,
    pub shape: Shape,
    /// Material/element-data tag, resolved against `Region::elemsdata`.
    pub tag: i32,
    pub verts: Vec<i64>,
    /// Partition id, for distributed runs (§5). Single-processor runs use 0.
    pub part: u32,
    /// Joint/rjoint marker: joint cells are built after all primary
    /// elements via `ElemConnector::Connect` rather than contributing
    /// their own equations directly.
    pub joint: bool,
}

/// Decoded `extra` keycode string (`!key:value !key:value ...`), e.g.
/// `!useB:true !thick:0.5`. Parsing the literal keycode grammar is the
/// one piece of "parser" logic this crate keeps, since `extra` is itself
/// typed data consumed directly by element constructors, not a mesh file
/// format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extra(pub BTreeMap<String, String>);

impl Extra {
    pub fn parse(s: &str) -> Result<Self> {
        let mut map = BTreeMap::new();
        for tok in s.split_whitespace() {
            let Some(rest) = tok.strip_prefix('!') else {
                return Err(ModelError::MalformedExtra(tok.to_string()));
            };
            let Some((key, value)) = rest.split_once(':') else {
                return Err(ModelError::MalformedExtra(tok.to_string()));
            };
            map.insert(key.to_string(), value.to_string());
        }
        Ok(Extra(map))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

/// Per-cell-tag element data: `{mat, type, extra, nip, nipf}` from §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElemData {
    pub tag: i32,
    pub mat: String,
    pub etype: String,
    #[serde(default)]
    pub extra: String,
    pub nip: usize,
    #[serde(default)]
    pub nipf: usize,
}

impl ElemData {
    pub fn extra(&self) -> Result<Extra> {
        Extra::parse(&self.extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_parses_keycodes() {
        let e = Extra::parse("!useB:true !thick:0.5").unwrap();
        assert_eq!(e.get_bool("useB", false), true);
        assert_eq!(e.get_f64("thick", 1.0), 0.5);
        assert_eq!(e.get("missing"), None);
    }

    #[test]
    fn extra_rejects_malformed_token() {
        assert!(Extra::parse("useB:true").is_err());
        assert!(Extra::parse("!useBtrue").is_err());
    }

    #[test]
    fn shape_nverts_matches_expectation() {
        assert_eq!(Shape::Quad4.nverts(), 4);
        assert_eq!(Shape::Hex8.ndim(), 3);
    }
}
