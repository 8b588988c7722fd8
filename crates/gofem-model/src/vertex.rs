//! Vertex: a point in the mesh geometry.

use serde::{Deserialize, Serialize};

/// A mesh vertex. Read-only geometry input to the Domain; `id` is the
/// vertex tag used by cell connectivity and by node/face boundary
/// conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: i64,
    /// 2 entries for 2D problems, 3 for 3D.
    pub coords: Vec<f64>,
    /// Optional vertex tag used to select node-level boundary conditions.
    pub tag: i32,
}

impl Vertex {
    pub fn new(id: i64, coords: Vec<f64>, tag: i32) -> Self {
        Self { id, coords, tag }
    }

    pub fn ndim(&self) -> usize {
        self.coords.len()
    }
}
