//! Mesh: the read-only vertex/cell container (§3, "Vertex / Cell").

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::vertex::Vertex;

/// Geometry and topology input to a simulation. Vertices and cells are
/// keyed by their mesh-assigned ids (not necessarily dense or
/// zero-based); `BTreeMap` keeps cell-id traversal deterministic, which
/// the Domain's stage setup relies on (§5, "Ordering guarantees").
///
/// `Serialize`/`Deserialize` let a caller hand the CLI a plain JSON
/// dump of vertices and cells; the actual mesh-file grammar (whatever
/// a real deployment's preprocessor emits) stays an external concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub verts: BTreeMap<i64, Vertex>,
    pub cells: BTreeMap<i64, Cell>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, v: Vertex) {
        self.verts.insert(v.id, v);
    }

    pub fn add_cell(&mut self, c: Cell) {
        self.cells.insert(c.id, c);
    }

    pub fn vertex(&self, id: i64) -> Option<&Vertex> {
        self.verts.get(&id)
    }

    pub fn cell(&self, id: i64) -> Option<&Cell> {
        self.cells.get(&id)
    }

    /// Cells in deterministic cell-id order, as consulted by `SetStage`.
    pub fn cells_in_order(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            nverts: self.verts.len(),
            ncells: self.cells.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshStats {
    pub nverts: usize,
    pub ncells: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Shape;

    #[test]
    fn cells_in_order_is_sorted_by_id() {
        let mut mesh = Mesh::new();
        mesh.add_cell(Cell {
            id: 5,
            shape: Shape::Quad4,
            tag: 1,
            verts: vec![1, 2, 3, 4],
            part: 0,
            joint: false,
        });
        mesh.add_cell(Cell {
            id: 1,
            shape: Shape::Quad4,
            tag: 1,
            verts: vec![1, 2, 3, 4],
            part: 0,
            joint: false,
        });
        let ids: Vec<i64> = mesh.cells_in_order().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 5]);
    }
}
