//! Node / Dof (§3): the per-vertex DOF table mapping key → global
//! equation index, and the closed DOF-key vocabulary.

use std::collections::BTreeMap;

use gofem_model::Vertex;

/// Closed vocabulary of DOF keys (§3, "Node"). New element kinds
/// contribute new keys additively; a vertex shared by several elements
/// still owns exactly one `Node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DofKey {
    Ux,
    Uy,
    Uz,
    Rx,
    Ry,
    Rz,
    Pl,
    Fl,
    H,
    Qb,
    Am,
}

impl DofKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DofKey::Ux => "ux",
            DofKey::Uy => "uy",
            DofKey::Uz => "uz",
            DofKey::Rx => "rx",
            DofKey::Ry => "ry",
            DofKey::Rz => "rz",
            DofKey::Pl => "pl",
            DofKey::Fl => "fl",
            DofKey::H => "h",
            DofKey::Qb => "qb",
            DofKey::Am => "am",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "ux" => DofKey::Ux,
            "uy" => DofKey::Uy,
            "uz" => DofKey::Uz,
            "rx" => DofKey::Rx,
            "ry" => DofKey::Ry,
            "rz" => DofKey::Rz,
            "pl" => DofKey::Pl,
            "fl" => DofKey::Fl,
            "h" => DofKey::H,
            "qb" => DofKey::Qb,
            "am" => DofKey::Am,
            _ => return None,
        })
    }

    /// Time-derivative order (§3, `Dof2Tnum`): 1 for first-order-in-time
    /// (e.g. `pl`), 2 for second-order-in-time (e.g. `ux`). Dual/auxiliary
    /// keys (`fl`, `qb`) and non-time-dependent keys carry no order.
    pub fn tnum(&self) -> Option<u8> {
        match self {
            DofKey::Ux | DofKey::Uy | DofKey::Uz | DofKey::Rx | DofKey::Ry | DofKey::Rz => Some(2),
            DofKey::Pl | DofKey::H => Some(1),
            DofKey::Fl | DofKey::Qb | DofKey::Am => None,
        }
    }
}

/// Active-in-stage wrapper around a `Vertex` (§3, "Node"). Holds an
/// ordered list of (key, global-equation-index) pairs.
#[derive(Debug, Clone)]
pub struct Node {
    pub vertex_id: i64,
    /// Ordered so that DOF iteration order is deterministic (insertion
    /// order, which is cell-traversal order during `SetStage`).
    dofs: Vec<(DofKey, usize)>,
}

impl Node {
    pub fn new(vertex_id: i64) -> Self {
        Self {
            vertex_id,
            dofs: Vec::new(),
        }
    }

    pub fn from_vertex(v: &Vertex) -> Self {
        Self::new(v.id)
    }

    /// Equation index for `key`, if this node already owns that DOF.
    pub fn eq_of(&self, key: DofKey) -> Option<usize> {
        self.dofs.iter().find(|(k, _)| *k == key).map(|(_, e)| e)
    }

    pub fn has_dof(&self, key: DofKey) -> bool {
        self.eq_of(key).is_some()
    }

    /// Insert `(key, eq)` if `key` is not already present; additive,
    /// never duplicates (§3, "new element types contribute new DOF
    /// keys additively without duplication").
    pub fn ensure_dof(&mut self, key: DofKey, eq: usize) -> usize {
        if let Some(existing) = self.eq_of(key) {
            return existing;
        }
        self.dofs.push((key, eq));
        eq
    }

    pub fn dofs(&self) -> &[(DofKey, usize)] {
        &self.dofs
    }

    pub fn ndof(&self) -> usize {
        self.dofs.len()
    }
}

/// Global mapping DOF-key → time-derivative order, and the derived
/// `T1eqs`/`T2eqs` equation subsets (§3, `Dof2Tnum`).
#[derive(Debug, Clone, Default)]
pub struct Dof2Tnum {
    /// Equation indices that are first-order-in-time.
    pub t1eqs: Vec<usize>,
    /// Equation indices that are second-order-in-time.
    pub t2eqs: Vec<usize>,
}

impl Dof2Tnum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: DofKey, eq: usize) {
        match key.tnum() {
            Some(1) => self.t1eqs.push(eq),
            Some(2) => self.t2eqs.push(eq),
            _ => {}
        }
    }
}

/// Reverse index `vertex id -> Node`, as owned by the Domain (§3,
/// `Vid2node`). A `BTreeMap` keeps iteration deterministic.
pub type Vid2Node = BTreeMap<i64, Node>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dof_key_roundtrips_through_its_string_form() {
        for key in [DofKey::Ux, DofKey::Pl, DofKey::Fl, DofKey::Qb, DofKey::Am] {
            assert_eq!(DofKey::parse(key.as_str()), Some(key));
        }
    }

    #[test]
    fn ensure_dof_is_additive_not_duplicating() {
        let mut node = Node::new(1);
        let e1 = node.ensure_dof(DofKey::Ux, 5);
        let e2 = node.ensure_dof(DofKey::Ux, 99); // must not overwrite
        assert_eq!(e1, 5);
        assert_eq!(e2, 5);
        assert_eq!(node.ndof(), 1);

        node.ensure_dof(DofKey::Pl, 6);
        assert_eq!(node.ndof(), 2);
    }

    #[test]
    fn dof2tnum_splits_first_and_second_order() {
        let mut map = Dof2Tnum::new();
        map.register(DofKey::Ux, 0);
        map.register(DofKey::Pl, 1);
        map.register(DofKey::Fl, 2); // no tnum, ignored
        assert_eq!(map.t2eqs, vec![0]);
        assert_eq!(map.t1eqs, vec![1]);
    }
}
