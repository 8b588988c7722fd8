//! Reference shape-function kit (§1, "shape-function libraries ...
//! values, gradients, integration points, face mappings ... are external
//! collaborators"). Like the linear-algebra backend, this repository
//! owns the trait boundary (`ShapeKit`) plus one concrete
//! implementation sufficient to exercise `ElemU`/`ElemP`/`ElemUP`
//! end-to-end; a production deployment swaps in a fuller library (higher
//! order elements, face mappings for every cell basis) behind the same
//! trait. Isoparametric formulas below follow the teacher's `C3D8`
//! (`elements/solid.rs`) generalized to the other bases this engine's
//! two representative elements need.

use gofem_model::Shape;

/// One Gauss-style quadrature point: natural coordinates and weight
/// (§3, glossary "Integration point").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegPoint {
    pub xi: [f64; 3],
    pub weight: f64,
}

/// Shape-function values `S[m]` and natural-coordinate derivatives
/// `dN/dxi[i][m]` at one integration point, for a cell with `nverts`
/// vertices in `ndim` natural dimensions.
#[derive(Debug, Clone)]
pub struct ShapeEval {
    pub n: Vec<f64>,
    /// `dn[i][m]` = dN_m/dxi_i.
    pub dn: Vec<Vec<f64>>,
}

fn line2_n(xi: f64) -> Vec<f64> {
    vec![(1.0 - xi) / 2.0, (1.0 + xi) / 2.0]
}

fn line2_dn(_xi: f64) -> Vec<Vec<f64>> {
    vec![vec![-0.5, 0.5]]
}

fn tri3_n(xi: f64, eta: f64) -> Vec<f64> {
    vec![1.0 - xi - eta, xi, eta]
}

fn tri3_dn(_xi: f64, _eta: f64) -> Vec<Vec<f64>> {
    vec![vec![-1.0, 1.0, 0.0], vec![-1.0, 0.0, 1.0]]
}

fn quad4_n(xi: f64, eta: f64) -> Vec<f64> {
    vec![
        (1.0 - xi) * (1.0 - eta) / 4.0,
        (1.0 + xi) * (1.0 - eta) / 4.0,
        (1.0 + xi) * (1.0 + eta) / 4.0,
        (1.0 - xi) * (1.0 + eta) / 4.0,
    ]
}

fn quad4_dn(xi: f64, eta: f64) -> Vec<Vec<f64>> {
    vec![
        vec![
            -(1.0 - eta) / 4.0,
            (1.0 - eta) / 4.0,
            (1.0 + eta) / 4.0,
            -(1.0 + eta) / 4.0,
        ],
        vec![
            -(1.0 - xi) / 4.0,
            -(1.0 + xi) / 4.0,
            (1.0 + xi) / 4.0,
            (1.0 - xi) / 4.0,
        ],
    ]
}

/// Serendipity 8-node quad; used by `ElemUP`'s pressure field as the
/// "basic shape" is `Quad4` and the full shape is `Quad8` (§4.6, LBB
/// stabilisation).
fn quad8_n(xi: f64, eta: f64) -> Vec<f64> {
    let mut n = vec![0.0; 8];
    n[0] = (1.0 - xi) * (1.0 - eta) * (-xi - eta - 1.0) / 4.0;
    n[1] = (1.0 + xi) * (1.0 - eta) * (xi - eta - 1.0) / 4.0;
    n[2] = (1.0 + xi) * (1.0 + eta) * (xi + eta - 1.0) / 4.0;
    n[3] = (1.0 - xi) * (1.0 + eta) * (-xi + eta - 1.0) / 4.0;
    n[4] = (1.0 - xi * xi) * (1.0 - eta) / 2.0;
    n[5] = (1.0 + xi) * (1.0 - eta * eta) / 2.0;
    n[6] = (1.0 - xi * xi) * (1.0 + eta) / 2.0;
    n[7] = (1.0 - xi) * (1.0 - eta * eta) / 2.0;
    n
}

fn quad8_dn(xi: f64, eta: f64) -> Vec<Vec<f64>> {
    let mut dxi = vec![0.0; 8];
    let mut deta = vec![0.0; 8];
    dxi[0] = -(1.0 - eta) * (-2.0 * xi - eta) / 4.0;
    dxi[1] = (1.0 - eta) * (2.0 * xi - eta) / 4.0;
    dxi[2] = (1.0 + eta) * (2.0 * xi + eta) / 4.0;
    dxi[3] = -(1.0 + eta) * (-2.0 * xi + eta) / 4.0;
    dxi[4] = -xi * (1.0 - eta);
    dxi[5] = (1.0 - eta * eta) / 2.0;
    dxi[6] = -xi * (1.0 + eta);
    dxi[7] = -(1.0 - eta * eta) / 2.0;

    deta[0] = -(1.0 - xi) * (-xi - 2.0 * eta) / 4.0;
    deta[1] = -(1.0 + xi) * (xi - 2.0 * eta) / 4.0;
    deta[2] = (1.0 + xi) * (xi + 2.0 * eta) / 4.0;
    deta[3] = (1.0 - xi) * (-xi + 2.0 * eta) / 4.0;
    deta[4] = -(1.0 - xi * xi) / 2.0;
    deta[5] = -(1.0 + xi) * eta;
    deta[6] = (1.0 - xi * xi) / 2.0;
    deta[7] = -(1.0 - xi) * eta;

    vec![dxi, deta]
}

fn tet4_n(xi: f64, eta: f64, zeta: f64) -> Vec<f64> {
    vec![1.0 - xi - eta - zeta, xi, eta, zeta]
}

fn tet4_dn(_xi: f64, _eta: f64, _zeta: f64) -> Vec<Vec<f64>> {
    vec![
        vec![-1.0, 1.0, 0.0, 0.0],
        vec![-1.0, 0.0, 1.0, 0.0],
        vec![-1.0, 0.0, 0.0, 1.0],
    ]
}

const HEX8_XI: [f64; 8] = [-1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0];
const HEX8_ETA: [f64; 8] = [-1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0];
const HEX8_ZETA: [f64; 8] = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];

fn hex8_n(xi: f64, eta: f64, zeta: f64) -> Vec<f64> {
    (0..8)
        .map(|i| {
            (1.0 + xi * HEX8_XI[i]) * (1.0 + eta * HEX8_ETA[i]) * (1.0 + zeta * HEX8_ZETA[i]) / 8.0
        })
        .collect()
}

fn hex8_dn(xi: f64, eta: f64, zeta: f64) -> Vec<Vec<f64>> {
    let mut dxi = vec![0.0; 8];
    let mut deta = vec![0.0; 8];
    let mut dzeta = vec![0.0; 8];
    for i in 0..8 {
        dxi[i] = HEX8_XI[i] * (1.0 + eta * HEX8_ETA[i]) * (1.0 + zeta * HEX8_ZETA[i]) / 8.0;
        deta[i] = (1.0 + xi * HEX8_XI[i]) * HEX8_ETA[i] * (1.0 + zeta * HEX8_ZETA[i]) / 8.0;
        dzeta[i] = (1.0 + xi * HEX8_XI[i]) * (1.0 + eta * HEX8_ETA[i]) * HEX8_ZETA[i] / 8.0;
    }
    vec![dxi, deta, dzeta]
}

/// Evaluate shape functions and natural-coordinate gradients for `shape`
/// at one natural-coordinate point.
pub fn eval(shape: Shape, xi: [f64; 3]) -> ShapeEval {
    let (n, dn) = match shape {
        Shape::Line2 => (line2_n(xi[0]), line2_dn(xi[0])),
        Shape::Tri3 => (tri3_n(xi[0], xi[1]), tri3_dn(xi[0], xi[1])),
        Shape::Quad4 => (quad4_n(xi[0], xi[1]), quad4_dn(xi[0], xi[1])),
        Shape::Quad8 => (quad8_n(xi[0], xi[1]), quad8_dn(xi[0], xi[1])),
        Shape::Tet4 => (
            tet4_n(xi[0], xi[1], xi[2]),
            tet4_dn(xi[0], xi[1], xi[2]),
        ),
        Shape::Hex8 => (hex8_n(xi[0], xi[1], xi[2]), hex8_dn(xi[0], xi[1], xi[2])),
    };
    ShapeEval { n, dn }
}

const GAUSS2: [f64; 2] = [-0.577350269189626, 0.577350269189626];

/// Integration points for `shape` with `nip` points requested. Falls
/// back to each basis's natural minimum-order rule when `nip` does not
/// match a tabulated count, rather than failing: the spec leaves
/// integration-order selection to the region config (`nip`/`nipf`, §6)
/// and only requires *some* consistent rule per cell.
pub fn integration_points(shape: Shape, nip: usize) -> Vec<IntegPoint> {
    match shape {
        Shape::Line2 => {
            if nip <= 1 {
                vec![IntegPoint {
                    xi: [0.0, 0.0, 0.0],
                    weight: 2.0,
                }]
            } else {
                GAUSS2
                    .iter()
                    .map(|&x| IntegPoint {
                        xi: [x, 0.0, 0.0],
                        weight: 1.0,
                    })
                    .collect()
            }
        }
        Shape::Tri3 => vec![IntegPoint {
            xi: [1.0 / 3.0, 1.0 / 3.0, 0.0],
            weight: 0.5,
        }],
        Shape::Tet4 => vec![IntegPoint {
            xi: [0.25, 0.25, 0.25],
            weight: 1.0 / 6.0,
        }],
        Shape::Quad4 | Shape::Quad8 => {
            if nip <= 1 {
                vec![IntegPoint {
                    xi: [0.0, 0.0, 0.0],
                    weight: 4.0,
                }]
            } else {
                let mut pts = Vec::with_capacity(4);
                for &e in &GAUSS2 {
                    for &x in &GAUSS2 {
                        pts.push(IntegPoint {
                            xi: [x, e, 0.0],
                            weight: 1.0,
                        });
                    }
                }
                pts
            }
        }
        Shape::Hex8 => {
            if nip <= 1 {
                vec![IntegPoint {
                    xi: [0.0, 0.0, 0.0],
                    weight: 8.0,
                }]
            } else {
                let mut pts = Vec::with_capacity(8);
                for &z in &GAUSS2 {
                    for &e in &GAUSS2 {
                        for &x in &GAUSS2 {
                            pts.push(IntegPoint {
                                xi: [x, e, z],
                                weight: 1.0,
                            });
                        }
                    }
                }
                pts
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad4_shape_functions_partition_unity() {
        let ev = eval(Shape::Quad4, [0.3, -0.2, 0.0]);
        let sum: f64 = ev.n.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn quad4_derivatives_sum_to_zero() {
        let ev = eval(Shape::Quad4, [0.1, 0.4, 0.0]);
        for row in &ev.dn {
            let sum: f64 = row.iter().sum();
            assert!(sum.abs() < 1e-12);
        }
    }

    #[test]
    fn hex8_has_eight_integration_points_for_2x2x2_rule() {
        let pts = integration_points(Shape::Hex8, 8);
        assert_eq!(pts.len(), 8);
        let total_weight: f64 = pts.iter().map(|p| p.weight).sum();
        assert!((total_weight - 8.0).abs() < 1e-12);
    }

    #[test]
    fn tri3_shape_functions_partition_unity() {
        let ev = eval(Shape::Tri3, [0.2, 0.3, 0.0]);
        let sum: f64 = ev.n.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }
}
