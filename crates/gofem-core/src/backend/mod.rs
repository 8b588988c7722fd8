//! Linear-algebra backend boundary (§1, §9). See `traits` for the
//! `LinearSolver` contract and `native` for the bundled reference
//! implementation.

pub mod native;
pub mod traits;

pub use native::NativeBackend;
pub use traits::{BackendError, LinearSolver};
