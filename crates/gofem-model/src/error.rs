//! Error type for malformed mesh/configuration records.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("unknown dof key: {0}")]
    UnknownDofKey(String),

    #[error("malformed extra keycode entry: {0}")]
    MalformedExtra(String),

    #[error("cell tag {0} has no matching elemsdata entry")]
    UnknownCellTag(i32),

    #[error("region references unknown vertex id {0}")]
    UnknownVertex(i64),

    #[error("time function {0} is not defined")]
    UnknownFunction(String),
}
