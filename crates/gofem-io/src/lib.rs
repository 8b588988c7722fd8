//! Checkpoint and summary-file persistence (§4.11).

pub mod encoding;
pub mod error;
pub mod persistence;

pub use encoding::Encoder;
pub use error::{IoError, Result};
pub use persistence::{
    load_element_checkpoint, load_node_checkpoint, load_summary, save_element_checkpoint,
    save_node_checkpoint, save_summary, ElementPayload, NodeCheckpoint, Summary,
};
