//! Collision event data
//!
//! - Graph records and batch collation
//! - Safetensors-backed dataset chunks
//! - Seeded partition split and batched loaders

mod dataset;
mod graph;
mod loader;

pub use dataset::{GraphDataset, PROCESSED_DIR};
pub use graph::{GraphBatch, GraphEvent, NUM_FEATURES};
pub use loader::{random_split, DataLoader, Split};
