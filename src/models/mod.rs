//! Neural network models
//!
//! - EdgeNet graph autoencoder (batch norm + encoder/decoder EdgeConv)

pub mod edgenet;

// Re-exports
pub use edgenet::{EdgeNet, EdgeNetConfig, NormMode};
