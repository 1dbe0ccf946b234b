//! Neural network building blocks for the severity classifier.
//!
//! The model is a plain fully connected `ReLU` network with explicit
//! forward and backward passes over [`Matrix`](crate::primitives::Matrix)
//! buffers, Kaiming initialization, inverted dropout, and a per-buffer
//! Adam optimizer.

mod adam;
pub mod init;
mod network;

pub use adam::Adam;
pub use network::{Dense, ForwardCache, InteractionNet, LayerGrad, NetConfig};
