//! Core compute primitive (Matrix).
//!
//! [`Matrix`] carries the dense minibatch rows for the classifier.
//! Feature storage elsewhere in the crate is bit-packed; dense f32 only
//! appears here, at the boundary of the network.

mod matrix;

pub use matrix::Matrix;
