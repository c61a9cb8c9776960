//! The processing chain and its lifecycle.

pub mod graph;
pub mod node;
pub mod params;

pub use graph::{DspGraph, GraphSnapshot, TapBlock};
pub use node::{NodeId, NodeKind};
pub use params::DspControls;
