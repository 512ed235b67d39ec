mod graph;
pub mod eval;
pub mod group;
pub mod material;
pub mod toon;

pub use graph::*;
pub use toon::ToonRamp;
