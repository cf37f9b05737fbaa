//! Scene graph
//!
//! Hierarchical nodes with Y-sorted draw order. Children are split into a
//! presorted static set and a lazily sorted dynamic set so that large maps
//! full of immobile props only pay for sorting the things that move.

pub mod component;
pub(crate) mod draw_order;
pub mod movement;
pub mod node;
pub mod tree;

pub use component::{Component, Drawable, FrameInfo, Steppable};
pub use movement::move_towards;
pub use node::{DrawLayer, NodeId, SceneNode};
pub use tree::{SceneError, SceneResult, SceneTree};
