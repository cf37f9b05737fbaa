//! Rendering
//!
//! Backend-neutral 2D drawing: the [`DrawContext`] trait, a software
//! [`Canvas`], a recording [`DrawList`], the tileset atlas, the static/animated
//! [`LayerRenderer`] and the dead-zone [`CameraController`].

pub mod camera;
pub mod canvas;
pub mod context;
pub mod draw_list;
pub mod layer_renderer;
pub mod tileset;

pub use camera::{CameraController, MapBounds};
pub use canvas::Canvas;
pub use context::DrawContext;
pub use draw_list::{DrawCommand, DrawList};
pub use layer_renderer::{prerender_static_layers, separate_layers, DocumentRenderer, LayerRenderer};
pub use tileset::Tileset;
