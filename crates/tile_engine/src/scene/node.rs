//! Scene node data

use crate::foundation::collections::new_key_type;
use crate::foundation::math::Vec2;
use crate::scene::component::Component;
use crate::scene::draw_order::DrawOrder;

new_key_type! {
    /// Stable handle to a node stored in a [`SceneTree`](crate::scene::SceneTree)
    pub struct NodeId;
}

/// Compositing bucket a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawLayer {
    /// Regular Y-sorted world content
    #[default]
    None,
    /// Ground decals; always drawn beneath Y-sorted siblings
    Floor,
    /// Screen-space overlay drawn in its own pass
    Hud,
    /// Lighting drawn in its own pass
    Lights,
}

impl DrawLayer {
    /// Layers the regular draw traversal skips
    pub const fn is_separate_pass(self) -> bool {
        matches!(self, Self::Hud | Self::Lights)
    }
}

/// HUD/LIGHTS node buckets cached on a compositing ancestor
#[derive(Debug, Default)]
pub(crate) struct LayerCache {
    pub(crate) dirty: bool,
    pub(crate) hud: Vec<NodeId>,
    pub(crate) lights: Vec<NodeId>,
}

/// A node in the scene tree.
///
/// Nodes are created detached with [`SceneNode::new`] and the builder
/// methods, then inserted into a tree. Tree links are owned by the tree and
/// only change through [`SceneTree`](crate::scene::SceneTree) methods.
pub struct SceneNode {
    pub(crate) position: Vec2,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) order: DrawOrder,
    pub(crate) draw_layer: DrawLayer,
    pub(crate) sorting_offset_y: f32,
    pub(crate) is_solid: bool,
    pub(crate) is_dynamic: bool,
    pub(crate) ready_called: bool,
    pub(crate) name: Option<String>,
    pub(crate) layer_cache: Option<LayerCache>,
    pub(crate) component: Option<Box<dyn Component>>,
}

impl SceneNode {
    /// Create a static node at `position`
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            parent: None,
            children: Vec::new(),
            order: DrawOrder::default(),
            draw_layer: DrawLayer::None,
            sorting_offset_y: 0.0,
            is_solid: false,
            is_dynamic: false,
            ready_called: false,
            name: None,
            layer_cache: None,
            component: None,
        }
    }

    /// Create a static node at `(x, y)`
    pub fn at(x: f32, y: f32) -> Self {
        Self::new(Vec2::new(x, y))
    }

    /// Mark the node as moving; moving nodes are re-sorted on demand
    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    /// Set the draw layer
    pub fn with_draw_layer(mut self, layer: DrawLayer) -> Self {
        self.draw_layer = layer;
        self
    }

    /// Offset added to the Y coordinate when sorting
    pub fn with_sorting_offset(mut self, offset_y: f32) -> Self {
        self.sorting_offset_y = offset_y;
        self
    }

    /// Mark the node as blocking movement
    pub fn solid(mut self) -> Self {
        self.is_solid = true;
        self
    }

    /// Attach behaviour
    pub fn with_component(mut self, component: impl Component) -> Self {
        self.component = Some(Box::new(component));
        self
    }

    /// Attach already boxed behaviour
    pub fn with_boxed_component(mut self, component: Box<dyn Component>) -> Self {
        self.component = Some(component);
        self
    }

    /// Make this node collect HUD/LIGHTS descendants for separate passes
    pub fn with_layer_cache(mut self) -> Self {
        self.layer_cache = Some(LayerCache { dirty: true, ..LayerCache::default() });
        self
    }

    /// Debug name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Local position relative to the parent
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Parent handle, if attached
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Draw layer tag
    pub fn draw_layer(&self) -> DrawLayer {
        self.draw_layer
    }

    /// Sorting offset
    pub fn sorting_offset_y(&self) -> f32 {
        self.sorting_offset_y
    }

    /// Whether the node blocks movement
    pub fn is_solid(&self) -> bool {
        self.is_solid
    }

    /// Whether the node is tracked as a moving child
    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    /// Whether `ready` has run
    pub fn is_ready(&self) -> bool {
        self.ready_called
    }

    /// Debug name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Y value used for depth ordering
    pub fn sort_y(&self) -> f32 {
        self.position.y + self.sorting_offset_y
    }
}

impl std::fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneNode")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .field("draw_layer", &self.draw_layer)
            .field("is_dynamic", &self.is_dynamic)
            .field("has_component", &self.component.is_some())
            .finish()
    }
}
