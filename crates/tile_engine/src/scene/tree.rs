//! Arena-backed scene tree
//!
//! Nodes live in a [`SlotMap`] and refer to each other by [`NodeId`]. The
//! tree owns every parent/child link, which keeps the single-parent rule and
//! the draw-order bookkeeping in one place.

use std::collections::HashMap;

use thiserror::Error;

use crate::foundation::collections::SlotMap;
use crate::foundation::math::Vec2;
use crate::render::DrawContext;
use crate::scene::component::{Component, FrameInfo};
use crate::scene::node::{DrawLayer, NodeId, SceneNode};

/// Scene tree errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The handle does not refer to a live node
    #[error("Scene node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// The operation needs the node to be attached to a parent
    #[error("Scene node {0:?} has no parent")]
    Detached(NodeId),

    /// Static nodes are sorted once on insertion and may not change Y
    #[error("Static scene node {0:?} cannot change its Y position")]
    StaticNodeMoved(NodeId),

    /// Attaching would make a node its own ancestor
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    WouldCycle {
        /// Requested parent
        parent: NodeId,
        /// Requested child
        child: NodeId,
    },
}

/// Result alias for scene operations
pub type SceneResult<T> = Result<T, SceneError>;

/// Tree of scene nodes with a permanent root
pub struct SceneTree {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
}

impl SceneTree {
    /// Create a tree whose root collects HUD and LIGHTS nodes
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new(Vec2::zeros()).with_layer_cache().named("root"));
        Self { nodes, root }
    }

    /// Root handle
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; the root is permanent
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> SceneResult<&SceneNode> {
        self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> SceneResult<&mut SceneNode> {
        self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Store a detached node and return its handle
    pub fn insert(&mut self, node: SceneNode) -> NodeId {
        let mut node = node;
        node.parent = None;
        node.children.clear();
        self.nodes.insert(node)
    }

    /// Insert `node` and attach it under `parent`
    pub fn spawn(&mut self, parent: NodeId, node: SceneNode) -> SceneResult<NodeId> {
        self.node(parent)?;
        let id = self.insert(node);
        if let Err(e) = self.add_child(parent, id) {
            self.nodes.remove(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Attach `child` under `parent`, detaching it from any previous parent.
    ///
    /// Static children are placed into their sorted slot immediately; dynamic
    /// children are appended and sorted lazily on the next draw.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        self.node(parent)?;
        self.node(child)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::WouldCycle { parent, child });
        }
        if self.node(child)?.parent.is_some() {
            self.detach(child)?;
        }

        let (is_dynamic, floor, key) = {
            let node = self.node_mut(child)?;
            (node.is_dynamic, node.draw_layer == DrawLayer::Floor, node.sort_y())
        };
        self.node_mut(child)?.parent = Some(parent);

        let parent_node = self.node_mut(parent)?;
        parent_node.children.push(child);
        if is_dynamic {
            parent_node.order.insert_dynamic(child, floor, key);
        } else {
            parent_node.order.insert_static(child, floor, key);
        }
        self.invalidate_layer_cache(parent);
        Ok(())
    }

    /// Remove `child` from its parent's lists without destroying it
    pub fn detach(&mut self, child: NodeId) -> SceneResult<()> {
        let parent = self.node(child)?.parent.ok_or(SceneError::Detached(child))?;
        let parent_node = self.node_mut(parent)?;
        parent_node.children.retain(|c| *c != child);
        parent_node.order.remove(child);
        self.node_mut(child)?.parent = None;
        self.invalidate_layer_cache(parent);
        Ok(())
    }

    /// Recursively destroy `id` and every descendant
    pub fn destroy(&mut self, id: NodeId) -> SceneResult<()> {
        if self.node(id)?.parent.is_none() {
            return Err(SceneError::Detached(id));
        }
        self.detach(id)?;
        self.remove_subtree(id);
        Ok(())
    }

    /// Drop a detached node and its descendants
    pub fn remove_detached(&mut self, id: NodeId) -> SceneResult<()> {
        if id == self.root {
            return Err(SceneError::Detached(id));
        }
        if self.node(id)?.parent.is_some() {
            self.detach(id)?;
        }
        self.remove_subtree(id);
        Ok(())
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
            }
        }
    }

    /// Update a node's local position.
    ///
    /// A change in Y invalidates the parent's draw order. Static nodes that
    /// are attached may move horizontally only.
    pub fn set_position(&mut self, id: NodeId, position: Vec2) -> SceneResult<()> {
        let node = self.node_mut(id)?;
        let y_changed = (node.position.y - position.y).abs() > f32::EPSILON;
        if y_changed && !node.is_dynamic && node.parent.is_some() {
            return Err(SceneError::StaticNodeMoved(id));
        }
        node.position = position;
        if y_changed {
            self.invalidate_parent_sorting(id)?;
        }
        Ok(())
    }

    /// Move by `delta`
    pub fn translate(&mut self, id: NodeId, delta: Vec2) -> SceneResult<()> {
        let position = self.node(id)?.position + delta;
        self.set_position(id, position)
    }

    /// Local position
    pub fn position(&self, id: NodeId) -> SceneResult<Vec2> {
        Ok(self.node(id)?.position)
    }

    /// Sum of the positions of `id` and all of its ancestors
    pub fn world_position(&self, id: NodeId) -> SceneResult<Vec2> {
        let mut total = Vec2::zeros();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            total += node.position;
            current = node.parent;
        }
        Ok(total)
    }

    /// Change a node's draw layer
    pub fn set_draw_layer(&mut self, id: NodeId, layer: DrawLayer) -> SceneResult<()> {
        let node = self.node_mut(id)?;
        if node.draw_layer == layer {
            return Ok(());
        }
        node.draw_layer = layer;
        let parent = node.parent;
        if let Some(parent) = parent {
            let floor = layer == DrawLayer::Floor;
            let parent_node = self.node_mut(parent)?;
            parent_node.order.remove(id);
            let (is_dynamic, key) = {
                let node = self.node(id)?;
                (node.is_dynamic, node.sort_y())
            };
            let parent_node = self.node_mut(parent)?;
            if is_dynamic {
                parent_node.order.insert_dynamic(id, floor, key);
            } else {
                parent_node.order.insert_static(id, floor, key);
            }
            self.invalidate_layer_cache(parent);
        }
        Ok(())
    }

    /// Mark the parent's merged draw order stale
    pub fn invalidate_parent_sorting(&mut self, id: NodeId) -> SceneResult<()> {
        if let Some(parent) = self.node(id)?.parent {
            self.node_mut(parent)?.order.invalidate();
        }
        Ok(())
    }

    /// Mark the nearest compositing ancestor's HUD/LIGHTS buckets stale
    pub fn invalidate_layer_cache(&mut self, from: NodeId) {
        let mut current = Some(from);
        while let Some(id) = current {
            let Some(node) = self.nodes.get_mut(id) else {
                return;
            };
            if let Some(cache) = node.layer_cache.as_mut() {
                cache.dirty = true;
                return;
            }
            current = node.parent;
        }
    }

    /// Children of `id` in draw order: floor first, then ascending Y plus
    /// sorting offset, ties in insertion order
    pub fn ordered_children(&mut self, id: NodeId) -> SceneResult<Vec<NodeId>> {
        let node = self.node(id)?;
        if node.order.is_dirty() {
            let refreshed: HashMap<NodeId, f32> = {
                let mut keys = HashMap::new();
                for child in &node.children {
                    let child_node = self.node(*child)?;
                    if child_node.is_dynamic {
                        keys.insert(*child, child_node.sort_y());
                    }
                }
                keys
            };
            let order = &mut self.node_mut(id)?.order;
            for entry in order.dynamics_mut() {
                if let Some(key) = refreshed.get(&entry.id) {
                    entry.key = *key;
                }
            }
            order.refresh();
        }
        Ok(self.node(id)?.order.cached().to_vec())
    }

    /// Step `id`'s subtree: children first, then `ready` once, then `step`
    pub fn step_entry(&mut self, id: NodeId, frame: &FrameInfo) -> SceneResult<()> {
        let children = self.node(id)?.children.clone();
        for child in children {
            if self.nodes.contains_key(child) {
                self.step_entry(child, frame)?;
            }
        }

        let node = self.node_mut(id)?;
        let first = !node.ready_called;
        node.ready_called = true;
        if let Some(component) = node.component.as_mut() {
            if first {
                component.ready();
            }
            component.step(frame.delta_ms, frame);
        }
        Ok(())
    }

    /// Draw `id` and its ordered subtree, skipping HUD and LIGHTS children
    pub fn draw(&mut self, id: NodeId, ctx: &mut dyn DrawContext, x: f32, y: f32) -> SceneResult<()> {
        let position = self.node(id)?.position;
        let (draw_x, draw_y) = (x + position.x, y + position.y);
        if let Some(component) = self.node(id)?.component.as_deref() {
            component.draw(ctx, draw_x, draw_y);
        }

        for child in self.ordered_children(id)? {
            if self.node(child)?.draw_layer.is_separate_pass() {
                continue;
            }
            self.draw(child, ctx, draw_x, draw_y)?;
        }
        Ok(())
    }

    /// Nodes tagged `layer` below the compositing node `owner`, in draw order
    pub fn layer_nodes(&mut self, owner: NodeId, layer: DrawLayer) -> SceneResult<Vec<NodeId>> {
        let needs_rebuild = self
            .node(owner)?
            .layer_cache
            .as_ref()
            .map_or(true, |cache| cache.dirty);

        if needs_rebuild {
            let (mut hud, mut lights) = (Vec::new(), Vec::new());
            self.collect_layer_nodes(owner, &mut hud, &mut lights)?;
            let node = self.node_mut(owner)?;
            let cache = node.layer_cache.get_or_insert_with(Default::default);
            cache.hud = hud;
            cache.lights = lights;
            cache.dirty = false;
        }

        let cache = self.node(owner)?.layer_cache.as_ref();
        Ok(match (layer, cache) {
            (DrawLayer::Hud, Some(cache)) => cache.hud.clone(),
            (DrawLayer::Lights, Some(cache)) => cache.lights.clone(),
            _ => Vec::new(),
        })
    }

    /// Draw every `layer` node under `owner`, each offset by its parent's
    /// world position plus `(x, y)`
    pub fn draw_layer_pass(
        &mut self,
        owner: NodeId,
        layer: DrawLayer,
        ctx: &mut dyn DrawContext,
        x: f32,
        y: f32,
    ) -> SceneResult<()> {
        for id in self.layer_nodes(owner, layer)? {
            let base = match self.node(id)?.parent {
                Some(parent) => self.world_position(parent)?,
                None => Vec2::zeros(),
            };
            self.draw(id, ctx, x + base.x, y + base.y)?;
        }
        Ok(())
    }

    /// Downcast a node's component
    pub fn component<T: Component>(&self, id: NodeId) -> Option<&T> {
        self.nodes
            .get(id)?
            .component
            .as_deref()
            .and_then(|c| c.as_any().downcast_ref::<T>())
    }

    /// Mutably downcast a node's component
    pub fn component_mut<T: Component>(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes
            .get_mut(id)?
            .component
            .as_deref_mut()
            .and_then(|c| c.as_any_mut().downcast_mut::<T>())
    }

    /// Iterate over `(id, node)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter()
    }

    fn collect_layer_nodes(
        &mut self,
        id: NodeId,
        hud: &mut Vec<NodeId>,
        lights: &mut Vec<NodeId>,
    ) -> SceneResult<()> {
        for child in self.ordered_children(id)? {
            match self.node(child)?.draw_layer {
                DrawLayer::Hud => hud.push(child),
                DrawLayer::Lights => lights.push(child),
                DrawLayer::None | DrawLayer::Floor => self.collect_layer_nodes(child, hud, lights)?,
            }
        }
        Ok(())
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut current = Some(of);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SceneTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneTree")
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::DrawList;
    use crate::scene::component::{Drawable, Steppable};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Steppable for Recorder {
        fn ready(&mut self) {
            self.log.borrow_mut().push(format!("ready:{}", self.name));
        }

        fn step(&mut self, _delta_ms: f32, _frame: &FrameInfo) {
            self.log.borrow_mut().push(format!("step:{}", self.name));
        }
    }

    impl Drawable for Recorder {
        fn draw(&self, _ctx: &mut dyn DrawContext, x: f32, y: f32) {
            self.log.borrow_mut().push(format!("draw:{}@{x},{y}", self.name));
        }
    }

    fn recorder(name: &'static str, log: &Log) -> Recorder {
        Recorder { name, log: Rc::clone(log) }
    }

    fn frame() -> FrameInfo {
        FrameInfo::new(16.0, Vec2::new(320.0, 240.0))
    }

    #[test]
    fn test_step_children_before_parent_and_ready_once() {
        let log: Log = Rc::default();
        let mut tree = SceneTree::new();
        let root = tree.root();
        let parent = tree.spawn(root, SceneNode::at(0.0, 0.0).with_component(recorder("parent", &log))).unwrap();
        tree.spawn(parent, SceneNode::at(0.0, 0.0).with_component(recorder("child", &log))).unwrap();

        tree.step_entry(root, &frame()).unwrap();
        tree.step_entry(root, &frame()).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "ready:child",
                "step:child",
                "ready:parent",
                "step:parent",
                "step:child",
                "step:parent",
            ]
        );
    }

    #[test]
    fn test_draw_orders_by_y_and_skips_overlay_layers() {
        let log: Log = Rc::default();
        let mut tree = SceneTree::new();
        let root = tree.root();
        tree.spawn(root, SceneNode::at(0.0, 30.0).with_component(recorder("low", &log))).unwrap();
        tree.spawn(root, SceneNode::at(5.0, 10.0).dynamic().with_component(recorder("high", &log)))
            .unwrap();
        tree.spawn(
            root,
            SceneNode::at(0.0, 0.0)
                .with_draw_layer(DrawLayer::Hud)
                .with_component(recorder("hud", &log)),
        )
        .unwrap();

        let mut ctx = DrawList::new(320, 240);
        tree.draw(root, &mut ctx, 100.0, 0.0).unwrap();

        assert_eq!(*log.borrow(), vec!["draw:high@105,10", "draw:low@100,30"]);
    }

    #[test]
    fn test_sorting_offset_changes_order() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let a = tree.spawn(root, SceneNode::at(0.0, 10.0).with_sorting_offset(20.0)).unwrap();
        let b = tree.spawn(root, SceneNode::at(0.0, 20.0)).unwrap();
        assert_eq!(tree.ordered_children(root).unwrap(), vec![b, a]);
    }

    #[test]
    fn test_many_moving_nodes_resort() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let ids: Vec<NodeId> = (0..200)
            .map(|i| tree.spawn(root, SceneNode::at(0.0, i as f32).dynamic()).unwrap())
            .collect();
        assert_eq!(tree.ordered_children(root).unwrap(), ids);

        // Reverse the vertical order in one frame
        for (i, id) in ids.iter().enumerate() {
            tree.set_position(*id, Vec2::new(0.0, 1000.0 - i as f32)).unwrap();
        }
        let reversed: Vec<NodeId> = ids.iter().rev().copied().collect();
        assert_eq!(tree.ordered_children(root).unwrap(), reversed);
    }

    #[test]
    fn test_floor_node_draws_beneath_siblings() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let actor = tree.spawn(root, SceneNode::at(0.0, -50.0).dynamic()).unwrap();
        let rug = tree
            .spawn(root, SceneNode::at(0.0, 500.0).with_draw_layer(DrawLayer::Floor))
            .unwrap();
        assert_eq!(tree.ordered_children(root).unwrap(), vec![rug, actor]);
    }

    #[test]
    fn test_layer_pass_draws_hud_with_parent_offset() {
        let log: Log = Rc::default();
        let mut tree = SceneTree::new();
        let root = tree.root();
        let panel = tree.spawn(root, SceneNode::at(10.0, 10.0)).unwrap();
        let hud = tree
            .spawn(
                panel,
                SceneNode::at(1.0, 2.0)
                    .with_draw_layer(DrawLayer::Hud)
                    .with_component(recorder("hud", &log)),
            )
            .unwrap();
        tree.spawn(
            root,
            SceneNode::at(0.0, 0.0)
                .with_draw_layer(DrawLayer::Lights)
                .with_component(recorder("light", &log)),
        )
        .unwrap();

        assert_eq!(tree.layer_nodes(root, DrawLayer::Hud).unwrap(), vec![hud]);

        let mut ctx = DrawList::new(320, 240);
        tree.draw_layer_pass(root, DrawLayer::Hud, &mut ctx, 0.0, 0.0).unwrap();
        assert_eq!(*log.borrow(), vec!["draw:hud@11,12"]);

        tree.destroy(hud).unwrap();
        assert!(tree.layer_nodes(root, DrawLayer::Hud).unwrap().is_empty());
        assert_eq!(tree.layer_nodes(root, DrawLayer::Lights).unwrap().len(), 1);
    }

    #[test]
    fn test_destroy_removes_subtree() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let parent = tree.spawn(root, SceneNode::at(0.0, 0.0)).unwrap();
        let child = tree.spawn(parent, SceneNode::at(0.0, 0.0)).unwrap();
        let grandchild = tree.spawn(child, SceneNode::at(0.0, 0.0)).unwrap();

        tree.destroy(parent).unwrap();
        assert!(!tree.contains(parent));
        assert!(!tree.contains(child));
        assert!(!tree.contains(grandchild));
        assert_eq!(tree.len(), 1);
        assert!(tree.ordered_children(root).unwrap().is_empty());
    }

    #[test]
    fn test_destroy_requires_parent() {
        let mut tree = SceneTree::new();
        let loose = tree.insert(SceneNode::at(0.0, 0.0));
        assert_eq!(tree.destroy(loose), Err(SceneError::Detached(loose)));
        assert_eq!(tree.destroy(tree.root()), Err(SceneError::Detached(tree.root())));
    }

    #[test]
    fn test_static_node_cannot_change_y() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let rock = tree.spawn(root, SceneNode::at(0.0, 10.0)).unwrap();

        assert!(tree.set_position(rock, Vec2::new(40.0, 10.0)).is_ok());
        assert_eq!(
            tree.set_position(rock, Vec2::new(40.0, 11.0)),
            Err(SceneError::StaticNodeMoved(rock))
        );
    }

    #[test]
    fn test_reparenting_keeps_single_parent() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let a = tree.spawn(root, SceneNode::at(0.0, 0.0)).unwrap();
        let b = tree.spawn(root, SceneNode::at(0.0, 0.0)).unwrap();
        let item = tree.spawn(a, SceneNode::at(0.0, 0.0)).unwrap();

        tree.add_child(b, item).unwrap();
        assert!(tree.node(a).unwrap().children().is_empty());
        assert_eq!(tree.node(b).unwrap().children(), &[item]);
        assert_eq!(tree.node(item).unwrap().parent(), Some(b));

        assert_eq!(tree.add_child(item, b), Err(SceneError::WouldCycle { parent: item, child: b }));
    }

    #[test]
    fn test_component_downcast() {
        let log: Log = Rc::default();
        let mut tree = SceneTree::new();
        let root = tree.root();
        let id = tree.spawn(root, SceneNode::at(0.0, 0.0).with_component(recorder("p", &log))).unwrap();

        assert_eq!(tree.component::<Recorder>(id).map(|p| p.name), Some("p"));
        tree.component_mut::<Recorder>(id).unwrap().name = "q";
        assert_eq!(tree.component::<Recorder>(id).map(|p| p.name), Some("q"));
    }
}
