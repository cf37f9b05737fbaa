//! Movement helpers for dynamic nodes

use crate::foundation::math::Vec2;
use crate::scene::tree::{SceneResult, SceneTree};
use crate::scene::node::NodeId;

/// Step `id` toward `target` by at most `max_distance` pixels.
///
/// Goes through [`SceneTree::set_position`], so the parent's draw order is
/// invalidated whenever Y changes. Returns `true` once the target is reached.
pub fn move_towards(tree: &mut SceneTree, id: NodeId, target: Vec2, max_distance: f32) -> SceneResult<bool> {
    let current = tree.position(id)?;
    let offset = target - current;
    let distance = offset.norm();

    if distance <= max_distance || distance <= f32::EPSILON {
        tree.set_position(id, target)?;
        return Ok(true);
    }

    let next = current + offset * (max_distance / distance);
    tree.set_position(id, next)?;
    Ok(false)
}
