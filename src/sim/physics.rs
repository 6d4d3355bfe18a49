//! Per-frame integrator and drag handling
//!
//! `tick` is deterministic: nodes are visited in id order, pairs in (i, j)
//! order, and nothing reads a half-updated neighbour from another frame.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use glam::Vec2;

use super::collision::{circle_circle_collision, clamp_to_screen, inside_screen, resolve_circle_rect};
use super::state::{Node, NodeId};
use crate::consts::THROW_WINDOW;
use crate::per_frame_factor;
use crate::settings::Settings;

/// Two nodes that touched this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub a: NodeId,
    pub b: NodeId,
    /// The node that hit decisively, if the hit was a launch
    pub launched: Option<NodeId>,
}

impl Contact {
    /// The node on the other side of `id`
    pub fn other(&self, id: NodeId) -> NodeId {
        if self.a == id { self.b } else { self.a }
    }
}

/// Advance every free node by one timestep.
///
/// Nodes in `sucking` (and dragged nodes) are not integrated; sucking nodes
/// are also invisible to collisions. Returns the contacts seen this tick.
pub fn tick(nodes: &mut [Node], sucking: &HashSet<NodeId>, dt: f32, settings: &Settings) -> Vec<Contact> {
    let radius = settings.node_radius;

    // --- Integrate ---
    for node in nodes.iter_mut() {
        if node.is_free() && !sucking.contains(&node.id) {
            node.pos += node.vel * dt;
        }
    }

    // --- Node/node collisions ---
    let mut contacts = Vec::new();
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            let (head, tail) = nodes.split_at_mut(j);
            let a = &mut head[i];
            let b = &mut tail[0];
            if sucking.contains(&a.id) || sucking.contains(&b.id) || a.flags.sucking || b.flags.sucking {
                continue;
            }
            if let Some(contact) = resolve_pair(a, b, radius, settings) {
                contacts.push(contact);
            }
        }
    }

    // --- Obstacles, screen edges, damping ---
    let damping = per_frame_factor(settings.damping, dt);
    for node in nodes.iter_mut() {
        if !node.is_free() || sucking.contains(&node.id) {
            continue;
        }

        for rect in &settings.obstacles {
            if let Some((pos, vel, _)) = resolve_circle_rect(node.pos, node.vel, radius, rect, settings.wall_retention) {
                node.pos = pos;
                node.vel = vel;
            }
        }

        let (pos, vel) = clamp_to_screen(node.pos, node.vel, radius, settings.screen, settings.wall_retention);
        node.pos = pos;
        node.vel = vel;

        if settings.damped() {
            node.vel *= damping;
            if node.vel.x.abs() < settings.rest_speed {
                node.vel.x = 0.0;
            }
            if node.vel.y.abs() < settings.rest_speed {
                node.vel.y = 0.0;
            }
        }

        if node.flags.launched && node.speed() < settings.launch_threshold {
            node.flags.launched = false;
        }

        // Out-of-range outputs are clamped rather than propagated
        if !node.pos.is_finite() {
            node.pos = settings.screen * 0.5;
        }
        if !node.vel.is_finite() {
            node.vel = Vec2::ZERO;
        }
    }

    contacts
}

/// Separate and bounce one pair. A dragged node is treated as immovable.
fn resolve_pair(a: &mut Node, b: &mut Node, radius: f32, settings: &Settings) -> Option<Contact> {
    let hit = circle_circle_collision(a.pos, b.pos, radius);
    if !hit.hit {
        return None;
    }
    // Normal points from b toward a
    let n = hit.normal;

    match (a.flags.dragged, b.flags.dragged) {
        (true, true) => {}
        (true, false) => b.pos -= n * hit.penetration,
        (false, true) => a.pos += n * hit.penetration,
        (false, false) => {
            a.pos += n * (hit.penetration * 0.5);
            b.pos -= n * (hit.penetration * 0.5);
        }
    }

    let a_shot = a.flags.launched && a.speed() > settings.launch_threshold;
    let b_shot = b.flags.launched && b.speed() > settings.launch_threshold;
    // A decisive hit needs a stationary target
    let a_still = a.speed() < settings.rest_speed;
    let b_still = b.speed() < settings.rest_speed;

    let launched = if a_shot && b_still && !b.flags.dragged {
        b.vel = a.vel * settings.launch_transfer;
        a.vel = -a.vel * settings.launch_retention;
        Some(a.id)
    } else if b_shot && a_still && !a.flags.dragged {
        a.vel = b.vel * settings.launch_transfer;
        b.vel = -b.vel * settings.launch_retention;
        Some(b.id)
    } else {
        // Invert-and-damp whatever is moving into the other node
        let into_a = a.vel.dot(n);
        if into_a < 0.0 && !a.flags.dragged {
            a.vel -= n * into_a * (1.0 + settings.restitution);
        }
        let into_b = b.vel.dot(-n);
        if into_b < 0.0 && !b.flags.dragged {
            b.vel += n * into_b * (1.0 + settings.restitution);
        }
        None
    };

    Some(Contact { a: a.id, b: b.id, launched })
}

/// Whether a node of `id` could sit at `pos`: on screen, clear of panels
/// and of every other node
pub fn is_valid_position(nodes: &[Node], id: NodeId, pos: Vec2, settings: &Settings) -> bool {
    let radius = settings.node_radius;
    if !inside_screen(pos, radius, settings.screen) {
        return false;
    }
    if settings.obstacles.iter().any(|r| r.overlaps_circle(pos, radius)) {
        return false;
    }
    let min_dist = settings.contact_distance();
    nodes
        .iter()
        .filter(|n| n.id != id && !n.flags.sucking)
        .all(|n| n.pos.distance(pos) >= min_dist)
}

/// Farthest valid point on the segment `from -> target`.
///
/// Returns `target` when it is free and `from` when it is not finite;
/// otherwise binary-searches along the
/// drag vector (20 halvings, stopping once the step drops below 0.1 px).
pub fn clamp_drag(nodes: &[Node], id: NodeId, from: Vec2, target: Vec2, settings: &Settings) -> Vec2 {
    if !target.is_finite() {
        return from;
    }
    if is_valid_position(nodes, id, target, settings) {
        return target;
    }

    let delta = target - from;
    let distance = delta.length();
    if distance == 0.0 {
        return from;
    }
    let dir = delta / distance;

    let mut valid = 0.0;
    let mut test = distance;
    let mut step = distance / 2.0;
    for _ in 0..20 {
        if is_valid_position(nodes, id, from + dir * test, settings) {
            valid = test;
            test += step;
        } else {
            test -= step;
        }
        step /= 2.0;
        if step < 0.1 {
            break;
        }
    }
    from + dir * valid
}

/// Move a dragged node toward the pointer, clamped. Returns the new position.
pub fn drag_to(nodes: &mut [Node], id: NodeId, target: Vec2, settings: &Settings) -> Option<Vec2> {
    let from = nodes.iter().find(|n| n.id == id)?.pos;
    let pos = clamp_drag(nodes, id, from, target, settings);
    let node = nodes.iter_mut().find(|n| n.id == id)?;
    node.pos = pos;
    node.vel = Vec2::ZERO;
    node.flags.dragged = true;
    Some(pos)
}

/// Sliding window of recent pointer samples used to "throw" a node on release
#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    samples: VecDeque<(Vec2, Duration)>,
}

impl PointerTracker {
    /// Start a new drag gesture
    pub fn begin(&mut self, pos: Vec2, at: Duration) {
        self.samples.clear();
        if pos.is_finite() {
            self.samples.push_back((pos, at));
        }
    }

    /// Record a pointer move, forgetting samples older than the window
    pub fn record(&mut self, pos: Vec2, at: Duration) {
        if !pos.is_finite() {
            return;
        }
        self.samples.push_back((pos, at));
        while let Some(&(_, t)) = self.samples.front() {
            if at.saturating_sub(t) >= THROW_WINDOW {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Throw velocity from the window, capped per axis. Clears the window.
    pub fn release(&mut self, max_speed: f32) -> Vec2 {
        let velocity = match (self.samples.front(), self.samples.back()) {
            (Some(&(old_pos, old_t)), Some(&(new_pos, new_t))) if self.samples.len() >= 2 => {
                let secs = new_t.saturating_sub(old_t).as_secs_f32();
                if secs > 0.0 {
                    let v = (new_pos - old_pos) / secs;
                    v.clamp(Vec2::splat(-max_speed), Vec2::splat(max_speed))
                } else {
                    Vec2::ZERO
                }
            }
            _ => Vec2::ZERO,
        };
        self.samples.clear();
        velocity
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
