//! Collision detection and response for circular nodes
//!
//! Nodes are equal-radius circles. They collide with each other, with static
//! rectangular UI panels, and with the screen edges.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in screen space (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Whether a circle at `pos` overlaps the rectangle (touching counts)
    pub fn overlaps_circle(&self, pos: Vec2, radius: f32) -> bool {
        pos.x + radius >= self.min.x
            && pos.x - radius <= self.max.x
            && pos.y + radius >= self.min.y
            && pos.y - radius <= self.max.y
    }
}

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Surface normal at collision (pointing toward the moving circle)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Check overlap between two equal circles.
///
/// The normal points from `b` toward `a`. Coincident centres give a zero
/// normal, so callers never divide by zero.
pub fn circle_circle_collision(a: Vec2, b: Vec2, radius: f32) -> CollisionResult {
    let delta = a - b;
    let dist = delta.length();
    let min_dist = radius * 2.0;
    if dist >= min_dist {
        return CollisionResult::miss();
    }
    CollisionResult {
        hit: true,
        normal: delta.normalize_or_zero(),
        penetration: min_dist - dist,
    }
}

/// Which side of a rectangle a circle was pushed out through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectSide {
    Left,
    Right,
    Top,
    Bottom,
}

impl RectSide {
    /// Outward normal of this side
    pub fn normal(&self) -> Vec2 {
        match self {
            RectSide::Left => Vec2::NEG_X,
            RectSide::Right => Vec2::X,
            RectSide::Top => Vec2::NEG_Y,
            RectSide::Bottom => Vec2::Y,
        }
    }
}

/// Push a circle out of a rectangle through the nearest side.
///
/// Returns the corrected position and velocity, or `None` when there is no
/// overlap. The velocity component into the side is reflected and scaled by
/// `retention`; the tangential component is kept.
pub fn resolve_circle_rect(
    pos: Vec2,
    vel: Vec2,
    radius: f32,
    rect: &Rect,
    retention: f32,
) -> Option<(Vec2, Vec2, RectSide)> {
    if !rect.overlaps_circle(pos, radius) {
        return None;
    }

    let candidates = [
        (RectSide::Left, ((pos.x + radius) - rect.min.x).abs()),
        (RectSide::Right, ((pos.x - radius) - rect.max.x).abs()),
        (RectSide::Top, ((pos.y + radius) - rect.min.y).abs()),
        (RectSide::Bottom, ((pos.y - radius) - rect.max.y).abs()),
    ];
    // First minimum wins ties, giving a stable order
    let mut side = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.1 < side.1 {
            side = *candidate;
        }
    }
    let side = side.0;

    let mut pos = pos;
    let mut vel = vel;
    let normal = side.normal();
    match side {
        RectSide::Left => pos.x = rect.min.x - radius,
        RectSide::Right => pos.x = rect.max.x + radius,
        RectSide::Top => pos.y = rect.min.y - radius,
        RectSide::Bottom => pos.y = rect.max.y + radius,
    }
    // Only reflect when moving into the side
    let into = vel.dot(normal);
    if into < 0.0 {
        vel -= normal * into;
        vel += normal * (-into * retention);
    }
    Some((pos, vel, side))
}

/// Keep a circle inside the screen, reflecting velocity at the edges
pub fn clamp_to_screen(pos: Vec2, vel: Vec2, radius: f32, screen: Vec2, retention: f32) -> (Vec2, Vec2) {
    let mut pos = pos;
    let mut vel = vel;
    let max_x = (screen.x - radius).max(radius);
    let max_y = (screen.y - radius).max(radius);

    // Only reflect when moving into the edge
    if pos.x <= radius {
        pos.x = radius;
        if vel.x < 0.0 {
            vel.x = -vel.x * retention;
        }
    } else if pos.x >= max_x {
        pos.x = max_x;
        if vel.x > 0.0 {
            vel.x = -vel.x * retention;
        }
    }
    if pos.y <= radius {
        pos.y = radius;
        if vel.y < 0.0 {
            vel.y = -vel.y * retention;
        }
    } else if pos.y >= max_y {
        pos.y = max_y;
        if vel.y > 0.0 {
            vel.y = -vel.y * retention;
        }
    }
    (pos, vel)
}

/// Whether a circle lies fully on screen
pub fn inside_screen(pos: Vec2, radius: f32, screen: Vec2) -> bool {
    pos.x - radius >= 0.0 && pos.x + radius <= screen.x && pos.y - radius >= 0.0 && pos.y + radius <= screen.y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_circle_overlap() {
        let result = circle_circle_collision(Vec2::new(50.0, 0.0), Vec2::ZERO, 30.0);
        assert!(result.hit);
        assert!((result.penetration - 10.0).abs() < 0.001);
        assert!((result.normal - Vec2::X).length() < 0.001);

        let result = circle_circle_collision(Vec2::new(61.0, 0.0), Vec2::ZERO, 30.0);
        assert!(!result.hit);
    }

    #[test]
    fn test_coincident_circles_give_zero_normal() {
        let result = circle_circle_collision(Vec2::splat(5.0), Vec2::splat(5.0), 30.0);
        assert!(result.hit);
        assert_eq!(result.normal, Vec2::ZERO);
        assert!(result.normal.is_finite());
    }

    #[test]
    fn test_rect_pushes_out_through_nearest_side() {
        let rect = Rect::new(Vec2::new(100.0, 100.0), Vec2::new(300.0, 200.0));
        // Approaching the left side, slightly overlapping
        let (pos, vel, side) =
            resolve_circle_rect(Vec2::new(75.0, 150.0), Vec2::new(100.0, 10.0), 30.0, &rect, 0.8).unwrap();
        assert_eq!(side, RectSide::Left);
        assert!((pos.x - 70.0).abs() < 0.001);
        assert!((vel.x + 80.0).abs() < 0.001);
        assert!((vel.y - 10.0).abs() < 0.001);
        assert!(!rect.overlaps_circle(pos - Vec2::new(0.01, 0.0), 30.0));
    }

    #[test]
    fn test_rect_moving_away_keeps_velocity() {
        let rect = Rect::new(Vec2::new(100.0, 100.0), Vec2::new(300.0, 200.0));
        let (pos, vel, side) =
            resolve_circle_rect(Vec2::new(150.0, 225.0), Vec2::new(0.0, 50.0), 30.0, &rect, 0.8).unwrap();
        assert_eq!(side, RectSide::Bottom);
        assert!((pos.y - 230.0).abs() < 0.001);
        assert_eq!(vel, Vec2::new(0.0, 50.0));
    }

    #[test]
    fn test_rect_miss() {
        let rect = Rect::new(Vec2::new(100.0, 100.0), Vec2::new(300.0, 200.0));
        assert!(resolve_circle_rect(Vec2::new(0.0, 0.0), Vec2::ZERO, 30.0, &rect, 0.8).is_none());
    }

    #[test]
    fn test_screen_clamp_reflects() {
        let screen = Vec2::new(800.0, 600.0);
        let (pos, vel) = clamp_to_screen(Vec2::new(10.0, 300.0), Vec2::new(-100.0, 0.0), 30.0, screen, 0.8);
        assert_eq!(pos.x, 30.0);
        assert!((vel.x - 80.0).abs() < 0.001);

        let (pos, vel) = clamp_to_screen(Vec2::new(400.0, 300.0), Vec2::new(5.0, 5.0), 30.0, screen, 0.8);
        assert_eq!(pos, Vec2::new(400.0, 300.0));
        assert_eq!(vel, Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_screen_edge_leaves_outgoing_velocity_alone() {
        let screen = Vec2::new(800.0, 600.0);
        // Resting on the left edge but already heading back in
        let (pos, vel) = clamp_to_screen(Vec2::new(30.0, 300.0), Vec2::new(50.0, 0.0), 30.0, screen, 0.8);
        assert_eq!(pos, Vec2::new(30.0, 300.0));
        assert_eq!(vel, Vec2::new(50.0, 0.0));

        // Past the bottom edge, moving up
        let (pos, vel) = clamp_to_screen(Vec2::new(400.0, 590.0), Vec2::new(0.0, -40.0), 30.0, screen, 0.8);
        assert_eq!(pos.y, 570.0);
        assert_eq!(vel, Vec2::new(0.0, -40.0));

        // Past the right edge, moving further out
        let (pos, vel) = clamp_to_screen(Vec2::new(790.0, 300.0), Vec2::new(100.0, 0.0), 30.0, screen, 0.8);
        assert_eq!(pos.x, 770.0);
        assert!((vel.x + 80.0).abs() < 0.001);
    }
}
