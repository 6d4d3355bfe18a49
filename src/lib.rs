//! Galist - a physics-driven linked-list construction game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (world state, graph queries, physics, portal suction)
//! - `validate`: Scoring of a submitted structure against an expected list
//! - `settings`: Mode flags and tuning, persisted as JSON
//! - `platform`: Browser bindings for the presentation layer

pub mod error;
pub mod platform;
pub mod settings;
pub mod sim;
pub mod validate;

pub use error::ActionError;
pub use settings::{GameMode, LinkMode, PhysicsMode, Settings};
pub use validate::{ExpectedNode, ExpectedStructure, ValidationResult, validate};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    use std::time::Duration;

    /// Fixed simulation timestep (60 Hz, one animation frame)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Default play field
    pub const SCREEN_WIDTH: f32 = 1280.0;
    pub const SCREEN_HEIGHT: f32 = 720.0;

    /// Node defaults
    pub const NODE_RADIUS: f32 = 30.0;

    /// Velocity retained per reference frame in damped mode
    pub const DAMPING: f32 = 0.98;
    /// Velocity retained along the normal after a plain node/node bounce
    pub const RESTITUTION: f32 = 0.6;
    /// Velocity retained after hitting a wall or obstacle
    pub const WALL_ENERGY_RETENTION: f32 = 0.8;
    /// Speeds below this are zeroed in damped mode (pixels/s)
    pub const REST_SPEED: f32 = 6.0;

    /// A launched node above this speed hits "decisively" (pixels/s)
    pub const LAUNCH_THRESHOLD: f32 = 180.0;
    /// Share of the launched node's velocity handed to the target
    pub const LAUNCH_TRANSFER: f32 = 0.8;
    /// Share of the launched node's velocity kept as a reversed rebound
    pub const LAUNCH_RETENTION: f32 = 0.4;

    /// Drag release: sample window and per-axis speed cap
    pub const THROW_WINDOW: Duration = Duration::from_millis(100);
    pub const MAX_THROW_SPEED: f32 = 900.0;

    /// Constant speed of a node being sucked toward the portal (pixels/s)
    pub const SUCTION_SPEED: f32 = 210.0;

    /// Suction choreography delays
    pub const STAGGER_DELAY: Duration = Duration::from_millis(150);
    pub const CHAIN_GAP: Duration = Duration::from_millis(1000);
    pub const EDGE_GRACE: Duration = Duration::from_millis(500);
    pub const VALIDATION_DELAY: Duration = Duration::from_millis(500);

    /// Competitive mode countdown
    pub const COMPETITIVE_TIME_LIMIT: Duration = Duration::from_secs(120);

    /// Points awarded per passing validation check
    pub const CHECK_POINTS: u32 = 20;
}

/// Direction from `from` to `to`, or zero when the points coincide
#[inline]
pub fn direction(from: Vec2, to: Vec2) -> Vec2 {
    (to - from).normalize_or_zero()
}

/// Scale a per-reference-frame factor (e.g. damping) to an arbitrary dt
#[inline]
pub fn per_frame_factor(factor: f32, dt: f32) -> f32 {
    factor.powf(dt / consts::SIM_DT)
}
