//! Engine settings and mode flags
//!
//! One parametrized engine serves every level; the level picks a preset and
//! the presentation layer may override tuning. Persisted as JSON in
//! LocalStorage on the web.

use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::sim::collision::Rect;

/// How nodes point at each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LinkMode {
    /// One `next` pointer per node
    #[default]
    Singly,
    /// Paired `next`/`prev` pointers, always created and removed together
    Doubly,
}

/// How free nodes move between collisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PhysicsMode {
    /// Velocity decays every frame and slow nodes come to rest
    #[default]
    Damped,
    /// Space levels: velocity is constant until something is hit
    Floating,
}

/// Which operations the level exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GameMode {
    /// Free construction: connect, insert, delete
    #[default]
    Construction,
    /// Abstract data type level: enqueue, dequeue and peek only
    QueueOnly,
    /// Timed challenge with a leaderboard submission on success
    Competitive,
}

impl GameMode {
    /// Whether arbitrary pointer surgery (connect, insert at head/index) is allowed
    pub fn allows_free_linking(&self) -> bool {
        !matches!(self, GameMode::QueueOnly)
    }

    /// Whether a countdown runs
    pub fn is_timed(&self) -> bool {
        matches!(self, GameMode::Competitive)
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // === Modes ===
    pub link_mode: LinkMode,
    pub physics_mode: PhysicsMode,
    pub game_mode: GameMode,

    // === Arena ===
    /// Play field size in pixels
    pub screen: Vec2,
    /// Static UI panels nodes bounce off
    pub obstacles: Vec<Rect>,
    pub node_radius: f32,
    /// Where launched nodes appear
    pub launcher: Vec2,

    // === Physics tuning ===
    pub damping: f32,
    pub restitution: f32,
    pub wall_retention: f32,
    pub rest_speed: f32,
    pub launch_threshold: f32,
    pub launch_transfer: f32,
    pub launch_retention: f32,
    pub max_throw_speed: f32,

    // === Portal ===
    pub suction_speed: f32,
    /// Portal entrance point
    pub portal_entrance: Vec2,
    /// Half-extent of the box around the entrance that counts as "inside"
    pub portal_tolerance: Vec2,
    pub stagger_delay: Duration,
    pub chain_gap: Duration,
    pub edge_grace: Duration,
    pub validation_delay: Duration,

    // === Competitive ===
    pub time_limit: Duration,

    /// Seed for launch jitter
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let screen = Vec2::new(SCREEN_WIDTH, SCREEN_HEIGHT);
        Self {
            link_mode: LinkMode::Singly,
            physics_mode: PhysicsMode::Damped,
            game_mode: GameMode::Construction,

            screen,
            obstacles: vec![
                // Expected-results bar across the top
                Rect::new(Vec2::ZERO, Vec2::new(screen.x, 60.0)),
                // Control panel along the bottom
                Rect::new(
                    Vec2::new(screen.x * 0.15, screen.y - 60.0),
                    Vec2::new(screen.x * 0.75, screen.y - 10.0),
                ),
            ],
            node_radius: NODE_RADIUS,
            launcher: Vec2::new(screen.x - 2.0 * NODE_RADIUS, screen.y - 100.0),

            damping: DAMPING,
            restitution: RESTITUTION,
            wall_retention: WALL_ENERGY_RETENTION,
            rest_speed: REST_SPEED,
            launch_threshold: LAUNCH_THRESHOLD,
            launch_transfer: LAUNCH_TRANSFER,
            launch_retention: LAUNCH_RETENTION,
            max_throw_speed: MAX_THROW_SPEED,

            suction_speed: SUCTION_SPEED,
            portal_entrance: Vec2::new(32.5, screen.y / 2.0),
            portal_tolerance: Vec2::new(12.5, 40.0),
            stagger_delay: STAGGER_DELAY,
            chain_gap: CHAIN_GAP,
            edge_grace: EDGE_GRACE,
            validation_delay: VALIDATION_DELAY,

            time_limit: COMPETITIVE_TIME_LIMIT,

            seed: 0x5EED,
        }
    }
}

impl Settings {
    /// Preset for a level's mode combination
    pub fn for_mode(link_mode: LinkMode, game_mode: GameMode) -> Self {
        let mut settings = Self {
            link_mode,
            game_mode,
            ..Self::default()
        };
        // Timed levels take place in space
        if game_mode.is_timed() {
            settings.physics_mode = PhysicsMode::Floating;
        }
        settings
    }

    /// Parse settings from JSON, missing fields are an error
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Whether velocity decays this mode
    pub fn damped(&self) -> bool {
        self.physics_mode == PhysicsMode::Damped
    }

    /// Minimum center distance between two nodes
    pub fn contact_distance(&self) -> f32 {
        self.node_radius * 2.0
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "galist_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(settings) = Self::from_json(&json) {
                    log::info!("Loaded settings from LocalStorage");
                    return settings;
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = self.to_json() {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
