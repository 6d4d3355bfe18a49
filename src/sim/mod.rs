//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod actions;
pub mod collision;
pub mod graph;
pub mod physics;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod suction;

pub use actions::RngState;
pub use collision::{CollisionResult, Rect, RectSide, circle_circle_collision, resolve_circle_rect};
pub use graph::{GraphIndex, NodeRole};
pub use physics::{Contact, PointerTracker, clamp_drag, drag_to, is_valid_position, tick};
pub use scheduler::{Epoch, Scheduler};
pub use session::{GameSession, LeaderboardEntry, SessionEvent};
pub use state::{Edge, EdgeId, EdgeKind, Node, NodeFlags, NodeId, Snapshot, World};
pub use suction::{Portal, Suction, SuctionEvent, SuctionPhase, SuctionSession, SuctionTask};
