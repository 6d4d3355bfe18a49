//! Game session
//!
//! Owns everything one level needs: the world, the portal, the loaded
//! exercise, the clock and the launch RNG. Nothing lives in module-level
//! state, so switching exercises is a matter of resetting this object.
//!
//! Each step runs physics, then contact linking, then the portal, in that
//! order.

use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::actions::{self, RngState};
use super::physics::{PointerTracker, drag_to, tick};
use super::state::{EdgeId, Node, NodeId, World};
use super::suction::{Suction, SuctionEvent, SuctionPhase};
use crate::consts::{MAX_SUBSTEPS, SIM_DT};
use crate::error::ActionError;
use crate::settings::Settings;
use crate::validate::{ExpectedStructure, ProgressReport, ValidationResult, progress_report, validate};

/// Longest single step; larger or non-finite dt is clamped
const MAX_STEP: f32 = 0.1;

/// Score handed to the external leaderboard after a correct timed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub score: u32,
    pub time_elapsed: Duration,
}

/// Output of a step, for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    Linked(EdgeId),
    Suction(SuctionEvent),
    TimeExpired,
    Leaderboard(LeaderboardEntry),
}

/// Competitive countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Countdown {
    remaining: Duration,
    elapsed: Duration,
    running: bool,
}

impl Countdown {
    fn new(limit: Duration) -> Self {
        Self {
            remaining: limit,
            elapsed: Duration::ZERO,
            running: true,
        }
    }

    /// Returns true on the step the countdown hits zero
    fn advance(&mut self, dt: Duration) -> bool {
        if !self.running {
            return false;
        }
        self.elapsed += dt;
        self.remaining = self.remaining.saturating_sub(dt);
        if self.remaining.is_zero() {
            self.running = false;
            return true;
        }
        false
    }
}

/// One level being played
#[derive(Debug, Clone)]
pub struct GameSession {
    settings: Settings,
    world: World,
    suction: Suction,
    exercise: Option<ExpectedStructure>,
    rng: RngState,
    /// Simulation clock
    clock: Duration,
    accumulator: f32,
    pointer: PointerTracker,
    dragged: Option<NodeId>,
    countdown: Option<Countdown>,
    time_expired: bool,
    last_result: Option<ValidationResult>,
}

impl GameSession {
    pub fn new(settings: Settings, exercise: Option<ExpectedStructure>) -> Self {
        let countdown = settings.game_mode.is_timed().then(|| Countdown::new(settings.time_limit));
        Self {
            world: World::new(settings.link_mode),
            suction: Suction::new(&settings),
            rng: RngState::new(settings.seed),
            exercise,
            clock: Duration::ZERO,
            accumulator: 0.0,
            pointer: PointerTracker::default(),
            dragged: None,
            countdown,
            time_expired: false,
            last_result: None,
            settings,
        }
    }

    // === Read access ===

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn exercise(&self) -> Option<&ExpectedStructure> {
        self.exercise.as_ref()
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn portal_phase(&self) -> SuctionPhase {
        self.suction.phase()
    }

    pub fn suction(&self) -> &Suction {
        &self.suction
    }

    pub fn last_result(&self) -> Option<&ValidationResult> {
        self.last_result.as_ref()
    }

    /// Time left on the competitive countdown
    pub fn time_remaining(&self) -> Option<Duration> {
        self.countdown.map(|c| c.remaining)
    }

    pub fn is_time_expired(&self) -> bool {
        self.time_expired
    }

    // === Loop ===

    /// Feed a variable frame time, running fixed steps
    pub fn advance(&mut self, frame_dt: f32) -> Vec<SessionEvent> {
        if frame_dt.is_finite() {
            self.accumulator += frame_dt.clamp(0.0, MAX_STEP);
        }
        let mut events = Vec::new();
        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            events.extend(self.step(SIM_DT));
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        events
    }

    /// One simulation step
    pub fn step(&mut self, dt: f32) -> Vec<SessionEvent> {
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_STEP) } else { 0.0 };
        let dt_duration = Duration::from_secs_f32(dt);
        self.clock += dt_duration;
        let mut events = Vec::new();

        let contacts = tick(self.world.nodes_mut(), self.suction.sucking(), dt, &self.settings);
        if !self.suction.is_active() && !self.time_expired {
            let linked = actions::link_on_contact(&mut self.world, self.settings.game_mode, &contacts);
            events.extend(linked.into_iter().map(SessionEvent::Linked));
        }

        for event in self
            .suction
            .advance(&mut self.world, self.clock, dt, self.exercise.as_ref())
        {
            if let SuctionEvent::Completed(result) = &event {
                self.on_result(result, &mut events);
            }
            events.push(SessionEvent::Suction(event));
        }

        if let Some(countdown) = self.countdown.as_mut() {
            if countdown.advance(dt_duration) {
                log::info!("time expired");
                self.time_expired = true;
                events.push(SessionEvent::TimeExpired);
                if let Some(event) = self.suction.close(&mut self.world) {
                    events.push(SessionEvent::Suction(event));
                }
            }
        }
        events
    }

    fn on_result(&mut self, result: &ValidationResult, events: &mut Vec<SessionEvent>) {
        self.last_result = Some(result.clone());
        let Some(countdown) = self.countdown.as_mut() else {
            return;
        };
        if result.is_correct && countdown.running {
            countdown.running = false;
            let entry = LeaderboardEntry {
                score: result.score,
                time_elapsed: countdown.elapsed,
            };
            log::info!("leaderboard entry: {} in {:?}", entry.score, entry.time_elapsed);
            events.push(SessionEvent::Leaderboard(entry));
        }
    }

    // === Exercise and portal ===

    /// Switch exercise. Cancels any extraction and clears the world.
    pub fn load_exercise(&mut self, exercise: ExpectedStructure) -> Option<SuctionEvent> {
        let cancelled = self.suction.close(&mut self.world);
        self.world.clear();
        self.exercise = Some(exercise);
        self.dragged = None;
        self.pointer = PointerTracker::default();
        self.last_result = None;
        self.time_expired = false;
        self.countdown = self
            .settings
            .game_mode
            .is_timed()
            .then(|| Countdown::new(self.settings.time_limit));
        log::info!("exercise loaded");
        cancelled
    }

    pub fn open_portal(&mut self) -> Result<SuctionEvent, ActionError> {
        self.ensure_playable()?;
        self.drag_cancel();
        self.suction.open(&self.world, self.clock).ok_or(ActionError::PortalBusy)
    }

    pub fn close_portal(&mut self) -> Option<SuctionEvent> {
        self.suction.close(&mut self.world)
    }

    /// Countdown adjustment from pickups; positive adds time
    pub fn adjust_time(&mut self, delta_secs: f32) {
        if !delta_secs.is_finite() {
            log::warn!("ignoring time adjustment of {delta_secs}");
            return;
        }
        if let Some(countdown) = self.countdown.as_mut().filter(|c| c.running) {
            // Finite but too large for a Duration saturates
            let delta = Duration::try_from_secs_f32(delta_secs.abs()).unwrap_or(Duration::MAX);
            countdown.remaining = if delta_secs >= 0.0 {
                countdown.remaining.saturating_add(delta)
            } else {
                countdown.remaining.saturating_sub(delta)
            };
        }
    }

    /// Score the live world without the portal (no entry-order bonus)
    pub fn validate_now(&self) -> ValidationResult {
        validate(
            self.world.nodes(),
            self.world.edges(),
            None,
            self.exercise.as_ref(),
            self.world.link_mode,
        )
    }

    pub fn progress(&self) -> Option<ProgressReport> {
        let exercise = self.exercise.as_ref()?;
        Some(progress_report(
            self.world.nodes(),
            self.world.edges(),
            exercise,
            self.world.link_mode,
        ))
    }

    // === Actions ===

    fn ensure_playable(&self) -> Result<(), ActionError> {
        if self.time_expired {
            return Err(ActionError::TimeUp);
        }
        if self.suction.is_active() {
            return Err(ActionError::PortalBusy);
        }
        Ok(())
    }

    fn rejected<T>(result: Result<T, ActionError>, action: &str) -> Result<T, ActionError> {
        if let Err(err) = &result {
            log::warn!("{action} rejected: {err}");
        }
        result
    }

    pub fn spawn(&mut self, address: &str, value: &str, pos: Vec2) -> Result<NodeId, ActionError> {
        let result = self
            .ensure_playable()
            .and_then(|_| actions::spawn(&mut self.world, address, value, pos));
        Self::rejected(result, "spawn")
    }

    pub fn launch(&mut self, address: &str, value: &str) -> Result<NodeId, ActionError> {
        let result = self
            .ensure_playable()
            .and_then(|_| actions::launch(&mut self.world, &self.settings, &mut self.rng, address, value));
        Self::rejected(result, "launch")
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<EdgeId, ActionError> {
        let result = self
            .ensure_playable()
            .and_then(|_| actions::connect(&mut self.world, self.settings.game_mode, from, to));
        Self::rejected(result, "connect")
    }

    pub fn connect_to_address(&mut self, from: NodeId, address: &str) -> Result<EdgeId, ActionError> {
        let result = self.ensure_playable().and_then(|_| {
            actions::connect_to_address(&mut self.world, self.settings.game_mode, from, address)
        });
        Self::rejected(result, "connect")
    }

    pub fn disconnect(&mut self, from: NodeId) -> Result<NodeId, ActionError> {
        let result = self
            .ensure_playable()
            .and_then(|_| actions::disconnect(&mut self.world, from));
        Self::rejected(result, "disconnect")
    }

    pub fn delete(&mut self, id: NodeId) -> Result<Node, ActionError> {
        let result = self.ensure_playable().and_then(|_| actions::delete(&mut self.world, id));
        if result.is_ok() && self.dragged == Some(id) {
            self.dragged = None;
        }
        Self::rejected(result, "delete")
    }

    pub fn insert_at_head(&mut self, address: &str, value: &str) -> Result<NodeId, ActionError> {
        let result = self
            .ensure_playable()
            .and_then(|_| actions::insert_at_head(&mut self.world, &self.settings, address, value));
        Self::rejected(result, "insert at head")
    }

    pub fn insert_at_tail(&mut self, address: &str, value: &str) -> Result<NodeId, ActionError> {
        let result = self
            .ensure_playable()
            .and_then(|_| actions::insert_at_tail(&mut self.world, &self.settings, address, value));
        Self::rejected(result, "insert at tail")
    }

    pub fn insert_at_index(&mut self, index: usize, address: &str, value: &str) -> Result<NodeId, ActionError> {
        let result = self
            .ensure_playable()
            .and_then(|_| actions::insert_at_index(&mut self.world, &self.settings, index, address, value));
        Self::rejected(result, "insert at index")
    }

    pub fn enqueue(&mut self, address: &str, value: &str) -> Result<NodeId, ActionError> {
        let result = self
            .ensure_playable()
            .and_then(|_| actions::enqueue(&mut self.world, &self.settings, address, value));
        Self::rejected(result, "enqueue")
    }

    pub fn dequeue(&mut self) -> Result<(i64, String), ActionError> {
        let result = self.ensure_playable().and_then(|_| actions::dequeue(&mut self.world));
        Self::rejected(result, "dequeue")
    }

    pub fn peek(&self) -> Result<&Node, ActionError> {
        actions::peek(&self.world)
    }

    // === Drag ===

    /// Grab a node. `at` is the pointer event time.
    pub fn drag_begin(&mut self, id: NodeId, pointer: Vec2, at: Duration) -> Result<(), ActionError> {
        self.ensure_playable()?;
        let node = self.world.node_mut(id).ok_or(ActionError::NodeNotFound(id))?;
        if node.flags.sucking {
            return Err(ActionError::PortalBusy);
        }
        node.flags.dragged = true;
        node.vel = Vec2::ZERO;
        self.dragged = Some(id);
        self.pointer.begin(pointer, at);
        Ok(())
    }

    /// Follow the pointer, clamped against panels and other nodes
    pub fn drag_move(&mut self, pointer: Vec2, at: Duration) -> Option<Vec2> {
        let id = self.dragged?;
        self.pointer.record(pointer, at);
        drag_to(self.world.nodes_mut(), id, pointer, &self.settings)
    }

    /// Let go, throwing the node with the recent pointer velocity
    pub fn drag_end(&mut self) -> Option<Vec2> {
        let id = self.dragged.take()?;
        let velocity = self.pointer.release(self.settings.max_throw_speed);
        let node = self.world.node_mut(id)?;
        node.flags.dragged = false;
        node.vel = velocity;
        Some(velocity)
    }

    fn drag_cancel(&mut self) {
        if let Some(id) = self.dragged.take() {
            if let Some(node) = self.world.node_mut(id) {
                node.flags.dragged = false;
            }
        }
        self.pointer = PointerTracker::default();
    }
}
