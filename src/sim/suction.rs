//! Portal suction: ordered extraction of the built structure
//!
//! `Closed -> Open -> Extracting -> Complete -> Closed`. Opening snapshots the
//! world and schedules one trigger per node, head first, through an
//! epoch-keyed scheduler. Closing advances the epoch, which cancels every
//! pending trigger, prune and validation at once.

use std::collections::HashSet;
use std::time::Duration;

use glam::Vec2;
use serde::Serialize;

use super::scheduler::Scheduler;
use super::state::{NodeId, Snapshot, World};
use crate::direction;
use crate::settings::Settings;
use crate::validate::{ExpectedStructure, ValidationResult, validate};

/// Fixed entrance nodes are pulled toward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Portal {
    pub entrance: Vec2,
    /// Half-extent of the box that counts as "inside"
    pub tolerance: Vec2,
}

impl Portal {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            entrance: settings.portal_entrance,
            tolerance: settings.portal_tolerance,
        }
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        let d = (pos - self.entrance).abs();
        d.x <= self.tolerance.x && d.y <= self.tolerance.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuctionPhase {
    #[default]
    Closed,
    /// Triggers scheduled, nothing moving yet
    Open,
    Extracting,
    /// Validation result delivered
    Complete,
}

/// Deferred work, fired by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuctionTask {
    /// Start pulling a node toward the entrance
    Trigger(NodeId),
    /// Drop edges whose endpoints have both entered
    PruneEdges,
    /// Score the snapshot
    Validate,
}

/// Something the presentation layer should react to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SuctionEvent {
    Opened { scheduled: usize },
    NodeEntered { id: NodeId, position: usize },
    EdgesPruned(usize),
    Completed(ValidationResult),
    Cancelled,
}

/// One submission in progress
#[derive(Debug, Clone, Default)]
pub struct SuctionSession {
    /// Ids in the order they reached the entrance
    pub entry_order: Vec<NodeId>,
    pub sucked: HashSet<NodeId>,
    /// World as it was when the portal opened
    pub snapshot: Snapshot,
}

/// The portal state machine
#[derive(Debug, Clone)]
pub struct Suction {
    phase: SuctionPhase,
    portal: Portal,
    speed: f32,
    stagger: Duration,
    chain_gap: Duration,
    edge_grace: Duration,
    validation_delay: Duration,
    session: Option<SuctionSession>,
    /// Nodes currently travelling
    sucking: HashSet<NodeId>,
    scheduler: Scheduler<SuctionTask>,
    validation_scheduled: bool,
}

impl Suction {
    pub fn new(settings: &Settings) -> Self {
        Self {
            phase: SuctionPhase::Closed,
            portal: Portal::from_settings(settings),
            speed: settings.suction_speed,
            stagger: settings.stagger_delay,
            chain_gap: settings.chain_gap,
            edge_grace: settings.edge_grace,
            validation_delay: settings.validation_delay,
            session: None,
            sucking: HashSet::new(),
            scheduler: Scheduler::new(),
            validation_scheduled: false,
        }
    }

    pub fn phase(&self) -> SuctionPhase {
        self.phase
    }

    pub fn portal(&self) -> &Portal {
        &self.portal
    }

    /// Whether a submission is in flight (opened and not yet scored)
    pub fn is_active(&self) -> bool {
        matches!(self.phase, SuctionPhase::Open | SuctionPhase::Extracting)
    }

    pub fn session(&self) -> Option<&SuctionSession> {
        self.session.as_ref()
    }

    pub fn entry_order(&self) -> &[NodeId] {
        match &self.session {
            Some(session) => &session.entry_order,
            None => &[],
        }
    }

    /// Nodes physics must leave alone
    pub fn sucking(&self) -> &HashSet<NodeId> {
        &self.sucking
    }

    /// Open the portal and schedule the drain.
    ///
    /// Each component drains from its head (or smallest id when it has none)
    /// at `stagger × position`; components start `chain_gap` apart. Nodes a
    /// component's chain does not reach follow its tail in id order.
    /// Reopening an active portal is a no-op.
    pub fn open(&mut self, world: &World, now: Duration) -> Option<SuctionEvent> {
        if self.is_active() {
            return None;
        }
        if self.phase == SuctionPhase::Complete {
            self.reset();
        }

        self.session = Some(SuctionSession {
            snapshot: world.snapshot(),
            ..SuctionSession::default()
        });
        self.phase = SuctionPhase::Open;

        let mut scheduled = 0;
        for (k, component) in world.components().iter().enumerate() {
            let mut order = world.component_chain(component);
            let mut rest: Vec<NodeId> = component.iter().copied().filter(|id| !order.contains(id)).collect();
            rest.sort();
            order.extend(rest);

            let start = now + self.chain_gap * k as u32;
            for (i, id) in order.into_iter().enumerate() {
                self.scheduler.schedule(start + self.stagger * i as u32, SuctionTask::Trigger(id));
                scheduled += 1;
            }
        }

        log::info!("portal opened: {} nodes scheduled", scheduled);
        Some(SuctionEvent::Opened { scheduled })
    }

    /// Close the portal, cancelling everything pending.
    ///
    /// Transient sets are cleared before returning, and edges left dangling
    /// by extracted nodes are pruned.
    pub fn close(&mut self, world: &mut World) -> Option<SuctionEvent> {
        let was_active = self.is_active();
        if self.phase == SuctionPhase::Closed {
            return None;
        }
        self.reset();
        world.clear_flags(|f| f.sucking = false);
        let pruned = world.prune_dangling();
        if pruned > 0 {
            log::debug!("pruned {} dangling edges on close", pruned);
        }
        if was_active {
            log::info!("portal closed mid-extraction");
            Some(SuctionEvent::Cancelled)
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.scheduler.advance_epoch();
        self.session = None;
        self.sucking.clear();
        self.validation_scheduled = false;
        self.phase = SuctionPhase::Closed;
    }

    /// Advance timers and sucking nodes by one step
    pub fn advance(
        &mut self,
        world: &mut World,
        now: Duration,
        dt: f32,
        expected: Option<&ExpectedStructure>,
    ) -> Vec<SuctionEvent> {
        let mut events = Vec::new();
        if self.phase == SuctionPhase::Closed {
            return events;
        }

        for task in self.scheduler.drain_due(now) {
            match task {
                SuctionTask::Trigger(id) => self.trigger(world, id),
                SuctionTask::PruneEdges => {
                    if let Some(session) = &self.session {
                        let pruned = world.remove_edges_where(|id| session.sucked.contains(&id));
                        if pruned > 0 {
                            events.push(SuctionEvent::EdgesPruned(pruned));
                        }
                    }
                }
                SuctionTask::Validate => {
                    if let Some(result) = self.complete(world, expected) {
                        events.push(SuctionEvent::Completed(result));
                    }
                }
            }
        }

        self.pull(world, now, dt, &mut events);

        if self.is_active() && world.is_empty() && !self.validation_scheduled {
            self.validation_scheduled = true;
            self.scheduler.schedule(now + self.validation_delay, SuctionTask::Validate);
            log::debug!("world drained, validating in {:?}", self.validation_delay);
        }
        events
    }

    /// Mark a node as sucking. Repeats and vanished nodes are ignored.
    fn trigger(&mut self, world: &mut World, id: NodeId) {
        let Some(session) = &self.session else {
            return;
        };
        if session.sucked.contains(&id) || self.sucking.contains(&id) {
            return;
        }
        let Some(node) = world.node_mut(id) else {
            return;
        };
        node.flags.sucking = true;
        node.flags.dragged = false;
        node.vel = Vec2::ZERO;
        self.sucking.insert(id);
        self.phase = SuctionPhase::Extracting;
        log::trace!("node {:?} is being sucked", id);
    }

    /// Move sucking nodes at constant speed; extract those inside the box
    fn pull(&mut self, world: &mut World, now: Duration, dt: f32, events: &mut Vec<SuctionEvent>) {
        let step = self.speed * dt;
        let mut arrived = Vec::new();
        for node in world.nodes_mut() {
            if !self.sucking.contains(&node.id) {
                continue;
            }
            let to_entrance = self.portal.entrance - node.pos;
            if to_entrance.length() <= step {
                node.pos = self.portal.entrance;
            } else {
                node.pos += direction(node.pos, self.portal.entrance) * step;
            }
            if self.portal.contains(node.pos) {
                arrived.push(node.id);
            }
        }

        for id in arrived {
            if let Some(event) = self.enter(world, id, now) {
                events.push(event);
            }
        }
    }

    /// Record a node reaching the entrance and take it out of the world.
    ///
    /// Idempotent: a node already in the sucked set is not recorded twice.
    fn enter(&mut self, world: &mut World, id: NodeId, now: Duration) -> Option<SuctionEvent> {
        self.sucking.remove(&id);
        let session = self.session.as_mut()?;
        if session.sucked.contains(&id) || session.entry_order.contains(&id) {
            return None;
        }
        session.sucked.insert(id);
        session.entry_order.push(id);
        let position = session.entry_order.len();

        world.extract_node(id);
        self.scheduler.schedule(now + self.edge_grace, SuctionTask::PruneEdges);
        log::debug!("node {:?} entered the portal at position {}", id, position);
        Some(SuctionEvent::NodeEntered { id, position })
    }

    /// Score the snapshot against the entry order
    fn complete(&mut self, world: &mut World, expected: Option<&ExpectedStructure>) -> Option<ValidationResult> {
        if !self.is_active() {
            return None;
        }
        let session = self.session.as_ref()?;
        let result = validate(
            &session.snapshot.nodes,
            &session.snapshot.edges,
            Some(&session.entry_order),
            expected,
            world.link_mode,
        );
        world.prune_dangling();
        self.phase = SuctionPhase::Complete;
        Some(result)
    }
}
