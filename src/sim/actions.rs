//! User actions
//!
//! Every action is checked against the world's invariants before anything is
//! mutated; a rejected action leaves the world untouched. Queue operations
//! work on the primary chain (the chain of the first head by id).

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::physics::{Contact, is_valid_position};
use super::state::{EdgeId, Node, NodeId, World};
use crate::error::ActionError;
use crate::settings::{GameMode, Settings};

/// Launch velocity ranges in pixels per reference frame
const LAUNCH_VX: std::ops::Range<f32> = 8.0..13.0;
const LAUNCH_VY: std::ops::Range<f32> = 5.0..8.0;
/// Reference frames per second
const FRAME_RATE: f32 = 60.0;

/// Seeded launch jitter. Each draw reseeds from `(seed, draws)` so the
/// state serializes as two integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub draws: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, draws: 0 }
    }

    fn next_rng(&mut self) -> Pcg32 {
        let rng = Pcg32::new(self.seed, self.draws.wrapping_mul(2).wrapping_add(1));
        self.draws += 1;
        rng
    }

    /// Velocity for a node leaving the launcher: up and to the left
    pub fn launch_velocity(&mut self) -> Vec2 {
        let mut rng = self.next_rng();
        let vx = rng.random_range(LAUNCH_VX);
        let vy = rng.random_range(LAUNCH_VY);
        Vec2::new(-vx, -vy) * FRAME_RATE
    }
}

/// Parse a value typed by the player
pub fn parse_value(raw: &str) -> Result<i64, ActionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ActionError::EmptyValue);
    }
    trimmed
        .parse()
        .map_err(|_| ActionError::InvalidValue(trimmed.to_string()))
}

/// Check an address typed by the player is non-empty and unused
pub fn check_address(world: &World, raw: &str) -> Result<String, ActionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ActionError::EmptyAddress);
    }
    if world.find_by_address(trimmed).is_some() {
        return Err(ActionError::DuplicateAddress(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

fn require(world: &World, id: NodeId) -> Result<(), ActionError> {
    if world.contains(id) {
        Ok(())
    } else {
        Err(ActionError::NodeNotFound(id))
    }
}

fn require_free_linking(mode: GameMode, action: &'static str) -> Result<(), ActionError> {
    if mode.allows_free_linking() {
        Ok(())
    } else {
        Err(ActionError::ModeRestricted(action))
    }
}

/// Place a new node at `pos`
pub fn spawn(world: &mut World, address: &str, value: &str, pos: Vec2) -> Result<NodeId, ActionError> {
    let value = parse_value(value)?;
    let address = check_address(world, address)?;
    let id = world.insert_node(address, value, pos);
    log::debug!("spawned node {:?} ({})", id, value);
    Ok(id)
}

/// Shoot a new node from the launcher
pub fn launch(
    world: &mut World,
    settings: &Settings,
    rng: &mut RngState,
    address: &str,
    value: &str,
) -> Result<NodeId, ActionError> {
    let id = spawn(world, address, value, settings.launcher)?;
    let vel = rng.launch_velocity();
    if let Some(node) = world.node_mut(id) {
        node.vel = vel;
        node.flags.launched = true;
    }
    Ok(id)
}

/// Point `from.next` at `to`
pub fn connect(world: &mut World, mode: GameMode, from: NodeId, to: NodeId) -> Result<EdgeId, ActionError> {
    require_free_linking(mode, "connect")?;
    require(world, from)?;
    require(world, to)?;
    if from == to {
        return Err(ActionError::SelfLoop);
    }
    if world.graph().next_of(from).is_some() {
        return Err(ActionError::AlreadyLinked(from));
    }
    Ok(world.link(from, to))
}

/// Point `from.next` at the node holding `address`
pub fn connect_to_address(
    world: &mut World,
    mode: GameMode,
    from: NodeId,
    address: &str,
) -> Result<EdgeId, ActionError> {
    let to = world
        .find_by_address(address.trim())
        .map(|n| n.id)
        .ok_or_else(|| ActionError::AddressNotFound(address.trim().to_string()))?;
    connect(world, mode, from, to)
}

/// Clear `from.next`, returning the old target
pub fn disconnect(world: &mut World, from: NodeId) -> Result<NodeId, ActionError> {
    require(world, from)?;
    world.unlink(from).ok_or(ActionError::NotLinked(from))
}

/// Remove a node and every pointer touching it
pub fn delete(world: &mut World, id: NodeId) -> Result<Node, ActionError> {
    world.remove_node(id).ok_or(ActionError::NodeNotFound(id))
}

/// Free spot next to `anchor`, trying the preferred side first
fn place_near(world: &World, settings: &Settings, anchor: Vec2, side: f32) -> Vec2 {
    let gap = settings.contact_distance() + 10.0;
    let offsets = [
        Vec2::new(side * gap, 0.0),
        Vec2::new(0.0, gap),
        Vec2::new(0.0, -gap),
        Vec2::new(-side * gap, 0.0),
    ];
    // Any id works: a fresh node is not in the world yet
    let unplaced = NodeId(u32::MAX);
    offsets
        .iter()
        .map(|o| anchor + *o)
        .find(|p| is_valid_position(world.nodes(), unplaced, *p, settings))
        .unwrap_or(anchor + offsets[0])
}

/// Position of the node at one end of the primary chain
fn end_position(world: &World, chain: &[NodeId], head: bool) -> Option<Vec2> {
    let id = if head { chain.first() } else { chain.last() }?;
    world.node(*id).map(|n| n.pos)
}

/// New node becomes the head of the primary chain
pub fn insert_at_head(
    world: &mut World,
    settings: &Settings,
    address: &str,
    value: &str,
) -> Result<NodeId, ActionError> {
    require_free_linking(settings.game_mode, "insert at head")?;
    let chain = world.primary_chain();
    let pos = end_position(world, &chain, true)
        .map(|p| place_near(world, settings, p, -1.0))
        .unwrap_or(settings.launcher);
    let id = spawn(world, address, value, pos)?;
    if let Some(head) = chain.first() {
        world.link(id, *head);
    }
    Ok(id)
}

/// New node becomes the tail of the primary chain
pub fn insert_at_tail(
    world: &mut World,
    settings: &Settings,
    address: &str,
    value: &str,
) -> Result<NodeId, ActionError> {
    let chain = world.primary_chain();
    let pos = end_position(world, &chain, false)
        .map(|p| place_near(world, settings, p, 1.0))
        .unwrap_or(settings.launcher);
    let id = spawn(world, address, value, pos)?;
    if let Some(tail) = chain.last() {
        world.link(*tail, id);
    }
    Ok(id)
}

/// New node lands at `index` in the primary chain (0 = head, len = tail)
pub fn insert_at_index(
    world: &mut World,
    settings: &Settings,
    index: usize,
    address: &str,
    value: &str,
) -> Result<NodeId, ActionError> {
    require_free_linking(settings.game_mode, "insert at index")?;
    let chain = world.primary_chain();
    if index > chain.len() {
        return Err(ActionError::IndexOutOfRange {
            index,
            len: chain.len(),
        });
    }
    if index == 0 {
        return insert_at_head(world, settings, address, value);
    }
    if index == chain.len() {
        return insert_at_tail(world, settings, address, value);
    }

    let (prev, next) = (chain[index - 1], chain[index]);
    let anchor = match (world.node(prev), world.node(next)) {
        (Some(a), Some(b)) => (a.pos + b.pos) * 0.5,
        _ => settings.launcher,
    };
    let pos = place_near(world, settings, anchor, 1.0);
    // Validate input before touching pointers
    let id = spawn(world, address, value, pos)?;
    world.unlink(prev);
    world.link(prev, id);
    world.link(id, next);
    Ok(id)
}

/// Queue push: same as insert at tail, allowed in every mode
pub fn enqueue(world: &mut World, settings: &Settings, address: &str, value: &str) -> Result<NodeId, ActionError> {
    insert_at_tail(world, settings, address, value)
}

/// Queue pop: remove the head and return its `(value, address)`
pub fn dequeue(world: &mut World) -> Result<(i64, String), ActionError> {
    let head = *world.primary_chain().first().ok_or(ActionError::EmptyList)?;
    let node = world.remove_node(head).ok_or(ActionError::NodeNotFound(head))?;
    log::debug!("dequeued {} from {}", node.value, node.address);
    Ok((node.value, node.address))
}

/// The head of the primary chain, left in place
pub fn peek(world: &World) -> Result<&Node, ActionError> {
    let head = *world.primary_chain().first().ok_or(ActionError::EmptyList)?;
    world.node(head).ok_or(ActionError::NodeNotFound(head))
}

/// Link nodes that touched this tick.
///
/// Only a launched node that has no pointers yet links:
/// - hitting a tail appends it (`tail -> launched`)
/// - hitting a head prepends it (`launched -> head`), except in queue mode
/// - hitting another bare node while the world has no pointers at all
///   starts a list (`launched -> other`)
///
/// Linking clears the launched flag. Returns the new `next` edges.
pub fn link_on_contact(world: &mut World, mode: GameMode, contacts: &[Contact]) -> Vec<EdgeId> {
    let mut linked = Vec::new();
    for contact in contacts {
        let shooter = contact.launched.or_else(|| {
            [contact.a, contact.b]
                .into_iter()
                .find(|id| world.node(*id).is_some_and(|n| n.flags.launched))
        });
        let Some(shooter) = shooter else {
            continue;
        };
        let target = contact.other(shooter);
        if !world.contains(shooter) || !world.contains(target) {
            continue;
        }
        let graph = world.graph();
        if graph.has_edges(shooter) {
            continue;
        }
        let (tail, head, bare) = (graph.is_tail(target), graph.is_head(target), !graph.has_edges(target));

        let edge = if tail {
            Some(world.link(target, shooter))
        } else if head && mode.allows_free_linking() {
            Some(world.link(shooter, target))
        } else if bare && world.edges().is_empty() {
            Some(world.link(shooter, target))
        } else {
            None
        };

        if let Some(edge) = edge {
            if let Some(node) = world.node_mut(shooter) {
                node.flags.launched = false;
            }
            log::debug!("contact linked {:?} with {:?}", shooter, target);
            linked.push(edge);
        }
    }
    linked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LinkMode;

    fn settings() -> Settings {
        Settings::default()
    }

    fn build(world: &mut World, values: &[i64]) -> Vec<NodeId> {
        let settings = settings();
        values
            .iter()
            .map(|v| insert_at_tail(world, &settings, &format!("a{v}"), &v.to_string()).unwrap())
            .collect()
    }

    fn values(world: &World) -> Vec<i64> {
        world
            .primary_chain()
            .iter()
            .filter_map(|id| world.node(*id))
            .map(|n| n.value)
            .collect()
    }

    #[test]
    fn test_input_rejections() {
        let mut world = World::default();
        spawn(&mut world, "ab7", "10", Vec2::new(400.0, 300.0)).unwrap();

        assert_eq!(
            spawn(&mut world, "ab7", "20", Vec2::ZERO),
            Err(ActionError::DuplicateAddress("ab7".to_string()))
        );
        assert_eq!(spawn(&mut world, "  ", "20", Vec2::ZERO), Err(ActionError::EmptyAddress));
        assert_eq!(spawn(&mut world, "x", "", Vec2::ZERO), Err(ActionError::EmptyValue));
        assert_eq!(
            spawn(&mut world, "x", "ten", Vec2::ZERO),
            Err(ActionError::InvalidValue("ten".to_string()))
        );
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_connect_rules() {
        let mut world = World::default();
        let a = spawn(&mut world, "a", "1", Vec2::new(200.0, 300.0)).unwrap();
        let b = spawn(&mut world, "b", "2", Vec2::new(400.0, 300.0)).unwrap();
        let c = spawn(&mut world, "c", "3", Vec2::new(600.0, 300.0)).unwrap();
        let mode = GameMode::Construction;

        assert_eq!(connect(&mut world, mode, a, a), Err(ActionError::SelfLoop));
        connect(&mut world, mode, a, b).unwrap();
        assert_eq!(connect(&mut world, mode, a, c), Err(ActionError::AlreadyLinked(a)));
        connect_to_address(&mut world, mode, b, "c").unwrap();
        assert_eq!(world.chain_order(c), vec![a, b, c]);
        assert_eq!(
            connect_to_address(&mut world, mode, c, "zz"),
            Err(ActionError::AddressNotFound("zz".to_string()))
        );
        assert_eq!(
            connect(&mut world, GameMode::QueueOnly, c, a),
            Err(ActionError::ModeRestricted("connect"))
        );

        assert_eq!(disconnect(&mut world, a), Ok(b));
        assert_eq!(disconnect(&mut world, a), Err(ActionError::NotLinked(a)));
    }

    #[test]
    fn test_insert_operations_keep_a_single_chain() {
        let mut world = World::default();
        let settings = settings();
        build(&mut world, &[2, 4]);
        insert_at_head(&mut world, &settings, "h", "1").unwrap();
        insert_at_index(&mut world, &settings, 2, "m", "3").unwrap();
        insert_at_index(&mut world, &settings, 4, "t", "5").unwrap();
        assert_eq!(values(&world), vec![1, 2, 3, 4, 5]);
        assert_eq!(world.edges().len(), 4);

        assert_eq!(
            insert_at_index(&mut world, &settings, 9, "x", "9"),
            Err(ActionError::IndexOutOfRange { index: 9, len: 5 })
        );
    }

    #[test]
    fn test_doubly_insert_repairs_both_pointers() {
        let mut world = World::new(LinkMode::Doubly);
        let settings = Settings::for_mode(LinkMode::Doubly, GameMode::Construction);
        build(&mut world, &[1, 3]);
        insert_at_index(&mut world, &settings, 1, "m", "2").unwrap();
        assert_eq!(values(&world), vec![1, 2, 3]);
        // Two next pointers, two prev pointers
        assert_eq!(world.edges().len(), 4);
    }

    #[test]
    fn test_queue_fifo() {
        let mut world = World::default();
        let settings = Settings::for_mode(LinkMode::Singly, GameMode::QueueOnly);
        assert_eq!(dequeue(&mut world), Err(ActionError::EmptyList));
        for v in [7, 8, 9] {
            enqueue(&mut world, &settings, &format!("q{v}"), &v.to_string()).unwrap();
        }
        assert_eq!(peek(&world).map(|n| n.value), Ok(7));
        assert_eq!(dequeue(&mut world), Ok((7, "q7".to_string())));
        assert_eq!(dequeue(&mut world), Ok((8, "q8".to_string())));
        assert_eq!(values(&world), vec![9]);
        assert_eq!(
            insert_at_head(&mut world, &settings, "h", "1"),
            Err(ActionError::ModeRestricted("insert at head"))
        );
    }

    #[test]
    fn test_launch_is_seeded() {
        let settings = settings();
        let mut a = World::default();
        let mut b = World::default();
        let mut rng_a = RngState::new(42);
        let mut rng_b = RngState::new(42);
        let id_a = launch(&mut a, &settings, &mut rng_a, "x", "1").unwrap();
        let id_b = launch(&mut b, &settings, &mut rng_b, "x", "1").unwrap();
        let (na, nb) = (a.node(id_a).unwrap(), b.node(id_b).unwrap());
        assert_eq!(na.vel, nb.vel);
        assert!(na.flags.launched);
        assert!(na.vel.x <= -480.0 && na.vel.x >= -780.0);
        assert!(na.vel.y <= -300.0 && na.vel.y >= -480.0);
    }

    #[test]
    fn test_launched_node_appends_to_tail() {
        let mut world = World::default();
        let ids = build(&mut world, &[1, 2]);
        let shot = spawn(&mut world, "s", "3", Vec2::new(900.0, 300.0)).unwrap();
        world.node_mut(shot).unwrap().flags.launched = true;

        let contact = Contact {
            a: ids[1],
            b: shot,
            launched: Some(shot),
        };
        let linked = link_on_contact(&mut world, GameMode::Construction, &[contact]);
        assert_eq!(linked.len(), 1);
        assert_eq!(world.graph().next_of(ids[1]), Some(shot));
        assert!(!world.node(shot).unwrap().flags.launched);
    }

    #[test]
    fn test_launched_node_prepends_to_head_outside_queue_mode() {
        let mut world = World::default();
        let ids = build(&mut world, &[1, 2]);
        let shot = spawn(&mut world, "s", "0", Vec2::new(900.0, 300.0)).unwrap();
        world.node_mut(shot).unwrap().flags.launched = true;
        let contact = Contact {
            a: shot,
            b: ids[0],
            launched: None,
        };

        assert!(link_on_contact(&mut world, GameMode::QueueOnly, &[contact]).is_empty());
        link_on_contact(&mut world, GameMode::Construction, &[contact]);
        assert_eq!(world.chain_order(ids[1]), vec![shot, ids[0], ids[1]]);
    }

    #[test]
    fn test_first_contact_starts_a_list() {
        let mut world = World::default();
        let a = spawn(&mut world, "a", "1", Vec2::new(200.0, 300.0)).unwrap();
        let b = spawn(&mut world, "b", "2", Vec2::new(400.0, 300.0)).unwrap();
        world.node_mut(b).unwrap().flags.launched = true;

        let contact = Contact { a, b, launched: None };
        link_on_contact(&mut world, GameMode::Construction, &[contact]);
        assert_eq!(world.graph().next_of(b), Some(a));

        // Plain bumps never link
        let c = spawn(&mut world, "c", "3", Vec2::new(600.0, 300.0)).unwrap();
        let bump = Contact { a: c, b: a, launched: None };
        assert!(link_on_contact(&mut world, GameMode::Construction, &[bump]).is_empty());
    }
}
