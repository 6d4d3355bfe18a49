//! End-to-end portal runs through `GameSession`.

use galist::consts::SIM_DT;
use galist::sim::{GameSession, NodeId, SessionEvent, SuctionEvent, SuctionPhase};
use galist::{ExpectedNode, ExpectedStructure, GameMode, LinkMode, Settings, ValidationResult};
use glam::Vec2;

fn exercise(values: &[i64]) -> ExpectedStructure {
    ExpectedStructure::new(values.iter().map(|v| ExpectedNode::new(*v, format!("0x{v:X}"))).collect())
}

fn open_arena(link_mode: LinkMode) -> Settings {
    Settings {
        obstacles: Vec::new(),
        ..Settings::for_mode(link_mode, GameMode::Construction)
    }
}

/// Spawn the exercise's nodes in a row, left to right
fn spawn_row(session: &mut GameSession, values: &[i64]) -> Vec<NodeId> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            session
                .spawn(&format!("0x{v:X}"), &v.to_string(), Vec2::new(300.0 + 100.0 * i as f32, 360.0))
                .unwrap()
        })
        .collect()
}

/// Step until the portal reports a result, collecting everything seen
fn run_until_complete(session: &mut GameSession, max_steps: usize) -> (Vec<SessionEvent>, Option<ValidationResult>) {
    let mut events = Vec::new();
    for _ in 0..max_steps {
        for event in session.step(SIM_DT) {
            let done = match &event {
                SessionEvent::Suction(SuctionEvent::Completed(result)) => Some(result.clone()),
                _ => None,
            };
            events.push(event);
            if done.is_some() {
                return (events, done);
            }
        }
    }
    (events, None)
}

fn entered(events: &[SessionEvent]) -> Vec<(NodeId, usize)> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Suction(SuctionEvent::NodeEntered { id, position }) => Some((*id, *position)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_correct_list_drains_head_first() {
    let values = [10, 20, 30];
    let mut session = GameSession::new(open_arena(LinkMode::Singly), Some(exercise(&values)));
    let ids = spawn_row(&mut session, &values);
    session.connect(ids[0], ids[1]).unwrap();
    session.connect(ids[1], ids[2]).unwrap();

    assert!(matches!(session.open_portal(), Ok(SuctionEvent::Opened { .. })));
    let (events, result) = run_until_complete(&mut session, 60 * 15);
    let result = result.expect("portal should finish");

    assert_eq!(entered(&events), vec![(ids[0], 1), (ids[1], 2), (ids[2], 3)]);
    assert!(result.is_correct);
    assert_eq!(result.score, 120);
    assert_eq!(result.total_points, 120);
    assert_eq!(session.portal_phase(), SuctionPhase::Complete);
    assert!(session.world().is_empty());
    assert!(session.world().edges().is_empty());
}

#[test]
fn test_reversed_links_lose_structure_points() {
    let values = [1, 2, 3];
    let mut session = GameSession::new(open_arena(LinkMode::Singly), Some(exercise(&values)));
    let ids = spawn_row(&mut session, &values);
    session.connect(ids[2], ids[1]).unwrap();
    session.connect(ids[1], ids[0]).unwrap();

    session.open_portal().unwrap();
    let (events, result) = run_until_complete(&mut session, 60 * 15);
    let result = result.unwrap();

    // The chain is walked from its actual head, the node holding 3
    assert_eq!(entered(&events)[0].0, ids[2]);
    assert!(!result.is_correct);
    assert_eq!(result.score, 60);
    assert_eq!(result.message, "Head node error!");
}

#[test]
fn test_doubly_list_scores_through_portal() {
    let values = [4, 8];
    let mut session = GameSession::new(open_arena(LinkMode::Doubly), Some(exercise(&values)));
    let ids = spawn_row(&mut session, &values);
    session.connect(ids[0], ids[1]).unwrap();
    assert_eq!(session.world().edges().len(), 2);

    session.open_portal().unwrap();
    let (_, result) = run_until_complete(&mut session, 60 * 15);
    assert_eq!(result.unwrap().score, 120);
}

#[test]
fn test_exercise_switch_cancels_pending_validation() {
    let values = [1, 2, 3];
    let mut session = GameSession::new(open_arena(LinkMode::Singly), Some(exercise(&values)));
    let ids = spawn_row(&mut session, &values);
    session.connect(ids[0], ids[1]).unwrap();
    session.connect(ids[1], ids[2]).unwrap();
    session.open_portal().unwrap();

    // Wait for the first node to go in, then switch mid-extraction
    let mut first_entry = false;
    for _ in 0..(60 * 10) {
        if !entered(&session.step(SIM_DT)).is_empty() {
            first_entry = true;
            break;
        }
    }
    assert!(first_entry);
    assert_eq!(session.load_exercise(exercise(&[7])), Some(SuctionEvent::Cancelled));

    let (events, result) = run_until_complete(&mut session, 60 * 15);
    assert!(result.is_none());
    assert!(entered(&events).is_empty());
    assert!(session.last_result().is_none());
    assert_eq!(session.portal_phase(), SuctionPhase::Closed);
}

#[test]
fn test_close_mid_extraction_then_reopen() {
    let values = [1, 2, 3];
    let mut session = GameSession::new(open_arena(LinkMode::Singly), Some(exercise(&values)));
    let ids = spawn_row(&mut session, &values);
    session.connect(ids[0], ids[1]).unwrap();
    session.connect(ids[1], ids[2]).unwrap();
    session.open_portal().unwrap();

    for _ in 0..(60 * 10) {
        if !entered(&session.step(SIM_DT)).is_empty() {
            break;
        }
    }
    assert_eq!(session.close_portal(), Some(SuctionEvent::Cancelled));

    // The extracted head's edge is gone; the rest of the list stays put
    assert_eq!(session.world().len(), 2);
    assert!(!session.world().contains(ids[0]));
    assert_eq!(session.world().edges().len(), 1);
    assert!(session.world().nodes().iter().all(|n| !n.flags.sucking));
    assert!(session.world().is_head(ids[1]));
    assert!(session.connect(ids[1], ids[2]).is_err());

    // A fresh run snapshots what is left
    session.open_portal().unwrap();
    let (_, result) = run_until_complete(&mut session, 60 * 15);
    let result = result.unwrap();
    assert!(!result.is_correct);
    assert_eq!(result.message, "Wrong number of nodes!");
    assert_eq!(result.score, 0);
}

#[test]
fn test_empty_world_validates_immediately() {
    let mut session = GameSession::new(open_arena(LinkMode::Singly), Some(exercise(&[5])));
    session.open_portal().unwrap();
    let (events, result) = run_until_complete(&mut session, 60);
    assert!(entered(&events).is_empty());
    assert_eq!(result.unwrap().message, "Wrong number of nodes!");
}

#[test]
fn test_events_serialize_for_the_presentation_layer() {
    let mut session = GameSession::new(open_arena(LinkMode::Singly), Some(exercise(&[5])));
    spawn_row(&mut session, &[5]);
    session.open_portal().unwrap();
    let (events, result) = run_until_complete(&mut session, 60 * 10);
    assert!(result.unwrap().is_correct);

    let json = serde_json::to_string(&events).unwrap();
    assert!(json.contains("NodeEntered"));
    assert!(json.contains("Completed"));
    assert!(json.contains("Perfect!"));
}
