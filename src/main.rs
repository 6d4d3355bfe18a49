//! Galist entry point
//!
//! On the web the library is driven from JavaScript through `WebSession`.
//! Natively this runs a headless round: build a list, open the portal and
//! log the validation result.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use galist::consts::SIM_DT;
    use galist::sim::{GameSession, SessionEvent, SuctionEvent};
    use galist::{ExpectedNode, ExpectedStructure, Settings};

    galist::platform::init_logging();
    log::info!("Galist (native) starting...");
    log::info!("Interactive play needs the web build - run with `trunk serve`");

    let exercise = ExpectedStructure::new(vec![
        ExpectedNode::new(10, "0x01"),
        ExpectedNode::new(20, "0x02"),
        ExpectedNode::new(30, "0x03"),
    ]);
    let mut session = GameSession::new(Settings::default(), Some(exercise.clone()));

    for node in exercise.traversal() {
        if let Err(e) = session.insert_at_tail(&node.address, &node.value.to_string()) {
            log::error!("insert failed: {e}");
            return;
        }
    }
    log::info!("Built {} nodes, {} edges", session.world().len(), session.world().edges().len());

    if let Err(e) = session.open_portal() {
        log::error!("portal refused: {e}");
        return;
    }

    // One simulated minute is far more than a three-node drain needs
    for _ in 0..3600 {
        for event in session.advance(SIM_DT) {
            match event {
                SessionEvent::Suction(SuctionEvent::NodeEntered { id, .. }) => {
                    log::info!("node {} entered the portal", id.0);
                }
                SessionEvent::Suction(SuctionEvent::Completed(result)) => {
                    log::info!("{} ({}/{})", result.message, result.score, result.total_points);
                    for line in &result.details {
                        log::info!("  {line}");
                    }
                    return;
                }
                _ => {}
            }
        }
    }
    log::warn!("portal never completed");
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is the library's start hook, this is just to satisfy the compiler
}
