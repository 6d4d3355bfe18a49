//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Logging setup (console on web, env_logger natively)
//! - The JavaScript-facing session handle (web only)
//!
//! The presentation layer owns rendering and input capture; it drives a
//! `WebSession` with discrete actions and reads state back as JSON.

/// Initialise logging for the current platform
#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    console_error_panic_hook::set_once();
    // A second init (hot reload) is harmless
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Initialise logging for the current platform
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::try_init();
}

#[cfg(target_arch = "wasm32")]
pub use web::WebSession;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::fmt::Display;
    use std::time::Duration;

    use glam::Vec2;
    use serde::Serialize;
    use wasm_bindgen::prelude::*;

    use crate::settings::Settings;
    use crate::sim::{GameSession, NodeId};
    use crate::validate::ExpectedStructure;

    fn js_error(err: impl Display) -> JsValue {
        js_sys::Error::new(&err.to_string()).into()
    }

    fn to_json(value: &impl Serialize) -> Result<String, JsValue> {
        serde_json::to_string(value).map_err(js_error)
    }

    /// Pointer event times arrive as `performance.now()` milliseconds.
    /// Negative, non-finite or overflowing stamps read as zero.
    fn millis(ms: f64) -> Duration {
        Duration::try_from_secs_f64(ms / 1000.0).unwrap_or_default()
    }

    #[wasm_bindgen(start)]
    pub fn wasm_main() {
        super::init_logging();
        log::info!("Galist (web) ready");
    }

    /// Session handle exported to JavaScript
    #[wasm_bindgen]
    pub struct WebSession {
        inner: GameSession,
    }

    #[wasm_bindgen]
    impl WebSession {
        /// Settings JSON falls back to LocalStorage, then defaults
        #[wasm_bindgen(constructor)]
        pub fn new(settings_json: Option<String>, exercise_json: Option<String>) -> Result<WebSession, JsValue> {
            let settings = match settings_json {
                Some(json) => Settings::from_json(&json).map_err(js_error)?,
                None => Settings::load(),
            };
            let exercise = exercise_json
                .map(|json| serde_json::from_str::<ExpectedStructure>(&json))
                .transpose()
                .map_err(js_error)?;
            log::info!("session created ({:?}, {:?})", settings.link_mode, settings.game_mode);
            Ok(WebSession {
                inner: GameSession::new(settings, exercise),
            })
        }

        /// Run fixed steps for one animation frame; returns events as JSON
        pub fn advance(&mut self, frame_dt: f32) -> Result<String, JsValue> {
            let events = self.inner.advance(frame_dt);
            to_json(&events)
        }

        /// Nodes and edges for rendering
        pub fn world(&self) -> Result<String, JsValue> {
            to_json(&self.inner.world().snapshot())
        }

        /// "head", "tail", "middle" or "head/tail"
        pub fn role(&self, id: u32) -> Option<String> {
            self.inner.world().role(NodeId(id)).map(|r| r.as_str().to_string())
        }

        pub fn spawn(&mut self, address: &str, value: &str, x: f32, y: f32) -> Result<u32, JsValue> {
            self.inner
                .spawn(address, value, Vec2::new(x, y))
                .map(|id| id.0)
                .map_err(js_error)
        }

        pub fn launch(&mut self, address: &str, value: &str) -> Result<u32, JsValue> {
            self.inner.launch(address, value).map(|id| id.0).map_err(js_error)
        }

        pub fn connect(&mut self, from: u32, to: u32) -> Result<(), JsValue> {
            self.inner.connect(NodeId(from), NodeId(to)).map(|_| ()).map_err(js_error)
        }

        pub fn connect_to_address(&mut self, from: u32, address: &str) -> Result<(), JsValue> {
            self.inner
                .connect_to_address(NodeId(from), address)
                .map(|_| ())
                .map_err(js_error)
        }

        pub fn disconnect(&mut self, from: u32) -> Result<u32, JsValue> {
            self.inner.disconnect(NodeId(from)).map(|id| id.0).map_err(js_error)
        }

        pub fn delete(&mut self, id: u32) -> Result<(), JsValue> {
            self.inner.delete(NodeId(id)).map(|_| ()).map_err(js_error)
        }

        pub fn insert_at_head(&mut self, address: &str, value: &str) -> Result<u32, JsValue> {
            self.inner.insert_at_head(address, value).map(|id| id.0).map_err(js_error)
        }

        pub fn insert_at_tail(&mut self, address: &str, value: &str) -> Result<u32, JsValue> {
            self.inner.insert_at_tail(address, value).map(|id| id.0).map_err(js_error)
        }

        pub fn insert_at_index(&mut self, index: usize, address: &str, value: &str) -> Result<u32, JsValue> {
            self.inner
                .insert_at_index(index, address, value)
                .map(|id| id.0)
                .map_err(js_error)
        }

        pub fn enqueue(&mut self, address: &str, value: &str) -> Result<u32, JsValue> {
            self.inner.enqueue(address, value).map(|id| id.0).map_err(js_error)
        }

        /// Removed head as `[value, address]` JSON
        pub fn dequeue(&mut self) -> Result<String, JsValue> {
            let popped = self.inner.dequeue().map_err(js_error)?;
            to_json(&popped)
        }

        pub fn peek(&self) -> Result<String, JsValue> {
            let node = self.inner.peek().map_err(js_error)?;
            to_json(node)
        }

        pub fn drag_begin(&mut self, id: u32, x: f32, y: f32, time_ms: f64) -> Result<(), JsValue> {
            self.inner
                .drag_begin(NodeId(id), Vec2::new(x, y), millis(time_ms))
                .map_err(js_error)
        }

        /// Clamped position as `[x, y]`, empty when nothing is dragged
        pub fn drag_move(&mut self, x: f32, y: f32, time_ms: f64) -> Vec<f32> {
            self.inner
                .drag_move(Vec2::new(x, y), millis(time_ms))
                .map(|p| vec![p.x, p.y])
                .unwrap_or_default()
        }

        pub fn drag_end(&mut self) {
            self.inner.drag_end();
        }

        pub fn open_portal(&mut self) -> Result<String, JsValue> {
            let event = self.inner.open_portal().map_err(js_error)?;
            to_json(&event)
        }

        pub fn close_portal(&mut self) -> Result<String, JsValue> {
            to_json(&self.inner.close_portal())
        }

        pub fn load_exercise(&mut self, exercise_json: &str) -> Result<(), JsValue> {
            let exercise: ExpectedStructure = serde_json::from_str(exercise_json).map_err(js_error)?;
            self.inner.load_exercise(exercise);
            Ok(())
        }

        pub fn adjust_time(&mut self, delta_secs: f32) {
            self.inner.adjust_time(delta_secs);
        }

        /// Seconds left, or -1 outside timed mode
        pub fn time_remaining(&self) -> f32 {
            self.inner.time_remaining().map_or(-1.0, |d| d.as_secs_f32())
        }

        pub fn validate_now(&self) -> Result<String, JsValue> {
            to_json(&self.inner.validate_now())
        }

        pub fn progress(&self) -> Result<String, JsValue> {
            to_json(&self.inner.progress())
        }

        pub fn save_settings(&self) {
            self.inner.settings().save();
        }
    }
}
