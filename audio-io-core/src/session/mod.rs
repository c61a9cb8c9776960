pub mod controller;
pub mod inline_engine;

pub use controller::{CaptureSessionController, FormatChangeNotifier};
pub use inline_engine::InlineEngine;
