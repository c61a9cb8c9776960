pub mod playback_monitor;

pub use playback_monitor::PlaybackMonitor;
