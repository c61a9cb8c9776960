use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::buffers::PlanarBuffer;
use crate::models::error::PipelineError;
use crate::models::format::FormatDescriptor;
use crate::models::sound_transform::SoundTransform;
use crate::traits::playback::{PlaybackRenderer, PlayerNode};

/// Owned-optional player slot. At most one player is alive at a time.
struct MonitorSlot {
    renderer: Option<Arc<dyn PlaybackRenderer>>,
    format: Option<FormatDescriptor>,
    player: Option<Box<dyn PlayerNode>>,
    transform: SoundTransform,
}

impl MonitorSlot {
    /// Create the player on first use.
    fn player(&mut self) -> Result<&mut Box<dyn PlayerNode>, PipelineError> {
        if self.player.is_none() {
            let renderer = self
                .renderer
                .as_ref()
                .ok_or_else(|| PipelineError::PlaybackFailed("no playback renderer".into()))?;
            let format = self
                .format
                .as_ref()
                .ok_or_else(|| PipelineError::PlaybackFailed("monitor is not attached".into()))?;
            let mut player = renderer.attach_player(format)?;
            player.set_volume(self.transform.volume);
            player.set_pan(self.transform.pan);
            log::debug!("Monitor player attached ({})", format);
            self.player = Some(player);
        }
        self.player
            .as_mut()
            .ok_or_else(|| PipelineError::PlaybackFailed("player slot empty".into()))
    }

    fn release_player(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.detach();
            log::debug!("Monitor player detached");
        }
    }

    /// Release a player whose renderer panicked. Its `detach` may panic too.
    fn discard_player(&mut self) {
        if panic::catch_unwind(AssertUnwindSafe(|| self.release_player())).is_err() {
            log::warn!("Monitor player panicked while detaching");
        }
    }

    fn can_render(&self) -> bool {
        self.renderer.is_some() && self.format.is_some()
    }
}

/// Best-effort local rendering of the processed signal.
///
/// Nothing here propagates to the capture path: renderer errors and panics
/// are logged, counted and the buffer is dropped.
pub struct PlaybackMonitor {
    slot: Mutex<MonitorSlot>,
    failures: AtomicU64,
    busy_drops: AtomicU64,
}

impl PlaybackMonitor {
    pub fn new(renderer: Option<Arc<dyn PlaybackRenderer>>) -> Self {
        Self {
            slot: Mutex::new(MonitorSlot {
                renderer,
                format: None,
                player: None,
                transform: SoundTransform::default(),
            }),
            failures: AtomicU64::new(0),
            busy_drops: AtomicU64::new(0),
        }
    }

    /// Swap the renderer. The current player belongs to the old renderer and
    /// is detached first.
    pub fn set_renderer(&self, renderer: Option<Arc<dyn PlaybackRenderer>>) {
        let mut slot = self.slot.lock();
        slot.release_player();
        slot.renderer = renderer;
    }

    /// Bind the monitor to a graph format. Any existing player is detached
    /// before a new one can be created.
    pub fn attach(&self, format: &FormatDescriptor) {
        let mut slot = self.slot.lock();
        slot.release_player();
        slot.format = Some(*format);
    }

    /// Lazy accessor: runs `f` on the player, creating it if needed.
    pub fn with_player<R>(&self, f: impl FnOnce(&mut dyn PlayerNode) -> R) -> Result<R, PipelineError> {
        let mut slot = self.slot.lock();
        let player = slot.player()?;
        Ok(f(&mut **player))
    }

    /// Apply volume and pan, creating the player as a side effect.
    ///
    /// The transform is remembered even when no player can be created yet and
    /// is applied to every player created later.
    pub fn set_sound_transform(&self, transform: SoundTransform) {
        let transform = transform.clamped();
        let mut slot = self.slot.lock();
        slot.transform = transform;
        if !slot.can_render() {
            log::debug!("Monitor transform stored, no renderer attached");
            return;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            slot.player().map(|player| {
                player.set_volume(transform.volume);
                player.set_pan(transform.pan);
            })
        }));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.record_failure(&e),
            Err(_) => {
                slot.discard_player();
                self.record_failure(&PipelineError::PlaybackFailed("renderer panicked".into()));
            }
        }
    }

    /// Enqueue a buffer and start playback if stopped. Never blocks: if the
    /// slot is held by another thread the buffer is skipped.
    ///
    /// Returns whether the buffer reached a player.
    pub fn schedule_buffer(&self, buffer: PlanarBuffer) -> bool {
        let Some(mut slot) = self.slot.try_lock() else {
            self.busy_drops.fetch_add(1, Ordering::Relaxed);
            log::trace!("Monitor busy, buffer skipped");
            return false;
        };
        if !slot.can_render() {
            return false;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), PipelineError> {
            let player = slot.player()?;
            player.schedule_buffer(buffer)?;
            if !player.is_playing() {
                player.play()?;
                log::debug!("Monitor playback started");
            }
            Ok(())
        }));
        match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                self.record_failure(&e);
                false
            }
            Err(_) => {
                slot.discard_player();
                self.record_failure(&PipelineError::PlaybackFailed("renderer panicked".into()));
                false
            }
        }
    }

    /// Destroy the player. The renderer and format stay, so the next access
    /// creates a fresh one.
    pub fn clear(&self) {
        self.slot.lock().release_player();
    }

    /// Destroy the player and forget the format. Nothing is rendered until
    /// the next `attach`.
    pub fn unbind(&self) {
        let mut slot = self.slot.lock();
        slot.release_player();
        slot.format = None;
    }

    /// Destroy the player and forget the format and renderer.
    pub fn detach(&self) {
        let mut slot = self.slot.lock();
        slot.release_player();
        slot.format = None;
        slot.renderer = None;
    }

    pub fn is_playing(&self) -> bool {
        self.slot.lock().player.as_ref().is_some_and(|p| p.is_playing())
    }

    pub fn has_player(&self) -> bool {
        self.slot.lock().player.is_some()
    }

    pub fn sound_transform(&self) -> SoundTransform {
        self.slot.lock().transform
    }

    /// Renderer errors and panics absorbed so far.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Buffers skipped because the slot was busy.
    pub fn busy_drops(&self) -> u64 {
        self.busy_drops.load(Ordering::Relaxed)
    }

    fn record_failure(&self, error: &PipelineError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        log::warn!("Monitor failure, buffer dropped: {}", error);
    }
}
