/// Lifecycle of the DSP chain.
///
/// ```text
/// Detached ──attach──→ Attached ──format change──→ Rebuilding ──→ Attached
///     ↑                    │
///     └──────dispose───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Detached,
    Attached,
    Rebuilding,
}

/// Capture session state as seen by callers and the delegate.
///
/// `Degraded` means the device is still bound but the engine could not be
/// restarted after an in-band format change; frames are dropped until the
/// next `attach`, `detach` or `dispose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Detached,
    Attached,
    Rebuilding,
    Degraded,
}

impl SessionState {
    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Detached)
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached)
    }

    /// Whether raw frames are processed in this state.
    pub fn accepts_frames(&self) -> bool {
        matches!(self, Self::Attached)
    }
}
