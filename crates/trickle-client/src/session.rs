use trickle_wire::FrameDecoder;
use uuid::Uuid;

/// Lifecycle state of one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Open,
    Completed,
    Aborted,
    Errored,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Aborted | SessionState::Errored
        )
    }
}

/// One streaming session, owned exclusively by its coordinator task.
///
/// The session owns its frame decoder, and through it the unconsumed byte
/// remainder, so the buffer is an explicit field rather than state captured
/// in a closure. Dropped once a terminal state is reached.
pub struct StreamSession {
    id: Uuid,
    state: SessionState,
    pub decoder: FrameDecoder,
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            decoder: FrameDecoder::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Apply a state transition. Transitions are one-directional: once a
    /// terminal state is reached, further transitions are no-ops.
    pub fn transition(&mut self, next: SessionState) {
        if self.state.is_terminal() {
            tracing::debug!(
                session = %self.id,
                from = ?self.state,
                to = ?next,
                "Ignoring transition out of terminal state"
            );
            return;
        }

        tracing::debug!(session = %self.id, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}
