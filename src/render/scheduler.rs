use crate::renderer::FrameHandle;

/// Where the presenter is within one display iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dispatched,
    Ready,
    Presenting,
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("frame dispatched while scheduler was {0:?}, expected Idle")]
    NotIdle(Phase),
    #[error("wait recorded while scheduler was {0:?}, expected Dispatched")]
    NotDispatched(Phase),
    #[error("presentation started while scheduler was {0:?}, expected Ready")]
    NotReady(Phase),
    #[error("presentation finished while scheduler was {0:?}, expected Presenting")]
    NotPresenting(Phase),
    #[error(
        "single-buffer dispatch returned frame {dispatched} while frame {pending} was pending"
    )]
    SingleBufferMismatch {
        dispatched: FrameHandle,
        pending: FrameHandle,
    },
}

/// Double-buffer handoff between the renderer and the display.
///
/// The display always shows the frame one submission behind the newest
/// dispatch: while frame K+1 renders, frame K is copied and presented. With a
/// single slot the two handles must coincide and the loop degenerates to a
/// fully synchronous render, wait, copy, present sequence; that coincidence is
/// an invariant this type checks rather than assumes.
#[derive(Debug)]
pub struct FrameScheduler {
    slot_count: u32,
    phase: Phase,
    /// Frame to wait on and display this iteration.
    pending: FrameHandle,
    /// Frame dispatched this iteration, pending next iteration.
    dispatched: FrameHandle,
}

impl FrameScheduler {
    /// The loop dispatches one frame before its first iteration; `first` is
    /// that frame's handle.
    pub fn primed(slot_count: u32, first: FrameHandle) -> Self {
        Self {
            slot_count,
            phase: Phase::Idle,
            pending: first,
            dispatched: first,
        }
    }

    /// Records the dispatch of a new frame and returns the handle to wait on.
    pub fn dispatched(&mut self, new_frame: FrameHandle) -> Result<FrameHandle, ScheduleError> {
        if self.phase != Phase::Idle {
            return Err(ScheduleError::NotIdle(self.phase));
        }
        if self.slot_count == 1 && new_frame != self.pending {
            return Err(ScheduleError::SingleBufferMismatch {
                dispatched: new_frame,
                pending: self.pending,
            });
        }
        self.dispatched = new_frame;
        self.phase = Phase::Dispatched;
        Ok(self.pending)
    }

    /// Records that the pending frame's wait returned; it is now ready for
    /// the tile copy.
    pub fn awaited(&mut self) -> Result<FrameHandle, ScheduleError> {
        if self.phase != Phase::Dispatched {
            return Err(ScheduleError::NotDispatched(self.phase));
        }
        self.phase = Phase::Ready;
        Ok(self.pending)
    }

    /// Marks the start of the presentation blit. The slot must be unmapped by
    /// this point.
    pub fn presenting(&mut self) -> Result<(), ScheduleError> {
        if self.phase != Phase::Ready {
            return Err(ScheduleError::NotReady(self.phase));
        }
        self.phase = Phase::Presenting;
        Ok(())
    }

    /// Finishes the iteration, carrying the dispatched frame forward as the
    /// next one to wait on.
    pub fn presented(&mut self) -> Result<(), ScheduleError> {
        if self.phase != Phase::Presenting {
            return Err(ScheduleError::NotPresenting(self.phase));
        }
        self.pending = self.dispatched;
        self.phase = Phase::Idle;
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pending(&self) -> FrameHandle {
        self.pending
    }
}
