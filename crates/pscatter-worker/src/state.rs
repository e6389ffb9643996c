use std::sync::atomic::{AtomicU8, Ordering};

/// Worker state machine (spec: `starting -> running`, `running <-> idle`,
/// any -> `stopped`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerRunState {
    Starting = 0,
    Running = 1,
    Idle = 2,
    Stopped = 3,
}

impl From<u8> for WorkerRunState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Idle,
            3 => Self::Stopped,
            _ => Self::Starting,
        }
    }
}

#[derive(Default)]
pub struct RunStateCell(AtomicU8);

impl RunStateCell {
    pub fn get(&self) -> WorkerRunState {
        WorkerRunState::from(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: WorkerRunState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
