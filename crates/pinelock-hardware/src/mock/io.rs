//! Mock binary inputs and outputs.

use crate::{
    Result,
    traits::{DigitalInput, DigitalOutput},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Sensor input whose level is set from a [`MockInputHandle`].
#[derive(Debug)]
pub struct MockInput {
    level: Arc<AtomicBool>,
}

impl MockInput {
    pub fn new() -> (Self, MockInputHandle) {
        let level = Arc::new(AtomicBool::new(false));
        (
            Self {
                level: Arc::clone(&level),
            },
            MockInputHandle { level },
        )
    }
}

impl DigitalInput for MockInput {
    fn is_active(&mut self) -> Result<bool> {
        Ok(self.level.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone)]
pub struct MockInputHandle {
    level: Arc<AtomicBool>,
}

impl MockInputHandle {
    pub fn set(&self, active: bool) {
        self.level.store(active, Ordering::SeqCst);
    }
}

/// Output that records its level for inspection through a
/// [`MockOutputHandle`].
#[derive(Debug)]
pub struct MockOutput {
    shared: Arc<OutputState>,
}

#[derive(Debug, Default)]
struct OutputState {
    active: AtomicBool,
    writes: AtomicU32,
}

impl MockOutput {
    pub fn new() -> (Self, MockOutputHandle) {
        let shared = Arc::new(OutputState::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockOutputHandle { shared },
        )
    }
}

impl DigitalOutput for MockOutput {
    fn set_active(&mut self, active: bool) -> Result<()> {
        self.shared.active.store(active, Ordering::SeqCst);
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MockOutputHandle {
    shared: Arc<OutputState>,
}

impl MockOutputHandle {
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Number of times the output has been driven.
    pub fn writes(&self) -> u32 {
        self.shared.writes.load(Ordering::SeqCst)
    }
}
