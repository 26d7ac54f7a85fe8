use std::collections::VecDeque;

use crate::{
    error::CommandError,
    types::{Device, Mode},
};

pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// A validated request to change controller state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetMode(Mode),
    NextMode,
    SetTarget(f32),
    Switch { device: Device, on: bool },
    MasterOff,
    /// Re-publish discovery, availability and full state.
    Announce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// Front panel or local HTTP surface.
    Local,
    /// The automation hub over MQTT.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedCommand {
    pub command: Command,
    pub source: CommandSource,
}

/// Bounded FIFO drained once at the start of every control cycle.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    items: VecDeque<QueuedCommand>,
    capacity: usize,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl CommandQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, command: Command, source: CommandSource) -> Result<(), CommandError> {
        if self.items.len() >= self.capacity {
            return Err(CommandError::QueueFull);
        }
        self.items.push_back(QueuedCommand { command, source });
        Ok(())
    }

    pub fn drain(&mut self) -> Vec<QueuedCommand> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
