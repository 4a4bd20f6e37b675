//! Match simulation: movement, hazards, creatures, economy and the match actor

pub mod creatures;
pub mod economy;
pub mod error;
pub mod events;
pub mod hazards;
pub mod r#match;
pub mod movement;
pub mod player;

pub use error::GameError;
pub use events::GameEvent;
pub use player::Player;
pub use r#match::{
    GameMatch, MatchCommand, MatchHandle, MatchOptions, MatchSnapshot, MatchState, MatchTimings,
    Trade,
};

use uuid::Uuid;

use crate::world::{HazardKind, Position};
use hazards::ChainId;

/// How long a deferred task waits before it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    Now,
    /// Hazard and creature tick
    Tick,
    /// Next step of a queued path
    Step,
    /// Timed charge fuse
    Fuse,
}

/// Continuation scheduled by the simulation and run later on the match actor
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Gas {
        chain: ChainId,
        origin: Position,
        gas: HazardKind,
    },
    Lava {
        chain: ChainId,
        origin: Position,
    },
    Wake {
        position: Position,
        creature: HazardKind,
    },
    Reroll {
        position: Position,
        creature: HazardKind,
    },
    Step {
        player_id: Uuid,
        /// Path submission this step belongs to
        epoch: u64,
    },
    Detonate {
        center: Position,
        radius: usize,
    },
}

/// Result of one simulation call: events in broadcast order plus follow-ups
#[derive(Debug, Default)]
pub struct Outcome {
    pub events: Vec<GameEvent>,
    pub deferred: Vec<(Delay, Task)>,
}

impl Outcome {
    pub fn event(event: GameEvent) -> Self {
        Self {
            events: vec![event],
            deferred: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn defer(&mut self, delay: Delay, task: Task) {
        self.deferred.push((delay, task));
    }

    pub fn merge(&mut self, other: Outcome) {
        self.events.extend(other.events);
        self.deferred.extend(other.deferred);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.deferred.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Synchronous task runner for simulation tests

    use super::*;

    /// Run deferred tasks in FIFO order until none remain, returning every event.
    /// Panics after `limit` tasks so a runaway chain fails the test.
    pub fn drain(state: &mut MatchState, first: Outcome, limit: usize) -> Vec<GameEvent> {
        let mut events = first.events;
        let mut queue: std::collections::VecDeque<Task> =
            first.deferred.into_iter().map(|(_, t)| t).collect();
        let mut ran = 0;
        while let Some(task) = queue.pop_front() {
            ran += 1;
            assert!(ran <= limit, "task chain did not terminate within {limit} tasks");
            let outcome = state.run_task(task);
            events.extend(outcome.events);
            queue.extend(outcome.deferred.into_iter().map(|(_, t)| t));
        }
        events
    }
}
