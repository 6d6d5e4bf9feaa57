//! Exact stochastic simulation of chemical reaction networks.
//!
//! A [`network::ReactionNetwork`] holds species with integer copy numbers and
//! the reactions between them, organised in a tree of scopes. A
//! [`scheduler::Scheduler`] (Gillespie's direct method or the next reaction
//! method) repeatedly picks and fires the next reaction, and
//! [`simulate::Simulation`] ties the two together with a seeded random number
//! generator and event observers.

pub mod analysis;
pub mod composite;
pub mod config;
pub mod container;
pub mod ending_criterion;
pub mod error;
pub mod indexed_heap;
pub mod network;
pub mod reaction;
pub mod scheduler;
pub mod signals;
pub mod simulate;
pub mod species;
pub mod species_registry;

pub use composite::NodeId;
pub use error::{ChemError, InvariantViolation, Result};
pub use network::{NetworkChange, ReactionNetwork};
pub use reaction::{ReactionId, ReactionKind};
pub use scheduler::{Scheduler, SchedulerKind, SchedulerState, StepOutcome};
pub use simulate::{RunLimit, RunStatus, Simulation};
pub use signals::{ChemEvent, Target};
pub use species::{SpeciesId, MAX_COPY_NUMBER, NO_UPPER_LIMIT};
pub use species_registry::NameId;
