use crate::reaction::ReactionId;
use crate::species::SpeciesId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Something observable that happened to a signaling entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChemEvent {
    CopyNumberChanged {
        species: SpeciesId,
        delta: i64,
        copy_number: u64,
    },
    ReactionFired {
        reaction: ReactionId,
    },
    SpeciesRemoved {
        species: SpeciesId,
    },
    ReactionRemoved {
        reaction: ReactionId,
    },
}

impl ChemEvent {
    /// The entity the event is about.
    pub fn target(&self) -> Target {
        match *self {
            ChemEvent::CopyNumberChanged { species, .. } | ChemEvent::SpeciesRemoved { species } => {
                Target::Species(species)
            }
            ChemEvent::ReactionFired { reaction } | ChemEvent::ReactionRemoved { reaction } => {
                Target::Reaction(reaction)
            }
        }
    }

    fn is_removal(&self) -> bool {
        matches!(
            self,
            ChemEvent::SpeciesRemoved { .. } | ChemEvent::ReactionRemoved { .. }
        )
    }
}

/// Callbacks see the simulation time and the event. They cannot reach the
/// network.
pub type Callback = Box<dyn FnMut(f64, &ChemEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Connection(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Species(SpeciesId),
    Reaction(ReactionId),
}

struct Slot {
    target: Target,
    generation: u32,
    callback: Callback,
}

/// Routes timestamped events to the callbacks connected to the entity they
/// concern. Ids are reused once an entity is removed, so a connection is
/// made for one generation of its id (see
/// [`crate::network::ReactionNetwork::generation`]) and only sees events
/// tagged with that generation. A removal event is delivered and then drops
/// every connection of the removed entity.
#[derive(Default)]
pub struct SignalHub {
    next: u64,
    slots: BTreeMap<Connection, Slot>,
}

impl fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHub")
            .field("connections", &self.slots.len())
            .finish()
    }
}

impl SignalHub {
    pub fn new() -> Self {
        SignalHub::default()
    }

    fn connect(&mut self, target: Target, generation: u32, callback: Callback) -> Connection {
        let connection = Connection(self.next);
        self.next += 1;
        self.slots.insert(
            connection,
            Slot {
                target,
                generation,
                callback,
            },
        );
        connection
    }

    /// Receives `CopyNumberChanged` and `SpeciesRemoved` for `species`.
    pub fn connect_copy_number(
        &mut self,
        species: SpeciesId,
        generation: u32,
        callback: impl FnMut(f64, &ChemEvent) + 'static,
    ) -> Connection {
        self.connect(Target::Species(species), generation, Box::new(callback))
    }

    /// Receives `ReactionFired` and `ReactionRemoved` for `reaction`.
    pub fn connect_firing(
        &mut self,
        reaction: ReactionId,
        generation: u32,
        callback: impl FnMut(f64, &ChemEvent) + 'static,
    ) -> Connection {
        self.connect(Target::Reaction(reaction), generation, Box::new(callback))
    }

    pub fn disconnect(&mut self, connection: Connection) -> bool {
        self.slots.remove(&connection).is_some()
    }

    pub fn number_of_connections(&self) -> usize {
        self.slots.len()
    }

    pub fn is_connected(&self, connection: Connection) -> bool {
        self.slots.contains_key(&connection)
    }

    /// Delivers `(event, generation)` pairs in order, in connection order
    /// within an event. Returns the number of callback invocations.
    pub fn dispatch(&mut self, time: f64, events: &[(ChemEvent, u32)]) -> usize {
        let mut delivered = 0;
        for (event, generation) in events {
            let target = event.target();
            let concerned = |slot: &Slot| slot.target == target && slot.generation == *generation;
            for slot in self.slots.values_mut() {
                if concerned(&*slot) {
                    (slot.callback)(time, event);
                    delivered += 1;
                }
            }
            if event.is_removal() {
                let before = self.slots.len();
                self.slots.retain(|_, slot| !concerned(&*slot));
                let pruned = before - self.slots.len();
                if pruned > 0 {
                    debug!(?target, pruned, "pruned connections of a removed entity");
                }
            }
        }
        delivered
    }

    /// Drops the connections for which `is_current(target, generation)` is
    /// false, such as those of entities whose removal was never dispatched.
    pub fn prune(&mut self, is_current: impl Fn(Target, u32) -> bool) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| is_current(slot.target, slot.generation));
        let pruned = before - self.slots.len();
        if pruned > 0 {
            debug!(pruned, "pruned stale connections");
        }
        pruned
    }
}
