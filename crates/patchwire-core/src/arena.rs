//! Generational arena with stable `(index, generation)` handles.
//!
//! [`Arena`] stores values in a flat vector of [`Slot`]s. Removing a value
//! opens its slot and bumps the slot's generation, so every handle that
//! pointed at the removed value becomes detectably stale instead of silently
//! aliasing whatever is inserted into the slot next. Slots are never shifted
//! or renumbered; the vector only grows.
//!
//! Open slots are reused oldest-first. A reused slot is occupied at the
//! generation it carried while open, which is always one past the generation
//! of the value that was removed from it.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Most open slots [`Arena::insert_at`] will add in front of the slot it
/// claims.
pub const MAX_SLOT_GAP: usize = 4096;

/// Handle to an arena slot.
///
/// Two handles are equal iff both fields match. Ordering is by slot index,
/// then generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Index {
    /// Position of the slot in the arena.
    pub index: u32,
    /// Generation of the slot at the time the handle was issued.
    pub generation: u32,
}

impl Index {
    pub const fn new(index: u32, generation: u32) -> Self {
        Index { index, generation }
    }
}

/// Canonical string form, `index.generation`. Used in UI diff keys.
impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

/// A single arena slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slot<T> {
    /// Holds a live value.
    Occupied { value: T, generation: u32 },
    /// Vacant; the next value placed here gets this generation.
    Open { generation: u32 },
}

impl<T> Slot<T> {
    /// Returns the slot's current generation.
    pub fn generation(&self) -> u32 {
        match self {
            Slot::Occupied { generation, .. } | Slot::Open { generation } => *generation,
        }
    }

    /// Returns `true` if the slot holds a value.
    pub fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied { .. })
    }
}

/// Vector-backed slot store with generation-checked access.
///
/// Every operation is total: out-of-range, open, or stale handles yield
/// `None` (or a no-op) and never touch a different entry.
///
/// On the wire an arena is the plain array of its slots. The free list is
/// rebuilt from the open slots on deserialization.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    /// Open slot indices, oldest first.
    free: VecDeque<u32>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free: VecDeque::new(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Arena {
            slots: Vec::with_capacity(capacity),
            free: VecDeque::new(),
            len: 0,
        }
    }

    /// Inserts a value, reusing the oldest open slot if there is one.
    pub fn insert(&mut self, value: T) -> Index {
        self.len += 1;

        while let Some(slot_index) = self.free.pop_front() {
            if let Some(slot) = self.slots.get_mut(slot_index as usize) {
                if let Slot::Open { generation } = *slot {
                    *slot = Slot::Occupied { value, generation };
                    return Index::new(slot_index, generation);
                }
            }
        }

        let slot_index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied {
            value,
            generation: 0,
        });
        Index::new(slot_index, 0)
    }

    /// Places a value at exactly `index`, growing the arena with open slots
    /// if needed.
    ///
    /// Used to mirror handles assigned by another arena (e.g. the remote
    /// process). If the slot holds an entry of an older generation, that
    /// entry is replaced and returned. Returns [`CoreError::StaleHandle`] if
    /// the slot has already moved past `index.generation`, and
    /// [`CoreError::HandleOutOfRange`] if reaching the slot would need more
    /// than [`MAX_SLOT_GAP`] padding slots. The arena is unchanged on error.
    pub fn insert_at(&mut self, index: Index, value: T) -> Result<Option<T>, CoreError> {
        let slot_index = index.index as usize;
        let slots = self.slots.len();
        if slot_index >= slots {
            if slot_index - slots > MAX_SLOT_GAP {
                return Err(CoreError::HandleOutOfRange { index, slots });
            }
            self.slots
                .resize_with(slot_index + 1, || Slot::Open { generation: 0 });
            // The claimed slot itself is not free.
            self.free.extend(slots as u32..index.index);
            self.len += 1;
            self.slots[slot_index] = Slot::Occupied {
                value,
                generation: index.generation,
            };
            return Ok(None);
        }

        let slot = &mut self.slots[slot_index];
        let current = slot.generation();
        if current > index.generation {
            return Err(CoreError::StaleHandle { index, current });
        }

        if !slot.is_occupied() {
            self.free.retain(|&free| free != index.index);
            self.len += 1;
        }

        let old = std::mem::replace(
            slot,
            Slot::Occupied {
                value,
                generation: index.generation,
            },
        );
        Ok(match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Open { .. } => None,
        })
    }

    /// Removes the value behind `index` and opens its slot.
    ///
    /// A stale handle is a no-op returning `None`; it can never remove the
    /// entry that currently occupies a reused slot. A slot whose generation
    /// cannot be bumped any further is retired instead of reopened.
    pub fn remove(&mut self, index: Index) -> Option<T> {
        let slot = self.slots.get_mut(index.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == index.generation => {}
            _ => return None,
        }

        let next = index.generation.checked_add(1);
        let old = std::mem::replace(
            slot,
            Slot::Open {
                generation: next.unwrap_or(u32::MAX),
            },
        );
        if next.is_some() {
            self.free.push_back(index.index);
        }
        self.len -= 1;

        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Open { .. } => None,
        }
    }

    pub fn get(&self, index: Index) -> Option<&T> {
        match self.slots.get(index.index as usize)? {
            Slot::Occupied { value, generation } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: Index) -> Option<&mut T> {
        match self.slots.get_mut(index.index as usize)? {
            Slot::Occupied { value, generation } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, index: Index) -> bool {
        self.get(index).is_some()
    }

    /// Returns the live handle occupying `slot_index`, whatever its generation.
    pub fn occupant(&self, slot_index: u32) -> Option<Index> {
        match self.slots.get(slot_index as usize)? {
            Slot::Occupied { generation, .. } => Some(Index::new(slot_index, *generation)),
            Slot::Open { .. } => None,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots, occupied or open.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterates occupied slots in slot-index order.
    pub fn iter(&self) -> impl Iterator<Item = (Index, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot_index, slot)| match slot {
                Slot::Occupied { value, generation } => {
                    Some((Index::new(slot_index as u32, *generation), value))
                }
                Slot::Open { .. } => None,
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Index, &mut T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(slot_index, slot)| match slot {
                Slot::Occupied { value, generation } => {
                    Some((Index::new(slot_index as u32, *generation), value))
                }
                Slot::Open { .. } => None,
            })
    }

    /// Handles of all occupied slots, in slot-index order.
    pub fn indices(&self) -> impl Iterator<Item = Index> + '_ {
        self.iter().map(|(index, _)| index)
    }

    /// Raw slot view, open slots included.
    pub fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }
}

impl<T> From<Vec<Slot<T>>> for Arena<T> {
    fn from(slots: Vec<Slot<T>>) -> Self {
        let mut free = VecDeque::new();
        let mut len = 0;
        for (slot_index, slot) in slots.iter().enumerate() {
            match slot {
                Slot::Occupied { .. } => len += 1,
                Slot::Open { generation } if *generation < u32::MAX => {
                    free.push_back(slot_index as u32);
                }
                Slot::Open { .. } => {}
            }
        }
        Arena { slots, free, len }
    }
}

impl<T: PartialEq> PartialEq for Arena<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl<T: Serialize> Serialize for Arena<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.slots.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Arena<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Slot<T>>::deserialize(deserializer).map(Arena::from)
    }
}
