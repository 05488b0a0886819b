//! Registry of dynamically-typed sockets.
//!
//! The engine can register sockets at runtime (e.g. per-voice outputs or
//! user-named MIDI ports). Each registration gets a human-readable name and a
//! [`Socket`] whose sub-kind is `Dynamic(uid)`. The [`SocketRegistry`] maps
//! names to those sockets and back, and supplies display labels.
//!
//! Wire format (as pushed by the backend):
//!
//! ```json
//! { "name_to_socket_type": { "<name>": { "template": .., "socketType": .., "associatedData": .. } } }
//! ```

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::socket::Socket;

/// One registered socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketRegistryEntry {
    /// The socket this registration was instantiated from.
    pub template: Socket,
    /// The registered dynamic socket.
    pub socket_type: Socket,
    /// Engine-defined extra data, passed through untouched.
    #[serde(default)]
    pub associated_data: Option<serde_json::Value>,
}

/// Name → dynamic socket registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocketRegistry {
    name_to_socket_type: IndexMap<String, SocketRegistryEntry>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the backend's registry payload.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Registers `name` as a new dynamic socket in `template`'s category.
    ///
    /// The uid is one past the largest uid currently registered. Fails with
    /// [`CoreError::SocketUidExhausted`] once that uid would be `u64::MAX + 1`.
    pub fn register(&mut self, name: &str, template: Socket) -> Result<Socket, CoreError> {
        if self.name_to_socket_type.contains_key(name) {
            return Err(CoreError::DuplicateSocketName {
                name: name.to_string(),
            });
        }

        let uid = self
            .name_to_socket_type
            .values()
            .filter_map(|entry| entry.socket_type.dynamic_uid())
            .max()
            .map_or(Some(0), |max| max.checked_add(1))
            .ok_or_else(|| CoreError::SocketUidExhausted {
                name: name.to_string(),
            })?;
        let socket_type = template.with_uid(uid);

        self.name_to_socket_type.insert(
            name.to_string(),
            SocketRegistryEntry {
                template,
                socket_type,
                associated_data: None,
            },
        );
        Ok(socket_type)
    }

    pub fn get(&self, name: &str) -> Option<&SocketRegistryEntry> {
        self.name_to_socket_type.get(name)
    }

    /// The dynamic socket registered under `name`.
    pub fn socket_for(&self, name: &str) -> Option<Socket> {
        self.get(name).map(|entry| entry.socket_type)
    }

    /// Reverse lookup: the name a dynamic socket was registered under.
    pub fn name_of(&self, socket: &Socket) -> Option<&str> {
        self.name_to_socket_type
            .iter()
            .find(|(_, entry)| entry.socket_type == *socket)
            .map(|(name, _)| name.as_str())
    }

    /// Display label of any socket.
    ///
    /// Built-in sockets use their fixed label. Dynamic sockets use their
    /// registered name, or an empty placeholder if the uid is not (yet)
    /// registered.
    pub fn label(&self, socket: &Socket) -> Cow<'_, str> {
        if let Some(label) = socket.builtin_label() {
            return Cow::Borrowed(label);
        }
        match self.name_of(socket) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Borrowed(""),
        }
    }

    /// Replaces the whole registry with a fresh one from the backend.
    pub fn replace(&mut self, other: SocketRegistry) {
        *self = other;
    }

    pub fn len(&self) -> usize {
        self.name_to_socket_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_socket_type.is_empty()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SocketRegistryEntry)> + '_ {
        self.name_to_socket_type
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
    }
}
