//! Typed connection points on nodes.
//!
//! A [`Socket`] is a closed, two-level variant: a category (stream, midi,
//! value, node reference) and a named sub-kind within that category. Every
//! category also has a `Dynamic(uid)` sub-kind for sockets registered at
//! runtime through the [`SocketRegistry`](crate::socket_registry::SocketRegistry).
//!
//! Equality is structural. [`Socket::to_key`] renders the canonical string
//! `"<kind>,<subkind>[:<uid>]"`, which depends only on the socket's content
//! and is therefore stable across processes and snapshot replacement.
//!
//! Sub-kind names on the wire are closed sets: an unknown name fails to
//! deserialize rather than falling into `Dynamic`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Audio-rate stream sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamSocketType {
    Audio,
    Gate,
    Gain,
    Detune,
    Dynamic(u64),
}

/// MIDI event sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MidiSocketType {
    Default,
    Dynamic(u64),
}

/// Control-rate value sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueSocketType {
    Default,
    Gain,
    Frequency,
    Resonance,
    Gate,
    Attack,
    Decay,
    Sustain,
    Release,
    Speed,
    Dynamic(u64),
}

/// Sockets carrying a reference to another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRefSocketType {
    Button,
    Dynamic(u64),
}

/// Socket category, without the sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketKind {
    Stream,
    Midi,
    Value,
    NodeRef,
}

impl SocketKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SocketKind::Stream => "stream",
            SocketKind::Midi => "midi",
            SocketKind::Value => "value",
            SocketKind::NodeRef => "noderef",
        }
    }
}

/// Which side of a node a socket sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketDirection {
    Input,
    Output,
}

impl SocketDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SocketDirection::Input => "input",
            SocketDirection::Output => "output",
        }
    }
}

/// A typed connection point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Socket {
    Stream(StreamSocketType),
    Midi(MidiSocketType),
    Value(ValueSocketType),
    NodeRef(NodeRefSocketType),
}

impl Socket {
    pub fn kind(&self) -> SocketKind {
        match self {
            Socket::Stream(_) => SocketKind::Stream,
            Socket::Midi(_) => SocketKind::Midi,
            Socket::Value(_) => SocketKind::Value,
            Socket::NodeRef(_) => SocketKind::NodeRef,
        }
    }

    /// Lowercase sub-kind name; `"dynamic"` for registered sockets.
    pub fn sub_kind(&self) -> &'static str {
        match self {
            Socket::Stream(stream) => match stream {
                StreamSocketType::Audio => "audio",
                StreamSocketType::Gate => "gate",
                StreamSocketType::Gain => "gain",
                StreamSocketType::Detune => "detune",
                StreamSocketType::Dynamic(_) => "dynamic",
            },
            Socket::Midi(midi) => match midi {
                MidiSocketType::Default => "default",
                MidiSocketType::Dynamic(_) => "dynamic",
            },
            Socket::Value(value) => match value {
                ValueSocketType::Default => "default",
                ValueSocketType::Gain => "gain",
                ValueSocketType::Frequency => "frequency",
                ValueSocketType::Resonance => "resonance",
                ValueSocketType::Gate => "gate",
                ValueSocketType::Attack => "attack",
                ValueSocketType::Decay => "decay",
                ValueSocketType::Sustain => "sustain",
                ValueSocketType::Release => "release",
                ValueSocketType::Speed => "speed",
                ValueSocketType::Dynamic(_) => "dynamic",
            },
            Socket::NodeRef(node_ref) => match node_ref {
                NodeRefSocketType::Button => "button",
                NodeRefSocketType::Dynamic(_) => "dynamic",
            },
        }
    }

    /// The registry uid of a dynamic socket.
    pub fn dynamic_uid(&self) -> Option<u64> {
        match *self {
            Socket::Stream(StreamSocketType::Dynamic(uid))
            | Socket::Midi(MidiSocketType::Dynamic(uid))
            | Socket::Value(ValueSocketType::Dynamic(uid))
            | Socket::NodeRef(NodeRefSocketType::Dynamic(uid)) => Some(uid),
            _ => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic_uid().is_some()
    }

    /// A dynamic socket of the same category with the given uid.
    pub fn with_uid(&self, uid: u64) -> Socket {
        match self.kind() {
            SocketKind::Stream => Socket::Stream(StreamSocketType::Dynamic(uid)),
            SocketKind::Midi => Socket::Midi(MidiSocketType::Dynamic(uid)),
            SocketKind::Value => Socket::Value(ValueSocketType::Dynamic(uid)),
            SocketKind::NodeRef => Socket::NodeRef(NodeRefSocketType::Dynamic(uid)),
        }
    }

    /// Canonical content key: `"<kind>,<subkind>[:<uid>]"`.
    pub fn to_key(&self) -> String {
        match self.dynamic_uid() {
            Some(uid) => format!("{},{}:{}", self.kind().as_str(), self.sub_kind(), uid),
            None => format!("{},{}", self.kind().as_str(), self.sub_kind()),
        }
    }

    /// Display label for built-in sockets; `None` for dynamic ones, whose
    /// label lives in the registry.
    pub fn builtin_label(&self) -> Option<&'static str> {
        let label = match self {
            Socket::Stream(StreamSocketType::Audio) => "Audio",
            Socket::Stream(StreamSocketType::Gate) => "Gate",
            Socket::Stream(StreamSocketType::Gain) => "Gain",
            Socket::Stream(StreamSocketType::Detune) => "Detune",
            Socket::Midi(MidiSocketType::Default) => "MIDI",
            Socket::Value(ValueSocketType::Default) => "Value",
            Socket::Value(ValueSocketType::Gain) => "Gain",
            Socket::Value(ValueSocketType::Frequency) => "Frequency",
            Socket::Value(ValueSocketType::Resonance) => "Resonance",
            Socket::Value(ValueSocketType::Gate) => "Gate",
            Socket::Value(ValueSocketType::Attack) => "Attack",
            Socket::Value(ValueSocketType::Decay) => "Decay",
            Socket::Value(ValueSocketType::Sustain) => "Sustain",
            Socket::Value(ValueSocketType::Release) => "Release",
            Socket::Value(ValueSocketType::Speed) => "Speed",
            Socket::NodeRef(NodeRefSocketType::Button) => "Button",
            _ => return None,
        };
        Some(label)
    }
}

impl fmt::Display for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

/// Key that also distinguishes an input from an output of the same type on
/// one node: `"<kind>,<subkind>[:<uid>],<direction>"`.
pub fn socket_to_key(socket: &Socket, direction: SocketDirection) -> String {
    format!("{},{}", socket.to_key(), direction.as_str())
}
