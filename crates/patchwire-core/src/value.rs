//! Values carried by sockets and node properties.

use serde::{Deserialize, Serialize};

/// Scalar carried by value sockets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Float(f32),
    Int(i32),
    Boolean(bool),
    String(String),
}

/// Default value of a socket.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum SocketValue {
    /// Constant level fed into an unconnected stream input.
    Stream(f32),
    /// Raw MIDI bytes.
    Midi(Vec<u8>),
    Value(Primitive),
    #[default]
    None,
}

impl SocketValue {
    pub fn is_none(&self) -> bool {
        matches!(self, SocketValue::None)
    }

    /// Numeric view for stream and numeric value sockets.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            SocketValue::Stream(level) => Some(*level),
            SocketValue::Value(Primitive::Float(value)) => Some(*value),
            SocketValue::Value(Primitive::Int(value)) => Some(*value as f32),
            _ => None,
        }
    }
}

/// Declared type of a node property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Bool,
    /// One of a fixed list of choices.
    MultipleChoice(Vec<String>),
    /// Path of a resource (sample, wavetable) known to the engine.
    Resource(String),
}

/// Concrete value of a node property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Property {
    String(String),
    Integer(i32),
    Float(f32),
    Bool(bool),
    MultipleChoice(String),
    Resource(String),
}

impl Property {
    /// Whether this value is admissible for `property_type`.
    pub fn conforms_to(&self, property_type: &PropertyType) -> bool {
        match (self, property_type) {
            (Property::String(_), PropertyType::String)
            | (Property::Integer(_), PropertyType::Integer)
            | (Property::Float(_), PropertyType::Float)
            | (Property::Bool(_), PropertyType::Bool)
            | (Property::Resource(_), PropertyType::Resource(_)) => true,
            (Property::MultipleChoice(choice), PropertyType::MultipleChoice(choices)) => {
                choices.contains(choice)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_value_defaults_to_none() {
        assert!(SocketValue::default().is_none());
    }

    #[test]
    fn as_f32_covers_numeric_variants() {
        assert_eq!(SocketValue::Stream(0.5).as_f32(), Some(0.5));
        assert_eq!(SocketValue::Value(Primitive::Int(3)).as_f32(), Some(3.0));
        assert_eq!(SocketValue::Value(Primitive::Boolean(true)).as_f32(), None);
        assert_eq!(SocketValue::Midi(vec![0x90, 60, 127]).as_f32(), None);
    }

    #[test]
    fn multiple_choice_must_be_listed() {
        let wave = PropertyType::MultipleChoice(vec!["sine".into(), "saw".into()]);
        assert!(Property::MultipleChoice("saw".into()).conforms_to(&wave));
        assert!(!Property::MultipleChoice("square".into()).conforms_to(&wave));
        assert!(!Property::Float(1.0).conforms_to(&wave));
    }
}
