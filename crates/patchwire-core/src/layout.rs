//! Deterministic node geometry.
//!
//! Nodes are drawn as a title bar followed by their rows stacked top to
//! bottom. Input sockets sit on the left edge, outputs on the right edge, and
//! a socket's anchor is vertically centred in its row. Row heights are fixed
//! per row kind, so socket positions can be computed without the renderer.

use serde::{Deserialize, Serialize};

use crate::node::{NodeRow, NodeWrapper};
use crate::socket::{Socket, SocketDirection};

/// A point in editor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };
}

/// Fixed node dimensions, in editor units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeLayout {
    pub node_width: f32,
    pub title_height: f32,
    pub socket_height: f32,
    pub property_height: f32,
    pub inner_graph_height: f32,
}

impl Default for NodeLayout {
    fn default() -> Self {
        NodeLayout {
            node_width: 200.0,
            title_height: 30.0,
            socket_height: 36.0,
            property_height: 40.0,
            inner_graph_height: 36.0,
        }
    }
}

impl NodeLayout {
    pub fn row_height(&self, row: &NodeRow) -> f32 {
        match row {
            NodeRow::Input { .. } | NodeRow::Output { .. } => self.socket_height,
            NodeRow::Property { .. } => self.property_height,
            NodeRow::InnerGraph => self.inner_graph_height,
        }
    }

    /// Total height of a node.
    pub fn node_height(&self, node: &NodeWrapper) -> f32 {
        self.title_height + node.node_rows.iter().map(|row| self.row_height(row)).sum::<f32>()
    }

    /// Anchor of a socket, or `None` if the node has no such row.
    pub fn socket_xy(&self, node: &NodeWrapper, socket: &Socket, direction: SocketDirection) -> Option<Point> {
        let position = node.row_position(socket, direction)?;
        let above: f32 = node.node_rows[..position]
            .iter()
            .map(|row| self.row_height(row))
            .sum();
        let row_height = self.row_height(&node.node_rows[position]);

        let x = match direction {
            SocketDirection::Input => node.ui_data.x,
            SocketDirection::Output => node.ui_data.x + self.node_width,
        };
        let y = node.ui_data.y + self.title_height + above + row_height / 2.0;
        Some(Point { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::UiData;
    use crate::socket::{StreamSocketType, ValueSocketType};
    use crate::value::{Property, PropertyType, SocketValue};

    fn node() -> NodeWrapper {
        NodeWrapper::new("FilterNode")
            .with_ui(UiData {
                x: 100.0,
                y: 50.0,
                ..UiData::default()
            })
            .with_row(NodeRow::Input {
                socket: Socket::Stream(StreamSocketType::Audio),
                default: SocketValue::None,
            })
            .with_row(NodeRow::Property {
                name: "mode".into(),
                property_type: PropertyType::String,
                default: Property::String("lowpass".into()),
            })
            .with_row(NodeRow::Input {
                socket: Socket::Value(ValueSocketType::Frequency),
                default: SocketValue::None,
            })
            .with_row(NodeRow::Output {
                socket: Socket::Stream(StreamSocketType::Audio),
                default: SocketValue::None,
            })
    }

    #[test]
    fn first_input_sits_below_title() {
        let layout = NodeLayout::default();
        let point = layout
            .socket_xy(&node(), &Socket::Stream(StreamSocketType::Audio), SocketDirection::Input)
            .unwrap();
        assert_eq!(point, Point { x: 100.0, y: 50.0 + 30.0 + 18.0 });
    }

    #[test]
    fn rows_above_are_summed() {
        let layout = NodeLayout::default();
        let point = layout
            .socket_xy(&node(), &Socket::Value(ValueSocketType::Frequency), SocketDirection::Input)
            .unwrap();
        assert_eq!(point.y, 50.0 + 30.0 + 36.0 + 40.0 + 18.0);
    }

    #[test]
    fn outputs_sit_on_right_edge() {
        let layout = NodeLayout::default();
        let point = layout
            .socket_xy(&node(), &Socket::Stream(StreamSocketType::Audio), SocketDirection::Output)
            .unwrap();
        assert_eq!(point.x, 300.0);
        assert_eq!(point.y, 50.0 + 30.0 + 36.0 + 40.0 + 36.0 + 18.0);
    }

    #[test]
    fn missing_row_has_no_anchor() {
        let layout = NodeLayout::default();
        assert!(layout
            .socket_xy(&node(), &Socket::Value(ValueSocketType::Gain), SocketDirection::Input)
            .is_none());
    }

    #[test]
    fn node_height_includes_title() {
        assert_eq!(NodeLayout::default().node_height(&node()), 30.0 + 36.0 + 40.0 + 36.0 + 36.0);
    }
}
