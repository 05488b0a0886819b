//! Directed graph over two generational arenas.
//!
//! [`Graph`] keeps vertices and edges in separate [`Arena`]s. Each vertex
//! records the edges touching it in two adjacency lists:
//! `connections_from` (edges leaving the vertex, paired with the target) and
//! `connections_to` (edges arriving, paired with the source).
//!
//! Adjacency lists are private to the graph. Every mutation keeps them and
//! the edge arena mutually consistent; [`Graph::check_consistency`] verifies
//! this for data that arrives from outside (deserialized snapshots).

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::arena::{Arena, Index};
use crate::error::CoreError;

/// Handle to a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexIndex(pub Index);

/// Handle to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeIndex(pub Index);

impl VertexIndex {
    /// `{0, 0}`: the root graph in the graph of graphs.
    pub const ROOT: VertexIndex = VertexIndex::new(0, 0);

    pub const fn new(index: u32, generation: u32) -> Self {
        VertexIndex(Index::new(index, generation))
    }
}

impl EdgeIndex {
    pub const fn new(index: u32, generation: u32) -> Self {
        EdgeIndex(Index::new(index, generation))
    }
}

impl fmt::Display for VertexIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(other endpoint, edge)` pairs.
pub type Adjacency = SmallVec<[(VertexIndex, EdgeIndex); 4]>;

/// A vertex with its payload and adjacency lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vertex<V> {
    connections_from: Adjacency,
    connections_to: Adjacency,
    data: V,
}

impl<V> Vertex<V> {
    fn new(data: V) -> Self {
        Vertex {
            connections_from: SmallVec::new(),
            connections_to: SmallVec::new(),
            data,
        }
    }

    /// Outgoing edges as `(target, edge)`.
    pub fn connections_from(&self) -> &[(VertexIndex, EdgeIndex)] {
        &self.connections_from
    }

    /// Incoming edges as `(source, edge)`.
    pub fn connections_to(&self) -> &[(VertexIndex, EdgeIndex)] {
        &self.connections_to
    }

    pub fn data(&self) -> &V {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut V {
        &mut self.data
    }
}

/// A directed edge with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<E> {
    from: VertexIndex,
    to: VertexIndex,
    data: E,
}

impl<E> Edge<E> {
    pub fn from(&self) -> VertexIndex {
        self.from
    }

    pub fn to(&self) -> VertexIndex {
        self.to
    }

    pub fn data(&self) -> &E {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut E {
        &mut self.data
    }
}

/// Directed multigraph with stable vertex and edge handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph<V, E> {
    vertices: Arena<Vertex<V>>,
    edges: Arena<Edge<E>>,
}

impl<V, E> Default for Graph<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> Graph<V, E> {
    pub fn new() -> Self {
        Graph {
            vertices: Arena::new(),
            edges: Arena::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    pub fn add_vertex(&mut self, data: V) -> VertexIndex {
        VertexIndex(self.vertices.insert(Vertex::new(data)))
    }

    /// Places a vertex at exactly `index`, mirroring a handle assigned
    /// elsewhere.
    ///
    /// If `index` is already live, only its payload is replaced (edges are
    /// kept) and the old payload is returned. If the slot holds an older
    /// generation, that vertex is removed first, cascading to its edges.
    pub fn insert_vertex_at(&mut self, index: VertexIndex, data: V) -> Result<Option<V>, CoreError> {
        if let Some(vertex) = self.vertices.get_mut(index.0) {
            return Ok(Some(std::mem::replace(&mut vertex.data, data)));
        }

        if let Some(occupant) = self.vertices.occupant(index.0.index) {
            if occupant.generation > index.0.generation {
                return Err(CoreError::StaleHandle {
                    index: index.0,
                    current: occupant.generation,
                });
            }
            self.remove_vertex(VertexIndex(occupant));
        }

        self.vertices.insert_at(index.0, Vertex::new(data))?;
        Ok(None)
    }

    /// Connects `from` to `to`. Both endpoints must be live.
    pub fn add_edge(&mut self, from: VertexIndex, to: VertexIndex, data: E) -> Result<EdgeIndex, CoreError> {
        for vertex in [from, to] {
            if !self.vertices.contains(vertex.0) {
                return Err(CoreError::DanglingEndpoint { vertex });
            }
        }

        let edge = EdgeIndex(self.edges.insert(Edge { from, to, data }));
        if let Some(source) = self.vertices.get_mut(from.0) {
            source.connections_from.push((to, edge));
        }
        if let Some(target) = self.vertices.get_mut(to.0) {
            target.connections_to.push((from, edge));
        }
        Ok(edge)
    }

    /// Removes a vertex and every edge touching it.
    pub fn remove_vertex(&mut self, index: VertexIndex) -> Option<V> {
        let vertex = self.vertices.remove(index.0)?;
        for (_, edge) in vertex
            .connections_from
            .iter()
            .chain(vertex.connections_to.iter())
        {
            // Self-loops appear in both lists; the second removal is a no-op.
            self.remove_edge(*edge);
        }
        Some(vertex.data)
    }

    /// Removes an edge and prunes it from both endpoints' adjacency lists.
    pub fn remove_edge(&mut self, index: EdgeIndex) -> Option<E> {
        let (from, to) = {
            let edge = self.edges.get(index.0)?;
            (edge.from, edge.to)
        };
        if let Some(source) = self.vertices.get_mut(from.0) {
            source.connections_from.retain(|(_, e)| *e != index);
        }
        if let Some(target) = self.vertices.get_mut(to.0) {
            target.connections_to.retain(|(_, e)| *e != index);
        }
        self.edges.remove(index.0).map(|edge| edge.data)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_vertex(&self, index: VertexIndex) -> Option<&Vertex<V>> {
        self.vertices.get(index.0)
    }

    pub fn get_vertex_mut(&mut self, index: VertexIndex) -> Option<&mut Vertex<V>> {
        self.vertices.get_mut(index.0)
    }

    pub fn get_vertex_data(&self, index: VertexIndex) -> Option<&V> {
        self.get_vertex(index).map(Vertex::data)
    }

    pub fn get_vertex_data_mut(&mut self, index: VertexIndex) -> Option<&mut V> {
        self.get_vertex_mut(index).map(Vertex::data_mut)
    }

    pub fn get_edge(&self, index: EdgeIndex) -> Option<&Edge<E>> {
        self.edges.get(index.0)
    }

    pub fn get_edge_data_mut(&mut self, index: EdgeIndex) -> Option<&mut E> {
        self.edges.get_mut(index.0).map(Edge::data_mut)
    }

    pub fn contains_vertex(&self, index: VertexIndex) -> bool {
        self.vertices.contains(index.0)
    }

    pub fn contains_edge(&self, index: EdgeIndex) -> bool {
        self.edges.contains(index.0)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Live vertices in slot order.
    pub fn iter_vertices(&self) -> impl Iterator<Item = (VertexIndex, &Vertex<V>)> + '_ {
        self.vertices
            .iter()
            .map(|(index, vertex)| (VertexIndex(index), vertex))
    }

    /// Live edges in slot order.
    pub fn iter_edges(&self) -> impl Iterator<Item = (EdgeIndex, &Edge<E>)> + '_ {
        self.edges.iter().map(|(index, edge)| (EdgeIndex(index), edge))
    }

    /// Verifies that adjacency lists and the edge arena agree.
    ///
    /// Every adjacency entry must name a live edge with matching endpoints,
    /// and every live edge must appear exactly once in the source's
    /// `connections_from` and once in the target's `connections_to`.
    pub fn check_consistency(&self) -> Result<(), CoreError> {
        for (vertex_index, vertex) in self.iter_vertices() {
            for &(target, edge_index) in &vertex.connections_from {
                match self.get_edge(edge_index) {
                    Some(edge) if edge.from == vertex_index && edge.to == target => {}
                    Some(_) => {
                        return Err(inconsistency(format!(
                            "vertex {vertex_index} lists outgoing edge {edge_index} with mismatched endpoints"
                        )))
                    }
                    None => {
                        return Err(inconsistency(format!(
                            "vertex {vertex_index} lists missing outgoing edge {edge_index}"
                        )))
                    }
                }
            }
            for &(source, edge_index) in &vertex.connections_to {
                match self.get_edge(edge_index) {
                    Some(edge) if edge.to == vertex_index && edge.from == source => {}
                    Some(_) => {
                        return Err(inconsistency(format!(
                            "vertex {vertex_index} lists incoming edge {edge_index} with mismatched endpoints"
                        )))
                    }
                    None => {
                        return Err(inconsistency(format!(
                            "vertex {vertex_index} lists missing incoming edge {edge_index}"
                        )))
                    }
                }
            }
        }

        for (edge_index, edge) in self.iter_edges() {
            let (Some(source), Some(target)) = (self.get_vertex(edge.from), self.get_vertex(edge.to)) else {
                return Err(inconsistency(format!(
                    "edge {edge_index} references a missing vertex ({} -> {})",
                    edge.from, edge.to
                )));
            };
            let outgoing = source
                .connections_from
                .iter()
                .filter(|(_, e)| *e == edge_index)
                .count();
            let incoming = target
                .connections_to
                .iter()
                .filter(|(_, e)| *e == edge_index)
                .count();
            if outgoing != 1 || incoming != 1 {
                return Err(inconsistency(format!(
                    "edge {edge_index} is listed {outgoing} time(s) on its source and {incoming} time(s) on its target"
                )));
            }
        }

        Ok(())
    }
}

fn inconsistency(reason: String) -> CoreError {
    CoreError::GraphInconsistency { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_vertices() -> (Graph<&'static str, u8>, VertexIndex, VertexIndex) {
        let mut graph = Graph::new();
        let v1 = graph.add_vertex("v1");
        let v2 = graph.add_vertex("v2");
        (graph, v1, v2)
    }

    #[test]
    fn add_edge_records_both_adjacency_lists() {
        let (mut graph, v1, v2) = two_vertices();
        let e = graph.add_edge(v1, v2, 7).unwrap();

        assert_eq!(graph.get_vertex(v1).unwrap().connections_from(), &[(v2, e)]);
        assert_eq!(graph.get_vertex(v2).unwrap().connections_to(), &[(v1, e)]);
        assert!(graph.get_vertex(v1).unwrap().connections_to().is_empty());
        assert_eq!(graph.get_edge(e).unwrap().data(), &7);
        graph.check_consistency().unwrap();
    }

    #[test]
    fn add_edge_rejects_dangling_endpoint() {
        let (mut graph, v1, v2) = two_vertices();
        graph.remove_vertex(v2);

        let err = graph.add_edge(v1, v2, 0).unwrap_err();
        assert!(matches!(err, CoreError::DanglingEndpoint { vertex } if vertex == v2));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn remove_vertex_cascades_to_edges() {
        let (mut graph, v1, v2) = two_vertices();
        let e = graph.add_edge(v1, v2, 1).unwrap();

        assert_eq!(graph.remove_vertex(v1), Some("v1"));
        assert!(graph.get_edge(e).is_none());
        assert!(graph.get_vertex(v2).unwrap().connections_to().is_empty());
        graph.check_consistency().unwrap();
    }

    #[test]
    fn remove_vertex_handles_self_loop() {
        let mut graph: Graph<(), ()> = Graph::new();
        let v = graph.add_vertex(());
        let other = graph.add_vertex(());
        graph.add_edge(v, v, ()).unwrap();
        graph.add_edge(other, v, ()).unwrap();

        graph.remove_vertex(v);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.get_vertex(other).unwrap().connections_from().is_empty());
        graph.check_consistency().unwrap();
    }

    #[test]
    fn remove_edge_prunes_both_endpoints() {
        let (mut graph, v1, v2) = two_vertices();
        let keep = graph.add_edge(v1, v2, 1).unwrap();
        let drop = graph.add_edge(v1, v2, 2).unwrap();

        assert_eq!(graph.remove_edge(drop), Some(2));
        assert_eq!(graph.remove_edge(drop), None);
        assert_eq!(graph.get_vertex(v1).unwrap().connections_from(), &[(v2, keep)]);
        assert_eq!(graph.get_vertex(v2).unwrap().connections_to(), &[(v1, keep)]);
    }

    #[test]
    fn stale_vertex_handle_does_not_reach_new_occupant() {
        let (mut graph, v1, _) = two_vertices();
        graph.remove_vertex(v1);
        let v3 = graph.add_vertex("v3");

        assert_eq!(v3.0.index, v1.0.index);
        assert!(graph.get_vertex(v1).is_none());
        assert_eq!(graph.remove_vertex(v1), None);
        assert_eq!(graph.get_vertex_data(v3), Some(&"v3"));
    }

    #[test]
    fn insert_vertex_at_keeps_edges_for_same_handle() {
        let (mut graph, v1, v2) = two_vertices();
        let e = graph.add_edge(v1, v2, 0).unwrap();

        let old = graph.insert_vertex_at(v1, "v1'").unwrap();
        assert_eq!(old, Some("v1"));
        assert!(graph.contains_edge(e));
        assert_eq!(graph.get_vertex_data(v1), Some(&"v1'"));
    }

    #[test]
    fn insert_vertex_at_newer_generation_evicts_occupant() {
        let (mut graph, v1, v2) = two_vertices();
        let e = graph.add_edge(v1, v2, 0).unwrap();

        let newer = VertexIndex::new(v1.0.index, v1.0.generation + 3);
        assert_eq!(graph.insert_vertex_at(newer, "fresh").unwrap(), None);
        assert!(!graph.contains_edge(e));
        assert!(graph.get_vertex(v1).is_none());
        assert_eq!(graph.get_vertex_data(newer), Some(&"fresh"));
        graph.check_consistency().unwrap();
    }

    #[test]
    fn consistency_check_catches_orphaned_adjacency() {
        let json = r#"{
            "vertices": [
                {"Occupied":{"value":{"connectionsFrom":[[{"index":1,"generation":0},{"index":0,"generation":0}]],"connectionsTo":[],"data":0},"generation":0}},
                {"Occupied":{"value":{"connectionsFrom":[],"connectionsTo":[],"data":1},"generation":0}}
            ],
            "edges": []
        }"#;
        let graph: Graph<u8, u8> = serde_json::from_str(json).unwrap();
        let err = graph.check_consistency().unwrap_err();
        assert!(matches!(err, CoreError::GraphInconsistency { .. }));
    }

    #[test]
    fn serde_preserves_handles() {
        let (mut graph, v1, v2) = two_vertices();
        let e = graph.add_edge(v1, v2, 9).unwrap();
        graph.remove_vertex(v1);
        let v3 = graph.add_vertex("v3");

        let json = serde_json::to_string(&graph).unwrap();
        let back: Graph<String, u8> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get_vertex_data(v3).map(String::as_str), Some("v3"));
        assert!(back.get_vertex(v1).is_none());
        assert!(back.get_edge(e).is_none());
        back.check_consistency().unwrap();
    }
}
