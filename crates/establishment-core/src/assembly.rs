//! # Graph Assembly
//!
//! Turns raw graph rows into a structurally valid `Graph`.
//!
//! Assembly runs in two passes:
//! 1. Collect nodes into an id-keyed map (last row wins) and collect
//!    candidate edges from rows that carry a complete relationship.
//! 2. Keep only candidate edges whose source and target are both present in
//!    the realized node set.
//!
//! The second pass is what guarantees referential closure: a store may emit
//! relationship rows that point at persons absent from the same result.
//! Malformed rows never fail the assembly; they are counted in the
//! `AssemblyReport` so callers can surface them.

use crate::storage::GraphRow;
use crate::{Graph, Person, Relationship, RelationshipKind};
use std::collections::BTreeMap;

/// Counts of rows seen and dropped during one assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Total rows processed.
    pub rows_seen: usize,
    /// Rows missing the person, or carrying a relationship with a missing
    /// type or details.
    pub incomplete_rows: usize,
    /// Rows whose relationship type is not a known `RelationshipKind`.
    pub unknown_types: usize,
    /// Rows relating a person to itself.
    pub self_loops: usize,
    /// Candidate edges dropped because an endpoint is not in the node set.
    pub dangling_edges: usize,
}

impl AssemblyReport {
    /// Total number of rows or edges dropped.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.incomplete_rows + self.unknown_types + self.self_loops + self.dangling_edges
    }

    /// True if nothing was dropped.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.dropped() == 0
    }
}

/// Assemble a graph from raw rows.
///
/// Never fails: malformed rows are dropped and counted.
#[must_use]
pub fn assemble_graph(rows: impl IntoIterator<Item = GraphRow>) -> (Graph, AssemblyReport) {
    let mut report = AssemblyReport::default();
    let mut nodes: BTreeMap<String, Person> = BTreeMap::new();
    let mut candidates: Vec<Relationship> = Vec::new();

    // Pass 1: nodes (last write wins) and candidate edges.
    for row in rows {
        report.rows_seen += 1;

        let Some(person) = row.person.filter(|p| !p.id.is_empty()) else {
            report.incomplete_rows += 1;
            continue;
        };
        let source_id = person.id.clone();
        nodes.insert(source_id.clone(), person);

        let Some(target_id) = row.related_id else {
            continue;
        };
        let (Some(kind), Some(details)) = (row.kind, row.details) else {
            report.incomplete_rows += 1;
            continue;
        };
        let Ok(kind) = kind.parse::<RelationshipKind>() else {
            report.unknown_types += 1;
            continue;
        };
        if source_id == target_id {
            report.self_loops += 1;
            continue;
        }
        candidates.push(Relationship {
            source_id,
            target_id,
            kind,
            details,
        });
    }

    // Pass 2: referential closure against the realized node set.
    let edges: Vec<Relationship> = candidates
        .into_iter()
        .filter(|edge| {
            let closed = nodes.contains_key(&edge.source_id) && nodes.contains_key(&edge.target_id);
            if !closed {
                report.dangling_edges += 1;
            }
            closed
        })
        .collect();

    let graph = Graph {
        nodes: nodes.into_values().collect(),
        edges,
    };
    (graph, report)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str) -> Person {
        Person::new(id, id.to_uppercase())
    }

    #[test]
    fn empty_rows_yield_empty_graph() {
        let (graph, report) = assemble_graph(Vec::new());
        assert_eq!(graph, Graph::default());
        assert!(report.is_clean());
        assert_eq!(report.rows_seen, 0);
    }

    #[test]
    fn isolated_persons_are_nodes() {
        let rows = vec![GraphRow::isolated(person("a")), GraphRow::isolated(person("b"))];
        let (graph, report) = assemble_graph(rows);
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.edges.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn fan_out_collapses_to_one_node() {
        let rows = vec![
            GraphRow::edge(person("a"), "b", "FRIEND", "x"),
            GraphRow::edge(person("a"), "c", "FRIEND", "y"),
            GraphRow::edge(person("a"), "d", "FAMILY", "z"),
            GraphRow::isolated(person("b")),
            GraphRow::isolated(person("c")),
            GraphRow::isolated(person("d")),
        ];
        let (graph, report) = assemble_graph(rows);
        let ids: Vec<_> = graph.nodes.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);
        assert_eq!(graph.edges.len(), 3);
        assert!(report.is_clean());
    }

    #[test]
    fn last_row_wins_for_node_attributes() {
        let first = Person::new("a", "Old Name");
        let second = Person::new("a", "New Name");
        let rows = vec![GraphRow::isolated(first), GraphRow::isolated(second)];
        let (graph, _) = assemble_graph(rows);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].name, "New Name");
    }

    #[test]
    fn dangling_edge_is_filtered() {
        let rows = vec![
            GraphRow::edge(person("a"), "ghost", "COLLEAGUE", "x"),
            GraphRow::edge(person("a"), "b", "COLLEAGUE", "y"),
            GraphRow::isolated(person("b")),
        ];
        let (graph, report) = assemble_graph(rows);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].target_id, "b");
        assert_eq!(report.dangling_edges, 1);
    }

    #[test]
    fn edge_to_later_row_survives() {
        // The target appears only after the edge row; pass 2 still sees it.
        let rows = vec![
            GraphRow::edge(person("a"), "z", "BUSINESS", "board"),
            GraphRow::isolated(person("z")),
        ];
        let (graph, report) = assemble_graph(rows);
        assert_eq!(graph.edges.len(), 1);
        assert!(report.is_clean());
    }

    #[test]
    fn self_loop_rows_are_dropped() {
        let rows = vec![GraphRow::edge(person("a"), "a", "FRIEND", "me")];
        let (graph, report) = assemble_graph(rows);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
        assert_eq!(report.self_loops, 1);
    }

    #[test]
    fn incomplete_rows_are_dropped_not_fatal() {
        let rows = vec![
            GraphRow {
                person: None,
                related_id: Some("b".to_string()),
                kind: Some("FRIEND".to_string()),
                details: Some("x".to_string()),
            },
            GraphRow {
                person: Some(person("a")),
                related_id: Some("b".to_string()),
                kind: None,
                details: Some("x".to_string()),
            },
            GraphRow {
                person: Some(person("b")),
                related_id: Some("a".to_string()),
                kind: Some("FRIEND".to_string()),
                details: None,
            },
            GraphRow::isolated(Person::new("", "nameless")),
        ];
        let (graph, report) = assemble_graph(rows);
        let ids: Vec<_> = graph.nodes.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(graph.edges.is_empty());
        assert_eq!(report.incomplete_rows, 4);
        assert_eq!(report.rows_seen, 4);
    }

    #[test]
    fn unknown_type_rows_are_dropped() {
        let rows = vec![
            GraphRow::edge(person("a"), "b", "NEMESIS", "x"),
            GraphRow::isolated(person("b")),
        ];
        let (graph, report) = assemble_graph(rows);
        assert!(graph.edges.is_empty());
        assert_eq!(report.unknown_types, 1);
        assert_eq!(report.dropped(), 1);
    }
}
