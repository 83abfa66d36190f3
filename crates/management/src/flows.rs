//! Flow graph validation.
//!
//! A flow is runnable when it has exactly one trigger, every edge points at
//! a known node, every node is reachable from the trigger, and the graph
//! has no cycles.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::models::{FlowEdge, FlowNode, FlowNodeKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FlowIssue {
    MissingTrigger,
    MultipleTriggers { node_ids: Vec<String> },
    DuplicateNodeId { node_id: String },
    TriggerHasIncomingEdge { node_id: String },
    UnknownEdgeEndpoint { source: String, target: String },
    OrphanNode { node_id: String },
    Cycle { path: Vec<String> },
    ExitHasOutgoingEdge { node_id: String },
    EmptyEmailSubject { node_id: String },
    ZeroWait { node_id: String },
    InvalidCondition { node_id: String, reason: String },
    /// Warning only: a condition node should branch.
    UnbranchedCondition { node_id: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowValidation {
    pub valid: bool,
    pub errors: Vec<FlowIssue>,
    pub warnings: Vec<FlowIssue>,
}

pub fn validate_flow(nodes: &[FlowNode], edges: &[FlowEdge]) -> FlowValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(FlowIssue::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    let triggers: Vec<&FlowNode> = nodes
        .iter()
        .filter(|n| matches!(n.kind, FlowNodeKind::Trigger))
        .collect();
    match triggers.len() {
        0 => errors.push(FlowIssue::MissingTrigger),
        1 => {}
        _ => errors.push(FlowIssue::MultipleTriggers {
            node_ids: triggers.iter().map(|n| n.id.clone()).collect(),
        }),
    }

    let mut adjacency: HashMap<&str, Vec<&str>> =
        nodes.iter().map(|n| (n.id.as_str(), Vec::new())).collect();
    for edge in edges {
        let known = seen.contains(edge.source.as_str()) && seen.contains(edge.target.as_str());
        if !known {
            errors.push(FlowIssue::UnknownEdgeEndpoint {
                source: edge.source.clone(),
                target: edge.target.clone(),
            });
            continue;
        }
        if let Some(targets) = adjacency.get_mut(edge.source.as_str()) {
            targets.push(edge.target.as_str());
        }
    }

    for node in nodes {
        let outgoing = adjacency.get(node.id.as_str()).map_or(0, Vec::len);
        match &node.kind {
            FlowNodeKind::Trigger => {
                if edges.iter().any(|e| e.target == node.id) {
                    errors.push(FlowIssue::TriggerHasIncomingEdge {
                        node_id: node.id.clone(),
                    });
                }
            }
            FlowNodeKind::Email { subject, .. } if subject.trim().is_empty() => {
                errors.push(FlowIssue::EmptyEmailSubject {
                    node_id: node.id.clone(),
                });
            }
            FlowNodeKind::Wait { duration_hours: 0 } => {
                errors.push(FlowIssue::ZeroWait {
                    node_id: node.id.clone(),
                });
            }
            FlowNodeKind::Condition { condition } => {
                if let Err(e) = condition.validate() {
                    errors.push(FlowIssue::InvalidCondition {
                        node_id: node.id.clone(),
                        reason: e.to_string(),
                    });
                }
                if outgoing < 2 {
                    warnings.push(FlowIssue::UnbranchedCondition {
                        node_id: node.id.clone(),
                    });
                }
            }
            FlowNodeKind::Exit if outgoing > 0 => {
                errors.push(FlowIssue::ExitHasOutgoingEdge {
                    node_id: node.id.clone(),
                });
            }
            _ => {}
        }
    }

    if let [trigger] = triggers.as_slice() {
        let reachable = reachable_from(trigger.id.as_str(), &adjacency);
        for node in nodes {
            if !reachable.contains(node.id.as_str()) {
                errors.push(FlowIssue::OrphanNode {
                    node_id: node.id.clone(),
                });
            }
        }
    }

    if let Some(path) = find_cycle(nodes, &adjacency) {
        errors.push(FlowIssue::Cycle { path });
    }

    FlowValidation {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn reachable_from<'a>(start: &'a str, adjacency: &HashMap<&'a str, Vec<&'a str>>) -> HashSet<&'a str> {
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(id) = queue.pop_front() {
        for &next in adjacency.get(id).into_iter().flatten() {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    visited
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Grey,
    Black,
}

/// Iterative three-colour DFS. Returns the node ids forming the first cycle
/// found, closed with the repeated node.
fn find_cycle(nodes: &[FlowNode], adjacency: &HashMap<&str, Vec<&str>>) -> Option<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = nodes.iter().map(|n| (n.id.as_str(), Mark::White)).collect();

    for root in nodes.iter().map(|n| n.id.as_str()) {
        if marks.get(root) != Some(&Mark::White) {
            continue;
        }
        // (node, index of next child to visit)
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        marks.insert(root, Mark::Grey);

        while let Some((id, child)) = stack.last().copied() {
            let children = adjacency.get(id).map(Vec::as_slice).unwrap_or(&[]);
            if child >= children.len() {
                marks.insert(id, Mark::Black);
                stack.pop();
                continue;
            }
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            let next = children[child];
            match marks.get(next).copied().unwrap_or(Mark::Black) {
                Mark::White => {
                    marks.insert(next, Mark::Grey);
                    stack.push((next, 0));
                }
                Mark::Grey => {
                    let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|(n, _)| n.to_string()).collect();
                    path.push(next.to_string());
                    return Some(path);
                }
                Mark::Black => {}
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailwise_segmentation::{Condition, CustomerField, Operator};

    fn node(id: &str, kind: FlowNodeKind) -> FlowNode {
        FlowNode {
            id: id.to_string(),
            kind,
        }
    }

    fn email(id: &str) -> FlowNode {
        node(
            id,
            FlowNodeKind::Email {
                subject: "Welcome".into(),
                content: String::new(),
            },
        )
    }

    fn edge(source: &str, target: &str) -> FlowEdge {
        FlowEdge {
            source: source.to_string(),
            target: target.to_string(),
            label: None,
        }
    }

    fn welcome_series() -> (Vec<FlowNode>, Vec<FlowEdge>) {
        let nodes = vec![
            node("t", FlowNodeKind::Trigger),
            email("e1"),
            node("w", FlowNodeKind::Wait { duration_hours: 48 }),
            node(
                "c",
                FlowNodeKind::Condition {
                    condition: Condition::new(CustomerField::TotalOrders, Operator::GreaterThan, 0),
                },
            ),
            email("e2"),
            node("x", FlowNodeKind::Exit),
        ];
        let edges = vec![
            edge("t", "e1"),
            edge("e1", "w"),
            edge("w", "c"),
            edge("c", "e2"),
            edge("c", "x"),
            edge("e2", "x"),
        ];
        (nodes, edges)
    }

    #[test]
    fn test_valid_flow() {
        let (nodes, edges) = welcome_series();
        let result = validate_flow(&nodes, &edges);
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_cycle_detected() {
        let (nodes, mut edges) = welcome_series();
        edges.push(edge("e2", "w"));
        let result = validate_flow(&nodes, &edges);
        assert!(!result.valid);
        let cycle = result
            .errors
            .iter()
            .find_map(|e| match e {
                FlowIssue::Cycle { path } => Some(path.clone()),
                _ => None,
            })
            .expect("cycle reported");
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&"w".to_string()));
    }

    #[test]
    fn test_orphan_node_detected() {
        let (mut nodes, edges) = welcome_series();
        nodes.push(email("lonely"));
        let result = validate_flow(&nodes, &edges);
        assert!(result.errors.contains(&FlowIssue::OrphanNode {
            node_id: "lonely".into()
        }));
    }

    #[test]
    fn test_trigger_rules() {
        let result = validate_flow(&[email("e1")], &[]);
        assert!(result.errors.contains(&FlowIssue::MissingTrigger));

        let nodes = vec![
            node("t1", FlowNodeKind::Trigger),
            node("t2", FlowNodeKind::Trigger),
        ];
        let result = validate_flow(&nodes, &[edge("t1", "t2")]);
        assert!(matches!(
            result.errors[0],
            FlowIssue::MultipleTriggers { .. }
        ));
        assert!(result.errors.contains(&FlowIssue::TriggerHasIncomingEdge {
            node_id: "t2".into()
        }));
    }

    #[test]
    fn test_node_level_checks() {
        let nodes = vec![
            node("t", FlowNodeKind::Trigger),
            node(
                "e",
                FlowNodeKind::Email {
                    subject: " ".into(),
                    content: String::new(),
                },
            ),
            node("w", FlowNodeKind::Wait { duration_hours: 0 }),
            node("x", FlowNodeKind::Exit),
        ];
        let edges = vec![
            edge("t", "e"),
            edge("e", "w"),
            edge("w", "x"),
            edge("x", "ghost"),
        ];
        let result = validate_flow(&nodes, &edges);
        assert!(result.errors.contains(&FlowIssue::EmptyEmailSubject { node_id: "e".into() }));
        assert!(result.errors.contains(&FlowIssue::ZeroWait { node_id: "w".into() }));
        assert!(result.errors.contains(&FlowIssue::UnknownEdgeEndpoint {
            source: "x".into(),
            target: "ghost".into()
        }));
    }

    #[test]
    fn test_node_wire_format() {
        let json = serde_json::json!({
            "id": "c",
            "type": "condition",
            "condition": {"field": "state", "operator": "=", "value": "TX"}
        });
        let parsed: FlowNode = serde_json::from_value(json).unwrap();
        assert!(matches!(parsed.kind, FlowNodeKind::Condition { .. }));

        let wait: FlowNode =
            serde_json::from_value(serde_json::json!({"id": "w", "type": "wait", "durationHours": 24}))
                .unwrap();
        assert!(matches!(wait.kind, FlowNodeKind::Wait { duration_hours: 24 }));
    }
}
