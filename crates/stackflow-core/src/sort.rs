//! Dependency ordering

use crate::error::{DefinitionError, Result};
use crate::tree::DefinitionTree;
use std::collections::HashMap;

/// Produces the order in which top-level resources are provisioned
pub trait Sorter {
    fn sort(&self, tree: &DefinitionTree) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Depth-first topological sort over immutable reference edges.
///
/// References held through Mutable attributes are not edges, so cycles made
/// only of them are allowed; they get attached after creation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopologicalSorter;

impl TopologicalSorter {
    pub fn new() -> Self {
        Self
    }

    fn visit(
        &self,
        tree: &DefinitionTree,
        name: &str,
        marks: &mut HashMap<String, Mark>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::InProgress) => {
                return Err(DefinitionError::CycleDetected(name.to_string()));
            }
            Some(Mark::Done) => return Ok(()),
            None => {}
        }
        marks.insert(name.to_string(), Mark::InProgress);

        for owned in tree.owned_references(name)? {
            if owned.mutable {
                continue;
            }
            for target in tree.matching_resources(owned.reference) {
                self.visit(tree, &target.top, marks, order)?;
            }
        }

        marks.insert(name.to_string(), Mark::Done);
        order.push(name.to_string());
        Ok(())
    }
}

impl Sorter for TopologicalSorter {
    fn sort(&self, tree: &DefinitionTree) -> Result<Vec<String>> {
        let mut marks = HashMap::new();
        let mut order = Vec::new();
        for name in tree.names() {
            self.visit(tree, &name, &mut marks, &mut order)?;
        }
        tracing::debug!("Creation order: {}", order.join(" -> "));
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::security_group;
    use crate::node::ResourceNode;
    use crate::testing;

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let tree = testing::chain_tree();
        let order = TopologicalSorter::new().sort(&tree).unwrap();
        assert_eq!(order, vec!["n", "s", "i"]);
    }

    #[test]
    fn test_each_resource_once() {
        let mut tree = testing::chain_tree();
        let second = testing::instance(&mut tree, "i2", "s");
        tree.add(second).unwrap();

        let order = TopologicalSorter::new().sort(&tree).unwrap();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "n") < position(&order, "s"));
        assert!(position(&order, "s") < position(&order, "i"));
        assert!(position(&order, "s") < position(&order, "i2"));
    }

    #[test]
    fn test_mutable_cycle_is_allowed() {
        let tree = testing::cyclic_groups();
        let order = TopologicalSorter::new().sort(&tree).unwrap();
        assert_eq!(order, vec!["g1", "g2"]);
    }

    /// Only the immutable edge orders a cycle with one edge of each kind
    #[test]
    fn test_mixed_cycle_puts_immutable_target_first() {
        let mut tree = DefinitionTree::new("mixed");
        let mut app = ResourceNode::new(security_group::schema(), "app").unwrap();
        app.set("network", tree.reference(&["edge", "id"])).unwrap();
        app.set("description", "app").unwrap();
        let edge = testing::security_group(&mut tree, "edge", "app");
        tree.add(app).unwrap();
        tree.add(edge).unwrap();

        let order = TopologicalSorter::new().sort(&tree).unwrap();
        assert_eq!(order, vec!["edge", "app"]);
    }

    #[test]
    fn test_immutable_cycle_is_rejected() {
        let mut tree = DefinitionTree::new("loop");
        for (name, peer) in [("a", "b"), ("b", "a")] {
            let mut group = ResourceNode::new(security_group::schema(), name).unwrap();
            group.set("network", tree.reference(&[peer, "id"])).unwrap();
            tree.add(group).unwrap();
        }

        assert_eq!(
            TopologicalSorter::new().sort(&tree).unwrap_err(),
            DefinitionError::CycleDetected("a".to_string())
        );
    }
}
