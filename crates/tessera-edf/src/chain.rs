//! Dependency ordering by repeated fixed-point scans.
//!
//! [`DependencyChain`] records edges `a -> b` meaning "`a` depends on `b`" and
//! orders nodes so that every dependency precedes its dependents. Each pass
//! over the node list places every node whose dependencies are already placed.
//! Two consecutive passes that place nothing mean the remaining nodes form (or
//! hang off) a cycle.
//!
//! The same chain orders `$require`d definition files, links definitions in
//! inheritance order, and sequences static entities declared with `->dep`.

use std::collections::HashMap;
use std::hash::Hash;

/// Outcome of a partial resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainResolution<T> {
    /// Nodes that could be placed, dependencies first.
    pub ordered: Vec<T>,
    /// Nodes that are part of, or depend on, a cycle.
    pub unresolved: Vec<T>,
}

impl<T> ChainResolution<T> {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// A directed dependency graph with insertion-ordered nodes.
#[derive(Debug, Clone)]
pub struct DependencyChain<T> {
    nodes: Vec<T>,
    index: HashMap<T, usize>,
    /// `deps[i]` holds the node indices that node `i` depends on.
    deps: Vec<Vec<usize>>,
}

impl<T> Default for DependencyChain<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            deps: Vec::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> DependencyChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node without edges. Returns its index; adding twice is a no-op.
    pub fn add_node(&mut self, node: T) -> usize {
        if let Some(&i) = self.index.get(&node) {
            return i;
        }
        let i = self.nodes.len();
        self.index.insert(node.clone(), i);
        self.nodes.push(node);
        self.deps.push(Vec::new());
        i
    }

    /// Record that `a` depends on `b`.
    pub fn connect_ab(&mut self, a: T, b: T) {
        let ia = self.add_node(a);
        let ib = self.add_node(b);
        if !self.deps[ia].contains(&ib) {
            self.deps[ia].push(ib);
        }
    }

    pub fn contains(&self, node: &T) -> bool {
        self.index.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of `node`, in the order they were connected.
    pub fn dependencies_of(&self, node: &T) -> Vec<&T> {
        self.index
            .get(node)
            .map(|&i| self.deps[i].iter().map(|&d| &self.nodes[d]).collect())
            .unwrap_or_default()
    }

    /// Order every node, or `None` if any cycle exists.
    pub fn resolve_chain_to_list(&self) -> Option<Vec<T>> {
        let resolution = self.resolve();
        if resolution.is_complete() {
            Some(resolution.ordered)
        } else {
            None
        }
    }

    /// Order as many nodes as possible, reporting the rest as unresolved.
    pub fn resolve(&self) -> ChainResolution<T> {
        let n = self.nodes.len();
        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut idle_passes = 0;

        while order.len() < n {
            let mut moved = 0;
            for i in 0..n {
                if !placed[i] && self.deps[i].iter().all(|&d| placed[d]) {
                    placed[i] = true;
                    order.push(i);
                    moved += 1;
                }
            }
            if moved == 0 {
                idle_passes += 1;
                if idle_passes >= 2 {
                    break;
                }
            } else {
                idle_passes = 0;
            }
        }

        ChainResolution {
            ordered: order.iter().map(|&i| self.nodes[i].clone()).collect(),
            unresolved: (0..n)
                .filter(|&i| !placed[i])
                .map(|i| self.nodes[i].clone())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[&str], name: &str) -> usize {
        order.iter().position(|n| *n == name).unwrap()
    }

    #[test]
    fn dependencies_precede_dependents() {
        let mut chain = DependencyChain::new();
        chain.connect_ab("game", "player");
        chain.connect_ab("player", "sprite");
        chain.connect_ab("game", "sprite");
        chain.add_node("hud");

        let order = chain.resolve_chain_to_list().unwrap();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "sprite") < position(&order, "player"));
        assert!(position(&order, "player") < position(&order, "game"));
    }

    #[test]
    fn independent_nodes_keep_insertion_order() {
        let mut chain = DependencyChain::new();
        for n in ["c", "a", "b"] {
            chain.add_node(n);
        }
        assert_eq!(chain.resolve_chain_to_list().unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn two_node_cycle_returns_none() {
        let mut chain = DependencyChain::new();
        chain.connect_ab("a", "b");
        chain.connect_ab("b", "a");
        assert_eq!(chain.resolve_chain_to_list(), None);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut chain = DependencyChain::new();
        chain.connect_ab("a", "a");
        assert_eq!(chain.resolve_chain_to_list(), None);
    }

    #[test]
    fn partial_resolution_separates_cycle_and_dependents() {
        let mut chain = DependencyChain::new();
        chain.connect_ab("ok", "base");
        chain.connect_ab("x", "y");
        chain.connect_ab("y", "x");
        chain.connect_ab("z", "x");

        let res = chain.resolve();
        assert_eq!(res.ordered, vec!["base", "ok"]);
        assert_eq!(res.unresolved, vec!["x", "y", "z"]);
        assert!(!res.is_complete());
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        let mut chain = DependencyChain::new();
        chain.connect_ab("a", "b");
        chain.connect_ab("a", "b");
        assert_eq!(chain.dependencies_of(&"a"), vec![&"b"]);
        assert_eq!(chain.len(), 2);
    }
}
