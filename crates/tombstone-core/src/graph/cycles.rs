//! Strongly connected components over the cascade edges (Tarjan).

use crate::catalog::QualifiedName;
use std::collections::BTreeMap;

struct Tarjan<'a> {
    adjacency: &'a BTreeMap<QualifiedName, Vec<QualifiedName>>,
    index: usize,
    indices: BTreeMap<&'a QualifiedName, usize>,
    lowlinks: BTreeMap<&'a QualifiedName, usize>,
    stack: Vec<&'a QualifiedName>,
    on_stack: BTreeMap<&'a QualifiedName, bool>,
    components: Vec<Vec<QualifiedName>>,
}

impl<'a> Tarjan<'a> {
    fn visit(&mut self, node: &'a QualifiedName) {
        self.indices.insert(node, self.index);
        self.lowlinks.insert(node, self.index);
        self.index += 1;
        self.stack.push(node);
        self.on_stack.insert(node, true);

        let adjacency = self.adjacency;
        if let Some(successors) = adjacency.get(node) {
            for next in successors {
                if !self.indices.contains_key(next) {
                    self.visit(next);
                    let low = self.lowlinks[next].min(self.lowlinks[node]);
                    self.lowlinks.insert(node, low);
                } else if self.on_stack.get(next).copied().unwrap_or(false) {
                    let low = self.indices[next].min(self.lowlinks[node]);
                    self.lowlinks.insert(node, low);
                }
            }
        }

        if self.lowlinks[node] == self.indices[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.insert(member, false);
                component.push(member.clone());
                if member == node {
                    break;
                }
            }
            component.sort();
            self.components.push(component);
        }
    }
}

/// Find the cycles of a directed graph.
///
/// A cycle is a component with more than one node, or a single node with an
/// edge to itself. Members are sorted; cycles are ordered by first member.
pub fn find_cycles(
    adjacency: &BTreeMap<QualifiedName, Vec<QualifiedName>>,
) -> Vec<Vec<QualifiedName>> {
    let mut tarjan = Tarjan {
        adjacency,
        index: 0,
        indices: BTreeMap::new(),
        lowlinks: BTreeMap::new(),
        stack: Vec::new(),
        on_stack: BTreeMap::new(),
        components: Vec::new(),
    };

    for node in adjacency.keys() {
        if !tarjan.indices.contains_key(node) {
            tarjan.visit(node);
        }
    }

    let mut cycles: Vec<_> = tarjan
        .components
        .into_iter()
        .filter(|component| match component.as_slice() {
            [single] => adjacency
                .get(single)
                .is_some_and(|next| next.contains(single)),
            _ => true,
        })
        .collect();
    cycles.sort();
    cycles
}
