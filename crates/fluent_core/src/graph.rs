//! The reference dependency graph (§4.3): which messages/terms reference
//! which, used to detect undefined references and cyclic dependencies before
//! resolution ever runs.
//!
//! Nodes are fully-qualified entry ids (`msg:foo`, `term:-bar`). Edges are
//! collected by walking every `Expression` in every `Pattern` the resource
//! contains. Cycle detection runs Tarjan's SCC algorithm first (cheap, linear)
//! and only enumerates the actual simple cycles inside an SCC (Johnson's
//! algorithm) when one is found, bounded by `max_cycles` so a
//! combinatorially-cyclic resource can't turn a single `validate_resource`
//! call into an unbounded enumeration.

use ahash::{AHashMap, AHashSet};

use crate::ast::{Entry, Expression, Pattern, PatternElement, Resource};

/// A directed graph over fully-qualified entry ids.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: Vec<String>,
    node_index: AHashMap<String, usize>,
    pub edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn intern(&mut self, id: String) -> usize {
        if let Some(&i) = self.node_index.get(&id) {
            return i;
        }
        let i = self.nodes.len();
        self.node_index.insert(id.clone(), i);
        self.nodes.push(id);
        self.edges.push(Vec::new());
        i
    }

    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }
}

/// Builds the dependency graph for every `Message`/`Term` in `resource`.
/// Edges are added only to targets that exist as a node (i.e. a declared
/// Message or Term); references to undefined ids are reported separately by
/// the caller (`bundle::validate_resource`), not as dangling graph edges.
#[must_use]
pub fn build_dependency_graph(resource: &Resource) -> DependencyGraph {
    let mut graph = DependencyGraph::default();
    for entry in &resource.entries {
        if let Some(id) = entry.qualified_id() {
            graph.intern(id);
        }
    }
    for entry in &resource.entries {
        let Some(from_id) = entry.qualified_id() else { continue };
        let from = graph.intern(from_id);
        let mut targets = Vec::new();
        match entry {
            Entry::Message(m) => {
                if let Some(v) = &m.value {
                    collect_pattern_refs(v, &mut targets);
                }
                for attr in &m.attributes {
                    collect_pattern_refs(&attr.value, &mut targets);
                }
            }
            Entry::Term(t) => {
                collect_pattern_refs(&t.value, &mut targets);
                for attr in &t.attributes {
                    collect_pattern_refs(&attr.value, &mut targets);
                }
            }
            Entry::Comment(_) | Entry::Junk(_) => {}
        }
        for target in targets {
            if let Some(&to) = graph.node_index.get(&target) {
                graph.add_edge(from, to);
            }
        }
    }
    graph
}

/// Every `(referrer, target)` pair in `resource`, regardless of whether
/// `target` is actually declared anywhere — used by `validation::validate_resource`
/// to report [`crate::error::ValidationError::UndefinedReference`], which
/// `build_dependency_graph` itself stays silent on (it only wires edges
/// between nodes that both exist).
#[must_use]
pub fn collect_referenced_ids(resource: &Resource) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for entry in &resource.entries {
        let Some(from_id) = entry.qualified_id() else { continue };
        let mut targets = Vec::new();
        match entry {
            Entry::Message(m) => {
                if let Some(v) = &m.value {
                    collect_pattern_refs(v, &mut targets);
                }
                for attr in &m.attributes {
                    collect_pattern_refs(&attr.value, &mut targets);
                }
            }
            Entry::Term(t) => {
                collect_pattern_refs(&t.value, &mut targets);
                for attr in &t.attributes {
                    collect_pattern_refs(&attr.value, &mut targets);
                }
            }
            Entry::Comment(_) | Entry::Junk(_) => {}
        }
        for target in targets {
            pairs.push((from_id.clone(), target));
        }
    }
    pairs
}

fn collect_pattern_refs(pattern: &Pattern, out: &mut Vec<String>) {
    for element in &pattern.elements {
        if let PatternElement::Placeable(p) = element {
            collect_expression_refs(&p.expression, out);
        }
    }
}

fn collect_expression_refs(expr: &Expression, out: &mut Vec<String>) {
    match expr {
        Expression::MessageReference { id, .. } => out.push(format!("msg:{}", id.as_str())),
        Expression::TermReference { id, args, .. } => {
            out.push(format!("term:{}", id.as_str()));
            if let Some(args) = args {
                for positional in &args.positional {
                    collect_expression_refs(positional, out);
                }
                for value in args.named.values() {
                    collect_expression_refs(value, out);
                }
            }
        }
        Expression::FunctionReference { args, .. } => {
            for positional in &args.positional {
                collect_expression_refs(positional, out);
            }
            for value in args.named.values() {
                collect_expression_refs(value, out);
            }
        }
        Expression::Select(sel) => {
            collect_expression_refs(&sel.selector, out);
            for variant in &sel.variants {
                collect_pattern_refs(&variant.value, out);
            }
        }
        Expression::StringLiteral(_) | Expression::NumberLiteral(_) | Expression::VariableReference { .. } => {}
    }
}

/// One simple cycle, canonicalized: rotated so its lexicographically-smallest
/// node id comes first, then joined with U+241F (SYMBOL FOR INFORMATION
/// SEPARATOR ONE) so the same cycle found via different starting points
/// always produces the same key. Direction is preserved — `a -> b -> a` and
/// `b -> a -> b` canonicalize to the same key, but a cycle and its reverse
/// traversal do not get conflated if the graph doesn't actually contain the
/// reverse edges.
#[must_use]
pub fn canonicalize_cycle(cycle: &[usize], graph: &DependencyGraph) -> String {
    if cycle.is_empty() {
        return String::new();
    }
    let (min_idx, _) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, &node)| graph.nodes[node].as_str())
        .expect("cycle is non-empty");
    let rotated: Vec<&str> = (0..cycle.len()).map(|i| graph.nodes[cycle[(min_idx + i) % cycle.len()]].as_str()).collect();
    rotated.join("\u{241F}")
}

/// Tarjan's strongly connected components, iterative to avoid recursion depth
/// proportional to resource size.
#[must_use]
pub fn strongly_connected_components(graph: &DependencyGraph) -> Vec<Vec<usize>> {
    let n = graph.node_count();
    let mut index = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut next_index = 0usize;
    let mut sccs = Vec::new();

    enum Frame {
        Enter(usize),
        Finish(usize, usize),
    }

    for start in 0..n {
        if index[start].is_some() {
            continue;
        }
        let mut work: Vec<Frame> = vec![Frame::Enter(start)];
        let mut child_cursor: AHashMap<usize, usize> = AHashMap::new();

        while let Some(frame) = work.pop() {
            match frame {
                Frame::Enter(v) => {
                    if index[v].is_some() {
                        continue;
                    }
                    index[v] = Some(next_index);
                    lowlink[v] = next_index;
                    next_index += 1;
                    stack.push(v);
                    on_stack[v] = true;
                    child_cursor.insert(v, 0);
                    work.push(Frame::Finish(v, 0));
                }
                Frame::Finish(v, _) => {
                    let cursor = *child_cursor.get(&v).unwrap_or(&0);
                    if cursor < graph.edges[v].len() {
                        let w = graph.edges[v][cursor];
                        child_cursor.insert(v, cursor + 1);
                        work.push(Frame::Finish(v, 0));
                        if index[w].is_none() {
                            work.push(Frame::Enter(w));
                            // after `w` finishes, lowlink[v] must absorb lowlink[w]; re-check on the
                            // next time this frame pops by comparing indices directly below.
                        } else if on_stack[w] {
                            lowlink[v] = lowlink[v].min(index[w].expect("w was indexed"));
                        }
                        continue;
                    }
                    // all children processed; propagate lowlink from any child back to parent
                    for &w in &graph.edges[v] {
                        if index[w].is_some() {
                            lowlink[v] = lowlink[v].min(lowlink[w]);
                        }
                    }
                    if lowlink[v] == index[v].expect("v was indexed") {
                        let mut component = Vec::new();
                        loop {
                            let w = stack.pop().expect("component root is still on stack");
                            on_stack[w] = false;
                            component.push(w);
                            if w == v {
                                break;
                            }
                        }
                        sccs.push(component);
                    }
                }
            }
        }
    }
    sccs
}

/// Enumerates simple cycles contained within a single SCC using Johnson's
/// algorithm, stopping early once `max_cycles` have been found. Returns
/// `(cycles, truncated)`.
#[must_use]
pub fn enumerate_simple_cycles(graph: &DependencyGraph, scc: &[usize], max_cycles: usize) -> (Vec<Vec<usize>>, bool) {
    let members: AHashSet<usize> = scc.iter().copied().collect();
    let mut cycles = Vec::new();
    let mut truncated = false;

    for &start in scc {
        if truncated {
            break;
        }
        let mut blocked: AHashSet<usize> = AHashSet::new();
        let mut block_map: AHashMap<usize, AHashSet<usize>> = AHashMap::new();
        let mut stack = vec![start];
        let mut seen_path: AHashSet<usize> = AHashSet::from_iter([start]);

        if !johnson_circuit(
            graph,
            &members,
            start,
            start,
            &mut blocked,
            &mut block_map,
            &mut stack,
            &mut seen_path,
            &mut cycles,
            max_cycles,
            &mut truncated,
        ) {
            break;
        }
    }
    (cycles, truncated)
}

#[allow(clippy::too_many_arguments)]
fn johnson_circuit(
    graph: &DependencyGraph,
    members: &AHashSet<usize>,
    root: usize,
    current: usize,
    blocked: &mut AHashSet<usize>,
    block_map: &mut AHashMap<usize, AHashSet<usize>>,
    stack: &mut Vec<usize>,
    seen_path: &mut AHashSet<usize>,
    cycles: &mut Vec<Vec<usize>>,
    max_cycles: usize,
    truncated: &mut bool,
) -> bool {
    let mut found = false;
    blocked.insert(current);

    for &next in &graph.edges[current] {
        if !members.contains(&next) || next < root {
            continue;
        }
        if next == root {
            cycles.push(stack.clone());
            found = true;
            if cycles.len() >= max_cycles {
                *truncated = true;
                blocked.remove(&current);
                return false;
            }
        } else if !blocked.contains(&next) && seen_path.insert(next) {
            stack.push(next);
            let sub_found = johnson_circuit(
                graph, members, root, next, blocked, block_map, stack, seen_path, cycles, max_cycles, truncated,
            );
            stack.pop();
            seen_path.remove(&next);
            if *truncated {
                blocked.remove(&current);
                return false;
            }
            found |= sub_found;
        }
    }

    if found {
        unblock(current, blocked, block_map);
    } else {
        for &next in &graph.edges[current] {
            if members.contains(&next) && next >= root {
                block_map.entry(next).or_default().insert(current);
            }
        }
    }
    true
}

fn unblock(node: usize, blocked: &mut AHashSet<usize>, block_map: &mut AHashMap<usize, AHashSet<usize>>) {
    blocked.remove(&node);
    if let Some(dependents) = block_map.remove(&node) {
        for dependent in dependents {
            if blocked.contains(&dependent) {
                unblock(dependent, blocked, block_map);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn detects_no_cycle_in_acyclic_resource() {
        let (res, _) = parse("a = { b }\nb = plain\n");
        let graph = build_dependency_graph(&res);
        let sccs = strongly_connected_components(&graph);
        assert!(sccs.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn detects_direct_two_cycle() {
        let (res, _) = parse("a = { b }\nb = { a }\n");
        let graph = build_dependency_graph(&res);
        let sccs = strongly_connected_components(&graph);
        let cyclic: Vec<_> = sccs.into_iter().filter(|c| c.len() > 1).collect();
        assert_eq!(cyclic.len(), 1);
        let (cycles, truncated) = enumerate_simple_cycles(&graph, &cyclic[0], 100);
        assert!(!truncated);
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let (res, _) = parse("-a = { -a }\n");
        let graph = build_dependency_graph(&res);
        let sccs = strongly_connected_components(&graph);
        let self_loop = sccs.iter().find(|c| c.len() == 1 && graph.edges[c[0]].contains(&c[0]));
        assert!(self_loop.is_some());
    }

    #[test]
    fn cycle_canonicalization_is_rotation_independent() {
        let (res, _) = parse("a = { b }\nb = { c }\nc = { a }\n");
        let graph = build_dependency_graph(&res);
        let a = graph.index_of("msg:a").unwrap();
        let b = graph.index_of("msg:b").unwrap();
        let c = graph.index_of("msg:c").unwrap();
        let k1 = canonicalize_cycle(&[a, b, c], &graph);
        let k2 = canonicalize_cycle(&[b, c, a], &graph);
        let k3 = canonicalize_cycle(&[c, a, b], &graph);
        assert_eq!(k1, k2);
        assert_eq!(k2, k3);
    }
}
