//! Ideal link lengths from neighbourhood overlap, and directed-edge ("flow") constraints.

use crate::graph::{Axis, Constraint, Link};
use rustc_hash::{FxHashMap, FxHashSet};

fn neighbours(links: &[Link]) -> FxHashMap<usize, FxHashSet<usize>> {
    let mut neighbours: FxHashMap<usize, FxHashSet<usize>> = FxHashMap::default();
    for l in links {
        neighbours.entry(l.source).or_default().insert(l.target);
        neighbours.entry(l.target).or_default().insert(l.source);
    }
    neighbours
}

fn compute_link_lengths(
    links: &mut [Link],
    w: f64,
    f: impl Fn(&FxHashSet<usize>, &FxHashSet<usize>) -> f64,
) {
    let neighbours = neighbours(links);
    let empty = FxHashSet::default();
    for l in links.iter_mut() {
        let a = neighbours.get(&l.source).unwrap_or(&empty);
        let b = neighbours.get(&l.target).unwrap_or(&empty);
        l.length = Some(1.0 + w * f(a, b));
    }
}

/// `1 + w * sqrt(|N(u) ∪ N(v)| - |N(u) ∩ N(v)|)`: links between nodes with different
/// neighbourhoods get longer.
pub fn symmetric_diff_link_lengths(links: &mut [Link], w: f64) {
    compute_link_lengths(links, w, |a, b| {
        let intersection = a.intersection(b).count();
        let union = a.union(b).count();
        ((union - intersection) as f64).sqrt()
    });
}

/// `1 + w * |N(u) ∩ N(v)| / |N(u) ∪ N(v)|`, with leaves contributing nothing.
pub fn jaccard_link_lengths(links: &mut [Link], w: f64) {
    compute_link_lengths(links, w, |a, b| {
        if (a.len().min(b.len()) as f64) < 1.1 {
            return 0.0;
        }
        a.intersection(b).count() as f64 / a.union(b).count() as f64
    });
}

/// Tarjan's algorithm, iterative. Components come out in reverse topological order.
pub fn strongly_connected_components(n: usize, links: &[Link]) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for l in links {
        if l.source < n && l.target < n {
            adjacency[l.source].push(l.target);
        }
    }

    let mut next_index = 0;
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut components = Vec::new();

    for s in 0..n {
        if index[s].is_some() {
            continue;
        }
        let mut calls: Vec<(usize, usize)> = vec![(s, 0)];
        index[s] = Some(next_index);
        lowlink[s] = next_index;
        next_index += 1;
        stack.push(s);
        on_stack[s] = true;

        while let Some(&(v, pos)) = calls.last() {
            if let Some(&w) = adjacency[v].get(pos) {
                if let Some(top) = calls.last_mut() {
                    top.1 += 1;
                }
                match index[w] {
                    None => {
                        index[w] = Some(next_index);
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        calls.push((w, 0));
                    }
                    Some(iw) if on_stack[w] => lowlink[v] = lowlink[v].min(iw),
                    Some(_) => {}
                }
                continue;
            }
            calls.pop();
            if let Some(&(u, _)) = calls.last() {
                lowlink[u] = lowlink[u].min(lowlink[v]);
            }
            if Some(lowlink[v]) == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }
    components
}

/// `source + min_separation(link) <= target` along `axis` for every link that is not part of a
/// cycle.
pub fn generate_directed_edge_constraints(
    n: usize,
    links: &[Link],
    axis: Axis,
    min_separation: &dyn Fn(&Link) -> f64,
) -> Vec<Constraint> {
    let mut component_of = vec![usize::MAX; n];
    for (i, c) in strongly_connected_components(n, links).iter().enumerate() {
        for &v in c {
            component_of[v] = i;
        }
    }
    links
        .iter()
        .filter(|l| l.source < n && l.target < n)
        .filter(|l| component_of[l.source] != component_of[l.target])
        .map(|l| Constraint::separation(axis, l.source, l.target, min_separation(l)))
        .collect()
}
