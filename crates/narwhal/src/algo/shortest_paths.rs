//! Dijkstra-based shortest paths over an undirected weighted graph.

use super::TotalF64;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone)]
pub struct Calculator {
    n: usize,
    neighbours: Vec<Vec<(usize, f64)>>,
}

impl Calculator {
    /// `edges` are `(source, target, length)`; edges with an endpoint outside `0..n` are ignored.
    pub fn new(n: usize, edges: impl IntoIterator<Item = (usize, usize, f64)>) -> Self {
        let mut neighbours: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for (u, v, d) in edges {
            if u >= n || v >= n {
                continue;
            }
            neighbours[u].push((v, d));
            neighbours[v].push((u, d));
        }
        Self { n, neighbours }
    }

    pub fn node_count(&self) -> usize {
        self.n
    }

    /// All-pairs distances; unreachable pairs are `f64::INFINITY`.
    pub fn distance_matrix(&self) -> Vec<Vec<f64>> {
        (0..self.n).map(|i| self.distances_from_node(i)).collect()
    }

    pub fn distances_from_node(&self, start: usize) -> Vec<f64> {
        self.dijkstra(start, None).0
    }

    /// Node sequence from `start` to `end` inclusive, or `None` if `end` is unreachable.
    pub fn path_from_node_to_node(&self, start: usize, end: usize) -> Option<Vec<usize>> {
        if start >= self.n || end >= self.n {
            return None;
        }
        let (d, prev) = self.dijkstra(start, Some(end));
        if !d[end].is_finite() {
            return None;
        }
        let mut path = vec![end];
        let mut v = end;
        while let Some(p) = prev[v] {
            path.push(p);
            v = p;
        }
        path.reverse();
        Some(path)
    }

    fn dijkstra(&self, start: usize, dest: Option<usize>) -> (Vec<f64>, Vec<Option<usize>>) {
        let mut d = vec![f64::INFINITY; self.n];
        let mut prev: Vec<Option<usize>> = vec![None; self.n];
        let mut done = vec![false; self.n];
        if start >= self.n {
            return (d, prev);
        }
        let mut q: BinaryHeap<(Reverse<TotalF64>, usize)> = BinaryHeap::new();
        d[start] = 0.0;
        q.push((Reverse(TotalF64(0.0)), start));
        while let Some((Reverse(TotalF64(du)), u)) = q.pop() {
            if done[u] || du > d[u] {
                continue;
            }
            done[u] = true;
            if dest == Some(u) {
                break;
            }
            for &(v, len) in &self.neighbours[u] {
                let t = du + len;
                if t < d[v] {
                    d[v] = t;
                    prev[v] = Some(u);
                    q.push((Reverse(TotalF64(t)), v));
                }
            }
        }
        (d, prev)
    }
}
