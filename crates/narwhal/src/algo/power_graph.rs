//! Power-graph compression: greedily merge nodes that share neighbours into modules, so that
//! bundles of parallel links become single links between modules.

use crate::graph::{Group, Link};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Neighbour modules of one module, bucketed by link type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSets {
    sets: BTreeMap<u32, BTreeSet<usize>>,
    n: usize,
}

impl LinkSets {
    pub fn count(&self) -> usize {
        self.n
    }

    pub fn contains(&self, id: usize) -> bool {
        self.sets.values().any(|ms| ms.contains(&id))
    }

    pub fn add(&mut self, link_type: u32, m: usize) {
        if self.sets.entry(link_type).or_default().insert(m) {
            self.n += 1;
        }
    }

    pub fn remove(&mut self, link_type: u32, m: usize) {
        if let Some(ms) = self.sets.get_mut(&link_type) {
            if ms.remove(&m) {
                self.n -= 1;
            }
            if ms.is_empty() {
                self.sets.remove(&link_type);
            }
        }
    }

    pub fn intersection(&self, other: &LinkSets) -> LinkSets {
        let mut result = LinkSets::default();
        for (&t, ms) in &self.sets {
            let Some(theirs) = other.sets.get(&t) else {
                continue;
            };
            let common: BTreeSet<usize> = ms.intersection(theirs).copied().collect();
            if !common.is_empty() {
                result.n += common.len();
                result.sets.insert(t, common);
            }
        }
        result
    }

    /// `(link_type, module)` pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.sets
            .iter()
            .flat_map(|(&t, ms)| ms.iter().map(move |&m| (t, m)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub id: usize,
    pub outgoing: LinkSets,
    pub incoming: LinkSets,
    pub children: BTreeSet<usize>,
    gid: Option<usize>,
}

impl Module {
    fn leaf(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_island(&self) -> bool {
        self.outgoing.count() == 0 && self.incoming.count() == 0
    }
}

/// Endpoint of a power edge: an original node or one of the returned groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerEnd {
    Node(usize),
    Group(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerEdge {
    pub source: PowerEnd,
    pub target: PowerEnd,
    pub link_type: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerGraph {
    pub groups: Vec<Group>,
    pub power_edges: Vec<PowerEdge>,
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub modules: Vec<Module>,
    root: BTreeSet<usize>,
    /// Number of edges remaining in the compressed graph.
    r: usize,
}

impl Configuration {
    pub fn new(n: usize, links: &[Link], link_type: &dyn Fn(&Link) -> u32) -> Self {
        let mut modules: Vec<Module> = (0..n).map(Module::leaf).collect();
        for l in links {
            if l.source >= n || l.target >= n {
                continue;
            }
            let t = link_type(l);
            modules[l.source].outgoing.add(t, l.target);
            modules[l.target].incoming.add(t, l.source);
        }
        let r = modules.iter().map(|m| m.outgoing.count()).sum();
        Self {
            modules,
            root: (0..n).collect(),
            r,
        }
    }

    pub fn edge_count(&self) -> usize {
        self.r
    }

    fn edges_after_merge(&self, a: usize, b: usize) -> usize {
        let (ma, mb) = (&self.modules[a], &self.modules[b]);
        let shared = ma.incoming.intersection(&mb.incoming).count()
            + ma.outgoing.intersection(&mb.outgoing).count();
        self.r.saturating_sub(shared)
    }

    /// Replaces root modules `a` and `b` by a new module owning both; links they share are
    /// moved up to it. Returns the new module's id.
    pub fn merge(&mut self, a: usize, b: usize) -> usize {
        let in_int = self.modules[a]
            .incoming
            .intersection(&self.modules[b].incoming);
        let out_int = self.modules[a]
            .outgoing
            .intersection(&self.modules[b].outgoing);
        let m = self.modules.len();
        self.modules.push(Module {
            id: m,
            outgoing: out_int.clone(),
            incoming: in_int.clone(),
            children: [a, b].into_iter().collect(),
            gid: None,
        });
        for (t, n) in out_int.iter() {
            let incoming = &mut self.modules[n].incoming;
            incoming.add(t, m);
            incoming.remove(t, a);
            incoming.remove(t, b);
            self.modules[a].outgoing.remove(t, n);
            self.modules[b].outgoing.remove(t, n);
        }
        for (t, n) in in_int.iter() {
            let outgoing = &mut self.modules[n].outgoing;
            outgoing.add(t, m);
            outgoing.remove(t, a);
            outgoing.remove(t, b);
            self.modules[a].incoming.remove(t, n);
            self.modules[b].incoming.remove(t, n);
        }
        self.r = self.r.saturating_sub(in_int.count() + out_int.count());
        self.root.remove(&a);
        self.root.remove(&b);
        self.root.insert(m);
        m
    }

    /// Performs the cheapest root merge if it strictly reduces the edge count.
    pub fn greedy_merge(&mut self) -> bool {
        let rs: Vec<usize> = self.root.iter().copied().collect();
        if rs.len() < 2 {
            return false;
        }
        let mut best: Option<(usize, usize, usize)> = None;
        for (i, &a) in rs.iter().enumerate() {
            for &b in &rs[i + 1..] {
                let n_edges = self.edges_after_merge(a, b);
                if best.is_none_or(|(e, _, _)| n_edges < e) {
                    best = Some((n_edges, a, b));
                }
            }
        }
        match best {
            Some((n_edges, a, b)) if n_edges < self.r => {
                self.merge(a, b);
                true
            }
            _ => false,
        }
    }

    /// Edges of the compressed graph, between module ids.
    pub fn all_edges(&self) -> Vec<(usize, usize, u32)> {
        let mut es = Vec::new();
        let roots: Vec<usize> = self.root.iter().copied().collect();
        self.collect_edges(&roots, &mut es);
        es
    }

    fn collect_edges(&self, ms: &[usize], es: &mut Vec<(usize, usize, u32)>) {
        for &m in ms {
            let module = &self.modules[m];
            es.extend(module.outgoing.iter().map(|(t, target)| (m, target, t)));
            let children: Vec<usize> = module.children.iter().copied().collect();
            self.collect_edges(&children, es);
        }
    }

    /// Turns the module tree into groups; merged modules without links of their own are
    /// flattened into their parent. Returns the groups and the edges retargeted onto them.
    pub fn group_hierarchy(&mut self) -> PowerGraph {
        let mut groups = Vec::new();
        let mut top = Group::default();
        let roots: Vec<usize> = self.root.iter().copied().collect();
        self.to_groups(&roots, None, &mut top, &mut groups);

        let end = |m: usize, modules: &[Module]| match modules[m].gid {
            Some(g) => PowerEnd::Group(g),
            None => PowerEnd::Node(m),
        };
        let power_edges = self
            .all_edges()
            .into_iter()
            .map(|(s, t, link_type)| PowerEdge {
                source: end(s, &self.modules),
                target: end(t, &self.modules),
                link_type,
            })
            .collect();
        PowerGraph {
            groups,
            power_edges,
        }
    }

    fn to_groups(
        &mut self,
        ms: &[usize],
        group: Option<usize>,
        top: &mut Group,
        groups: &mut Vec<Group>,
    ) {
        for &m in ms {
            if self.modules[m].is_leaf() {
                match group {
                    Some(g) => groups[g].leaves.push(m),
                    None => top.leaves.push(m),
                }
                continue;
            }
            let mut target = group;
            if !self.modules[m].is_island() {
                let gid = groups.len();
                self.modules[m].gid = Some(gid);
                groups.push(Group {
                    parent: group,
                    ..Group::default()
                });
                match group {
                    Some(g) => groups[g].groups.push(gid),
                    None => top.groups.push(gid),
                }
                target = Some(gid);
            }
            let children: Vec<usize> = self.modules[m].children.iter().copied().collect();
            self.to_groups(&children, target, top, groups);
        }
    }
}

/// Runs greedy merging to a fixed point and extracts the group hierarchy.
pub fn get_groups(n: usize, links: &[Link], link_type: &dyn Fn(&Link) -> u32) -> PowerGraph {
    let mut c = Configuration::new(n, links, link_type);
    while c.greedy_merge() {}
    c.group_hierarchy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_sets_count_distinct_members() {
        let mut s = LinkSets::default();
        s.add(0, 3);
        s.add(0, 3);
        s.add(1, 3);
        assert_eq!(s.count(), 2);
        s.remove(0, 3);
        assert_eq!(s.count(), 1);
        assert!(s.contains(3));
        s.remove(1, 3);
        assert!(!s.contains(3));
    }
}
