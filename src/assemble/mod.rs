/// Splice-graph decomposition: iteratively simplify the graph under the
/// edge-equivalence discipline until only source-to-sink paths remain.
pub mod disjoint;
pub mod path;
pub mod router;
pub mod smoother;
pub mod subsetsum;

use std::collections::{HashMap, HashSet};

use crate::graph::hyper::HyperSet;
use crate::graph::SpliceGraph;
use crate::params::Parameters;
use disjoint::DisjointSets;
use path::Path;
use router::{Router, RouterStatus};
use subsetsum::SubsetSums;

/// Floating tolerance for weight identities.
const SMIN: f64 = 1e-6;
/// Watchdog: outer iterations allowed per bundle before falling back to
/// greedy decomposition.
const MAX_ROUNDS: usize = 1000;
/// Cap on paths peeled by the greedy fallback.
const GREEDY_MAX_PATHS: usize = 1000;

/// The assembly driver for one bundle's splice graph.
pub struct Scallop {
    name: String,
    pub gr: SpliceGraph,
    hs: HyperSet,
    average_read_length: i32,
    /// Super-edges: every current edge aliases the chain of original
    /// vertices it has subsumed.
    mev: HashMap<usize, Vec<usize>>,
    /// Edges unified in a class are known to carry equal flow.
    ds: DisjointSets,
    /// Endpoint pairs of topologically intersecting edges.
    sis: HashSet<(usize, usize)>,
    pub paths: Vec<Path>,
    /// Router statuses observed during the balancing pre-pass.
    pub router_status: Vec<(usize, RouterStatus)>,
    pub solver_failures: usize,
    pub watchdog_tripped: bool,
}

impl Scallop {
    pub fn new(name: String, gr: SpliceGraph, hs: HyperSet, params: &Parameters) -> Self {
        Scallop {
            name,
            gr,
            hs,
            average_read_length: params.average_read_length,
            mev: HashMap::new(),
            ds: DisjointSets::new(),
            sis: HashSet::new(),
            paths: Vec::new(),
            router_status: Vec::new(),
            solver_failures: 0,
            watchdog_tripped: false,
        }
    }

    /// Decompose the splice graph into source-to-sink paths.
    pub fn assemble(&mut self) -> Vec<Path> {
        smoother::smooth_weights(&mut self.gr);
        self.balance_vertices();
        self.init_super_edges();
        self.reconstruct_splice_graph();
        self.init_disjoint_sets();

        let mut round = 0usize;
        while self.iterate() {
            round += 1;
            if round >= MAX_ROUNDS {
                self.watchdog_tripped = true;
                log::warn!(
                    "{}: iteration cap reached, collecting residual paths greedily",
                    self.name
                );
                break;
            }
        }

        self.collect_existing_st_paths();
        self.greedy_decompose();
        self.paths.clone()
    }

    // ── pre-passes ──────────────────────────────────────────────────────

    /// Route-based balancing of junction vertices: a vertex whose
    /// neighborhood is fully connected by read phasing gets its weights
    /// re-estimated from route flows.
    fn balance_vertices(&mut self) {
        let n = self.gr.num_vertices();
        if n < 3 {
            return;
        }
        for v in 1..n - 1 {
            if self.gr.in_degree(v) < 2 || self.gr.out_degree(v) < 2 {
                continue;
            }
            let routes = self.hs.vertex_routes(v, &self.gr);
            let mut rt = Router::new(v, routes);
            rt.build(&self.gr);
            log::debug!("{}: router at vertex {}: {:?}", self.name, v, rt.status);
            if rt.status == RouterStatus::Phased {
                if let Err(err) = rt.balance(&mut self.gr) {
                    self.solver_failures += 1;
                    log::debug!("{}: vertex {} left unbalanced: {}", self.name, v, err);
                }
            }
            self.router_status.push((v, rt.status));
        }
        smoother::round_and_repair(&mut self.gr);
    }

    fn init_super_edges(&mut self) {
        self.mev.clear();
        for e in self.gr.edge_ids().collect::<Vec<_>>() {
            self.mev.insert(e, Vec::new());
        }
    }

    /// Collapse trivial vertices until a fixed point: interior dead ends are
    /// removed, and chains through degree-(1,1) vertices are merged into a
    /// single edge carrying the lighter side's weight.
    pub fn reconstruct_splice_graph(&mut self) {
        loop {
            let mut changed = false;
            let n = self.gr.num_vertices();
            for x in 1..n.saturating_sub(1) {
                if self.init_trivial_vertex(x) {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn init_trivial_vertex(&mut self, x: usize) -> bool {
        let id = self.gr.in_degree(x);
        let od = self.gr.out_degree(x);
        if id == 0 && od == 0 {
            return false;
        }
        if id == 0 || od == 0 {
            for e in self
                .gr
                .in_edges(x)
                .iter()
                .chain(self.gr.out_edges(x))
                .copied()
                .collect::<Vec<_>>()
            {
                self.mev.remove(&e);
            }
            self.gr.clear_vertex(x);
            return true;
        }
        if id != 1 || od != 1 {
            return false;
        }

        let e1 = self.gr.in_edges(x)[0];
        let e2 = self.gr.out_edges(x)[0];
        let s = self.gr.source(e1);
        let t = self.gr.target(e2);
        let (w1, w2) = (self.gr.edge_weight(e1), self.gr.edge_weight(e2));
        let (w, a) = if w1 < w2 {
            (w1, self.gr.edge_stddev(e1))
        } else {
            (w2, self.gr.edge_stddev(e2))
        };

        let e = self.gr.add_edge(s, t);
        self.gr.set_edge_weight(e, w);
        self.gr.set_edge_stddev(e, a);

        let mut chain = self.mev.remove(&e1).unwrap_or_default();
        chain.push(x);
        chain.extend(self.mev.remove(&e2).unwrap_or_default());
        self.mev.insert(e, chain);

        self.gr.clear_vertex(x);
        true
    }

    fn init_disjoint_sets(&mut self) {
        self.ds = DisjointSets::new();
        for i in 0..self.gr.edge_capacity() {
            let id = self.ds.make_set();
            debug_assert_eq!(id, i);
            if !self.gr.edge_alive(i) {
                self.ds.kill(i);
            }
        }
    }

    // ── main iteration ──────────────────────────────────────────────────

    fn iterate(&mut self) -> bool {
        loop {
            let Some((ei, sub)) = self.identify_equation() else {
                break;
            };
            if !self.verify_equation(ei, &sub) {
                break;
            }
            self.split_edge(ei, &sub);
        }

        let mut flag = false;
        loop {
            self.compute_intersecting_edges();
            let b1 = self.link_one_pair();
            let b2 = self.decompose_trivial_vertices();
            if b1 || b2 {
                flag = true;
            } else {
                break;
            }
        }
        flag
    }

    /// Find the best verifiable identity w(e) == sum(w(S)) over the current
    /// class representatives. Only exact (zero-error) equations are
    /// reported; ties break on subset size, then lexicographic subset, then
    /// representative index.
    fn identify_equation(&mut self) -> Option<(usize, Vec<usize>)> {
        let reps = self.ds.representatives();
        if reps.len() < 2 || reps.len() > subsetsum::MAX_ENUM_ITEMS {
            return None;
        }
        let x: Vec<i64> = reps
            .iter()
            .map(|&e| self.gr.edge_weight(e).round() as i64)
            .collect();
        let sums = SubsetSums::enumerate(&x)?;

        let mut best: Option<(i64, usize, Vec<usize>, usize)> = None;
        for ri in 0..reps.len() {
            let Some((err, idx)) = sums.closest_excluding(ri, x[ri]) else {
                continue;
            };
            let items = sums.recover(idx);
            let better = match &best {
                None => true,
                Some((berr, bsize, bitems, bri)) => {
                    (err, items.len(), &items, ri) < (*berr, *bsize, bitems, *bri)
                }
            };
            if better {
                best = Some((err, items.len(), items, ri));
            }
        }

        let (err, _, items, ri) = best?;
        if err != 0 {
            return None;
        }
        let sub: Vec<usize> = items.into_iter().map(|i| reps[i]).collect();
        log::debug!(
            "{}: equation: edge {} ({}) = subset {:?}",
            self.name,
            reps[ri],
            x[ri],
            sub
        );
        Some((reps[ri], sub))
    }

    /// Every subset member must share a directed path with the split edge
    /// in one direction or the other.
    fn verify_equation(&self, ei: usize, sub: &[usize]) -> bool {
        sub.iter().all(|&s| {
            self.gr.check_directed_path(ei, s) || self.gr.check_directed_path(s, ei)
        })
    }

    /// Split `ei` into parallel edges matching the subset's weights, unifying
    /// each piece with its subset edge. The piece weights sum exactly to the
    /// original weight.
    fn split_edge(&mut self, ei: usize, sub: &[usize]) -> Vec<usize> {
        debug_assert!(self.gr.edge_alive(ei));
        debug_assert!(!sub.is_empty());

        let w = self.gr.edge_weight(ei);
        let sum: f64 = sub.iter().map(|&e| self.gr.edge_weight(e)).sum();
        let residual = w - sum;

        let s = self.gr.source(ei);
        let t = self.gr.target(ei);

        let mut pieces = vec![ei];
        self.gr
            .set_edge_weight(ei, self.gr.edge_weight(sub[0]) + residual);
        self.gr.set_edge_stddev(ei, self.gr.edge_stddev(sub[0]));
        self.ds.union(ei, sub[0]);

        for &sx in &sub[1..] {
            let e = self.gr.add_edge(s, t);
            let id = self.ds.make_set();
            debug_assert_eq!(id, e);
            self.gr.set_edge_weight(e, self.gr.edge_weight(sx));
            self.gr.set_edge_stddev(e, self.gr.edge_stddev(sx));
            let chain = self.mev.get(&ei).cloned().unwrap_or_default();
            self.mev.insert(e, chain);
            self.ds.union(e, sx);
            pieces.push(e);
        }
        pieces
    }

    // ── linking ─────────────────────────────────────────────────────────

    fn compute_intersecting_edges(&mut self) {
        self.sis.clear();
        let ids: Vec<usize> = self.gr.edge_ids().collect();
        for (i, &e1) in ids.iter().enumerate() {
            for &e2 in &ids[i + 1..] {
                if !self.gr.intersect(e1, e2) {
                    continue;
                }
                self.sis.insert((self.gr.source(e1), self.gr.target(e1)));
                self.sis.insert((self.gr.source(e2), self.gr.target(e2)));
            }
        }
    }

    /// Link one pair of equal-weight class members, if any pair admits a
    /// clean walk between them.
    fn link_one_pair(&mut self) -> bool {
        let classes = self.ds.classes();
        for class in classes {
            if class.len() < 2 {
                continue;
            }
            for j in 0..class.len() {
                for k in j + 1..class.len() {
                    let (a, b) = (class[j], class[k]);
                    if (self.gr.edge_weight(a) - self.gr.edge_weight(b)).abs() > SMIN {
                        continue;
                    }
                    let Some((ex, ey, p, walk)) = self.check_linkable(a, b) else {
                        continue;
                    };
                    log::debug!(
                        "{}: linking edges ({}, {}) through {:?}",
                        self.name,
                        ex,
                        ey,
                        p
                    );
                    self.link_edges(ex, ey, &p, &walk);
                    return true;
                }
            }
        }
        false
    }

    /// Decide whether two equal edges can be pulled together: they must lie
    /// on a common directed path whose intermediate walk avoids every
    /// intersecting-edge endpoint pair, with each step assignable by the
    /// two-pointer ancestor sweep. Returns the ordered pair, the connecting
    /// vertex walk and the chosen edge per step.
    fn check_linkable(
        &self,
        a: usize,
        b: usize,
    ) -> Option<(usize, usize, Vec<usize>, Vec<usize>)> {
        let b1 = self.gr.check_directed_path(a, b);
        let b2 = self.gr.check_directed_path(b, a);
        if !b1 && !b2 {
            return None;
        }
        debug_assert!(!(b1 && b2));
        let (ex, ey) = if b1 { (a, b) } else { (b, a) };

        let p = self.gr.compute_shortest_path(ex, ey)?;
        if p.len() == 1 {
            return Some((ex, ey, p, Vec::new()));
        }

        for w in p.windows(2) {
            if self.sis.contains(&(w[0], w[1])) {
                return None;
            }
        }

        let mut li = 0;
        let mut ri = p.len() - 1;
        while li < ri {
            let l1 = p[li];
            let r1 = p[ri];
            let l2 = p[li + 1];
            let r2 = p[ri - 1];

            let lr = self.gr.compute_out_ancestor(l1);
            let rl = self.gr.compute_in_ancestor(r1);
            let ll = self.gr.compute_in_ancestor(l1);
            let rr = self.gr.compute_out_ancestor(r1);

            if lr == Some(l2) && !ll.is_some_and(|v| self.sis.contains(&(v, l1))) {
                li += 1;
            } else if rl == Some(r2) && !rr.is_some_and(|v| self.sis.contains(&(r1, v))) {
                ri -= 1;
            } else {
                return None;
            }
        }

        // The walk must have capacity for the linked flow on every step.
        let w = self.gr.edge_weight(ex);
        let mut walk = Vec::with_capacity(p.len() - 1);
        for pair in p.windows(2) {
            let e = self
                .gr
                .out_edges(pair[0])
                .iter()
                .copied()
                .filter(|&e| self.gr.target(e) == pair[1])
                .max_by(|&x, &y| {
                    self.gr
                        .edge_weight(x)
                        .partial_cmp(&self.gr.edge_weight(y))
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(y.cmp(&x))
                })?;
            if self.gr.edge_weight(e) + SMIN < w {
                return None;
            }
            walk.push(e);
        }

        Some((ex, ey, p, walk))
    }

    /// Pull `ex` and `ey` together: a new edge spans from source(ex) to
    /// target(ey) carrying the class weight, the connecting walk gives up
    /// that much flow, and the two originals retire.
    fn link_edges(&mut self, ex: usize, ey: usize, p: &[usize], walk: &[usize]) {
        if p.len() == 1 {
            self.connect_adjacent_edges(ex, ey);
            return;
        }

        let w = self.gr.edge_weight(ex);
        let s = self.gr.source(ex);
        let t = self.gr.target(ey);

        let e = self.gr.add_edge(s, t);
        let id = self.ds.make_set();
        debug_assert_eq!(id, e);
        self.gr.set_edge_weight(e, w);
        self.gr.set_edge_stddev(e, self.gr.edge_stddev(ex));

        let mut chain = self.mev.get(&ex).cloned().unwrap_or_default();
        chain.push(p[0]);
        for (i, &ce) in walk.iter().enumerate() {
            chain.extend(self.mev.get(&ce).cloned().unwrap_or_default());
            chain.push(p[i + 1]);
        }
        chain.extend(self.mev.get(&ey).cloned().unwrap_or_default());
        self.mev.insert(e, chain);
        self.ds.union(e, ex);

        for &ce in walk {
            let nw = self.gr.edge_weight(ce) - w;
            if nw <= SMIN {
                self.gr.remove_edge(ce);
                self.ds.kill(ce);
                self.mev.remove(&ce);
            } else {
                self.gr.set_edge_weight(ce, nw);
            }
        }

        for &z in &[ex, ey] {
            self.gr.remove_edge(z);
            self.ds.kill(z);
            self.mev.remove(&z);
        }
    }

    /// Merge two adjacent equal edges into one spanning edge.
    fn connect_adjacent_edges(&mut self, x: usize, y: usize) -> bool {
        if !self.gr.edge_alive(x) || !self.gr.edge_alive(y) {
            return false;
        }
        let xs = self.gr.source(x);
        let xt = self.gr.target(x);
        let ys = self.gr.source(y);
        let yt = self.gr.target(y);
        if xt != ys && yt != xs {
            return false;
        }
        if yt == xs {
            return self.connect_adjacent_edges(y, x);
        }

        let e = self.gr.add_edge(xs, yt);
        let id = self.ds.make_set();
        debug_assert_eq!(id, e);
        self.gr.set_edge_weight(e, self.gr.edge_weight(x));
        self.gr.set_edge_stddev(e, self.gr.edge_stddev(x));

        let mut chain = self.mev.get(&x).cloned().unwrap_or_default();
        chain.push(xt);
        chain.extend(self.mev.get(&y).cloned().unwrap_or_default());
        self.mev.insert(e, chain);

        self.ds.union(e, x);
        self.ds.union(e, y);

        for &z in &[x, y] {
            self.gr.remove_edge(z);
            self.ds.kill(z);
            self.mev.remove(&z);
        }
        true
    }

    // ── decomposition ───────────────────────────────────────────────────

    /// Resolve every vertex with a singleton side: split the singleton edge
    /// across the fan and merge each piece with its fan edge.
    fn decompose_trivial_vertices(&mut self) -> bool {
        let mut flag = false;
        let n = self.gr.num_vertices();
        for x in 1..n.saturating_sub(1) {
            let id = self.gr.in_degree(x);
            let od = self.gr.out_degree(x);
            if id == 0 && od == 0 {
                continue;
            }
            if id == 0 || od == 0 {
                // Interior dead end: flow cannot pass, drop it.
                let edges: Vec<usize> = self
                    .gr
                    .in_edges(x)
                    .iter()
                    .chain(self.gr.out_edges(x))
                    .copied()
                    .collect();
                self.gr.clear_vertex(x);
                for e in edges {
                    self.ds.kill(e);
                    self.mev.remove(&e);
                }
                flag = true;
                continue;
            }
            if id == 1 {
                log::debug!("{}: decompose trivial vertex {}", self.name, x);
                let ei = self.gr.in_edges(x)[0];
                let sub: Vec<usize> = self.gr.out_edges(x).to_vec();
                let pieces = self.split_edge(ei, &sub);
                debug_assert_eq!(pieces.len(), sub.len());
                for (pc, sx) in pieces.into_iter().zip(sub) {
                    self.connect_adjacent_edges(pc, sx);
                }
                flag = true;
            } else if od == 1 {
                log::debug!("{}: decompose trivial vertex {}", self.name, x);
                let ei = self.gr.out_edges(x)[0];
                let sub: Vec<usize> = self.gr.in_edges(x).to_vec();
                let pieces = self.split_edge(ei, &sub);
                debug_assert_eq!(pieces.len(), sub.len());
                for (pc, sx) in pieces.into_iter().zip(sub) {
                    self.connect_adjacent_edges(sx, pc);
                }
                flag = true;
            }
        }
        flag
    }

    // ── path collection ─────────────────────────────────────────────────

    /// Every edge running directly from source to sink is a finished
    /// transcript: record it and remove it from the graph.
    fn collect_existing_st_paths(&mut self) {
        let n = self.gr.num_vertices();
        if n < 2 {
            return;
        }
        let sink = n - 1;
        for e in self.gr.edge_ids().collect::<Vec<_>>() {
            if self.gr.source(e) != 0 || self.gr.target(e) != sink {
                continue;
            }
            let chain = self.mev.remove(&e).unwrap_or_default();
            let abd = self.gr.edge_weight(e);
            if abd >= 0.5 {
                self.push_path(chain, abd, sink);
            }
            self.gr.remove_edge(e);
            self.ds.kill(e);
        }
    }

    fn push_path(&mut self, chain: Vec<usize>, abd: f64, sink: usize) {
        let length: i32 = chain.iter().map(|&x| self.gr.vertex_info(x).length).sum();
        let reads = abd * length as f64 / self.average_read_length as f64;
        let mut v = Vec::with_capacity(chain.len() + 2);
        v.push(0);
        v.extend(chain);
        v.push(sink);
        self.paths.push(Path { v, abd, reads });
    }

    /// Peel the widest source-to-sink path from whatever is left, highest
    /// bottleneck first, until the graph drains.
    fn greedy_decompose(&mut self) {
        if self.gr.num_edges() == 0 {
            return;
        }
        log::debug!(
            "{}: greedy decomposition of {} residual edges",
            self.name,
            self.gr.num_edges()
        );
        let n = self.gr.num_vertices();
        let sink = n - 1;
        for _ in 0..GREEDY_MAX_PATHS {
            let Some((edges, bottleneck)) = self.widest_path() else {
                break;
            };
            let mut chain = Vec::new();
            for &e in &edges {
                chain.extend(self.mev.get(&e).cloned().unwrap_or_default());
                let t = self.gr.target(e);
                if t != sink {
                    chain.push(t);
                }
            }
            self.push_path(chain, bottleneck, sink);

            for e in edges {
                let nw = self.gr.edge_weight(e) - bottleneck;
                if nw <= SMIN {
                    self.gr.remove_edge(e);
                    self.ds.kill(e);
                    self.mev.remove(&e);
                } else {
                    self.gr.set_edge_weight(e, nw);
                }
            }
        }
    }

    /// Maximum-bottleneck source-to-sink path, as a forward edge list.
    fn widest_path(&self) -> Option<(Vec<usize>, f64)> {
        let n = self.gr.num_vertices();
        let sink = n - 1;
        let mut best = vec![0.0f64; n];
        let mut via: Vec<Option<usize>> = vec![None; n];
        best[0] = f64::INFINITY;

        for v in 1..n {
            for &e in self.gr.in_edges(v) {
                let s = self.gr.source(e);
                let cand = best[s].min(self.gr.edge_weight(e));
                if cand > best[v] {
                    best[v] = cand;
                    via[v] = Some(e);
                }
            }
        }
        if best[sink] < 0.5 {
            return None;
        }

        let mut edges = Vec::new();
        let mut v = sink;
        while v != 0 {
            let e = via[v]?;
            edges.push(e);
            v = self.gr.source(e);
        }
        edges.reverse();
        Some((edges, best[sink]))
    }
}
