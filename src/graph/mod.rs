pub mod hyper;

use std::collections::VecDeque;

/// Genomic annotation carried by a vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VertexInfo {
    pub lpos: i32,
    pub rpos: i32,
    pub length: i32,
    pub stddev: f64,
}

#[derive(Debug, Clone)]
struct Vertex {
    weight: f64,
    info: VertexInfo,
    ins: Vec<usize>,
    outs: Vec<usize>,
}

#[derive(Debug, Clone)]
struct EdgeData {
    source: usize,
    target: usize,
    weight: f64,
    stddev: f64,
}

/// Directed acyclic multigraph over partial exons.
///
/// Vertices and edges live in arenas addressed by dense integer indices.
/// Edge indices are stable for the lifetime of the graph: removing an edge
/// tombstones its slot instead of shifting later indices, so an edge index
/// can be used as a persistent identity across graph mutations.
///
/// Vertex indices follow genomic left-to-right order (vertex 0 is the
/// source, the last vertex is the sink) and every edge goes from a lower to
/// a higher index, which keeps the graph acyclic and makes index order a
/// topological order.
#[derive(Debug, Clone, Default)]
pub struct SpliceGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Option<EdgeData>>,
}

impl SpliceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── vertices ────────────────────────────────────────────────────────

    pub fn add_vertex(&mut self, weight: f64, info: VertexInfo) -> usize {
        self.vertices.push(Vertex {
            weight,
            info,
            ins: Vec::new(),
            outs: Vec::new(),
        });
        self.vertices.len() - 1
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex_weight(&self, v: usize) -> f64 {
        self.vertices[v].weight
    }

    pub fn set_vertex_weight(&mut self, v: usize, w: f64) {
        self.vertices[v].weight = w;
    }

    pub fn vertex_info(&self, v: usize) -> VertexInfo {
        self.vertices[v].info
    }

    pub fn in_degree(&self, v: usize) -> usize {
        self.vertices[v].ins.len()
    }

    pub fn out_degree(&self, v: usize) -> usize {
        self.vertices[v].outs.len()
    }

    pub fn degree(&self, v: usize) -> usize {
        self.in_degree(v) + self.out_degree(v)
    }

    /// Live in-edge indices of `v`, in insertion order.
    pub fn in_edges(&self, v: usize) -> &[usize] {
        &self.vertices[v].ins
    }

    /// Live out-edge indices of `v`, in insertion order.
    pub fn out_edges(&self, v: usize) -> &[usize] {
        &self.vertices[v].outs
    }

    /// Remove every edge incident to `v`, leaving the vertex isolated.
    pub fn clear_vertex(&mut self, v: usize) {
        let ins = std::mem::take(&mut self.vertices[v].ins);
        let outs = std::mem::take(&mut self.vertices[v].outs);
        for e in ins.into_iter().chain(outs) {
            self.detach(e, v);
            self.edges[e] = None;
        }
    }

    fn detach(&mut self, e: usize, keep: usize) {
        if let Some(d) = &self.edges[e] {
            let (s, t) = (d.source, d.target);
            if s != keep {
                self.vertices[s].outs.retain(|&x| x != e);
            }
            if t != keep {
                self.vertices[t].ins.retain(|&x| x != e);
            }
        }
    }

    // ── edges ───────────────────────────────────────────────────────────

    /// Add an edge from `s` to `t` and return its index. Parallel edges are
    /// allowed; self-loops and backward edges are not.
    pub fn add_edge(&mut self, s: usize, t: usize) -> usize {
        debug_assert!(s < t, "edge {s}->{t} violates topological order");
        let e = self.edges.len();
        self.edges.push(Some(EdgeData {
            source: s,
            target: t,
            weight: 0.0,
            stddev: 1.0,
        }));
        self.vertices[s].outs.push(e);
        self.vertices[t].ins.push(e);
        e
    }

    pub fn remove_edge(&mut self, e: usize) {
        if let Some(d) = self.edges[e].take() {
            self.vertices[d.source].outs.retain(|&x| x != e);
            self.vertices[d.target].ins.retain(|&x| x != e);
        }
    }

    pub fn edge_alive(&self, e: usize) -> bool {
        self.edges[e].is_some()
    }

    /// Number of live edges.
    pub fn num_edges(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    /// Total number of edge slots ever allocated, tombstones included.
    pub fn edge_capacity(&self) -> usize {
        self.edges.len()
    }

    /// Iterate over live edge indices in ascending order.
    pub fn edge_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|_| i))
    }

    /// First live edge from `s` to `t`, if any.
    pub fn edge(&self, s: usize, t: usize) -> Option<usize> {
        self.vertices[s]
            .outs
            .iter()
            .copied()
            .find(|&e| self.target(e) == t)
    }

    pub fn source(&self, e: usize) -> usize {
        self.edges[e].as_ref().map(|d| d.source).unwrap_or(usize::MAX)
    }

    pub fn target(&self, e: usize) -> usize {
        self.edges[e].as_ref().map(|d| d.target).unwrap_or(usize::MAX)
    }

    pub fn edge_weight(&self, e: usize) -> f64 {
        self.edges[e].as_ref().map(|d| d.weight).unwrap_or(0.0)
    }

    pub fn set_edge_weight(&mut self, e: usize, w: f64) {
        if let Some(d) = self.edges[e].as_mut() {
            d.weight = w;
        }
    }

    pub fn edge_stddev(&self, e: usize) -> f64 {
        self.edges[e].as_ref().map(|d| d.stddev).unwrap_or(0.0)
    }

    pub fn set_edge_stddev(&mut self, e: usize, d0: f64) {
        if let Some(d) = self.edges[e].as_mut() {
            d.stddev = d0;
        }
    }

    // ── queries ─────────────────────────────────────────────────────────

    /// True when a directed path from vertex `s` to vertex `t` exists
    /// (trivially true when `s == t`).
    pub fn check_path(&self, s: usize, t: usize) -> bool {
        if s == t {
            return true;
        }
        if s > t {
            return false;
        }
        let mut seen = vec![false; self.vertices.len()];
        let mut queue = VecDeque::from([s]);
        seen[s] = true;
        while let Some(v) = queue.pop_front() {
            for &e in &self.vertices[v].outs {
                let w = self.target(e);
                if w == t {
                    return true;
                }
                if w <= t && !seen[w] {
                    seen[w] = true;
                    queue.push_back(w);
                }
            }
        }
        false
    }

    /// True when a directed path containing `e1` before `e2` exists.
    pub fn check_directed_path(&self, e1: usize, e2: usize) -> bool {
        self.check_path(self.target(e1), self.source(e2))
    }

    /// Minimum-vertex walk from `target(e1)` to `source(e2)`, inclusive of
    /// both endpoints. `None` when no directed path exists.
    pub fn compute_shortest_path(&self, e1: usize, e2: usize) -> Option<Vec<usize>> {
        let a = self.target(e1);
        let b = self.source(e2);
        if a == b {
            return Some(vec![a]);
        }
        if a > b {
            return None;
        }
        let mut prev = vec![usize::MAX; self.vertices.len()];
        let mut queue = VecDeque::from([a]);
        prev[a] = a;
        while let Some(v) = queue.pop_front() {
            if v == b {
                break;
            }
            for &e in &self.vertices[v].outs {
                let w = self.target(e);
                if w <= b && prev[w] == usize::MAX {
                    prev[w] = v;
                    queue.push_back(w);
                }
            }
        }
        if prev[b] == usize::MAX {
            return None;
        }
        let mut path = vec![b];
        let mut v = b;
        while v != a {
            v = prev[v];
            path.push(v);
        }
        path.reverse();
        Some(path)
    }

    /// Common source of all in-edges of `v`, if they agree.
    pub fn compute_in_ancestor(&self, v: usize) -> Option<usize> {
        let mut it = self.vertices[v].ins.iter().map(|&e| self.source(e));
        let first = it.next()?;
        it.all(|s| s == first).then_some(first)
    }

    /// Common target of all out-edges of `v`, if they agree.
    pub fn compute_out_ancestor(&self, v: usize) -> Option<usize> {
        let mut it = self.vertices[v].outs.iter().map(|&e| self.target(e));
        let first = it.next()?;
        it.all(|t| t == first).then_some(first)
    }

    /// True when the closed vertex intervals [source, target] of two edges
    /// overlap strictly: neither contains the other and they are not nested
    /// along a linear chain.
    pub fn intersect(&self, e1: usize, e2: usize) -> bool {
        let (s1, t1) = (self.source(e1), self.target(e1));
        let (s2, t2) = (self.source(e2), self.target(e2));
        (s1 < s2 && s2 < t1 && t1 < t2) || (s2 < s1 && s1 < t2 && t2 < t1)
    }
}
