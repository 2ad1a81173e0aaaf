/// Single-vertex decoupling: partition a vertex's in-edges and out-edges
/// using read-supported pairings.
use std::collections::HashMap;

use crate::error::Error;
use crate::graph::SpliceGraph;

use super::disjoint::DisjointSets;
use super::subsetsum;

/// Sweeps allowed to the balancing solver before giving up.
const BALANCE_MAX_SWEEPS: usize = 1000;
const BALANCE_EPSILON: f64 = 1e-9;

/// Outcome of analyzing one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterStatus {
    /// Degree one on a side; the vertex balances as a single identity.
    Trivial,
    /// Reads connect the whole neighborhood; in-out pairing is determined.
    Phased,
    /// Reads split the neighborhood into separable components.
    Split,
    /// Not enough read support to decide anything.
    Unresolved,
}

/// An observed identity sum(w(s)) == sum(w(t)) between edge sets, with its
/// relative error.
#[derive(Debug, Clone, Default)]
pub struct Equation {
    /// In-edge ids.
    pub s: Vec<usize>,
    /// Out-edge ids.
    pub t: Vec<usize>,
    /// Relative error of the identity.
    pub e: f64,
}

/// Router for one junction vertex.
#[derive(Debug)]
pub struct Router {
    pub root: usize,
    /// (in-edge id, out-edge id) pairings implied by reads.
    routes: Vec<(usize, usize)>,
    /// Neighborhood edges: in-edges first, then out-edges.
    u2e: Vec<usize>,
    e2u: HashMap<usize, usize>,
    in_count: usize,
    pub status: RouterStatus,
    pub eqns: Vec<Equation>,
    pub ratio: f64,
}

impl Router {
    pub fn new(root: usize, routes: Vec<(usize, usize)>) -> Self {
        Router {
            root,
            routes,
            u2e: Vec::new(),
            e2u: HashMap::new(),
            in_count: 0,
            status: RouterStatus::Unresolved,
            eqns: Vec::new(),
            ratio: -1.0,
        }
    }

    /// Analyze the neighborhood of the root vertex.
    pub fn build(&mut self, gr: &SpliceGraph) {
        debug_assert!(gr.in_degree(self.root) >= 1);
        debug_assert!(gr.out_degree(self.root) >= 1);

        self.eqns.clear();
        self.ratio = -1.0;
        self.status = RouterStatus::Unresolved;
        self.build_indices(gr);

        if gr.in_degree(self.root) == 1 || gr.out_degree(self.root) == 1 {
            self.add_single_equation(gr);
            self.status = RouterStatus::Trivial;
            return;
        }

        let components = self.connected_components();
        if components.len() == 1 {
            self.status = RouterStatus::Phased;
            return;
        }

        self.split(gr, &components);
        if self.eqns.len() == 2 {
            self.status = RouterStatus::Split;
        }
    }

    fn build_indices(&mut self, gr: &SpliceGraph) {
        self.u2e.clear();
        self.e2u.clear();
        for &e in gr.in_edges(self.root) {
            self.e2u.insert(e, self.u2e.len());
            self.u2e.push(e);
        }
        self.in_count = self.u2e.len();
        for &e in gr.out_edges(self.root) {
            self.e2u.insert(e, self.u2e.len());
            self.u2e.push(e);
        }
    }

    fn add_single_equation(&mut self, gr: &SpliceGraph) {
        let mut eqn = Equation::default();
        let mut sum1 = 0.0;
        let mut sum2 = 0.0;
        for (u, &e) in self.u2e.iter().enumerate() {
            if u < self.in_count {
                eqn.s.push(e);
                sum1 += gr.edge_weight(e);
            } else {
                eqn.t.push(e);
                sum2 += gr.edge_weight(e);
            }
        }
        self.ratio = (sum1 - sum2).abs() / (sum1 + sum2);
        eqn.e = self.ratio;
        self.eqns.push(eqn);
    }

    /// Connected components of the undirected bipartite graph on the
    /// neighborhood, ordered by smallest member.
    fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut dsu = DisjointSets::new();
        for _ in 0..self.u2e.len() {
            dsu.make_set();
        }
        for &(e1, e2) in &self.routes {
            let (Some(&u1), Some(&u2)) = (self.e2u.get(&e1), self.e2u.get(&e2)) else {
                continue;
            };
            dsu.union(u1, u2);
        }
        dsu.classes()
    }

    fn split(&mut self, gr: &SpliceGraph, components: &[Vec<usize>]) {
        // Smooth locally: scale each side so in-flow equals out-flow.
        let mut vw: Vec<f64> = self.u2e.iter().map(|&e| gr.edge_weight(e)).collect();
        let sum1: f64 = vw[..self.in_count].iter().sum();
        let sum2: f64 = vw[self.in_count..].iter().sum();
        if sum1 <= 0.0 || sum2 <= 0.0 {
            return;
        }
        let r1 = if sum1 > sum2 { 1.0 } else { sum2 / sum1 };
        let r2 = if sum1 < sum2 { 1.0 } else { sum1 / sum2 };
        for (u, w) in vw.iter_mut().enumerate() {
            *w *= if u < self.in_count { r1 } else { r2 };
        }
        let scale = sum1 * r1;

        // Signed excess per component: in-weight minus out-weight.
        let mut ss: Vec<(i64, usize)> = Vec::new();
        let mut tt: Vec<(i64, usize)> = Vec::new();
        for (i, comp) in components.iter().enumerate() {
            let ww: f64 = comp
                .iter()
                .map(|&u| if u < self.in_count { vw[u] } else { -vw[u] })
                .sum();
            if ww >= 0.0 {
                ss.push((ww.round() as i64, i));
            } else {
                tt.push(((-ww).round() as i64, i));
            }
        }

        let side_edges = |comp: &[usize], eqn: &mut Equation| {
            for &u in comp {
                if u < self.in_count {
                    eqn.s.push(self.u2e[u]);
                } else {
                    eqn.t.push(self.u2e[u]);
                }
            }
        };

        // Candidate 0: the best self-balanced non-trivial component.
        let mut eqn0: Option<Equation> = None;
        for &(w, i) in ss.iter().chain(tt.iter()) {
            let comp = &components[i];
            if comp.len() <= 1 {
                continue;
            }
            let r = w as f64 / scale;
            if eqn0.as_ref().is_some_and(|q| r >= q.e) {
                continue;
            }
            let mut eqn = Equation {
                e: r,
                ..Default::default()
            };
            side_edges(comp, &mut eqn);
            debug_assert!(!eqn.s.is_empty() && !eqn.t.is_empty());
            eqn0 = Some(eqn);
        }

        // Candidate 1: the best two-sided component split.
        let mut eqn1: Option<Equation> = None;
        if ss.len() >= 2 && tt.len() >= 2 {
            if let Some(balance) = subsetsum::best_two_sided_balance(&ss, &tt) {
                let mut eqn = Equation {
                    e: balance.err,
                    ..Default::default()
                };
                for &i in balance.s_items.iter().chain(balance.t_items.iter()) {
                    side_edges(&components[i], &mut eqn);
                }
                eqn1 = Some(eqn);
            }
        }

        let eqn2 = match (eqn0, eqn1) {
            (None, None) => return,
            (Some(q), None) | (None, Some(q)) => q,
            (Some(q0), Some(q1)) => {
                if q0.e > q1.e {
                    q1
                } else {
                    q0
                }
            }
        };
        debug_assert!(!eqn2.s.is_empty() && !eqn2.t.is_empty());

        // The complement forms the second equation.
        let mut eqn3 = Equation {
            e: eqn2.e,
            ..Default::default()
        };
        for (u, &e) in self.u2e.iter().enumerate() {
            if u < self.in_count {
                if !eqn2.s.contains(&e) {
                    eqn3.s.push(e);
                }
            } else if !eqn2.t.contains(&e) {
                eqn3.t.push(e);
            }
        }
        if eqn3.s.is_empty() || eqn3.t.is_empty() {
            return;
        }

        self.ratio = eqn2.e;
        self.eqns.push(eqn2);
        self.eqns.push(eqn3);
    }

    /// Balance a phased vertex: route flows `r_i >= 1` reconstruct every
    /// neighborhood weight, minimizing the squared deviation from the
    /// observed weights. Coordinate descent with clamping; failure to
    /// converge leaves the vertex untouched.
    pub fn balance(&self, gr: &mut SpliceGraph) -> Result<(), Error> {
        debug_assert_eq!(self.status, RouterStatus::Phased);

        let m = self.routes.len();
        let nu = self.u2e.len();
        if m == 0 {
            return Err(Error::Solver(format!(
                "vertex {} has no routes to balance",
                self.root
            )));
        }

        let obs: Vec<f64> = self.u2e.iter().map(|&e| gr.edge_weight(e)).collect();
        let ends: Vec<(usize, usize)> = self
            .routes
            .iter()
            .map(|&(e1, e2)| (self.e2u[&e1], self.e2u[&e2]))
            .collect();
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); nu];
        for (i, &(u1, u2)) in ends.iter().enumerate() {
            incident[u1].push(i);
            incident[u2].push(i);
        }

        let mut r = vec![1.0f64; m];
        let mut converged = false;
        for _ in 0..BALANCE_MAX_SWEEPS {
            let mut delta = 0.0f64;
            for i in 0..m {
                let (u1, u2) = ends[i];
                let s1: f64 = incident[u1].iter().map(|&j| r[j]).sum();
                let s2: f64 = incident[u2].iter().map(|&j| r[j]).sum();
                let step = ((s1 - obs[u1]) + (s2 - obs[u2])) / 2.0;
                let next = (r[i] - step).max(1.0);
                delta = delta.max((next - r[i]).abs());
                r[i] = next;
            }
            if delta < BALANCE_EPSILON {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(Error::Solver(format!(
                "balancing vertex {} did not converge",
                self.root
            )));
        }

        for (u, &e) in self.u2e.iter().enumerate() {
            let w: f64 = incident[u].iter().map(|&j| r[j]).sum();
            gr.set_edge_weight(e, w);
        }
        Ok(())
    }
}
