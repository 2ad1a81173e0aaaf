/// Bundle construction: group adjacent hits into a locus, derive junctions
/// and partial exons, and seed the splice graph and hyper-edge set.
pub mod element;
pub mod region;

use std::collections::{BTreeMap, HashMap};

use coitrees::{BasicCOITree, Interval, IntervalTree};

use crate::error::Error;
use crate::graph::hyper::HyperSet;
use crate::graph::{SpliceGraph, VertexInfo};
use crate::hit::{high32, low32, Hit};
use crate::params::Parameters;
use element::{BoundaryType, Junction, PartialExon};
use region::{CoverageMap, Region};

/// Junction-count sieve applied in the first region pass.
const REGION_SIEVE_COUNT: usize = 5;
/// Entry edges lighter than this may mark an isolated terminal exon.
const ISOLATED_EDGE_MAX_WEIGHT: f64 = 1.5;
/// Anchor vertices heavier than this qualify for boundary extension.
const ISOLATED_VERTEX_MIN_WEIGHT: f64 = 5.0;
/// Path-count saturation for read-pair bridging; reaching it means the
/// bridge is too ambiguous to trust.
const BRIDGE_MAX_PATHS: u64 = 1 << 20;

/// A locus worth of aligned reads with its derived structures.
#[derive(Default)]
pub struct Bundle {
    /// Reference sequence index.
    pub tid: usize,
    /// Reference sequence name.
    pub chrm: String,
    /// Leftmost position covered by any hit.
    pub lpos: i32,
    /// Rightmost position covered by any hit (exclusive).
    pub rpos: i32,
    /// Bundle strand from the XS vote: '+', '-' or '.'.
    pub strand: char,
    pub hits: Vec<Hit>,
    /// Coverage over matched intervals.
    mmap: CoverageMap,
    /// Coverage over insertion/deletion markers.
    pub imap: CoverageMap,
    pub junctions: Vec<Junction>,
    regions: Vec<Region>,
    pub pexons: Vec<PartialExon>,
    pmap: Option<BasicCOITree<usize, u32>>,
    pub gr: SpliceGraph,
    pub hs: HyperSet,
}

impl Bundle {
    pub fn new(tid: usize, chrm: String) -> Self {
        Bundle {
            tid,
            chrm,
            lpos: i32::MAX,
            rpos: i32::MIN,
            strand: '.',
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Append a hit, extending the locus and the coverage maps.
    pub fn add_hit(&mut self, hit: Hit) {
        self.lpos = self.lpos.min(hit.pos);
        self.rpos = self.rpos.max(hit.rpos);
        let (vm, vi, vd) = hit.mid_intervals();
        for p in vm {
            self.mmap.add(high32(p), low32(p));
        }
        for p in vi.into_iter().chain(vd) {
            self.imap.add(high32(p), low32(p));
        }
        self.hits.push(hit);
    }

    /// Derive junctions, partial exons, splice graph and hyper-edges.
    ///
    /// Returns `false` when the bundle has no junction and single-exon
    /// transcripts are ignored; nothing is assembled in that case.
    pub fn build(&mut self, params: &Parameters) -> Result<bool, Error> {
        self.compute_strand();
        self.check_left_ascending()?;

        self.build_junctions(params);
        if self.junctions.is_empty() && params.ignore_single_exon_transcripts {
            return Ok(false);
        }

        self.build_regions(REGION_SIEVE_COUNT);
        self.build_partial_exons();
        self.build_regions(0);
        self.build_partial_exons();

        self.build_partial_exon_map();
        self.link_partial_exons();
        self.build_splice_graph();

        self.extend_isolated_start_boundaries();
        self.extend_isolated_end_boundaries();

        self.build_hyper_edges(params);

        Ok(true)
    }

    // ── strand and ordering ─────────────────────────────────────────────

    fn compute_strand(&mut self) {
        let mut np = 0usize;
        let mut nq = 0usize;
        for h in &self.hits {
            match h.xs {
                '+' => np += 1,
                '-' => nq += 1,
                _ => {}
            }
        }
        self.strand = match np.cmp(&nq) {
            std::cmp::Ordering::Greater => '+',
            std::cmp::Ordering::Less => '-',
            std::cmp::Ordering::Equal => '.',
        };
    }

    fn check_left_ascending(&self) -> Result<(), Error> {
        for w in self.hits.windows(2) {
            if w[0].pos > w[1].pos {
                return Err(Error::MalformedInput(format!(
                    "hits out of order at {}:{} > {}",
                    self.chrm, w[0].pos, w[1].pos
                )));
            }
        }
        Ok(())
    }

    // ── junctions ───────────────────────────────────────────────────────

    fn build_junctions(&mut self, params: &Parameters) {
        let mut m: BTreeMap<i64, usize> = BTreeMap::new();
        for h in &self.hits {
            for &p in &h.spos {
                *m.entry(p).or_insert(0) += 1;
            }
        }
        self.junctions = m
            .into_iter()
            .filter(|&(_, n)| n >= params.min_splice_boundary_hits)
            .map(|(p, n)| Junction::new(high32(p), low32(p), n))
            .collect();
    }

    // ── regions and partial exons ───────────────────────────────────────

    fn build_regions(&mut self, sieve: usize) {
        let mut s: BTreeMap<i32, BoundaryType> = BTreeMap::new();
        s.insert(self.lpos, BoundaryType::Start);
        s.insert(self.rpos, BoundaryType::End);

        for jc in &self.junctions {
            // Low-support junctions inside highly covered regions are
            // spurious; the intron coverage betrays them.
            let (ave, _) = self.mmap.ave_dev(jc.lpos, jc.rpos);
            if jc.count < sieve && ave >= sieve as f64 {
                continue;
            }

            match s.get(&jc.lpos) {
                None => {
                    s.insert(jc.lpos, BoundaryType::LeftSplice);
                }
                Some(BoundaryType::RightSplice) => {
                    s.insert(jc.lpos, BoundaryType::LeftRightSplice);
                }
                _ => {}
            }
            match s.get(&jc.rpos) {
                None => {
                    s.insert(jc.rpos, BoundaryType::RightSplice);
                }
                Some(BoundaryType::LeftSplice) => {
                    s.insert(jc.rpos, BoundaryType::LeftRightSplice);
                }
                _ => {}
            }
        }

        // Later passes refine around the boundaries found so far.
        for p in &self.pexons {
            s.entry(p.lpos).or_insert(p.ltype);
            s.entry(p.rpos).or_insert(p.rtype);
        }

        let v: Vec<(i32, BoundaryType)> = s.into_iter().collect();
        self.regions.clear();
        for w in v.windows(2) {
            let mut ltype = w[0].1;
            let mut rtype = w[1].1;
            if ltype == BoundaryType::LeftRightSplice {
                ltype = BoundaryType::RightSplice;
            }
            if rtype == BoundaryType::LeftRightSplice {
                rtype = BoundaryType::LeftSplice;
            }
            self.regions
                .push(Region::build(w[0].0, w[1].0, ltype, rtype, &self.mmap));
        }
    }

    fn build_partial_exons(&mut self) {
        self.pexons = self
            .regions
            .iter()
            .flat_map(|r| r.pexons.iter().cloned())
            .collect();
    }

    fn build_partial_exon_map(&mut self) {
        let intervals: Vec<Interval<usize>> = self
            .pexons
            .iter()
            .enumerate()
            .filter(|(_, p)| p.rpos > p.lpos)
            .map(|(i, p)| Interval::new(p.lpos, p.rpos - 1, i))
            .collect();
        self.pmap = Some(BasicCOITree::new(&intervals));
    }

    fn locate_pexon(&self, pos: i32) -> Option<usize> {
        let tree = self.pmap.as_ref()?;
        let mut found = None;
        tree.query(pos, pos, |node| {
            if found.is_none() {
                found = Some(node.metadata);
            }
        });
        found
    }

    /// Partial exon whose interior starts the matched interval beginning at
    /// `x`; a start within `min_flank_length` of the right boundary snaps to
    /// the next partial exon.
    pub fn locate_left_partial_exon(&self, x: i32, min_flank: i32) -> Option<usize> {
        let k = self.locate_pexon(x)?;
        let p = &self.pexons[k];
        debug_assert!(p.lpos <= x && x < p.rpos);
        let k = if x - p.lpos > min_flank && p.rpos - x < min_flank {
            k + 1
        } else {
            k
        };
        (k < self.pexons.len()).then_some(k)
    }

    /// Partial exon whose interior ends the matched interval ending at `x`
    /// (exclusive); an end within `min_flank_length` of the left boundary
    /// snaps to the previous partial exon.
    pub fn locate_right_partial_exon(&self, x: i32, min_flank: i32) -> Option<usize> {
        let k = self.locate_pexon(x - 1)?;
        let p = &self.pexons[k];
        debug_assert!(p.lpos < x && x <= p.rpos);
        if p.rpos - x > min_flank && x - p.lpos <= min_flank {
            k.checked_sub(1)
        } else {
            Some(k)
        }
    }

    fn link_partial_exons(&mut self) {
        if self.pexons.is_empty() {
            return;
        }
        let mut lm: HashMap<i32, usize> = HashMap::new();
        let mut rm: HashMap<i32, usize> = HashMap::new();
        for (i, p) in self.pexons.iter().enumerate() {
            lm.insert(p.lpos, i);
            rm.insert(p.rpos, i);
        }
        for jc in &mut self.junctions {
            jc.lexon = rm.get(&jc.lpos).copied();
            jc.rexon = lm.get(&jc.rpos).copied();
        }
    }

    // ── splice graph ────────────────────────────────────────────────────

    fn build_splice_graph(&mut self) {
        let mut gr = SpliceGraph::new();

        gr.add_vertex(
            0.0,
            VertexInfo {
                lpos: self.lpos,
                rpos: self.lpos,
                ..Default::default()
            },
        );
        for p in &self.pexons {
            let length = p.rpos - p.lpos;
            debug_assert!(length >= 1);
            gr.add_vertex(
                p.ave.max(1.0),
                VertexInfo {
                    lpos: p.lpos,
                    rpos: p.rpos,
                    length,
                    stddev: p.dev.max(1.0),
                },
            );
        }
        let tt = gr.add_vertex(
            0.0,
            VertexInfo {
                lpos: self.rpos,
                rpos: self.rpos,
                ..Default::default()
            },
        );

        // Junction edges, weighted by read support.
        for jc in &self.junctions {
            let (Some(le), Some(re)) = (jc.lexon, jc.rexon) else {
                continue;
            };
            let e = gr.add_edge(le + 1, re + 1);
            gr.set_edge_weight(e, jc.count as f64);
        }

        // Source/sink edges at transcript boundaries; the weight is the
        // coverage left over after the adjacent partial exon's share.
        for (i, p) in self.pexons.iter().enumerate() {
            if p.ltype == BoundaryType::Start {
                let mut w = p.ave;
                if i >= 1 && self.pexons[i - 1].rpos == p.lpos {
                    w -= self.pexons[i - 1].ave;
                }
                let e = gr.add_edge(0, i + 1);
                gr.set_edge_weight(e, w.max(1.0));
            }
            if p.rtype == BoundaryType::End {
                let mut w = p.ave;
                if i + 1 < self.pexons.len() && self.pexons[i + 1].lpos == p.rpos {
                    w -= self.pexons[i + 1].ave;
                }
                let e = gr.add_edge(i + 1, tt);
                gr.set_edge_weight(e, w.max(1.0));
            }
        }

        // Adjacency edges between partial exons sharing a boundary.
        for i in 0..self.pexons.len().saturating_sub(1) {
            let x = &self.pexons[i];
            let y = &self.pexons[i + 1];
            if x.rpos != y.lpos {
                continue;
            }
            let xd = gr.out_degree(i + 1);
            let yd = gr.in_degree(i + 2);
            let wt = if xd < yd { x.ave } else { y.ave };
            let e = gr.add_edge(i + 1, i + 2);
            gr.set_edge_weight(e, wt.max(1.0));
        }

        self.gr = gr;
    }

    /// A high-coverage vertex reached from the source through a faint linear
    /// chain models a broken-off unique first exon: give it its own start.
    fn extend_isolated_start_boundaries(&mut self) {
        let n = self.gr.num_vertices();
        for i in 1..n.saturating_sub(1) {
            if self.gr.in_degree(i) != 1 || self.gr.out_degree(i) != 1 {
                continue;
            }
            let e1 = self.gr.in_edges(i)[0];
            let e2 = self.gr.out_edges(i)[0];
            let s = self.gr.source(e1);
            let t = self.gr.target(e2);

            if s != 0 {
                continue;
            }
            if self.gr.in_degree(t) != 1 {
                continue;
            }
            if self.gr.edge_weight(e2) >= ISOLATED_EDGE_MAX_WEIGHT {
                continue;
            }
            if self.gr.vertex_weight(t) <= ISOLATED_VERTEX_MIN_WEIGHT {
                continue;
            }
            if self.gr.vertex_info(i).rpos == self.gr.vertex_info(t).lpos {
                continue;
            }

            let w = self.gr.vertex_weight(t) - self.gr.edge_weight(e2);
            let e = self.gr.add_edge(s, t);
            self.gr.set_edge_weight(e, w);
            log::debug!(
                "extend isolated start boundary: ({}, {:.2}) -- ({:.2}) -- ({}, {:.2})",
                i,
                self.gr.vertex_weight(i),
                self.gr.edge_weight(e2),
                t,
                self.gr.vertex_weight(t)
            );
        }
    }

    /// Mirror heuristic at transcript ends.
    fn extend_isolated_end_boundaries(&mut self) {
        let n = self.gr.num_vertices();
        for i in 1..n.saturating_sub(1) {
            if self.gr.in_degree(i) != 1 || self.gr.out_degree(i) != 1 {
                continue;
            }
            let e1 = self.gr.in_edges(i)[0];
            let e2 = self.gr.out_edges(i)[0];
            let s = self.gr.source(e1);
            let t = self.gr.target(e2);

            if self.gr.out_degree(s) != 1 {
                continue;
            }
            if t != n - 1 {
                continue;
            }
            if self.gr.edge_weight(e1) >= ISOLATED_EDGE_MAX_WEIGHT {
                continue;
            }
            if self.gr.vertex_weight(s) <= ISOLATED_VERTEX_MIN_WEIGHT {
                continue;
            }
            if self.gr.vertex_info(s).rpos == self.gr.vertex_info(i).lpos {
                continue;
            }

            let w = self.gr.vertex_weight(s) - self.gr.edge_weight(e1);
            let e = self.gr.add_edge(s, t);
            self.gr.set_edge_weight(e, w);
            log::debug!(
                "extend isolated end boundary: ({}, {:.2}) -- ({:.2}) -- ({}, {:.2})",
                s,
                self.gr.vertex_weight(s),
                self.gr.edge_weight(e1),
                i,
                self.gr.vertex_weight(i)
            );
        }
    }

    // ── hyper-edges ─────────────────────────────────────────────────────

    /// Build read-derived phasing chains, grouping hits by query name and
    /// bridging mate pairs through the graph where the connecting path is
    /// unique.
    fn build_hyper_edges(&mut self, params: &Parameters) {
        let mut order: Vec<usize> = (0..self.hits.len()).collect();
        order.sort_by(|&a, &b| {
            let x = &self.hits[a];
            let y = &self.hits[b];
            x.qname
                .cmp(&y.qname)
                .then(x.hi.cmp(&y.hi))
                .then(x.pos.cmp(&y.pos))
        });

        let mut hs = HyperSet::new();
        let mut qname: Option<&str> = None;
        let mut sp1: Vec<usize> = Vec::new();

        fn flush(hs: &mut HyperSet, sp: &[usize]) {
            let mut chain: Vec<usize> = sp.to_vec();
            chain.sort_unstable();
            chain.dedup();
            hs.add_chain(chain);
        }

        for &idx in &order {
            let h = &self.hits[idx];

            if qname != Some(h.qname.as_str()) {
                flush(&mut hs, &sp1);
                sp1.clear();
            }
            qname = Some(h.qname.as_str());

            if h.is_unmapped() {
                continue;
            }

            let mut sp2: Vec<usize> = Vec::new();
            for p in h.matched_intervals() {
                let k1 = self.locate_left_partial_exon(high32(p), params.min_flank_length);
                let k2 = self.locate_right_partial_exon(low32(p), params.min_flank_length);
                let (Some(k1), Some(k2)) = (k1, k2) else {
                    continue;
                };
                sp2.extend(k1..=k2);
            }

            if sp1.is_empty() || sp2.is_empty() {
                sp1.extend(sp2);
                continue;
            }

            let (x1, x2) = if h.isize < 0 {
                (
                    sp1.iter().copied().max().unwrap_or(0),
                    sp2.iter().copied().min().unwrap_or(0),
                )
            } else {
                (
                    sp2.iter().copied().max().unwrap_or(0),
                    sp1.iter().copied().min().unwrap_or(0),
                )
            };

            match self.bridge_read(x1, x2) {
                Some(sp3) => {
                    sp1.extend(sp2);
                    sp1.extend(sp3);
                }
                None => {
                    flush(&mut hs, &sp1);
                    sp1 = sp2;
                }
            }
        }
        flush(&mut hs, &sp1);

        self.hs = hs;
    }

    /// Attempt to complete a read pair's phasing between partial exons `x`
    /// and `y` by counting directed graph paths; succeeds iff exactly one
    /// path exists, returning its interior partial exons.
    fn bridge_read(&self, x: usize, y: usize) -> Option<Vec<usize>> {
        if x >= y {
            return Some(Vec::new());
        }
        let va = x + 1;
        let vb = y + 1;
        if self.gr.edge(va, vb).is_some() {
            return Some(Vec::new());
        }

        let n = vb - va + 1;
        let mut table = vec![0u64; n];
        let mut trace = vec![usize::MAX; n];
        table[0] = 1;
        for v in (va + 1)..=vb {
            for &e in self.gr.in_edges(v) {
                let s = self.gr.source(e);
                if s < va {
                    continue;
                }
                if table[s - va] == 0 {
                    continue;
                }
                table[v - va] = (table[v - va] + table[s - va]).min(BRIDGE_MAX_PATHS);
                trace[v - va] = s;
                if table[v - va] >= BRIDGE_MAX_PATHS {
                    return None;
                }
            }
        }
        if table[n - 1] != 1 {
            return None;
        }

        let mut out = Vec::new();
        let mut v = vb;
        loop {
            v = trace[v - va];
            if v == usize::MAX || v <= va {
                break;
            }
            out.push(v - 1);
        }
        out.reverse();
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::{CigarOp, RawAlignment};
    use clap::Parser;

    fn params(extra: &[&str]) -> Parameters {
        let mut args = vec!["ruScallop", "input.bam"];
        args.extend_from_slice(extra);
        Parameters::parse_from(args)
    }

    fn make_hit(pos: i32, cigar: Vec<CigarOp>, qname: &str, p: &Parameters) -> Hit {
        Hit::from_raw(
            RawAlignment {
                tid: 0,
                pos,
                flag: 0,
                qual: 60,
                qname: qname.to_string(),
                cigar,
                mpos: 0,
                isize: 0,
                xs: '.',
                ts: '.',
                hi: -1,
                nh: -1,
                nm: 0,
            },
            p,
        )
        .unwrap()
    }

    /// Ten plain reads over [100, 200) and [300, 400), eight spliced reads
    /// joining them.
    fn two_exon_bundle(p: &Parameters) -> Bundle {
        let mut bb = Bundle::new(0, "chr1".to_string());
        let mut hits = Vec::new();
        for i in 0..10 {
            hits.push(make_hit(
                100 + i,
                vec![CigarOp::Match(50)],
                &format!("a{i}"),
                p,
            ));
            hits.push(make_hit(
                300 + i,
                vec![CigarOp::Match(50)],
                &format!("b{i}"),
                p,
            ));
        }
        for i in 0..8 {
            hits.push(make_hit(
                150,
                vec![CigarOp::Match(50), CigarOp::RefSkip(100), CigarOp::Match(50)],
                &format!("s{i}"),
                p,
            ));
        }
        hits.sort_by_key(|h| h.pos);
        for h in hits {
            bb.add_hit(h);
        }
        bb
    }

    #[test]
    fn test_strand_vote() {
        let p = params(&[]);
        let mut bb = Bundle::new(0, "chr1".to_string());
        for (i, xs) in ['+', '+', '-', '.'].iter().enumerate() {
            let mut h = make_hit(100 + i as i32, vec![CigarOp::Match(50)], &format!("r{i}"), &p);
            h.xs = *xs;
            bb.add_hit(h);
        }
        bb.compute_strand();
        assert_eq!(bb.strand, '+');
    }

    #[test]
    fn test_strand_vote_tie() {
        let p = params(&[]);
        let mut bb = Bundle::new(0, "chr1".to_string());
        for (i, xs) in ['+', '-'].iter().enumerate() {
            let mut h = make_hit(100 + i as i32, vec![CigarOp::Match(50)], &format!("r{i}"), &p);
            h.xs = *xs;
            bb.add_hit(h);
        }
        bb.compute_strand();
        assert_eq!(bb.strand, '.');
    }

    #[test]
    fn test_out_of_order_hits_rejected() {
        let p = params(&[]);
        let mut bb = Bundle::new(0, "chr1".to_string());
        bb.add_hit(make_hit(200, vec![CigarOp::Match(50)], "r1", &p));
        bb.add_hit(make_hit(100, vec![CigarOp::Match(50)], "r2", &p));
        assert!(bb.build(&p).is_err());
    }

    #[test]
    fn test_junction_threshold() {
        let p = params(&["--min_splice_boundary_hits", "3"]);
        let mut bb = Bundle::new(0, "chr1".to_string());
        for i in 0..2 {
            bb.add_hit(make_hit(
                150,
                vec![CigarOp::Match(50), CigarOp::RefSkip(100), CigarOp::Match(50)],
                &format!("r{i}"),
                &p,
            ));
        }
        bb.build(&p).unwrap();
        assert!(bb.junctions.is_empty());
        // With the junction gone there is no junction edge in the graph.
        for e in bb.gr.edge_ids().collect::<Vec<_>>() {
            let s = bb.gr.source(e);
            let t = bb.gr.target(e);
            assert!(s == 0 || t == bb.gr.num_vertices() - 1 || t == s + 1);
        }
    }

    #[test]
    fn test_junction_skipped_bundle_with_ignore_flag() {
        let p = params(&[
            "--min_splice_boundary_hits",
            "3",
            "--ignore_single_exon_transcripts",
        ]);
        let mut bb = Bundle::new(0, "chr1".to_string());
        for i in 0..2 {
            bb.add_hit(make_hit(
                150,
                vec![CigarOp::Match(50), CigarOp::RefSkip(100), CigarOp::Match(50)],
                &format!("r{i}"),
                &p,
            ));
        }
        assert!(!bb.build(&p).unwrap());
    }

    #[test]
    fn test_junction_boundaries_match_partial_exons() {
        let p = params(&[]);
        let mut bb = two_exon_bundle(&p);
        bb.build(&p).unwrap();

        assert_eq!(bb.junctions.len(), 1);
        let jc = &bb.junctions[0];
        assert_eq!((jc.lpos, jc.rpos), (200, 300));
        assert_eq!(jc.count, 8);

        // Every retained junction endpoint coincides with a partial-exon
        // boundary.
        let le = jc.lexon.unwrap();
        let re = jc.rexon.unwrap();
        assert_eq!(bb.pexons[le].rpos, jc.lpos);
        assert_eq!(bb.pexons[re].lpos, jc.rpos);
    }

    #[test]
    fn test_graph_source_sink_shape() {
        let p = params(&[]);
        let mut bb = two_exon_bundle(&p);
        bb.build(&p).unwrap();

        let n = bb.gr.num_vertices();
        assert_eq!(n, bb.pexons.len() + 2);
        assert_eq!(bb.gr.in_degree(0), 0);
        assert_eq!(bb.gr.out_degree(n - 1), 0);
        assert!(bb.gr.out_degree(0) >= 1);
        assert!(bb.gr.in_degree(n - 1) >= 1);
        // Every edge runs forward, so the graph is acyclic.
        for e in bb.gr.edge_ids().collect::<Vec<_>>() {
            assert!(bb.gr.source(e) < bb.gr.target(e));
        }
    }

    #[test]
    fn test_locate_partial_exon_fuzz() {
        let p = params(&[]);
        let mut bb = two_exon_bundle(&p);
        bb.build(&p).unwrap();

        // Exact boundaries map to their own partial exons.
        let k1 = bb.locate_left_partial_exon(100, 3).unwrap();
        assert_eq!(bb.pexons[k1].lpos, 100);
        let k2 = bb.locate_right_partial_exon(200, 3).unwrap();
        assert_eq!(bb.pexons[k2].rpos, 200);

        // A start two bases before a right boundary snaps forward.
        let k = bb.locate_left_partial_exon(198, 3).unwrap();
        assert_eq!(bb.pexons[k].lpos, 300);
    }

    #[test]
    fn test_hyper_edges_spliced_read() {
        let p = params(&[]);
        let mut bb = two_exon_bundle(&p);
        bb.build(&p).unwrap();

        // Spliced reads phase the two exons together.
        assert!(!bb.hs.is_empty());
        let has_pair = bb.hs.iter().any(|(c, _)| c.len() >= 2);
        assert!(has_pair);
    }

    #[test]
    fn test_bridge_read_unique_path() {
        let p = params(&[]);
        let mut bb = two_exon_bundle(&p);
        bb.build(&p).unwrap();

        // Exons are chained; bridging across consecutive exons is trivial.
        let r = bb.bridge_read(0, bb.pexons.len() - 1);
        assert!(r.is_some());
    }

    #[test]
    fn test_isolated_end_boundary_extension() {
        // A strong exon [100, 200) linked by a single spliced read to a faint
        // terminal exon [300, 310): the builder synthesizes a direct end for
        // the strong exon.
        let p = params(&[]);
        let mut bb = Bundle::new(0, "chr1".to_string());
        for i in 0..20 {
            bb.add_hit(make_hit(100, vec![CigarOp::Match(100)], &format!("r{i}"), &p));
        }
        bb.add_hit(make_hit(
            150,
            vec![CigarOp::Match(50), CigarOp::RefSkip(100), CigarOp::Match(10)],
            "faint",
            &p,
        ));
        bb.build(&p).unwrap();

        let n = bb.gr.num_vertices();
        let strong = (1..n - 1)
            .find(|&v| bb.gr.vertex_info(v).lpos == 100)
            .unwrap();
        // The strong exon's only natural out-edge is the faint junction; the
        // heuristic adds a direct edge to the sink carrying the residual.
        let direct = bb
            .gr
            .out_edges(strong)
            .iter()
            .copied()
            .find(|&e| bb.gr.target(e) == n - 1)
            .unwrap();
        assert!(bb.gr.edge_weight(direct) > ISOLATED_VERTEX_MIN_WEIGHT);
    }

    #[test]
    fn test_single_exon_bundle() {
        let p = params(&[]);
        let mut bb = Bundle::new(0, "chr1".to_string());
        bb.add_hit(make_hit(100, vec![CigarOp::Match(50)], "r0", &p));
        assert!(bb.build(&p).unwrap());
        assert_eq!(bb.pexons.len(), 1);
        assert_eq!((bb.pexons[0].lpos, bb.pexons[0].rpos), (100, 150));
        assert_eq!(bb.gr.num_vertices(), 3);
    }
}
