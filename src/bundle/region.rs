/// Coverage accounting and region-to-partial-exon conversion.
use std::collections::BTreeMap;

use super::element::{BoundaryType, PartialExon};

/// Ratio between adjacent coverage levels that counts as a discontinuity.
const SLOPE_RATIO: f64 = 5.0;
/// Minimum depth on the high side of a discontinuity worth splitting at.
const SLOPE_MIN_DEPTH: f64 = 5.0;

/// Interval -> depth map, stored as position deltas.
#[derive(Debug, Clone, Default)]
pub struct CoverageMap {
    deltas: BTreeMap<i32, i32>,
}

impl CoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit of depth across [l, r).
    pub fn add(&mut self, l: i32, r: i32) {
        if l >= r {
            return;
        }
        *self.deltas.entry(l).or_insert(0) += 1;
        *self.deltas.entry(r).or_insert(0) -= 1;
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Depth at a single position.
    pub fn get(&self, pos: i32) -> i32 {
        self.deltas
            .range(..=pos)
            .map(|(_, d)| d)
            .sum::<i32>()
            .max(0)
    }

    /// Constant-depth segments covering [l, r), including zero-depth gaps.
    pub fn segments(&self, l: i32, r: i32) -> Vec<(i32, i32, i32)> {
        let mut out = Vec::new();
        if l >= r {
            return out;
        }
        let mut depth: i32 = self.deltas.range(..=l).map(|(_, d)| d).sum();
        let mut cur = l;
        for (&p, &d) in self.deltas.range((
            std::ops::Bound::Excluded(l),
            std::ops::Bound::Excluded(r),
        )) {
            if p > cur {
                out.push((cur, p, depth.max(0)));
            }
            cur = p;
            depth += d;
        }
        if cur < r {
            out.push((cur, r, depth.max(0)));
        }
        out
    }

    /// Length-weighted mean and standard deviation of depth across [l, r),
    /// counting uncovered positions as zero.
    pub fn ave_dev(&self, l: i32, r: i32) -> (f64, f64) {
        let len = (r - l) as f64;
        if len <= 0.0 {
            return (0.0, 0.0);
        }
        let segs = self.segments(l, r);
        let sum: f64 = segs.iter().map(|&(a, b, d)| (b - a) as f64 * d as f64).sum();
        let ave = sum / len;
        let var: f64 = segs
            .iter()
            .map(|&(a, b, d)| (b - a) as f64 * (d as f64 - ave).powi(2))
            .sum::<f64>()
            / len;
        (ave, var.sqrt())
    }
}

/// A genomic interval between two consecutive boundary points, emitting one
/// or more partial exons.
#[derive(Debug, Clone)]
pub struct Region {
    pub lpos: i32,
    pub rpos: i32,
    pub ltype: BoundaryType,
    pub rtype: BoundaryType,
    pub pexons: Vec<PartialExon>,
}

impl Region {
    /// Build a region and derive its partial exons from the coverage map.
    ///
    /// Uncovered stretches separate covered runs; within a run, a sharp
    /// coverage discontinuity splits the run at the discontinuity, typed as
    /// a transcript start (upward jump) or end (downward jump).
    pub fn build(
        lpos: i32,
        rpos: i32,
        ltype: BoundaryType,
        rtype: BoundaryType,
        mmap: &CoverageMap,
    ) -> Region {
        let mut region = Region {
            lpos,
            rpos,
            ltype,
            rtype,
            pexons: Vec::new(),
        };

        let segs = mmap.segments(lpos, rpos);

        // Covered runs: maximal stretches of positive depth.
        let mut runs: Vec<Vec<(i32, i32, i32)>> = Vec::new();
        for seg in segs {
            if seg.2 <= 0 {
                continue;
            }
            match runs.last_mut() {
                Some(run) if run.last().map(|s| s.1) == Some(seg.0) => run.push(seg),
                _ => runs.push(vec![seg]),
            }
        }

        for run in runs {
            let run_l = run[0].0;
            let run_r = run[run.len() - 1].1;

            // A run not anchored at the region boundary starts or ends at a
            // coverage gap.
            let run_ltype = if run_l == lpos { ltype } else { BoundaryType::Start };
            let run_rtype = if run_r == rpos { rtype } else { BoundaryType::End };

            // Slope test: cut the run at sharp discontinuities.
            let mut cuts: Vec<(i32, BoundaryType)> = Vec::new();
            for w in run.windows(2) {
                let d1 = w[0].2 as f64;
                let d2 = w[1].2 as f64;
                let (lo, hi) = if d1 < d2 { (d1, d2) } else { (d2, d1) };
                if hi >= SLOPE_MIN_DEPTH && hi >= lo * SLOPE_RATIO {
                    let btype = if d2 > d1 {
                        BoundaryType::Start
                    } else {
                        BoundaryType::End
                    };
                    cuts.push((w[1].0, btype));
                }
            }

            let mut left = run_l;
            let mut left_type = run_ltype;
            for (cut, btype) in cuts {
                region.push_pexon(left, cut, left_type, btype, mmap);
                left = cut;
                left_type = btype;
            }
            region.push_pexon(left, run_r, left_type, run_rtype, mmap);
        }

        region
    }

    fn push_pexon(
        &mut self,
        l: i32,
        r: i32,
        ltype: BoundaryType,
        rtype: BoundaryType,
        mmap: &CoverageMap,
    ) {
        if l >= r {
            return;
        }
        let (ave, dev) = mmap.ave_dev(l, r);
        self.pexons.push(PartialExon {
            lpos: l,
            rpos: r,
            ltype,
            rtype,
            ave,
            dev,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_get_and_segments() {
        let mut m = CoverageMap::new();
        m.add(100, 200);
        m.add(150, 250);
        assert_eq!(m.get(99), 0);
        assert_eq!(m.get(100), 1);
        assert_eq!(m.get(150), 2);
        assert_eq!(m.get(200), 1);
        assert_eq!(m.get(250), 0);

        let segs = m.segments(100, 250);
        assert_eq!(segs, vec![(100, 150, 1), (150, 200, 2), (200, 250, 1)]);
    }

    #[test]
    fn test_segments_with_gap() {
        let mut m = CoverageMap::new();
        m.add(100, 150);
        m.add(200, 250);
        let segs = m.segments(50, 300);
        assert_eq!(
            segs,
            vec![
                (50, 100, 0),
                (100, 150, 1),
                (150, 200, 0),
                (200, 250, 1),
                (250, 300, 0)
            ]
        );
    }

    #[test]
    fn test_ave_dev_uniform() {
        let mut m = CoverageMap::new();
        for _ in 0..4 {
            m.add(100, 200);
        }
        let (ave, dev) = m.ave_dev(100, 200);
        assert!((ave - 4.0).abs() < 1e-9);
        assert!(dev.abs() < 1e-9);
    }

    #[test]
    fn test_ave_dev_mixed() {
        let mut m = CoverageMap::new();
        m.add(0, 100); // depth 1 over [0, 100)
        m.add(0, 50); // depth 2 over [0, 50)
        let (ave, dev) = m.ave_dev(0, 100);
        assert!((ave - 1.5).abs() < 1e-9);
        assert!((dev - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_region_uniform_single_pexon() {
        let mut m = CoverageMap::new();
        for _ in 0..3 {
            m.add(100, 300);
        }
        let r = Region::build(100, 300, BoundaryType::Start, BoundaryType::End, &m);
        assert_eq!(r.pexons.len(), 1);
        let p = &r.pexons[0];
        assert_eq!((p.lpos, p.rpos), (100, 300));
        assert_eq!(p.ltype, BoundaryType::Start);
        assert_eq!(p.rtype, BoundaryType::End);
        assert!((p.ave - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_region_splits_at_upward_jump() {
        let mut m = CoverageMap::new();
        m.add(100, 300);
        for _ in 0..19 {
            m.add(200, 300);
        }
        let r = Region::build(100, 300, BoundaryType::Start, BoundaryType::End, &m);
        assert_eq!(r.pexons.len(), 2);
        assert_eq!((r.pexons[0].lpos, r.pexons[0].rpos), (100, 200));
        assert_eq!((r.pexons[1].lpos, r.pexons[1].rpos), (200, 300));
        // Upward jump: the right piece begins a transcript.
        assert_eq!(r.pexons[0].rtype, BoundaryType::Start);
        assert_eq!(r.pexons[1].ltype, BoundaryType::Start);
    }

    #[test]
    fn test_region_splits_at_downward_jump() {
        let mut m = CoverageMap::new();
        m.add(100, 300);
        for _ in 0..19 {
            m.add(100, 200);
        }
        let r = Region::build(100, 300, BoundaryType::LeftSplice, BoundaryType::End, &m);
        assert_eq!(r.pexons.len(), 2);
        assert_eq!(r.pexons[0].rtype, BoundaryType::End);
        assert_eq!(r.pexons[1].ltype, BoundaryType::End);
        assert_eq!(r.pexons[0].ltype, BoundaryType::LeftSplice);
    }

    #[test]
    fn test_region_gentle_slope_not_split() {
        let mut m = CoverageMap::new();
        for _ in 0..4 {
            m.add(100, 300);
        }
        for _ in 0..2 {
            m.add(200, 300); // 4 -> 6, well under the ratio
        }
        let r = Region::build(100, 300, BoundaryType::Start, BoundaryType::End, &m);
        assert_eq!(r.pexons.len(), 1);
    }

    #[test]
    fn test_region_gap_separates_runs() {
        let mut m = CoverageMap::new();
        m.add(100, 150);
        m.add(200, 250);
        let r = Region::build(100, 250, BoundaryType::Start, BoundaryType::End, &m);
        assert_eq!(r.pexons.len(), 2);
        assert_eq!((r.pexons[0].lpos, r.pexons[0].rpos), (100, 150));
        assert_eq!((r.pexons[1].lpos, r.pexons[1].rpos), (200, 250));
        // Gap boundaries are typed as transcript end/start.
        assert_eq!(r.pexons[0].rtype, BoundaryType::End);
        assert_eq!(r.pexons[1].ltype, BoundaryType::Start);
    }

    #[test]
    fn test_region_empty_coverage_no_pexons() {
        let m = CoverageMap::new();
        let r = Region::build(100, 300, BoundaryType::RightSplice, BoundaryType::LeftSplice, &m);
        assert!(r.pexons.is_empty());
    }
}
