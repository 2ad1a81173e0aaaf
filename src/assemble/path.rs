/// Residual source-to-sink paths and their conversion into transcripts.
use crate::bundle::element::PartialExon;

/// A source-to-sink vertex sequence with its abundance estimate.
#[derive(Debug, Clone)]
pub struct Path {
    /// Vertex indices, source first, sink last.
    pub v: Vec<usize>,
    /// Abundance (flow) carried by the path.
    pub abd: f64,
    /// Estimated supporting read count.
    pub reads: f64,
}

/// An assembled transcript ready for serialization.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub chrm: String,
    pub source: String,
    pub strand: char,
    pub gene_id: String,
    pub transcript_id: String,
    /// Exons as 0-based half-open intervals, ascending.
    pub exons: Vec<(i32, i32)>,
    pub coverage: f64,
    pub expression: f64,
}

impl Transcript {
    /// Leftmost position (0-based).
    pub fn lpos(&self) -> i32 {
        self.exons.first().map(|e| e.0).unwrap_or(0)
    }

    /// Rightmost position (exclusive).
    pub fn rpos(&self) -> i32 {
        self.exons.last().map(|e| e.1).unwrap_or(0)
    }

    /// Total exonic length.
    pub fn length(&self) -> i32 {
        self.exons.iter().map(|&(l, r)| r - l).sum()
    }
}

/// Expand a path over the bundle's partial exons into a transcript,
/// coalescing adjacent partial exons that share a genomic boundary.
///
/// Returns `None` for degenerate paths without interior vertices.
pub fn build_transcript(
    p: &Path,
    pexons: &[PartialExon],
    chrm: &str,
    strand: char,
    source: &str,
    gene_id: &str,
    transcript_id: &str,
) -> Option<Transcript> {
    let v = &p.v;
    if v.len() < 3 {
        return None;
    }
    debug_assert_eq!(v[0], 0);
    debug_assert_eq!(*v.last().unwrap(), pexons.len() + 1);

    let mut exons: Vec<(i32, i32)> = Vec::new();
    for &x in &v[1..v.len() - 1] {
        let pe = &pexons[x - 1];
        match exons.last_mut() {
            Some(last) if last.1 == pe.lpos => last.1 = pe.rpos,
            _ => exons.push((pe.lpos, pe.rpos)),
        }
    }
    if exons.is_empty() {
        return None;
    }

    Some(Transcript {
        chrm: chrm.to_string(),
        source: source.to_string(),
        strand,
        gene_id: gene_id.to_string(),
        transcript_id: transcript_id.to_string(),
        exons,
        coverage: p.reads,
        expression: p.abd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::element::BoundaryType;

    fn pexon(l: i32, r: i32) -> PartialExon {
        PartialExon {
            lpos: l,
            rpos: r,
            ltype: BoundaryType::Start,
            rtype: BoundaryType::End,
            ave: 1.0,
            dev: 1.0,
        }
    }

    #[test]
    fn test_adjacent_pexons_coalesce() {
        let pexons = vec![pexon(100, 150), pexon(150, 200), pexon(300, 400)];
        let p = Path {
            v: vec![0, 1, 2, 3, 4],
            abd: 6.0,
            reads: 9.0,
        };
        let t = build_transcript(&p, &pexons, "chr1", '+', "algo", "g1", "g1.0").unwrap();
        assert_eq!(t.exons, vec![(100, 200), (300, 400)]);
        assert_eq!(t.lpos(), 100);
        assert_eq!(t.rpos(), 400);
        assert_eq!(t.length(), 200);
        assert_eq!(t.strand, '+');
        assert_eq!(t.expression, 6.0);
        assert_eq!(t.coverage, 9.0);
    }

    #[test]
    fn test_skipped_pexon_keeps_exons_apart() {
        let pexons = vec![pexon(100, 150), pexon(150, 200), pexon(300, 400)];
        // Path using only the first and last partial exons.
        let p = Path {
            v: vec![0, 1, 3, 4],
            abd: 2.0,
            reads: 2.0,
        };
        let t = build_transcript(&p, &pexons, "chr1", '.', "algo", "g1", "g1.1").unwrap();
        assert_eq!(t.exons, vec![(100, 150), (300, 400)]);
    }

    #[test]
    fn test_degenerate_path_skipped() {
        let pexons = vec![pexon(100, 150)];
        let p = Path {
            v: vec![0, 2],
            abd: 1.0,
            reads: 1.0,
        };
        assert!(build_transcript(&p, &pexons, "chr1", '.', "algo", "g1", "g1.0").is_none());
    }

    #[test]
    fn test_single_exon_path() {
        let pexons = vec![pexon(100, 150)];
        let p = Path {
            v: vec![0, 1, 2],
            abd: 3.0,
            reads: 1.5,
        };
        let t = build_transcript(&p, &pexons, "chr1", '.', "algo", "g1", "g1.0").unwrap();
        assert_eq!(t.exons, vec![(100, 150)]);
        assert_eq!(t.length(), 50);
    }
}
