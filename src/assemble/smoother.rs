/// Flow-balance smoothing of edge weights.
///
/// The assembler wants every interior vertex to satisfy sum(in) == sum(out)
/// exactly, with integral weights, so that equation discovery and edge
/// splitting work with exact arithmetic.
use crate::graph::SpliceGraph;

/// Proportional-balancing sweeps before rounding.
const SMOOTH_SWEEPS: usize = 10;

/// Smooth all edge weights: proportional balancing toward the midpoint of
/// in-flow and out-flow, then integral rounding and an exact repair pass.
pub fn smooth_weights(gr: &mut SpliceGraph) {
    let n = gr.num_vertices();
    if n < 3 {
        return;
    }

    for _ in 0..SMOOTH_SWEEPS {
        for v in 1..n - 1 {
            let sin: f64 = gr.in_edges(v).iter().map(|&e| gr.edge_weight(e)).sum();
            let sout: f64 = gr.out_edges(v).iter().map(|&e| gr.edge_weight(e)).sum();
            if sin <= 0.0 || sout <= 0.0 {
                continue;
            }
            let target = (sin + sout) / 2.0;
            let rin = target / sin;
            let rout = target / sout;
            for e in gr.in_edges(v).to_vec() {
                let w = gr.edge_weight(e);
                gr.set_edge_weight(e, w * rin);
            }
            for e in gr.out_edges(v).to_vec() {
                let w = gr.edge_weight(e);
                gr.set_edge_weight(e, w * rout);
            }
        }
    }

    round_and_repair(gr);
}

/// Round every edge weight to an integer (at least 1), then sweep vertices
/// in topological order pushing any residual imbalance onto out-edges so
/// each interior vertex balances exactly.
pub fn round_and_repair(gr: &mut SpliceGraph) {
    let n = gr.num_vertices();

    for e in gr.edge_ids().collect::<Vec<_>>() {
        let w = gr.edge_weight(e).round().max(1.0);
        gr.set_edge_weight(e, w);
    }

    if n < 3 {
        return;
    }
    for v in 1..n - 1 {
        let sin: i64 = gr
            .in_edges(v)
            .iter()
            .map(|&e| gr.edge_weight(e) as i64)
            .sum();
        let sout: i64 = gr
            .out_edges(v)
            .iter()
            .map(|&e| gr.edge_weight(e) as i64)
            .sum();
        if sin == 0 || sout == 0 {
            continue;
        }
        let mut rem = sin - sout;
        if rem == 0 {
            continue;
        }

        // Heaviest out-edges absorb the difference; reductions stop at 1.
        let mut outs: Vec<usize> = gr.out_edges(v).to_vec();
        outs.sort_by(|&a, &b| {
            gr.edge_weight(b)
                .partial_cmp(&gr.edge_weight(a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        for e in outs {
            if rem == 0 {
                break;
            }
            let w = gr.edge_weight(e) as i64;
            let nw = (w + rem).max(1);
            rem -= nw - w;
            gr.set_edge_weight(e, nw as f64);
        }
    }
}
