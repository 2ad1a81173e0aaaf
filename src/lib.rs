#![allow(non_snake_case)]

pub mod assemble;
pub mod bundle;
pub mod error;
pub mod graph;
pub mod hit;
pub mod io;
pub mod params;
pub mod stats;

use std::fs::File;
use std::io::{BufWriter, Write};

use log::info;

use crate::assemble::path::build_transcript;
use crate::assemble::Scallop;
use crate::bundle::Bundle;
use crate::error::Error;
use crate::io::bam::BamReader;
use crate::io::gtf::GtfWriter;
use crate::params::Parameters;
use crate::stats::AssemblyStats;

/// Top-level driver. Called from `main()` after CLI parsing.
pub fn run(params: &Parameters) -> anyhow::Result<()> {
    params.validate()?;

    info!("ruScallop v{}", env!("CARGO_PKG_VERSION"));
    info!("input: {}", params.input_bam.display());
    info!("library_type: {}", params.library_type);

    let mut reader = BamReader::open(&params.input_bam)?;

    let out: Box<dyn Write> = match &params.output {
        Some(path) => {
            let file = File::create(path).map_err(|e| Error::io(e, path))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    let mut writer = GtfWriter::new(out);
    let mut stats = AssemblyStats::new();

    let mut bundle: Option<Bundle> = None;
    let mut gene_index = 0usize;

    while let Some(hit) = reader.next_hit(params)? {
        stats.hits += 1;

        let flush = bundle
            .as_ref()
            .is_some_and(|bb| bb.tid != hit.tid || hit.pos > bb.rpos + params.min_bundle_gap);
        if flush {
            if let Some(bb) = bundle.take() {
                process_bundle(bb, params, &mut writer, &mut stats, &mut gene_index)?;
            }
        }

        let bb = bundle.get_or_insert_with(|| {
            let chrm = reader.chrm_name(hit.tid).unwrap_or("*").to_string();
            Bundle::new(hit.tid, chrm)
        });
        bb.add_hit(hit);
    }
    if let Some(bb) = bundle.take() {
        process_bundle(bb, params, &mut writer, &mut stats, &mut gene_index)?;
    }

    writer.finish()?;
    stats.print_summary();
    Ok(())
}

/// Assemble one bundle and write its transcripts.
fn process_bundle<W: Write>(
    mut bb: Bundle,
    params: &Parameters,
    writer: &mut GtfWriter<W>,
    stats: &mut AssemblyStats,
    gene_index: &mut usize,
) -> Result<(), Error> {
    if bb.is_empty() {
        return Ok(());
    }
    stats.bundles += 1;

    if !bb.build(params)? {
        return Ok(());
    }
    stats.junctions += bb.junctions.len() as u64;

    *gene_index += 1;
    let gid = format!("gene.{gene_index}");
    log::debug!(
        "{}: {}:{}-{} strand {} with {} hits, {} junctions, {} partial exons",
        gid,
        bb.chrm,
        bb.lpos,
        bb.rpos,
        bb.strand,
        bb.hits.len(),
        bb.junctions.len(),
        bb.pexons.len()
    );

    let gr = std::mem::take(&mut bb.gr);
    let hs = std::mem::take(&mut bb.hs);
    let mut sc = Scallop::new(gid.clone(), gr, hs, params);
    let paths = sc.assemble();
    stats.solver_failures += sc.solver_failures as u64;
    if sc.watchdog_tripped {
        stats.watchdog_trips += 1;
    }

    for (i, p) in paths.iter().enumerate() {
        let tid = format!("{gid}.{i}");
        let Some(t) = build_transcript(p, &bb.pexons, &bb.chrm, bb.strand, &params.algo, &gid, &tid)
        else {
            continue;
        };
        if t.length() < params.min_transcript_length {
            continue;
        }
        writer.write_transcript(&t)?;
        stats.transcripts += 1;
    }

    Ok(())
}
