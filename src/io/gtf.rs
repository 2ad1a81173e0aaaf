/// GTF output writer.
///
/// Nine tab-separated fields per line: chromosome, source tag, feature,
/// 1-based inclusive start, 1-based inclusive end, score (literal 1000),
/// strand, frame (.), attributes. One transcript record is followed by its
/// exon records in ascending coordinate order.
use std::io::Write;

use crate::assemble::path::Transcript;
use crate::error::Error;

pub struct GtfWriter<W: Write> {
    writer: W,
}

impl<W: Write> GtfWriter<W> {
    pub fn new(writer: W) -> Self {
        GtfWriter { writer }
    }

    pub fn write_transcript(&mut self, t: &Transcript) -> Result<(), Error> {
        writeln!(
            self.writer,
            "{}\t{}\ttranscript\t{}\t{}\t1000\t{}\t.\tgene_id \"{}\"; transcript_id \"{}\"; coverage \"{:.2}\"; expression \"{:.2}\";",
            t.chrm,
            t.source,
            t.lpos() + 1,
            t.rpos(),
            t.strand,
            t.gene_id,
            t.transcript_id,
            t.coverage,
            t.expression,
        )?;

        for (i, &(l, r)) in t.exons.iter().enumerate() {
            writeln!(
                self.writer,
                "{}\t{}\texon\t{}\t{}\t1000\t{}\t.\tgene_id \"{}\"; transcript_id \"{}\"; exon_number \"{}\"; coverage \"{:.2}\"; expression \"{:.2}\";",
                t.chrm,
                t.source,
                l + 1,
                r,
                t.strand,
                t.gene_id,
                t.transcript_id,
                i + 1,
                t.coverage,
                t.expression,
            )?;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), Error> {
        self.writer.flush()?;
        Ok(())
    }
}
