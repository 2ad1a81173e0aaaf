/// BAM input reader with noodles (streaming, coordinate-sorted).
use std::fs::File;
use std::path::Path;

use noodles::bam;
use noodles::sam;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::RecordBuf;

use crate::error::Error;
use crate::hit::{CigarOp, Hit, RawAlignment};
use crate::params::Parameters;

const TAG_XS: Tag = Tag::new(b'X', b'S');
const TAG_TS: Tag = Tag::new(b't', b's');
const TAG_HI: Tag = Tag::new(b'H', b'I');
const TAG_NH: Tag = Tag::new(b'N', b'H');
const TAG_NM_UPPER: Tag = Tag::new(b'N', b'M');
const TAG_NM_LOWER: Tag = Tag::new(b'n', b'M');

/// Streaming BAM reader yielding interpreted hits.
///
/// Unmapped records are skipped; any violation of the coordinate-sort
/// invariant aborts the stream.
pub struct BamReader {
    reader: bam::io::Reader<noodles::bgzf::Reader<File>>,
    header: sam::Header,
    chrm_names: Vec<String>,
    last_tid: Option<usize>,
    last_pos: i32,
}

impl BamReader {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io(e, path))?;
        let mut reader = bam::io::Reader::new(file);
        let header = reader
            .read_header()
            .map_err(|e| Error::MalformedInput(format!("reading BAM header: {e}")))?;
        let chrm_names = header
            .reference_sequences()
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        Ok(BamReader {
            reader,
            header,
            chrm_names,
            last_tid: None,
            last_pos: 0,
        })
    }

    /// Reference sequence name for a header index.
    pub fn chrm_name(&self, tid: usize) -> Option<&str> {
        self.chrm_names.get(tid).map(String::as_str)
    }

    /// Read the next mapped hit, or `None` at end of stream.
    pub fn next_hit(&mut self, params: &Parameters) -> Result<Option<Hit>, Error> {
        let mut record = RecordBuf::default();
        loop {
            let n = self
                .reader
                .read_record_buf(&self.header, &mut record)
                .map_err(|e| Error::MalformedInput(format!("reading BAM record: {e}")))?;
            if n == 0 {
                return Ok(None);
            }

            let flag = record.flags().bits();
            if flag & 0x4 != 0 {
                continue;
            }
            let (Some(tid), Some(start)) =
                (record.reference_sequence_id(), record.alignment_start())
            else {
                continue;
            };
            let pos = usize::from(start) as i32 - 1;

            if self.last_tid == Some(tid) && pos < self.last_pos {
                return Err(Error::MalformedInput(format!(
                    "input is not coordinate-sorted at {}:{}",
                    self.chrm_name(tid).unwrap_or("?"),
                    pos
                )));
            }
            self.last_tid = Some(tid);
            self.last_pos = pos;

            let raw = to_raw_alignment(&record, tid, pos, flag)?;
            return Hit::from_raw(raw, params).map(Some);
        }
    }
}

fn to_raw_alignment(
    record: &RecordBuf,
    tid: usize,
    pos: i32,
    flag: u16,
) -> Result<RawAlignment, Error> {
    let qname = record
        .name()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "*".to_string());

    let cigar = convert_cigar(record, &qname)?;

    let data = record.data();
    let char_tag = |tag: &Tag| match data.get(tag) {
        Some(Value::Character(c)) => *c as char,
        _ => '.',
    };
    let int_tag = |tag: &Tag, default: i32| {
        data.get(tag)
            .and_then(|v| v.as_int())
            .map(|v| v as i32)
            .unwrap_or(default)
    };

    let nm = match data.get(&TAG_NM_LOWER).and_then(|v| v.as_int()) {
        Some(v) => v as i32,
        None => int_tag(&TAG_NM_UPPER, 0),
    };

    Ok(RawAlignment {
        tid,
        pos,
        flag,
        qual: record.mapping_quality().map(u8::from).unwrap_or(0),
        qname,
        cigar,
        mpos: record
            .mate_alignment_start()
            .map(|p| usize::from(p) as i32 - 1)
            .unwrap_or(-1),
        isize: record.template_length(),
        xs: char_tag(&TAG_XS),
        ts: char_tag(&TAG_TS),
        hi: int_tag(&TAG_HI, -1),
        nh: int_tag(&TAG_NH, -1),
        nm,
    })
}

fn convert_cigar(record: &RecordBuf, qname: &str) -> Result<Vec<CigarOp>, Error> {
    let ops: &[sam::alignment::record::cigar::Op] = record.cigar().as_ref();
    let mut cigar = Vec::with_capacity(ops.len());
    for op in ops {
        let len = op.len() as u32;
        let converted = match op.kind() {
            Kind::Match => CigarOp::Match(len),
            Kind::Insertion => CigarOp::Ins(len),
            Kind::Deletion => CigarOp::Del(len),
            Kind::Skip => CigarOp::RefSkip(len),
            Kind::SoftClip => CigarOp::SoftClip(len),
            Kind::HardClip => CigarOp::HardClip(len),
            Kind::Pad => CigarOp::Pad(len),
            Kind::SequenceMatch => CigarOp::Equal(len),
            Kind::SequenceMismatch => CigarOp::Diff(len),
        };
        if converted.is_empty() {
            return Err(Error::MalformedInput(format!(
                "read '{qname}' has a zero-length CIGAR operation"
            )));
        }
        cigar.push(converted);
    }
    Ok(cigar)
}
