/// CLI integration tests: write a real BAM, run the binary, check the GTF.
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::num::NonZeroUsize;
use tempfile::TempDir;

use noodles::bam;
use noodles::sam;
use noodles::sam::alignment::io::Write as SamWrite;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::header::record::value::{map::ReferenceSequence, Map};

fn test_header() -> sam::Header {
    sam::Header::builder()
        .set_header(Default::default())
        .add_reference_sequence(
            "chr1",
            Map::<ReferenceSequence>::new(NonZeroUsize::new(100_000).unwrap()),
        )
        .build()
}

fn make_record(name: &str, pos: usize, ops: &[(Kind, usize)]) -> RecordBuf {
    let mut record = RecordBuf::default();
    record.name_mut().replace(name.into());
    *record.flags_mut() = Flags::empty();
    *record.reference_sequence_id_mut() = Some(0);
    *record.alignment_start_mut() = Some(pos.try_into().unwrap());
    let mut cigar = sam::alignment::record_buf::Cigar::default();
    for &(kind, len) in ops {
        cigar.as_mut().push(Op::new(kind, len));
    }
    *record.cigar_mut() = cigar;
    record
        .data_mut()
        .insert(Tag::new(b'X', b'S'), Value::Character(b'+'));
    record
}

/// Ten plain reads on each of two exons plus eight spliced reads joining
/// them, coordinate-sorted.
fn write_two_exon_bam(path: &std::path::Path) {
    let header = test_header();
    let mut records = Vec::new();
    for i in 0..10 {
        records.push(make_record(&format!("a{i}"), 101, &[(Kind::Match, 100)]));
        records.push(make_record(&format!("b{i}"), 301, &[(Kind::Match, 100)]));
    }
    for i in 0..8 {
        records.push(make_record(
            &format!("s{i}"),
            151,
            &[(Kind::Match, 50), (Kind::Skip, 100), (Kind::Match, 50)],
        ));
    }
    records.sort_by_key(|r| r.alignment_start());

    let mut writer = bam::io::Writer::new(fs::File::create(path).unwrap());
    writer.write_header(&header).unwrap();
    for record in &records {
        writer.write_alignment_record(&header, record).unwrap();
    }
    writer.finish(&header).unwrap();
}

#[test]
fn test_assembles_two_exon_transcript() {
    let tmpdir = TempDir::new().unwrap();
    let bam_path = tmpdir.path().join("reads.bam");
    let gtf_path = tmpdir.path().join("out.gtf");
    write_two_exon_bam(&bam_path);

    Command::cargo_bin("ruScallop")
        .unwrap()
        .arg(&bam_path)
        .arg("-o")
        .arg(&gtf_path)
        .assert()
        .success();

    let content = fs::read_to_string(&gtf_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3, "expected one transcript with two exons");

    let fields: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(fields.len(), 9);
    assert_eq!(fields[0], "chr1");
    assert_eq!(fields[1], "ruScallop");
    assert_eq!(fields[2], "transcript");
    assert_eq!(fields[3], "101");
    assert_eq!(fields[4], "400");
    assert_eq!(fields[5], "1000");
    assert_eq!(fields[6], "+");
    assert_eq!(fields[7], ".");
    assert!(fields[8].contains("gene_id \"gene.1\""));
    assert!(fields[8].contains("transcript_id \"gene.1.0\""));

    let exon1: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(exon1[2], "exon");
    assert_eq!(exon1[3], "101");
    assert_eq!(exon1[4], "200");
    assert!(exon1[8].contains("exon_number \"1\""));

    let exon2: Vec<&str> = lines[2].split('\t').collect();
    assert_eq!(exon2[3], "301");
    assert_eq!(exon2[4], "400");
    assert!(exon2[8].contains("exon_number \"2\""));
}

#[test]
fn test_custom_source_tag() {
    let tmpdir = TempDir::new().unwrap();
    let bam_path = tmpdir.path().join("reads.bam");
    let gtf_path = tmpdir.path().join("out.gtf");
    write_two_exon_bam(&bam_path);

    Command::cargo_bin("ruScallop")
        .unwrap()
        .arg(&bam_path)
        .arg("-o")
        .arg(&gtf_path)
        .arg("--algo")
        .arg("assembler2")
        .assert()
        .success();

    let content = fs::read_to_string(&gtf_path).unwrap();
    for line in content.lines() {
        assert_eq!(line.split('\t').nth(1), Some("assembler2"));
    }
}

#[test]
fn test_missing_input_fails() {
    Command::cargo_bin("ruScallop")
        .unwrap()
        .arg("no_such_file.bam")
        .assert()
        .failure();
}

#[test]
fn test_help_lists_options() {
    Command::cargo_bin("ruScallop")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--library_type"))
        .stdout(predicate::str::contains("--min_flank_length"))
        .stdout(predicate::str::contains("--min_splice_boundary_hits"))
        .stdout(predicate::str::contains("--average_read_length"));
}
