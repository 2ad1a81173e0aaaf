pub mod bam;
pub mod gtf;
