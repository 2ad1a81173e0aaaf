use std::path::PathBuf;

use clap::Parser;

// ---------------------------------------------------------------------------
// Library type enum
// ---------------------------------------------------------------------------

/// Sequencing library orientation, controlling how read strand is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryType {
    /// Unstranded protocol; strand comes from the XS/ts tags only.
    Unstranded,
    /// FR first-stranded (e.g. dUTP): read 1 is antisense.
    FrFirst,
    /// FR second-stranded: read 1 is sense.
    FrSecond,
}

impl std::str::FromStr for LibraryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" | "unstranded" => Ok(Self::Unstranded),
            "first" => Ok(Self::FrFirst),
            "second" => Ok(Self::FrSecond),
            _ => Err(format!(
                "unknown library_type '{s}'; expected 'empty', 'first' or 'second'"
            )),
        }
    }
}

impl std::fmt::Display for LibraryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unstranded => write!(f, "empty"),
            Self::FrFirst => write!(f, "first"),
            Self::FrSecond => write!(f, "second"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters struct
// ---------------------------------------------------------------------------

/// ruScallop command-line parameters, matching the conventional assembler
/// option names (`--min_flank_length`, `--library_type`, ...).
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ruScallop",
    about = "Reference-guided transcript assembler for spliced short-read alignments",
    version
)]
pub struct Parameters {
    /// Input coordinate-sorted BAM file
    pub input_bam: PathBuf,

    /// Output GTF file (stdout when omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Library orientation: empty (unstranded), first or second
    #[arg(long = "library_type", default_value = "empty")]
    pub library_type: LibraryType,

    /// Minimum match length on both sides of a splice to accept it
    #[arg(long = "min_flank_length", default_value_t = 3)]
    pub min_flank_length: i32,

    /// Minimum number of reads supporting a splice junction
    #[arg(long = "min_splice_boundary_hits", default_value_t = 1)]
    pub min_splice_boundary_hits: usize,

    /// End the current bundle when the next hit starts this far past its right end
    #[arg(long = "min_bundle_gap", default_value_t = 50)]
    pub min_bundle_gap: i32,

    /// Emit nothing for bundles without any splice junction
    #[arg(long = "ignore_single_exon_transcripts")]
    pub ignore_single_exon_transcripts: bool,

    /// Discard assembled transcripts shorter than this
    #[arg(long = "min_transcript_length", default_value_t = 150)]
    pub min_transcript_length: i32,

    /// Read length used for coverage normalization in output
    #[arg(long = "average_read_length", default_value_t = 100)]
    pub average_read_length: i32,

    /// Maximum number of CIGAR operations accepted per alignment record
    #[arg(long = "max_num_cigar", default_value_t = 1000)]
    pub max_num_cigar: usize,

    /// Source tag written into the second GTF column
    #[arg(long = "algo", default_value = "ruScallop")]
    pub algo: String,
}

impl Parameters {
    /// Validate parameter combinations that clap alone cannot enforce.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.min_flank_length < 1 {
            return Err(crate::error::Error::Parameter(
                "--min_flank_length must be >= 1".into(),
            ));
        }

        if self.min_splice_boundary_hits < 1 {
            return Err(crate::error::Error::Parameter(
                "--min_splice_boundary_hits must be >= 1".into(),
            ));
        }

        if self.average_read_length < 1 {
            return Err(crate::error::Error::Parameter(
                "--average_read_length must be >= 1".into(),
            ));
        }

        if self.max_num_cigar < 1 {
            return Err(crate::error::Error::Parameter(
                "--max_num_cigar must be >= 1".into(),
            ));
        }

        if self.min_bundle_gap < 0 {
            return Err(crate::error::Error::Parameter(
                "--min_bundle_gap must be >= 0".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
