//! Gap-free progressive multiple alignment of short sequences, such as the helices and
//! strands of protein structures.
//!
//! Sequences are never gapped internally. They are only shifted against each other,
//! and the alignment is the set of shifts together with the averaged profile.
//!
//! ```no_run
//! use nogap::{AlignerConfig, NoGapAligner, Realigner, SequenceInput};
//! let aligner = NoGapAligner::new(AlignerConfig::default()).unwrap();
//! let seqs = vec![b"AAAAA".to_vec(), b"AAAA".to_vec(), b"AAAAAA".to_vec()];
//! let alignment = aligner.align(SequenceInput::Sequences(seqs)).unwrap();
//! let realigner = Realigner::from_aligned(&alignment.aligned_sequences(), aligner.config()).unwrap();
//! let (shift, pivot) = realigner.aligning_shift_and_pivot(b"AAAA").unwrap();
//! ```
#[macro_use]
extern crate log;
pub mod aligner;
pub mod error;
pub mod fasta;
pub mod logo;
pub mod pivot;
pub mod profile;
pub mod progressive;
pub mod realigner;
pub mod reference_residue;
pub mod substitution;
pub mod tree;

pub use aligner::{AlignerConfig, Alignment, NoGapAligner, SequenceInput};
pub use error::{NoGapError, Result};
pub use pivot::PivotPolicy;
pub use profile::{optimal_shift_and_score, Profile, ShiftScore};
pub use realigner::{Realigner, RealignerMap, ReferenceProfile};
pub use substitution::{ScoreTable, SubstitutionMatrix};
