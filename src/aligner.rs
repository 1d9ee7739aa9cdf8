//! The gap-free multiple aligner.
//!
//! Sequences are only shifted against each other, never gapped internally.
//! A progressive merge gives the initial shifts, then every sequence is re-shifted
//! against the consensus of all of them until the shifts stop changing.
use crate::error::{NoGapError, Result};
use crate::fasta;
use crate::logo::{LogoMatrix, LogoUnits};
use crate::pivot::{pivot_column_index, ColumnStatistics, PivotPolicy};
use crate::profile::{optimal_shift_and_score, Profile};
use crate::progressive::{multialign, ProgressiveAlignment};
use crate::realigner::{average_aligned, ReferenceProfile};
use crate::substitution::{ScoreTable, SubstitutionMatrix, DEFAULT_GAP_PENALTY, GAP};
use crate::tree::MergeTree;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_REALIGN_ITERATIONS: usize = 1000;

/// Parameters of `NoGapAligner`. Missing fields take their default values when read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    pub score_table: ScoreTable,
    /// Explicit alphabet, gap first. Inferred from `score_table` if `None`.
    pub alphabet: Option<String>,
    pub gap_penalty: f64,
    /// Refine the progressive alignment against the global consensus.
    pub realign: bool,
    pub max_realign_iterations: usize,
    pub pivot_policy: PivotPolicy,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            score_table: ScoreTable::default(),
            alphabet: None,
            gap_penalty: DEFAULT_GAP_PENALTY,
            realign: true,
            max_realign_iterations: DEFAULT_MAX_REALIGN_ITERATIONS,
            pivot_policy: PivotPolicy::default(),
        }
    }
}

impl AlignerConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rdr = std::fs::File::open(path).map(std::io::BufReader::new)?;
        Ok(serde_json::from_reader(rdr)?)
    }
    pub fn substitution_matrix(&self) -> Result<SubstitutionMatrix> {
        match self.alphabet.as_ref() {
            Some(alphabet) => {
                SubstitutionMatrix::with_alphabet(&self.score_table, alphabet.as_bytes(), self.gap_penalty)
            }
            None => Ok(SubstitutionMatrix::new(&self.score_table, self.gap_penalty)),
        }
    }
}

/// What to align.
#[derive(Debug, Clone)]
pub enum SequenceInput {
    FastaFile(PathBuf),
    /// Named "0", "1", ... in the given order.
    Sequences(Vec<Vec<u8>>),
    NamedSequences {
        names: Vec<String>,
        sequences: Vec<Vec<u8>>,
    },
}

impl SequenceInput {
    /// Names and sequences. Fails on zero sequences or a name count mismatch.
    pub fn resolve(self) -> Result<(Vec<String>, Vec<Vec<u8>>)> {
        let (names, sequences) = match self {
            SequenceInput::FastaFile(path) => fasta::read_fasta(&Some(path))?.into_iter().unzip(),
            SequenceInput::Sequences(sequences) => {
                let names = (0..sequences.len()).map(|i| i.to_string()).collect();
                (names, sequences)
            }
            SequenceInput::NamedSequences { names, sequences } => {
                if names.len() != sequences.len() {
                    return Err(NoGapError::NameCountMismatch {
                        names: names.len(),
                        sequences: sequences.len(),
                    });
                }
                (names, sequences)
            }
        };
        if sequences.is_empty() {
            return Err(NoGapError::EmptyInput);
        }
        Ok((names, sequences))
    }
}

impl From<Vec<fasta::FastaRecord>> for SequenceInput {
    fn from(records: Vec<fasta::FastaRecord>) -> Self {
        let (names, sequences) = records.into_iter().unzip();
        SequenceInput::NamedSequences { names, sequences }
    }
}

#[derive(Debug, Clone)]
pub struct NoGapAligner {
    config: AlignerConfig,
    matrix: SubstitutionMatrix,
}

impl NoGapAligner {
    pub fn new(config: AlignerConfig) -> Result<Self> {
        let matrix = config.substitution_matrix()?;
        Ok(Self { config, matrix })
    }
    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }
    pub fn matrix(&self) -> &SubstitutionMatrix {
        &self.matrix
    }
    pub fn align(&self, input: SequenceInput) -> Result<Alignment> {
        let (names, sequences) = input.resolve()?;
        let profiles = sequences
            .iter()
            .map(|seq| Profile::from_sequence(seq, &self.matrix))
            .collect::<Result<Vec<_>>>()?;
        debug!("Aligning {} sequences", profiles.len());
        let ProgressiveAlignment {
            mut profile,
            mut shifts,
            tree,
        } = multialign(&profiles, &self.matrix)?;
        let mut bestness = vec![];
        let mut iterations = 0;
        let mut converged = !self.config.realign;
        if self.config.realign {
            while iterations < self.config.max_realign_iterations {
                iterations += 1;
                let (next_profile, next_shifts, next_bestness) =
                    realign_to_consensus(&profile, &profiles, &self.matrix);
                converged = next_shifts == shifts;
                profile = next_profile;
                shifts = next_shifts;
                bestness = next_bestness;
                if let Some(summary) = BestnessSummary::new(&bestness) {
                    debug!("Iteration {}\t{}", iterations, summary);
                }
                if converged {
                    break;
                }
            }
            if !converged {
                warn!(
                    "Shifts did not converge within {} iterations. The last state is kept",
                    self.config.max_realign_iterations
                );
            }
        }
        let alignment = Alignment {
            names,
            sequences,
            profile,
            shifts,
            tree,
            bestness,
            iterations,
            converged,
            matrix: self.matrix.clone(),
            pivot_policy: self.config.pivot_policy,
        };
        debug!(
            "Aligned length {}, gap fraction {:.3}",
            alignment.profile.len(),
            alignment.gap_fraction()
        );
        Ok(alignment)
    }
}

/// One refinement step: shift every profile against `consensus`, move the shifts so the
/// smallest one is zero, and average the profiles at their new shifts.
/// Returns the new consensus, the shifts, and the bestness of each shift.
pub fn realign_to_consensus(
    consensus: &Profile,
    profiles: &[Profile],
    matrix: &SubstitutionMatrix,
) -> (Profile, Vec<usize>, Vec<f64>) {
    let results: Vec<_> = profiles
        .par_iter()
        .map(|profile| optimal_shift_and_score(consensus, profile, matrix))
        .collect();
    let min = results.iter().map(|r| r.shift).min().unwrap_or(0);
    let shifts: Vec<usize> = results.iter().map(|r| (r.shift - min) as usize).collect();
    let bestness = results.iter().map(|r| r.bestness).collect();
    let profile = Profile::average_at_shifts(profiles, &shifts);
    (profile, shifts, bestness)
}

/// Pad every sequence with `shift` leading gaps and enough trailing gaps
/// to reach the common length.
pub fn apply_shifts<T: AsRef<[u8]>>(sequences: &[T], shifts: &[usize]) -> Vec<Vec<u8>> {
    let len = sequences
        .iter()
        .zip(shifts.iter())
        .map(|(seq, shift)| seq.as_ref().len() + shift)
        .max()
        .unwrap_or(0);
    sequences
        .iter()
        .zip(shifts.iter())
        .map(|(seq, &shift)| {
            let seq = seq.as_ref();
            let mut aligned = vec![GAP; len];
            aligned[shift..shift + seq.len()].copy_from_slice(seq);
            aligned
        })
        .collect()
}

/// Distribution of the bestness over the sequences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestnessSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl BestnessSummary {
    pub fn new(bestness: &[f64]) -> Option<Self> {
        if bestness.is_empty() {
            return None;
        }
        let mut sorted = bestness.to_vec();
        sorted.sort_by(|x, y| x.total_cmp(y));
        let len = sorted.len();
        let median = match len % 2 {
            0 => (sorted[len / 2 - 1] + sorted[len / 2]) / 2f64,
            _ => sorted[len / 2],
        };
        Some(Self {
            min: sorted[0],
            max: sorted[len - 1],
            mean: sorted.iter().sum::<f64>() / len as f64,
            median,
        })
    }
}

impl std::fmt::Display for BestnessSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bestness: min {:.4}, max {:.4}, mean {:.4}, median {:.4}",
            self.min, self.max, self.mean, self.median
        )
    }
}

/// Result of `NoGapAligner::align`.
#[derive(Debug, Clone)]
pub struct Alignment {
    names: Vec<String>,
    sequences: Vec<Vec<u8>>,
    profile: Profile,
    shifts: Vec<usize>,
    tree: MergeTree,
    bestness: Vec<f64>,
    iterations: usize,
    converged: bool,
    matrix: SubstitutionMatrix,
    pivot_policy: PivotPolicy,
}

impl Alignment {
    pub fn names(&self) -> &[String] {
        &self.names
    }
    /// Input sequences, unaligned.
    pub fn sequences(&self) -> &[Vec<u8>] {
        &self.sequences
    }
    pub fn profile(&self) -> &Profile {
        &self.profile
    }
    pub fn shifts(&self) -> &[usize] {
        &self.shifts
    }
    pub fn tree(&self) -> &MergeTree {
        &self.tree
    }
    /// Bestness of each shift in the last refinement step. Empty without refinement.
    pub fn bestness(&self) -> &[f64] {
        &self.bestness
    }
    pub fn bestness_summary(&self) -> Option<BestnessSummary> {
        BestnessSummary::new(&self.bestness)
    }
    pub fn iterations(&self) -> usize {
        self.iterations
    }
    pub fn converged(&self) -> bool {
        self.converged
    }
    pub fn matrix(&self) -> &SubstitutionMatrix {
        &self.matrix
    }
    pub fn aligned_sequences(&self) -> Vec<Vec<u8>> {
        apply_shifts(&self.sequences, &self.shifts)
    }
    /// Fraction of gap symbols in the aligned sequences.
    pub fn gap_fraction(&self) -> f64 {
        let aligned = self.aligned_sequences();
        let total: usize = aligned.iter().map(|seq| seq.len()).sum();
        let gaps: usize = aligned.iter().map(|seq| bytecount::count(seq, GAP)).sum();
        match total {
            0 => 0f64,
            _ => gaps as f64 / total as f64,
        }
    }
    /// Input order, or the depth-first order of the merge tree.
    pub fn order(&self, keep_order: bool) -> Vec<usize> {
        if keep_order {
            (0..self.names.len()).collect()
        } else {
            self.tree.order()
        }
    }
    pub fn records(&self, keep_order: bool) -> Vec<fasta::FastaRecord> {
        let mut aligned = self.aligned_sequences();
        self.order(keep_order)
            .into_iter()
            .map(|i| (self.names[i].clone(), std::mem::take(&mut aligned[i])))
            .collect()
    }
    pub fn write_alignment<W: Write>(&self, wtr: &mut BufWriter<W>, keep_order: bool) -> std::io::Result<()> {
        fasta::write_fasta(wtr, &self.records(keep_order))
    }
    pub fn output_alignment<P: AsRef<Path>>(&self, path: P, keep_order: bool) -> std::io::Result<()> {
        fasta::write_fasta_file(path, &self.records(keep_order))
    }
    /// The tree drawing followed by the names and the aligned sequences, in tree order.
    pub fn tree_lines(&self) -> Vec<String> {
        let records = self.records(false);
        let width = records.iter().map(|(name, _)| name.chars().count()).max().unwrap_or(0);
        self.tree
            .draw()
            .into_iter()
            .zip(records)
            .map(|(branch, (name, seq))| {
                let seq = String::from_utf8_lossy(&seq);
                format!("{} {:<width$} | {} |", branch, name, seq, width = width)
            })
            .collect()
    }
    pub fn write_tree<W: Write>(&self, wtr: &mut W) -> std::io::Result<()> {
        for line in self.tree_lines() {
            writeln!(wtr, "{}", line)?;
        }
        Ok(())
    }
    /// Pivot column of the alignment profile.
    pub fn pivot(&self) -> Option<usize> {
        pivot_column_index(&self.profile, self.pivot_policy)
    }
    pub fn column_statistics(&self, label: &str) -> Option<ColumnStatistics> {
        ColumnStatistics::new(label, &self.profile)
    }
    /// The aligned sequences averaged with equal weights, as a `Realigner` would read them.
    pub fn reference_profile(&self) -> Result<ReferenceProfile> {
        let profile = average_aligned(&self.aligned_sequences(), &self.matrix)?;
        ReferenceProfile::new(&self.matrix, &profile, self.pivot_policy)
    }
    /// Logo matrix of the aligned sequences. See `LogoMatrix::new`.
    pub fn logo_matrix(&self, units: LogoUnits, pivot_as: Option<isize>) -> Result<LogoMatrix> {
        let profile = average_aligned(&self.aligned_sequences(), &self.matrix)?;
        let first_index = match pivot_as {
            Some(pivot_as) => {
                let policy = match units {
                    LogoUnits::Probability => PivotPolicy::MaxProbability,
                    LogoUnits::Bits => PivotPolicy::MaxArea,
                };
                let pivot = pivot_column_index(&self.profile, policy).ok_or(NoGapError::EmptyInput)?;
                pivot_as - pivot as isize
            }
            None => 1,
        };
        Ok(LogoMatrix::new(&profile, &self.matrix, units, first_index))
    }
}
