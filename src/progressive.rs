//! Greedy progressive merge of single-sequence profiles.
//!
//! All pairs are scored by their best shift, then the best-scoring pair of active nodes
//! is merged repeatedly until a single node is left. Candidates referring to a node
//! that has already been merged stay in the queue and are skipped when popped.
use crate::error::{NoGapError, Result};
use crate::profile::{optimal_shift_and_score, Profile};
use crate::substitution::SubstitutionMatrix;
use crate::tree::MergeTree;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

/// A pair of nodes waiting in the queue.
/// The greatest candidate has the highest score, then the smallest shift,
/// then the smallest insertion number.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    shift: isize,
    seq: usize,
    pair: (usize, usize),
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.shift.cmp(&self.shift))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone)]
pub struct ProgressiveAlignment {
    /// Profile of the last merged node, i.e., the root.
    pub profile: Profile,
    /// Absolute shift of each input sequence.
    pub shifts: Vec<usize>,
    pub tree: MergeTree,
}

/// Build the merge tree over `profiles`, each of weight one.
pub fn multialign(profiles: &[Profile], matrix: &SubstitutionMatrix) -> Result<ProgressiveAlignment> {
    if profiles.is_empty() {
        return Err(NoGapError::EmptyInput);
    }
    let n = profiles.len();
    let mut nodes: Vec<Profile> = profiles.to_vec();
    let mut weights = vec![1f64; n];
    let mut tree = MergeTree::new(n);
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .collect();
    let candidates: Vec<_> = pairs
        .par_iter()
        .enumerate()
        .map(|(seq, &(i, j))| {
            let result = optimal_shift_and_score(&nodes[i], &nodes[j], matrix);
            Candidate {
                score: result.score,
                shift: result.shift,
                seq,
                pair: (i, j),
            }
        })
        .collect();
    let mut seq = candidates.len();
    let mut queue = BinaryHeap::from(candidates);
    debug!("Scored {} initial pairs", seq);
    let mut active: BTreeSet<usize> = (0..n).collect();
    while 1 < active.len() {
        let next = std::iter::from_fn(|| queue.pop())
            .find(|c| active.contains(&c.pair.0) && active.contains(&c.pair.1));
        let Candidate {
            score,
            shift,
            pair: (i, j),
            ..
        } = match next {
            Some(candidate) => candidate,
            None => {
                warn!("No joinable pair left with {} active nodes", active.len());
                break;
            }
        };
        let new = nodes.len();
        let merged = nodes[i].combine(&nodes[j], (weights[i], weights[j]), shift);
        debug!("MERGE\t{}\t{}\t{}\t{}\t{:.3}", new, i, j, shift, score);
        nodes.push(merged);
        weights.push(weights[i] + weights[j]);
        active.remove(&i);
        active.remove(&j);
        tree.join(new, i, j, shift);
        let rest: Vec<usize> = active.iter().copied().collect();
        let results: Vec<_> = rest
            .par_iter()
            .map(|&node| optimal_shift_and_score(&nodes[node], &nodes[new], matrix))
            .collect();
        for (node, result) in rest.into_iter().zip(results) {
            trace!("PAIR\t{}\t{}\t{}\t{:.3}", node, new, result.shift, result.score);
            queue.push(Candidate {
                score: result.score,
                shift: result.shift,
                seq,
                pair: (node, new),
            });
            seq += 1;
        }
        active.insert(new);
    }
    let shifts = tree.leaf_shifts();
    let profile = nodes.pop().ok_or(NoGapError::EmptyInput)?;
    Ok(ProgressiveAlignment {
        profile,
        shifts,
        tree,
    })
}
