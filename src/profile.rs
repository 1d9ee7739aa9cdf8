//! Position-by-letter probability matrices and the shift-only scoring on them.
//!
//! A `Profile` is a serialized 2-d array. Row `i` is the distribution over the alphabet at
//! aligned column `i`, and column 0 is the gap. Every row sums to one. After a merge the gap
//! column is recomputed as `1 - (non-gap mass)`. It is never blended.
use crate::error::Result;
use crate::substitution::SubstitutionMatrix;

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    probs: Vec<f64>,
    column: usize,
    row: usize,
}

/// Result of the exhaustive shift search between two profiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftScore {
    /// How far the second profile is moved rightwards with respect to the first.
    pub shift: isize,
    pub score: f64,
    /// `(best - second best) / best`. 1 if there was only one possible shift.
    pub bestness: f64,
}

impl Profile {
    pub fn zeros(row: usize, column: usize) -> Self {
        Self {
            probs: vec![0f64; row * column],
            column,
            row,
        }
    }
    /// One-hot encoding. Letters outside the alphabet become the unknown symbol.
    pub fn from_sequence(seq: &[u8], matrix: &SubstitutionMatrix) -> Result<Self> {
        let mut profile = Self::zeros(seq.len(), matrix.dim());
        for (i, &letter) in seq.iter().enumerate() {
            let j = matrix.index_of(letter)?;
            *profile.get_mut(i, j) = 1f64;
        }
        let remapped = seq.iter().filter(|&&x| !matrix.contains(x)).count();
        if 0 < remapped {
            warn!(
                "{} letter(s) of {} are not in the alphabet and were read as unknown",
                remapped,
                String::from_utf8_lossy(seq)
            );
        }
        Ok(profile)
    }
    /// Rebuild from explicit rows. All rows must have `column` entries.
    pub fn from_rows(rows: &[Vec<f64>], column: usize) -> Option<Self> {
        if rows.iter().any(|r| r.len() != column) {
            return None;
        }
        let probs: Vec<_> = rows.iter().flatten().copied().collect();
        Some(Self {
            probs,
            column,
            row: rows.len(),
        })
    }
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(|r| r.to_vec()).collect()
    }
    /// Number of aligned columns (rows of the matrix).
    pub fn len(&self) -> usize {
        self.row
    }
    pub fn is_empty(&self) -> bool {
        self.row == 0
    }
    /// Alphabet size.
    pub fn column(&self) -> usize {
        self.column
    }
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.probs[i * self.column + j]
    }
    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut f64 {
        &mut self.probs[i * self.column + j]
    }
    pub fn row(&self, i: usize) -> &[f64] {
        &self.probs[i * self.column..(i + 1) * self.column]
    }
    pub fn rows(&self) -> std::slice::ChunksExact<'_, f64> {
        self.probs.chunks_exact(self.column)
    }
    pub fn gap_prob(&self, i: usize) -> f64 {
        self.get(i, 0)
    }
    fn add_at(&mut self, other: &Self, offset: usize, weight: f64) {
        let start = offset * self.column;
        self.probs[start..start + other.probs.len()]
            .iter_mut()
            .zip(other.probs.iter())
            .for_each(|(x, y)| *x += weight * y);
    }
    fn recompute_gap(&mut self) {
        for row in self.probs.chunks_exact_mut(self.column) {
            row[0] = 1f64 - row[1..].iter().sum::<f64>();
        }
    }
    /// Merge `other` placed `shift` columns to the right of `self`.
    /// `weights` are the relative contributions of `self` and `other`.
    /// A negative shift is applied as `self` moved right of `other`.
    pub fn combine(&self, other: &Self, weights: (f64, f64), shift: isize) -> Self {
        if shift < 0 {
            return other.combine(self, (weights.1, weights.0), -shift);
        }
        assert_eq!(self.column, other.column);
        let shift = shift as usize;
        let total = weights.0 + weights.1;
        let len = self.len().max(other.len() + shift);
        let mut result = Self::zeros(len, self.column);
        result.add_at(self, 0, weights.0 / total);
        result.add_at(other, shift, weights.1 / total);
        result.recompute_gap();
        result
    }
    /// Uniform average of the profiles, each placed at its own (non-negative) shift.
    pub fn average_at_shifts(profiles: &[Self], shifts: &[usize]) -> Self {
        assert!(!profiles.is_empty());
        assert_eq!(profiles.len(), shifts.len());
        let column = profiles[0].column;
        let len = profiles
            .iter()
            .zip(shifts.iter())
            .map(|(p, &s)| p.len() + s)
            .max()
            .unwrap_or(0);
        let mut result = Self::zeros(len, column);
        let weight = 1f64 / profiles.len() as f64;
        for (profile, &shift) in profiles.iter().zip(shifts.iter()) {
            result.add_at(profile, shift, weight);
        }
        result.recompute_gap();
        result
    }
    /// Multiply by the substitution matrix, row by row.
    fn scored_rows(&self, matrix: &SubstitutionMatrix) -> Vec<f64> {
        let mut scored = vec![0f64; self.probs.len()];
        for (row, out) in self.rows().zip(scored.chunks_exact_mut(self.column)) {
            for (letter, &p) in row.iter().enumerate().filter(|&(_, &p)| p != 0f64) {
                out.iter_mut()
                    .zip(matrix.row(letter))
                    .for_each(|(o, s)| *o += p * s);
            }
        }
        scored
    }
}

/// Scan every relative shift of `ys` against `xs` and keep the best one.
/// Shifts are visited in increasing order, and the first maximum wins.
/// Columns not covered by both profiles contribute nothing.
pub fn optimal_shift_and_score(xs: &Profile, ys: &Profile, matrix: &SubstitutionMatrix) -> ShiftScore {
    assert_eq!(xs.column(), ys.column());
    assert_eq!(xs.column(), matrix.dim());
    let (xlen, ylen) = (xs.len() as isize, ys.len() as isize);
    let scored = xs.scored_rows(matrix);
    let column = xs.column();
    let score_at = |shift: isize| -> f64 {
        let start = (-shift).max(0);
        let stop = (xlen - shift).min(ylen);
        (start..stop)
            .map(|j| {
                let i = (j + shift) as usize;
                let xrow = &scored[i * column..(i + 1) * column];
                xrow.iter().zip(ys.row(j as usize)).map(|(x, y)| x * y).sum::<f64>()
            })
            .sum()
    };
    let mut best: Option<(isize, f64)> = None;
    let mut second: Option<f64> = None;
    for shift in (1 - ylen)..xlen {
        let score = score_at(shift);
        match best {
            Some((_, b)) if score <= b => {
                if second.map(|s| s < score).unwrap_or(true) {
                    second = Some(score);
                }
            }
            _ => {
                second = best.map(|(_, b)| b);
                best = Some((shift, score));
            }
        }
    }
    let (shift, score) = best.unwrap_or((0, 0f64));
    let bestness = match second {
        None => 1f64,
        Some(_) if score == 0f64 => 0f64,
        Some(second) => (score - second) / score,
    };
    ShiftScore {
        shift,
        score,
        bestness,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::substitution::ScoreTable;
    use rand::seq::SliceRandom;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;
    pub(crate) const AMINO_ACIDS: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";
    pub(crate) fn blosum() -> SubstitutionMatrix {
        SubstitutionMatrix::new(&ScoreTable::blosum62(), 10.)
    }
    pub(crate) fn random_seq<R: rand::Rng>(rng: &mut R, len: usize) -> Vec<u8> {
        (0..len)
            .filter_map(|_| AMINO_ACIDS.choose(rng))
            .copied()
            .collect()
    }
    pub(crate) fn assert_row_stochastic(profile: &Profile) {
        for row in profile.rows() {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1f64).abs() < 1e-9, "{:?}", row);
        }
    }
    #[test]
    fn one_hot() {
        let matrix = blosum();
        let profile = Profile::from_sequence(b"AC-x", &matrix).unwrap();
        assert_eq!(profile.len(), 4);
        assert_eq!(profile.column(), matrix.dim());
        assert_eq!(profile.get(0, matrix.index_of(b'A').unwrap()), 1.);
        assert_eq!(profile.get(1, matrix.index_of(b'C').unwrap()), 1.);
        assert_eq!(profile.gap_prob(2), 1.);
        assert_eq!(profile.get(3, matrix.dim() - 1), 1.);
        assert_row_stochastic(&profile);
    }
    #[test]
    fn shift_of_substring() {
        let matrix = blosum();
        let xs = Profile::from_sequence(b"ACDEFG", &matrix).unwrap();
        let ys = Profile::from_sequence(b"DEF", &matrix).unwrap();
        let result = optimal_shift_and_score(&xs, &ys, &matrix);
        assert_eq!(result.shift, 2);
        assert_eq!(result.score, 47.);
        let result = optimal_shift_and_score(&ys, &xs, &matrix);
        assert_eq!(result.shift, -2);
        assert_eq!(result.score, 47.);
    }
    #[test]
    fn self_alignment() {
        let matrix = blosum();
        let xs = Profile::from_sequence(b"ACDE", &matrix).unwrap();
        let result = optimal_shift_and_score(&xs, &xs, &matrix);
        assert_eq!(result.shift, 0);
        assert_eq!(result.score, 64.);
        assert!((result.bestness - 35. / 64.).abs() < 1e-12);
    }
    #[test]
    fn first_maximum_wins() {
        let matrix = blosum();
        let xs = Profile::from_sequence(b"AAAA", &matrix).unwrap();
        let ys = Profile::from_sequence(b"AA", &matrix).unwrap();
        let result = optimal_shift_and_score(&xs, &ys, &matrix);
        assert_eq!(result.shift, 0);
        assert_eq!(result.score, 28.);
        assert_eq!(result.bestness, 0.);
    }
    #[test]
    fn single_shift_bestness() {
        let matrix = blosum();
        let xs = Profile::from_sequence(b"W", &matrix).unwrap();
        let result = optimal_shift_and_score(&xs, &xs, &matrix);
        assert_eq!(result.shift, 0);
        assert_eq!(result.bestness, 1.);
    }
    #[test]
    fn shift_symmetry_random() {
        let matrix = blosum();
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(4329);
        for _ in 0..200 {
            let xlen = rng.gen_range(3..40);
            let ylen = rng.gen_range(3..40);
            let xs = Profile::from_sequence(&random_seq(&mut rng, xlen), &matrix).unwrap();
            let ys = Profile::from_sequence(&random_seq(&mut rng, ylen), &matrix).unwrap();
            let forward = optimal_shift_and_score(&xs, &ys, &matrix);
            let backward = optimal_shift_and_score(&ys, &xs, &matrix);
            assert_eq!(forward.score, backward.score);
            if forward.bestness > 0. {
                assert_eq!(forward.shift, -backward.shift);
            }
        }
    }
    #[test]
    fn combine_layout() {
        let matrix = blosum();
        let xs = Profile::from_sequence(b"AAAAAA", &matrix).unwrap();
        let ys = Profile::from_sequence(b"CC", &matrix).unwrap();
        let combined = xs.combine(&ys, (3., 1.), 5);
        assert_eq!(combined.len(), 7);
        let (a, c) = (matrix.index_of(b'A').unwrap(), matrix.index_of(b'C').unwrap());
        assert!((combined.get(0, a) - 0.75).abs() < 1e-12);
        assert!((combined.gap_prob(0) - 0.25).abs() < 1e-12);
        assert!((combined.get(5, c) - 0.25).abs() < 1e-12);
        assert!((combined.gap_prob(6) - 0.75).abs() < 1e-12);
        assert_row_stochastic(&combined);
        let swapped = ys.combine(&xs, (1., 3.), -5);
        assert_eq!(swapped, combined);
    }
    #[test]
    fn combine_keeps_rows_stochastic() {
        let matrix = blosum();
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(24);
        let mut profile = Profile::from_sequence(&random_seq(&mut rng, 12), &matrix).unwrap();
        for weight in 1..50 {
            let len = rng.gen_range(3..30);
            let ys = Profile::from_sequence(&random_seq(&mut rng, len), &matrix).unwrap();
            let shift = optimal_shift_and_score(&profile, &ys, &matrix).shift;
            profile = profile.combine(&ys, (weight as f64, 1.), shift);
            assert_row_stochastic(&profile);
        }
    }
    #[test]
    fn average() {
        let matrix = blosum();
        let profiles: Vec<_> = [&b"AC"[..], &b"AC"[..], &b"C"[..]]
            .iter()
            .map(|s| Profile::from_sequence(s, &matrix).unwrap())
            .collect();
        let average = Profile::average_at_shifts(&profiles, &[0, 0, 1]);
        assert_eq!(average.len(), 2);
        let (a, c) = (matrix.index_of(b'A').unwrap(), matrix.index_of(b'C').unwrap());
        assert!((average.get(0, a) - 2. / 3.).abs() < 1e-12);
        assert!((average.gap_prob(0) - 1. / 3.).abs() < 1e-12);
        assert!((average.get(1, c) - 1.).abs() < 1e-12);
        assert_row_stochastic(&average);
    }
    #[test]
    fn rows_round_trip() {
        let matrix = blosum();
        let profile = Profile::from_sequence(b"KLMN", &matrix).unwrap();
        let rebuilt = Profile::from_rows(&profile.to_rows(), matrix.dim()).unwrap();
        assert_eq!(rebuilt, profile);
        assert!(Profile::from_rows(&[vec![1.0]], matrix.dim()).is_none());
    }
}
