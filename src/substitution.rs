//! Substitution scores over the residue alphabet.
//!
//! The alphabet always puts the gap symbol in column 0 and, by default, the unknown
//! symbol last, with the residues of the score table sorted in between.
//! Every cell not involving the gap receives `gap_penalty` on top of the table score.
//! Since a gap scores zero against anything, this is the reward an overlapping pair
//! earns over a pair facing a gap.
use crate::error::{NoGapError, Result};
use serde::{Deserialize, Serialize};

pub const GAP: u8 = b'-';
pub const UNKNOWN: u8 = b'?';
pub const DEFAULT_GAP_PENALTY: f64 = 10.0;
const NOT_IN_ALPHABET: usize = usize::MAX;

/// Residue-pair scores, as in the published half-matrices.
/// A pair only needs to be listed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub name: String,
    pub scores: Vec<(u8, u8, f64)>,
}

impl ScoreTable {
    /// Build from a square table with row/column order given by `letters`.
    pub fn from_square(name: &str, letters: &[u8], scores: &[i32]) -> Self {
        assert_eq!(letters.len() * letters.len(), scores.len());
        let dim = letters.len();
        let scores = letters
            .iter()
            .enumerate()
            .flat_map(|(i, &x)| {
                letters
                    .iter()
                    .enumerate()
                    .skip(i)
                    .map(move |(j, &y)| (x, y, scores[i * dim + j] as f64))
            })
            .collect();
        Self {
            name: name.to_string(),
            scores,
        }
    }
    pub fn blosum62() -> Self {
        Self::from_square("BLOSUM62", BLOSUM62_LETTERS, &BLOSUM62)
    }
    pub fn letters(&self) -> Vec<u8> {
        let mut letters: Vec<_> = self.scores.iter().flat_map(|&(x, y, _)| [x, y]).collect();
        letters.sort_unstable();
        letters.dedup();
        letters
    }
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self::blosum62()
    }
}

/// Symmetric score matrix indexed by alphabet position.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstitutionMatrix {
    alphabet: Vec<u8>,
    lookup: Vec<usize>,
    unknown: Option<usize>,
    scores: Vec<f64>,
}

impl SubstitutionMatrix {
    /// Alphabet inferred from the table: gap, sorted residues, unknown.
    pub fn new(table: &ScoreTable, gap_penalty: f64) -> Self {
        let residues = table
            .letters()
            .into_iter()
            .filter(|&x| x != GAP && x != UNKNOWN);
        let alphabet: Vec<_> = std::iter::once(GAP)
            .chain(residues)
            .chain(std::iter::once(UNKNOWN))
            .collect();
        Self::build(table, alphabet, gap_penalty)
    }
    /// Explicit alphabet. It must start with the gap symbol and contain no duplicates.
    pub fn with_alphabet(table: &ScoreTable, alphabet: &[u8], gap_penalty: f64) -> Result<Self> {
        if alphabet.first() != Some(&GAP) {
            let msg = format!("{:?} does not start with the gap symbol", String::from_utf8_lossy(alphabet));
            return Err(NoGapError::InvalidAlphabet(msg));
        }
        let mut sorted = alphabet.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != alphabet.len() {
            let msg = format!("{:?} has duplicated symbols", String::from_utf8_lossy(alphabet));
            return Err(NoGapError::InvalidAlphabet(msg));
        }
        Ok(Self::build(table, alphabet.to_vec(), gap_penalty))
    }
    fn build(table: &ScoreTable, alphabet: Vec<u8>, gap_penalty: f64) -> Self {
        let dim = alphabet.len();
        let mut lookup = vec![NOT_IN_ALPHABET; 256];
        for (i, &x) in alphabet.iter().enumerate() {
            lookup[x as usize] = i;
        }
        let mut scores = vec![0f64; dim * dim];
        for &(x, y, score) in table.scores.iter() {
            let (i, j) = (lookup[x as usize], lookup[y as usize]);
            if i != NOT_IN_ALPHABET && j != NOT_IN_ALPHABET {
                scores[i * dim + j] = score;
                scores[j * dim + i] = score;
            }
        }
        for i in 1..dim {
            for j in 1..dim {
                scores[i * dim + j] += gap_penalty;
            }
        }
        let unknown = match lookup[UNKNOWN as usize] {
            NOT_IN_ALPHABET => None,
            idx => Some(idx),
        };
        Self {
            alphabet,
            lookup,
            unknown,
            scores,
        }
    }
    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }
    pub fn dim(&self) -> usize {
        self.alphabet.len()
    }
    /// Column of `letter`, the unknown column for letters outside the alphabet.
    pub fn index_of(&self, letter: u8) -> Result<usize> {
        match self.lookup[letter as usize] {
            NOT_IN_ALPHABET => self.unknown.ok_or(NoGapError::UnmappedSymbol(letter as char)),
            idx => Ok(idx),
        }
    }
    /// True if `letter` has its own column.
    pub fn contains(&self, letter: u8) -> bool {
        self.lookup[letter as usize] != NOT_IN_ALPHABET
    }
    pub fn score(&self, i: usize, j: usize) -> f64 {
        self.scores[i * self.dim() + j]
    }
    /// Row `i` of the matrix.
    pub fn row(&self, i: usize) -> &[f64] {
        let dim = self.dim();
        &self.scores[i * dim..(i + 1) * dim]
    }
}

const BLOSUM62_LETTERS: &[u8] = b"ARNDCQEGHILKMFPSTWYVBZX";

#[rustfmt::skip]
const BLOSUM62: [i32; 23 * 23] = [
//   A   R   N   D   C   Q   E   G   H   I   L   K   M   F   P   S   T   W   Y   V   B   Z   X
     4, -1, -2, -2,  0, -1, -1,  0, -2, -1, -1, -1, -1, -2, -1,  1,  0, -3, -2,  0, -2, -1,  0, // A
    -1,  5,  0, -2, -3,  1,  0, -2,  0, -3, -2,  2, -1, -3, -2, -1, -1, -3, -2, -3, -1,  0, -1, // R
    -2,  0,  6,  1, -3,  0,  0,  0,  1, -3, -3,  0, -2, -3, -2,  1,  0, -4, -2, -3,  3,  0, -1, // N
    -2, -2,  1,  6, -3,  0,  2, -1, -1, -3, -4, -1, -3, -3, -1,  0, -1, -4, -3, -3,  4,  1, -1, // D
     0, -3, -3, -3,  9, -3, -4, -3, -3, -1, -1, -3, -1, -2, -3, -1, -1, -2, -2, -1, -3, -3, -2, // C
    -1,  1,  0,  0, -3,  5,  2, -2,  0, -3, -2,  1,  0, -3, -1,  0, -1, -2, -1, -2,  0,  3, -1, // Q
    -1,  0,  0,  2, -4,  2,  5, -2,  0, -3, -3,  1, -2, -3, -1,  0, -1, -3, -2, -2,  1,  4, -1, // E
     0, -2,  0, -1, -3, -2, -2,  6, -2, -4, -4, -2, -3, -3, -2,  0, -2, -2, -3, -3, -1, -2, -1, // G
    -2,  0,  1, -1, -3,  0,  0, -2,  8, -3, -3, -1, -2, -1, -2, -1, -2, -2,  2, -3,  0,  0, -1, // H
    -1, -3, -3, -3, -1, -3, -3, -4, -3,  4,  2, -3,  1,  0, -3, -2, -1, -3, -1,  3, -3, -3, -1, // I
    -1, -2, -3, -4, -1, -2, -3, -4, -3,  2,  4, -2,  2,  0, -3, -2, -1, -2, -1,  1, -4, -3, -1, // L
    -1,  2,  0, -1, -3,  1,  1, -2, -1, -3, -2,  5, -1, -3, -1,  0, -1, -3, -2, -2,  0,  1, -1, // K
    -1, -1, -2, -3, -1,  0, -2, -3, -2,  1,  2, -1,  5,  0, -2, -1, -1, -1, -1,  1, -3, -1, -1, // M
    -2, -3, -3, -3, -2, -3, -3, -3, -1,  0,  0, -3,  0,  6, -4, -2, -2,  1,  3, -1, -3, -3, -1, // F
    -1, -2, -2, -1, -3, -1, -1, -2, -2, -3, -3, -1, -2, -4,  7, -1, -1, -4, -3, -2, -2, -1, -2, // P
     1, -1,  1,  0, -1,  0,  0,  0, -1, -2, -2,  0, -1, -2, -1,  4,  1, -3, -2, -2,  0,  0,  0, // S
     0, -1,  0, -1, -1, -1, -1, -2, -2, -1, -1, -1, -1, -2, -1,  1,  5, -2, -2,  0, -1, -1,  0, // T
    -3, -3, -4, -4, -2, -2, -3, -2, -2, -3, -2, -3, -1,  1, -4, -3, -2, 11,  2, -3, -4, -3, -2, // W
    -2, -2, -2, -3, -2, -1, -2, -3,  2, -1, -1, -2, -1,  3, -3, -2, -2,  2,  7, -1, -3, -2, -1, // Y
     0, -3, -3, -3, -1, -2, -2, -3, -3,  3,  1, -2,  1, -1, -2, -2,  0, -3, -1,  4, -3, -2, -1, // V
    -2, -1,  3,  4, -3,  0,  1, -1,  0, -3, -4,  0, -3, -3, -2,  0, -1, -4, -3, -3,  4,  1, -1, // B
    -1,  0,  0,  1, -3,  3,  4, -2,  0, -3, -3,  1, -1, -3, -1,  0, -1, -3, -2, -2,  1,  4, -1, // Z
     0, -1, -1, -1, -2, -1, -1, -1, -1, -1, -1, -1, -1, -1, -2,  0,  0, -2, -1, -1, -1, -1, -1, // X
];

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn default_alphabet() {
        let matrix = SubstitutionMatrix::new(&ScoreTable::blosum62(), 10.);
        assert_eq!(matrix.alphabet(), b"-ABCDEFGHIKLMNPQRSTVWXYZ?");
        assert_eq!(matrix.index_of(GAP).unwrap(), 0);
        assert_eq!(matrix.index_of(UNKNOWN).unwrap(), matrix.dim() - 1);
    }
    #[test]
    fn symmetric_with_penalty() {
        let matrix = SubstitutionMatrix::new(&ScoreTable::blosum62(), 10.);
        let dim = matrix.dim();
        for i in 0..dim {
            for j in 0..dim {
                assert_eq!(matrix.score(i, j), matrix.score(j, i));
            }
        }
        let a = matrix.index_of(b'A').unwrap();
        let w = matrix.index_of(b'W').unwrap();
        let unk = matrix.index_of(UNKNOWN).unwrap();
        assert_eq!(matrix.score(a, a), 14.);
        assert_eq!(matrix.score(w, w), 21.);
        assert_eq!(matrix.score(a, w), 7.);
        assert_eq!(matrix.score(a, unk), 10.);
        assert!(matrix.row(0).iter().all(|&x| x == 0.));
    }
    #[test]
    fn unknown_letters() {
        let matrix = SubstitutionMatrix::new(&ScoreTable::blosum62(), 10.);
        let unk = matrix.index_of(UNKNOWN).unwrap();
        assert_eq!(matrix.index_of(b'a').unwrap(), unk);
        assert_eq!(matrix.index_of(b'J').unwrap(), unk);
        assert!(!matrix.contains(b'J'));
        let table = ScoreTable::blosum62();
        let matrix = SubstitutionMatrix::with_alphabet(&table, b"-ACD", 10.).unwrap();
        assert!(matrix.index_of(b'W').is_err());
        assert_eq!(matrix.score(1, 3), 8.);
    }
    #[test]
    fn invalid_alphabet() {
        let table = ScoreTable::blosum62();
        assert!(SubstitutionMatrix::with_alphabet(&table, b"AC-", 10.).is_err());
        assert!(SubstitutionMatrix::with_alphabet(&table, b"-ACA", 10.).is_err());
    }
}
