//! Alignment of single sequences to a fixed reference alignment.
//!
//! A `Realigner` holds the averaged profile of a reference alignment and its pivot column.
//! Querying it never mutates it, so one realigner can serve any number of threads.
use crate::aligner::AlignerConfig;
use crate::error::{NoGapError, Result};
use crate::fasta;
use crate::pivot::{pivot_column_index, PivotPolicy};
use crate::profile::{optimal_shift_and_score, Profile};
use crate::substitution::SubstitutionMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Serialized form of a realigner: the profile rows over `alphabet` and the pivot column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceProfile {
    pub alphabet: String,
    pub rows: Vec<Vec<f64>>,
    pub pivot: usize,
}

impl ReferenceProfile {
    pub fn new(matrix: &SubstitutionMatrix, profile: &Profile, policy: PivotPolicy) -> Result<Self> {
        let pivot = pivot_column_index(profile, policy).ok_or(NoGapError::EmptyInput)?;
        Ok(Self {
            alphabet: String::from_utf8_lossy(matrix.alphabet()).to_string(),
            rows: profile.to_rows(),
            pivot,
        })
    }
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rdr = std::fs::File::open(path).map(std::io::BufReader::new)?;
        Ok(serde_json::from_reader(rdr)?)
    }
    pub fn write_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = std::fs::File::create(path).map(BufWriter::new)?;
        serde_json::to_writer(&mut wtr, self)?;
        wtr.flush()?;
        Ok(())
    }
}

/// Average of already aligned sequences, each of weight `1/N`.
/// All sequences must have the same length.
pub fn average_aligned<T: AsRef<[u8]>>(aligned: &[T], matrix: &SubstitutionMatrix) -> Result<Profile> {
    let expected = aligned.first().ok_or(NoGapError::EmptyInput)?.as_ref().len();
    if let Some((i, seq)) = aligned
        .iter()
        .enumerate()
        .find(|(_, seq)| seq.as_ref().len() != expected)
    {
        return Err(NoGapError::RaggedAlignment {
            name: format!("#{}", i),
            expected,
            found: seq.as_ref().len(),
        });
    }
    let profiles = aligned
        .iter()
        .map(|seq| Profile::from_sequence(seq.as_ref(), matrix))
        .collect::<Result<Vec<_>>>()?;
    Ok(Profile::average_at_shifts(&profiles, &vec![0; profiles.len()]))
}

#[derive(Debug, Clone)]
pub struct Realigner {
    matrix: SubstitutionMatrix,
    profile: Profile,
    pivot: usize,
}

impl Realigner {
    /// Build from the rows of a reference alignment.
    pub fn from_aligned<T: AsRef<[u8]>>(aligned: &[T], config: &AlignerConfig) -> Result<Self> {
        let matrix = config.substitution_matrix()?;
        let profile = average_aligned(aligned, &matrix)?;
        let pivot = pivot_column_index(&profile, config.pivot_policy).ok_or(NoGapError::EmptyInput)?;
        debug!("Reference of {} sequences, length {}, pivot {}", aligned.len(), profile.len(), pivot);
        Ok(Self {
            matrix,
            profile,
            pivot,
        })
    }
    /// Build from an aligned FASTA file.
    pub fn from_fasta<P: AsRef<Path>>(path: P, config: &AlignerConfig) -> Result<Self> {
        let records = fasta::read_fasta(&Some(path))?;
        if let Some((_, first)) = records.first() {
            let expected = first.len();
            if let Some((name, seq)) = records.iter().find(|(_, seq)| seq.len() != expected) {
                return Err(NoGapError::RaggedAlignment {
                    name: name.clone(),
                    expected,
                    found: seq.len(),
                });
            }
        }
        let aligned: Vec<_> = records.iter().map(|(_, seq)| seq.as_slice()).collect();
        Self::from_aligned(&aligned, config)
    }
    /// Rebuild a persisted realigner. The alphabet of `config` must be the one the profile was built on.
    pub fn from_reference_profile(reference: &ReferenceProfile, config: &AlignerConfig) -> Result<Self> {
        let matrix = config.substitution_matrix()?;
        if reference.alphabet.as_bytes() != matrix.alphabet() {
            let msg = format!(
                "reference profile is over {:?}, but the configuration gives {:?}",
                reference.alphabet,
                String::from_utf8_lossy(matrix.alphabet())
            );
            return Err(NoGapError::InvalidAlphabet(msg));
        }
        let profile = Profile::from_rows(&reference.rows, matrix.dim()).ok_or_else(|| {
            NoGapError::Parse(format!("every row must have {} entries", matrix.dim()))
        })?;
        if profile.len() <= reference.pivot {
            let msg = format!("pivot {} is outside a profile of length {}", reference.pivot, profile.len());
            return Err(NoGapError::Parse(msg));
        }
        Ok(Self {
            matrix,
            profile,
            pivot: reference.pivot,
        })
    }
    pub fn reference_profile(&self) -> ReferenceProfile {
        ReferenceProfile {
            alphabet: String::from_utf8_lossy(self.matrix.alphabet()).to_string(),
            rows: self.profile.to_rows(),
            pivot: self.pivot,
        }
    }
    pub fn profile(&self) -> &Profile {
        &self.profile
    }
    pub fn pivot(&self) -> usize {
        self.pivot
    }
    /// Best shift of `seq` against the reference, and the position in `seq`
    /// facing the pivot column. The position may fall outside `seq`.
    pub fn aligning_shift_and_pivot(&self, seq: &[u8]) -> Result<(isize, isize)> {
        let query = Profile::from_sequence(seq, &self.matrix)?;
        let shift = optimal_shift_and_score(&self.profile, &query, &self.matrix).shift;
        Ok((shift, self.pivot as isize - shift))
    }
    pub fn aligning_shifts_and_pivots<T: AsRef<[u8]> + Sync>(&self, seqs: &[T]) -> Result<Vec<(isize, isize)>> {
        seqs.par_iter()
            .map(|seq| self.aligning_shift_and_pivot(seq.as_ref()))
            .collect()
    }
}

/// Realigners keyed by label, each built at most once.
/// With a directory, the reference of `label` is read from `<directory>/<label>.fasta`
/// on first request.
#[derive(Debug)]
pub struct RealignerMap {
    directory: Option<PathBuf>,
    config: AlignerConfig,
    realigners: Mutex<HashMap<String, Arc<Realigner>>>,
}

impl RealignerMap {
    pub fn from_directory<P: Into<PathBuf>>(directory: P, config: AlignerConfig) -> Self {
        Self {
            directory: Some(directory.into()),
            config,
            realigners: Mutex::new(HashMap::new()),
        }
    }
    pub fn from_realigners<I: IntoIterator<Item = (String, Realigner)>>(realigners: I) -> Self {
        let realigners = realigners.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        Self {
            directory: None,
            config: AlignerConfig::default(),
            realigners: Mutex::new(realigners),
        }
    }
    pub fn get(&self, label: &str) -> Result<Arc<Realigner>> {
        let mut realigners = self.realigners.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(realigner) = realigners.get(label) {
            return Ok(realigner.clone());
        }
        let directory = self
            .directory
            .as_ref()
            .ok_or_else(|| NoGapError::UnknownLabel(label.to_string()))?;
        let path = directory.join(format!("{}.fasta", label));
        debug!("Loading the reference of {} from {}", label, path.display());
        let realigner = Arc::new(Realigner::from_fasta(&path, &self.config)?);
        realigners.insert(label.to_string(), realigner.clone());
        Ok(realigner)
    }
    /// Number of realigners built so far.
    pub fn len(&self) -> usize {
        self.realigners.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::{NoGapAligner, SequenceInput};
    use crate::profile::tests::{blosum, random_seq};
    use rand::Rng;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;
    struct Reference {
        aligned: Vec<Vec<u8>>,
        seqs: Vec<Vec<u8>>,
        offsets: Vec<usize>,
        shifts: Vec<usize>,
    }
    fn reference(seed: u64) -> Reference {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(seed);
        let template = random_seq(&mut rng, 40);
        let (seqs, offsets): (Vec<_>, Vec<_>) = (0..40)
            .map(|_| {
                let len = rng.gen_range(30..36);
                let start = rng.gen_range(0..=40 - len);
                (template[start..start + len].to_vec(), start)
            })
            .unzip();
        let aligner = NoGapAligner::new(AlignerConfig::default()).unwrap();
        let alignment = aligner.align(SequenceInput::Sequences(seqs.clone())).unwrap();
        Reference {
            aligned: alignment.aligned_sequences(),
            seqs,
            offsets,
            shifts: alignment.shifts().to_vec(),
        }
    }
    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nogap-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
    #[test]
    fn average() {
        let matrix = blosum();
        let profile = average_aligned(&[b"-AC".to_vec(), b"AAC".to_vec()], &matrix).unwrap();
        assert_eq!(profile.len(), 3);
        assert!((profile.gap_prob(0) - 0.5).abs() < 1e-12);
        assert!(matches!(
            average_aligned(&[b"-AC".to_vec(), b"AC".to_vec()], &matrix),
            Err(NoGapError::RaggedAlignment {
                expected: 3,
                found: 2,
                ..
            })
        ));
        let empty: Vec<Vec<u8>> = vec![];
        assert!(matches!(average_aligned(&empty, &matrix), Err(NoGapError::EmptyInput)));
    }
    #[test]
    fn self_consistency() {
        for seed in 0..3 {
            let reference = reference(seed);
            let realigner = Realigner::from_aligned(&reference.aligned, &AlignerConfig::default()).unwrap();
            let results = realigner.aligning_shifts_and_pivots(&reference.seqs).unwrap();
            let mut residues = vec![];
            for (i, &(shift, pivot)) in results.iter().enumerate() {
                assert_eq!(shift, reference.shifts[i] as isize);
                assert_eq!(pivot, realigner.pivot() as isize - shift);
                if 0 <= pivot && pivot < reference.seqs[i].len() as isize {
                    residues.push(reference.offsets[i] as isize + pivot);
                }
            }
            assert!(!residues.is_empty());
            assert!(residues.iter().all(|&r| r == residues[0]), "{:?}", residues);
        }
    }
    #[test]
    fn persisted_profile() {
        let reference = reference(10);
        let config = AlignerConfig::default();
        let realigner = Realigner::from_aligned(&reference.aligned, &config).unwrap();
        let json = serde_json::to_string(&realigner.reference_profile()).unwrap();
        let persisted: ReferenceProfile = serde_json::from_str(&json).unwrap();
        let rebuilt = Realigner::from_reference_profile(&persisted, &config).unwrap();
        assert_eq!(rebuilt.pivot(), realigner.pivot());
        for seq in reference.seqs.iter() {
            assert_eq!(
                rebuilt.aligning_shift_and_pivot(seq).unwrap(),
                realigner.aligning_shift_and_pivot(seq).unwrap()
            );
        }
        let other = AlignerConfig {
            alphabet: Some("-ACDEFGHIKLMNPQRSTVWY?".to_string()),
            ..AlignerConfig::default()
        };
        assert!(matches!(
            Realigner::from_reference_profile(&persisted, &other),
            Err(NoGapError::InvalidAlphabet(_))
        ));
        let broken = ReferenceProfile {
            pivot: persisted.rows.len(),
            ..persisted
        };
        assert!(Realigner::from_reference_profile(&broken, &config).is_err());
    }
    #[test]
    fn from_fasta() {
        let dir = temp_dir("fasta");
        let path = dir.join("ref.fasta");
        std::fs::write(&path, b">a\n-AAAAA\n>b\n--AAAA\n>c\nAAAAAA\n").unwrap();
        let realigner = Realigner::from_fasta(&path, &AlignerConfig::default()).unwrap();
        assert_eq!(realigner.pivot(), 2);
        assert_eq!(realigner.aligning_shift_and_pivot(b"AAAAAA").unwrap(), (0, 2));
        std::fs::write(&path, b">a\n-AAAAA\n>b\nAAAA\n").unwrap();
        assert!(matches!(
            Realigner::from_fasta(&path, &AlignerConfig::default()),
            Err(NoGapError::RaggedAlignment { .. })
        ));
        std::fs::write(&path, b"not a fasta file\n").unwrap();
        assert!(matches!(
            Realigner::from_fasta(&path, &AlignerConfig::default()),
            Err(NoGapError::Parse(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
    #[test]
    fn map_builds_once() {
        let dir = temp_dir("map");
        std::fs::write(dir.join("A.fasta"), b">a\n-AAAAA\n>b\nAAAAAA\n").unwrap();
        std::fs::write(dir.join("B.fasta"), b">a\nKLMN\n>b\nKLMN\n").unwrap();
        let map = RealignerMap::from_directory(&dir, AlignerConfig::default());
        assert!(map.is_empty());
        let labels = vec!["A", "B", "A", "B", "A"];
        let realigners: Vec<_> = labels.par_iter().map(|label| map.get(label).unwrap()).collect();
        assert_eq!(map.len(), 2);
        assert!(Arc::ptr_eq(&realigners[0], &realigners[2]));
        assert!(Arc::ptr_eq(&realigners[1], &realigners[3]));
        assert!(matches!(map.get("C"), Err(NoGapError::Io(_))));
        std::fs::remove_dir_all(&dir).unwrap();
        let realigner = Realigner::from_aligned(&[b"KLMN".to_vec()], &AlignerConfig::default()).unwrap();
        let map = RealignerMap::from_realigners(vec![("A".to_string(), realigner)]);
        assert!(map.get("A").is_ok());
        assert!(matches!(map.get("B"), Err(NoGapError::UnknownLabel(_))));
    }
}
