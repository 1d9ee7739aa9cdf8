//! Reference (pivot) residue of secondary structure elements.
//!
//! The residue of an SSE facing the pivot column of its label's reference alignment
//! gets a common number across structures.
use crate::error::Result;
use crate::realigner::{Realigner, RealignerMap};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseRecord {
    /// Owner of the SSE, e.g. a PDB entry.
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// First and last residue number, inclusive.
    pub start: i64,
    pub end: i64,
    pub sequence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot_residue: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceResidue {
    pub residue: i64,
    pub shift: isize,
    /// False if the residue falls outside `[start, end]`.
    pub in_range: bool,
}

/// Residue number of `sse` facing the pivot of `realigner`.
/// A residue outside the SSE is reported and kept.
pub fn assign_reference_residue(sse: &SseRecord, realigner: &Realigner) -> Result<ReferenceResidue> {
    let (shift, pivot) = realigner.aligning_shift_and_pivot(sse.sequence.as_bytes())?;
    let residue = sse.start + pivot as i64;
    let in_range = sse.start <= residue && residue <= sse.end;
    if !in_range {
        let label = sse.label.as_deref().unwrap_or("-");
        warn!(
            "{}: reference residue of {} ({}) falls out of {} ({}-{})",
            sse.name, label, residue, label, sse.start, sse.end
        );
    }
    Ok(ReferenceResidue {
        residue,
        shift,
        in_range,
    })
}

/// Reference residue of every SSE whose label is selected, `None` for the others.
/// Every label is selected when `labels` is `None`. SSEs without a label are skipped.
pub fn assign_reference_residues(
    sses: &[SseRecord],
    realigners: &RealignerMap,
    labels: Option<&[String]>,
) -> Result<Vec<Option<ReferenceResidue>>> {
    sses.par_iter()
        .map(|sse| {
            let label = match sse.label.as_ref() {
                Some(label) if labels.map(|ls| ls.contains(label)).unwrap_or(true) => label,
                _ => return Ok(None),
            };
            let realigner = realigners.get(label)?;
            assign_reference_residue(sse, &realigner).map(Some)
        })
        .collect()
}

/// Fill `pivot_residue` of the selected SSEs. Returns how many were filled.
pub fn annotate_reference_residues(
    sses: &mut [SseRecord],
    realigners: &RealignerMap,
    labels: Option<&[String]>,
) -> Result<usize> {
    let residues = assign_reference_residues(sses, realigners, labels)?;
    let mut filled = 0;
    for (sse, residue) in sses.iter_mut().zip(residues) {
        if let Some(residue) = residue {
            sse.pivot_residue = Some(residue.residue);
            filled += 1;
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::AlignerConfig;
    use crate::error::NoGapError;
    fn sse(label: Option<&str>, start: i64, sequence: &str) -> SseRecord {
        SseRecord {
            name: "1tqn".to_string(),
            label: label.map(|x| x.to_string()),
            start,
            end: start + sequence.len() as i64 - 1,
            sequence: sequence.to_string(),
            pivot_residue: None,
        }
    }
    fn alanines() -> Realigner {
        let aligned = [&b"-AAAAA"[..], &b"--AAAA"[..], &b"AAAAAA"[..]];
        Realigner::from_aligned(&aligned, &AlignerConfig::default()).unwrap()
    }
    fn ruler() -> Realigner {
        let aligned = [&b"KLMNPQRSTV"[..], &b"KLMNPQRSTV"[..]];
        Realigner::from_aligned(&aligned, &AlignerConfig::default()).unwrap()
    }
    #[test]
    fn inside() {
        let residue = assign_reference_residue(&sse(Some("A"), 100, "AAAAAA"), &alanines()).unwrap();
        assert_eq!(
            residue,
            ReferenceResidue {
                residue: 102,
                shift: 0,
                in_range: true
            }
        );
        let residue = assign_reference_residue(&sse(Some("A"), 10, "AA"), &alanines()).unwrap();
        assert_eq!(residue.shift, 2);
        assert_eq!(residue.residue, 10);
        assert!(residue.in_range);
    }
    #[test]
    fn outside_is_kept() {
        let realigner = ruler();
        assert_eq!(realigner.pivot(), 0);
        let residue = assign_reference_residue(&sse(Some("B"), 50, "STV"), &realigner).unwrap();
        assert_eq!(residue.shift, 7);
        assert_eq!(residue.residue, 43);
        assert!(!residue.in_range);
    }
    #[test]
    fn batch() {
        let map = RealignerMap::from_realigners(vec![
            ("A".to_string(), alanines()),
            ("B".to_string(), ruler()),
        ]);
        let mut sses = vec![
            sse(Some("A"), 100, "AAAAAA"),
            sse(None, 1, "KLM"),
            sse(Some("B"), 50, "STV"),
            sse(Some("B"), 20, "KLMN"),
        ];
        let residues = assign_reference_residues(&sses, &map, None).unwrap();
        assert_eq!(residues[0].map(|r| r.residue), Some(102));
        assert_eq!(residues[1], None);
        assert_eq!(residues[2].map(|r| r.in_range), Some(false));
        assert_eq!(residues[3].map(|r| r.residue), Some(20));
        let only_a = vec!["A".to_string()];
        let filled = annotate_reference_residues(&mut sses, &map, Some(&only_a)).unwrap();
        assert_eq!(filled, 1);
        assert_eq!(sses[0].pivot_residue, Some(102));
        assert_eq!(sses[2].pivot_residue, None);
        let unknown = vec![sse(Some("C"), 1, "AAA")];
        assert!(matches!(
            assign_reference_residues(&unknown, &map, None),
            Err(NoGapError::UnknownLabel(_))
        ));
    }
    #[test]
    fn json_records() {
        let json = r#"[{"name": "1og2", "label": "A", "start": 30, "end": 35, "sequence": "AAAAAA"}]"#;
        let mut sses: Vec<SseRecord> = serde_json::from_str(json).unwrap();
        let map = RealignerMap::from_realigners(vec![("A".to_string(), alanines())]);
        annotate_reference_residues(&mut sses, &map, None).unwrap();
        let written = serde_json::to_value(&sses).unwrap();
        assert_eq!(written[0]["pivot_residue"], 32);
    }
}
