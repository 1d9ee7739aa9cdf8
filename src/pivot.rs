//! Per-column logo geometry and the choice of the pivot (reference) column.
//!
//! The height of a column is its information content: the entropy of a uniform
//! distribution over 20 amino acids minus the entropy of the residue distribution,
//! renormalized to ignore gaps. The width is the occupancy, one minus the gap probability.
//! The area is their product.
use crate::profile::Profile;
use serde::{Deserialize, Serialize};

/// `log2(20)`.
pub const BACKGROUND_ENTROPY: f64 = 4.321928094887363;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotPolicy {
    /// Largest area, the earliest column on ties.
    MaxArea,
    /// Largest single-residue probability, the latest column on ties.
    MaxProbability,
}

impl Default for PivotPolicy {
    fn default() -> Self {
        PivotPolicy::MaxArea
    }
}

impl std::str::FromStr for PivotPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "area" | "max_area" => Ok(PivotPolicy::MaxArea),
            "probability" | "max_probability" => Ok(PivotPolicy::MaxProbability),
            _ => Err(format!("unknown pivot policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnShape {
    pub height: f64,
    pub width: f64,
    pub area: f64,
}

impl ColumnShape {
    /// Shape of a column with residue probabilities `probs` and occupancy `width`.
    /// `probs` need not sum to one. A column without any residue has zero height.
    pub fn new(probs: &[f64], width: f64) -> Self {
        let total: f64 = probs.iter().sum();
        let height = if total <= 0f64 {
            0f64
        } else {
            let entropy: f64 = probs
                .iter()
                .filter(|&&p| 0f64 < p)
                .map(|&p| p / total)
                .map(|p| -p * p.log2())
                .sum();
            BACKGROUND_ENTROPY - entropy
        };
        Self {
            height,
            width,
            area: height * width,
        }
    }
}

pub fn column_shapes(profile: &Profile) -> Vec<ColumnShape> {
    profile
        .rows()
        .map(|row| ColumnShape::new(&row[1..], 1f64 - row[0]))
        .collect()
}

/// The largest non-gap probability of each column.
pub fn max_probabilities(profile: &Profile) -> Vec<f64> {
    profile
        .rows()
        .map(|row| row[1..].iter().fold(0f64, |x, &y| x.max(y)))
        .collect()
}

// Index of the maximum. `keep_last` decides which one wins among ties.
fn argmax<I: Iterator<Item = f64>>(xs: I, keep_last: bool) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, x) in xs.enumerate() {
        let replace = match best {
            None => true,
            Some((_, max)) if keep_last => max <= x,
            Some((_, max)) => max < x,
        };
        if replace {
            best = Some((i, x));
        }
    }
    best.map(|(i, _)| i)
}

pub fn max_area_column(profile: &Profile) -> Option<usize> {
    argmax(column_shapes(profile).iter().map(|c| c.area), false)
}

/// The highest column, the latest one on ties.
pub fn highest_column(profile: &Profile) -> Option<usize> {
    argmax(column_shapes(profile).iter().map(|c| c.height), true)
}

/// The widest column, ties broken by height and then by the latest index.
pub fn widest_and_highest_column(profile: &Profile) -> Option<usize> {
    column_shapes(profile)
        .iter()
        .enumerate()
        .max_by(|(i, x), (j, y)| {
            x.width
                .total_cmp(&y.width)
                .then(x.height.total_cmp(&y.height))
                .then(i.cmp(j))
        })
        .map(|(i, _)| i)
}

pub fn max_probability_column(profile: &Profile) -> Option<usize> {
    argmax(max_probabilities(profile).into_iter(), true)
}

/// `None` only for an empty profile.
pub fn pivot_column_index(profile: &Profile, policy: PivotPolicy) -> Option<usize> {
    match policy {
        PivotPolicy::MaxArea => max_area_column(profile),
        PivotPolicy::MaxProbability => max_probability_column(profile),
    }
}

/// Summary of the logo geometry of one alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub label: String,
    /// Sum of areas over sum of widths.
    pub average_height: f64,
    pub max_area: f64,
    pub max_area_index: usize,
    pub max_height: f64,
    pub max_height_index: usize,
}

impl ColumnStatistics {
    pub fn new(label: &str, profile: &Profile) -> Option<Self> {
        let shapes = column_shapes(profile);
        let max_area_index = max_area_column(profile)?;
        let max_height_index = highest_column(profile)?;
        let areas: f64 = shapes.iter().map(|c| c.area).sum();
        let widths: f64 = shapes.iter().map(|c| c.width).sum();
        Some(Self {
            label: label.to_string(),
            average_height: areas / widths,
            max_area: shapes[max_area_index].area,
            max_area_index,
            max_height: shapes[max_height_index].height,
            max_height_index,
        })
    }
    pub fn header() -> &'static str {
        "Label\tWeighted-average height\tMax. area\tMax. area index\tMax. height\tMax. height index"
    }
    pub fn to_tsv_row(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.label,
            self.average_height,
            self.max_area,
            self.max_area_index,
            self.max_height,
            self.max_height_index
        )
    }
}
