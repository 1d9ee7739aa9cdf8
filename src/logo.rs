//! Sequence-logo matrices for an external renderer.
//!
//! One row per aligned column and one value per residue letter (gap and unknown are dropped).
//! In probability units a row is the residue distribution renormalized over residues.
//! In bits it is that distribution scaled by the column height.
//! The occupancy of each column is kept as its width.
use crate::pivot::{ColumnShape, BACKGROUND_ENTROPY};
use crate::profile::Profile;
use crate::substitution::{SubstitutionMatrix, GAP, UNKNOWN};
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoUnits {
    Bits,
    Probability,
}

impl Default for LogoUnits {
    fn default() -> Self {
        LogoUnits::Bits
    }
}

impl std::str::FromStr for LogoUnits {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bits" => Ok(LogoUnits::Bits),
            "probability" => Ok(LogoUnits::Probability),
            _ => Err(format!("units must be 'bits' or 'probability', found {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoMatrix {
    pub letters: String,
    /// Number printed under the first row.
    pub first_index: isize,
    pub units: LogoUnits,
    pub rows: Vec<Vec<f64>>,
    pub widths: Vec<f64>,
}

impl LogoMatrix {
    pub fn new(profile: &Profile, matrix: &SubstitutionMatrix, units: LogoUnits, first_index: isize) -> Self {
        let (columns, letters): (Vec<usize>, Vec<u8>) = matrix
            .alphabet()
            .iter()
            .enumerate()
            .filter(|&(_, &x)| x != GAP && x != UNKNOWN)
            .map(|(i, &x)| (i, x))
            .unzip();
        let (rows, widths) = profile
            .rows()
            .map(|row| {
                let probs: Vec<f64> = columns.iter().map(|&j| row[j]).collect();
                let total: f64 = probs.iter().sum();
                let shape = ColumnShape::new(&probs, total);
                let scale = match units {
                    LogoUnits::Probability => 1f64,
                    LogoUnits::Bits => shape.height,
                };
                let values = match total {
                    t if t <= 0f64 => vec![0f64; probs.len()],
                    t => probs.iter().map(|p| scale * p / t).collect(),
                };
                (values, shape.width)
            })
            .unzip();
        Self {
            letters: String::from_utf8_lossy(&letters).to_string(),
            first_index,
            units,
            rows,
            widths,
        }
    }
    /// Upper limit of the value axis.
    pub fn max_value(&self) -> f64 {
        match self.units {
            LogoUnits::Bits => BACKGROUND_ENTROPY,
            LogoUnits::Probability => 1f64,
        }
    }
    pub fn positions(&self) -> impl Iterator<Item = isize> {
        let first = self.first_index;
        (0..self.rows.len() as isize).map(move |i| first + i)
    }
    /// Tab separated, with a header of the letters and a trailing width column.
    pub fn write_tsv<W: Write>(&self, wtr: &mut W) -> std::io::Result<()> {
        write!(wtr, "position")?;
        for letter in self.letters.chars() {
            write!(wtr, "\t{}", letter)?;
        }
        writeln!(wtr, "\twidth")?;
        for ((position, row), width) in self.positions().zip(self.rows.iter()).zip(self.widths.iter()) {
            write!(wtr, "{}", position)?;
            for value in row {
                write!(wtr, "\t{:.6}", value)?;
            }
            writeln!(wtr, "\t{:.6}", width)?;
        }
        Ok(())
    }
    pub fn write_json<W: Write>(&self, wtr: &mut W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(wtr, self)
    }
}
