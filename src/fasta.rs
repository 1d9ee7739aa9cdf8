//! Very thin Fasta reader and writer. Only support batch IO.
use crate::error::{NoGapError, Result};
use std::io::{BufRead, BufReader, Read};
use std::io::{BufWriter, Write};
pub type FastaRecord = (String, Vec<u8>);

/// Write records into the writer.
pub fn write_fasta<W: Write, I: AsRef<str>, S: AsRef<[u8]>>(
    wtr: &mut BufWriter<W>,
    records: &[(I, S)],
) -> std::io::Result<()> {
    for (id, seq) in records {
        writeln!(
            wtr,
            ">{}\n{}",
            id.as_ref(),
            String::from_utf8_lossy(seq.as_ref())
        )?;
    }
    Ok(())
}

/// Write records into a newly created file.
pub fn write_fasta_file<P: AsRef<std::path::Path>, I: AsRef<str>, S: AsRef<[u8]>>(
    path: P,
    records: &[(I, S)],
) -> std::io::Result<()> {
    let mut wtr = std::fs::File::create(path).map(BufWriter::new)?;
    write_fasta(&mut wtr, records)?;
    wtr.flush()
}

/// Read file or stdin, return parsed fasta records.
pub fn read_fasta<P: AsRef<std::path::Path>>(file: &Option<P>) -> Result<Vec<FastaRecord>> {
    let stdin = std::io::stdin();
    let mut reader: Box<dyn BufRead> = match file {
        Some(file) => std::fs::File::open(file)
            .map(BufReader::new)
            .map(Box::new)?,
        None => {
            let lock = stdin.lock();
            Box::new(BufReader::new(lock))
        }
    };
    let mut contents = vec![];
    reader.read_to_end(&mut contents)?;
    parse_fasta(&contents)
}

/// Parse FASTA formatted bytes.
/// The ID is the header up to the first whitespace, following lines are concatenated.
pub fn parse_fasta(contents: &[u8]) -> Result<Vec<FastaRecord>> {
    let mut contents = contents.split(|&x| x == b'>');
    if let Some(first) = contents.next() {
        if !first.iter().all(u8::is_ascii_whitespace) {
            let head = String::from_utf8_lossy(first);
            let head = head.lines().next().unwrap_or_default();
            return Err(NoGapError::Parse(format!("text before first header: {}", head)));
        }
    }
    contents
        .map(|record| {
            let mut record = record.splitn(2, |&x| x == b'\n');
            let header = record.next().unwrap_or_default();
            let id = header
                .split(|x| x.is_ascii_whitespace())
                .find(|x| !x.is_empty())
                .ok_or_else(|| NoGapError::Parse("record without an identifier".to_string()))?;
            let seq: Vec<_> = record
                .next()
                .unwrap_or_default()
                .iter()
                .filter(|x| !x.is_ascii_whitespace())
                .copied()
                .collect();
            Ok((String::from_utf8_lossy(id).to_string(), seq))
        })
        .collect()
}
