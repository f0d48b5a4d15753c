//! Matrix and text files, transparently gzip-compressed by extension.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use itertools::Itertools;

fn is_gz(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

fn create(path: &Path) -> io::Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }
    let file = File::create(path)?;
    let writer: Box<dyn Write> = if is_gz(path) {
        Box::new(BufWriter::new(GzEncoder::new(file, Compression::default())))
    } else {
        Box::new(BufWriter::new(file))
    };
    Ok(writer)
}

fn open(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if is_gz(path) {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Labeled square matrix as TSV: a header of column names after an empty
/// corner cell, then one named row per line.
///
/// `path` ending in `.gz` compresses; `-` writes plain text to stdout.
pub fn write_matrix_tsv<P: AsRef<Path>, T: Display>(
    path: P,
    names: &[String],
    matrix: &[Vec<T>],
) -> io::Result<()> {
    if names.len() != matrix.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} names for a matrix with {} rows", names.len(), matrix.len()),
        ));
    }
    let mut out = create(path.as_ref())?;
    writeln!(out, "\t{}", names.iter().join("\t"))?;
    for (name, row) in names.iter().zip(matrix) {
        writeln!(out, "{name}\t{}", row.iter().join("\t"))?;
    }
    out.flush()
}

/// Read a labeled square matrix in the layout written by [`write_matrix_tsv`]
/// (`.gz` files are decompressed). Returns the names and the rows.
pub fn read_matrix_tsv<P: AsRef<Path>>(path: P) -> io::Result<(Vec<String>, Vec<Vec<f64>>)> {
    let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidData, msg);
    let mut lines = open(path.as_ref())?.lines();

    let header = lines.next().ok_or_else(|| invalid("empty matrix file".to_string()))??;
    let names: Vec<String> = header.split('\t').skip(1).map(|s| s.trim().to_string()).collect();

    let mut rows = Vec::with_capacity(names.len());
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut cells = line.split('\t');
        let label = cells.next().unwrap_or_default().trim();
        if names.get(i).map(String::as_str) != Some(label) {
            return Err(invalid(format!("row {i} is labeled {label:?}, expected {:?}", names.get(i))));
        }
        let row = cells
            .map(|c| c.trim().parse::<f64>().map_err(|e| invalid(format!("row {i}: {e}"))))
            .collect::<io::Result<Vec<_>>>()?;
        rows.push(row);
    }
    Ok((names, rows))
}

/// Write `text` plus a trailing newline to a file (`.gz` compressed) or
/// stdout (`-`).
pub fn write_text<P: AsRef<Path>>(path: P, text: &str) -> io::Result<()> {
    let mut out = create(path.as_ref())?;
    writeln!(&mut out, "{text}")?;
    out.flush()
}

/// Read a whole file, decompressing `.gz`.
pub fn read_text<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let mut text = String::new();
    open(path.as_ref())?.read_to_string(&mut text)?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("quartet-search-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_matrix_round_trip() {
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let mat = vec![vec![0.0, 1.5, 2.0], vec![1.5, 0.0, 3.0], vec![2.0, 3.0, 0.0]];
        for file in ["plain.tsv", "packed.tsv.gz"] {
            let path = scratch(file);
            write_matrix_tsv(&path, &names, &mat).unwrap();
            let (read_names, rows) = read_matrix_tsv(&path).unwrap();
            assert_eq!(read_names, names);
            assert_eq!(rows, mat);
            std::fs::remove_file(&path).unwrap();
        }
    }

    #[test]
    fn test_mislabeled_row_is_rejected() {
        let path = scratch("mislabeled.tsv");
        std::fs::write(&path, "\ta\tb\nb\t0\t1\na\t1\t0\n").unwrap();
        let err = read_matrix_tsv(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_text_round_trip_gz() {
        let path = scratch("tree.nwk.gz");
        write_text(&path, "(0,(1,3),2);").unwrap();
        assert_eq!(read_text(&path).unwrap(), "(0,(1,3),2);\n");
        std::fs::remove_file(&path).unwrap();
    }
}
