use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;

/// Reads a matrix of numbers, one row per line, with values separated by commas and/or
/// whitespace. Empty lines are skipped, and files ending in `.gz` are decompressed on the fly.
/// Infinite bounds are written as `inf` or `-inf`.
pub fn load_rows<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("reading {:?}", path))?;
    let reader: Box<dyn BufRead> = if path.extension().map_or(false, |ext| ext == "gz") {
        Box::new(BufReader::new(GzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    parse_rows(reader).with_context(|| format!("parsing {:?}", path))
}

fn parse_rows<R: BufRead>(reader: R) -> Result<Vec<Vec<f64>>> {
    let mut rows = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                fast_float::parse::<f64, _>(tok)
                    .with_context(|| format!("line {}: invalid number {:?}", lineno + 1, tok))
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// Flattens rows of equal length into a row-major buffer, returning the common length.
pub fn flatten(rows: Vec<Vec<f64>>) -> Result<(Vec<f64>, usize)> {
    let width = rows.first().map_or(0, |r| r.len());
    let mut flat = Vec::with_capacity(width * rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != width {
            bail!("row {} has {} values, expected {}", i + 1, row.len(), width);
        }
        flat.extend(row);
    }
    Ok((flat, width))
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::PathBuf;

    fn tmp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("orthant-{}-{}", std::process::id(), name))
    }

    const CONTENT: &str = "-1, -inf 0.5\n\n2,inf,1e-3\n";

    #[test]
    fn test_load_plain() {
        let path = tmp_path("plain.csv");
        std::fs::write(&path, CONTENT).unwrap();
        let rows = load_rows(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![-1.0, f64::NEG_INFINITY, 0.5],
                vec![2.0, f64::INFINITY, 1e-3]
            ]
        );
    }

    #[test]
    fn test_load_gzip() {
        let path = tmp_path("compressed.csv.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(CONTENT.as_bytes()).unwrap();
        enc.finish().unwrap();
        let rows = load_rows(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], f64::INFINITY);
    }

    #[test]
    fn test_errors() {
        assert!(load_rows(tmp_path("missing.csv")).is_err());
        let err = parse_rows("1 2\n3 x\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let (flat, width) = flatten(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(width, 2);
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(flatten(vec![vec![1.0, 2.0], vec![3.0]]).is_err());
        assert_eq!(flatten(Vec::new()).unwrap(), (Vec::new(), 0));
    }
}
