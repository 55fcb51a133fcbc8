use crate::{enrichment::models::InputRow, error::EnrichError};
use csv::{ReaderBuilder, StringRecord};
use log::{debug, warn};
use std::{fs::File, io::BufReader, path::Path};

pub const VRM_COLUMN: &str = "VRM";
pub const MILEAGE_COLUMN: &str = "Mileage";

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    let wanted = name.to_ascii_lowercase();
    headers.iter().position(|h| normalize_header(h) == wanted)
}

fn open(path: &Path) -> Result<csv::Reader<BufReader<File>>, EnrichError> {
    let file = File::open(path)
        .map_err(|e| EnrichError::Io(format!("Failed to open input file {:?}: {}", path, e)))?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file)))
}

/// Reads the VRM and Mileage columns of a headered CSV file.
///
/// Headers are matched case-insensitively. A missing VRM column is an error; a missing
/// Mileage column yields empty mileages.
pub fn read_input_rows(path: &Path) -> Result<Vec<InputRow>, EnrichError> {
    let mut rdr = open(path)?;
    let headers = rdr.headers()?.clone();
    let vrm_idx = find_column(&headers, VRM_COLUMN).ok_or_else(|| {
        EnrichError::Csv(format!("Input file {:?} has no {} column", path, VRM_COLUMN))
    })?;
    let mileage_idx = find_column(&headers, MILEAGE_COLUMN);
    if mileage_idx.is_none() {
        warn!("Input file {:?} has no {} column; mileage will be empty", path, MILEAGE_COLUMN);
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        rows.push(InputRow {
            vrm: field(vrm_idx),
            mileage: mileage_idx.map(field).unwrap_or_default(),
            raw: record.iter().map(str::to_string).collect(),
        });
    }
    debug!("Read {} input rows from {:?}", rows.len(), path);
    Ok(rows)
}

/// Trimmed VRMs from the VRM column, blank entries included.
pub fn read_vrm_column(path: &Path) -> Result<Vec<String>, EnrichError> {
    Ok(read_input_rows(path)?.into_iter().map(|row| row.vrm).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn temp_csv(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("vrm_enrich_reader_{}_{}.csv", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn headers_match_case_insensitively_with_bom() {
        let path = temp_csv("bom", "\u{feff} vrm ,Colour, MILEAGE\nAB12CDE,Red,42000\n XY99ZZZ ,Blue,\n");
        let rows = read_input_rows(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].vrm, "AB12CDE");
        assert_eq!(rows[0].mileage, "42000");
        assert_eq!(rows[0].raw, vec!["AB12CDE", "Red", "42000"]);
        assert_eq!(rows[1].vrm, "XY99ZZZ");
        assert_eq!(rows[1].mileage, "");
    }

    #[test]
    fn missing_vrm_column_is_an_error() {
        let path = temp_csv("novrm", "Registration,Mileage\nAB12CDE,1\n");
        let err = read_input_rows(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("no VRM column"));
    }

    #[test]
    fn missing_mileage_column_gives_empty_mileage() {
        let path = temp_csv("nomileage", "VRM\nAB12CDE\n\n");
        let vrms = read_vrm_column(&path).unwrap();
        let rows = read_input_rows(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(vrms, vec!["AB12CDE"]);
        assert_eq!(rows[0].mileage, "");
    }

    #[test]
    fn header_only_file_has_no_rows() {
        let path = temp_csv("empty", "VRM,Mileage\n");
        let rows = read_input_rows(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(rows.is_empty());
    }
}
