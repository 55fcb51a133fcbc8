use crate::{
    enrichment::models::{RowOutcome, RETAIL_REPORT_HEADER},
    error::EnrichError,
};
use csv::WriterBuilder;
use log::info;
use std::{fs::File, path::Path};

/// `<prefix>_<local timestamp>.csv`
pub fn output_file_name(prefix: &str, timestamp_format: &str) -> String {
    format!("{}_{}.csv", prefix, chrono::Local::now().format(timestamp_format))
}

/// Writes a header and then every record as-is. Returns the number of records.
pub fn write_csv<R, F>(path: &Path, header: &[&str], records: R) -> Result<usize, EnrichError>
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let file = File::create(path)
        .map_err(|e| EnrichError::Io(format!("Failed to create report {:?}: {}", path, e)))?;
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
    wtr.write_record(header)?;
    let mut written = 0;
    for record in records {
        wtr.write_record(record)?;
        written += 1;
    }
    wtr.flush()?;
    Ok(written)
}

/// Fixed-header report over enrichment outcomes.
pub struct ReportWriter {
    header: Vec<&'static str>,
}

impl ReportWriter {
    pub fn new(header: &[&'static str]) -> Self {
        Self {
            header: header.to_vec(),
        }
    }

    /// The nine-column bulk retail check report.
    pub fn retail() -> Self {
        Self::new(&RETAIL_REPORT_HEADER)
    }

    /// Writes one line per successful outcome in ascending index order.
    /// Failed outcomes are omitted. Returns the number of data rows written.
    pub fn write(&self, outcomes: &[RowOutcome], path: &Path) -> Result<usize, EnrichError> {
        let mut successful: Vec<_> = outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref())
            .collect();
        successful.sort_by_key(|result| result.index);

        let written = write_csv(path, &self.header, successful.iter().map(|result| &result.fields))?;

        let skipped = outcomes.len() - written;
        if skipped > 0 {
            info!("{} failed rows omitted from {:?}", skipped, path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::models::RowResult;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn success(index: usize, vrm: &str) -> RowOutcome {
        let mut fields = vec![String::new(); 9];
        fields[1] = vrm.to_string();
        RowOutcome {
            index,
            result: Some(RowResult {
                index,
                fields,
                message: String::new(),
                elapsed: Duration::ZERO,
            }),
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("vrm_enrich_writer_{}_{}.csv", name, std::process::id()))
    }

    #[test]
    fn rows_are_written_in_index_order_without_failures() {
        let path = temp_path("order");
        let outcomes = vec![success(2, "CCC"), RowOutcome::failed(1), success(0, "AAA")];
        let written = ReportWriter::retail().write(&outcomes, &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(written, 2);
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Description,VRM,Mileage,Retail Valuation,Rating,Days to sell,Market Condition,National Competitors,Factory Fitted Features",
                ",AAA,,,,,,,",
                ",CCC,,,,,,,",
            ]
        );
    }

    #[test]
    fn no_outcomes_gives_header_only() {
        let path = temp_path("empty");
        assert_eq!(ReportWriter::retail().write(&[], &path).unwrap(), 0);
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn feature_lists_are_quoted() {
        let path = temp_path("quoted");
        let written = write_csv(&path, &["Name", "Features"], vec![vec!["a", "Sat Nav, Heated Seats"]]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(written, 1);
        assert_eq!(contents, "Name,Features\na,\"Sat Nav, Heated Seats\"\n");
    }

    #[test]
    fn file_name_carries_prefix_and_extension() {
        let name = output_file_name("Vehicles_API_Output", "%Y%m%d_%H%M");
        assert!(name.starts_with("Vehicles_API_Output_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "Vehicles_API_Output_".len() + 13 + 4);
    }
}
