use std::{fs::File, io::Write, path::Path};

use anyhow::Context;
use serialid::Identifier;

/// Column header written above the serial numbers.
pub const DEFAULT_HEADER: &str = "Número de Série";

/// Writes a single-column CSV: `header` followed by one identifier per row.
pub fn write_csv<W: Write>(writer: W, header: &str, identifiers: &[Identifier]) -> csv::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([header])?;
    for identifier in identifiers {
        csv.write_record([identifier.to_string()])?;
    }
    csv.flush()?;
    Ok(())
}

/// Creates (or truncates) `path` and writes `identifiers` to it as CSV.
pub fn export(path: &Path, header: &str, identifiers: &[Identifier]) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(file, header, identifiers)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = identifiers.len(), "exported serial numbers");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<Identifier> {
        raw.iter().map(|id| id.parse().unwrap()).collect()
    }

    fn render(header: &str, identifiers: &[Identifier]) -> String {
        let mut out = Vec::new();
        write_csv(&mut out, header, identifiers).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn writes_header_then_one_row_per_identifier() {
        let csv = render(DEFAULT_HEADER, &ids(&["2024PT00001", "2024PT00002"]));
        assert_eq!(csv, "Número de Série\n2024PT00001\n2024PT00002\n");
    }

    #[test]
    fn empty_export_still_has_header() {
        assert_eq!(render("Serial", &[]), "Serial\n");
    }

    #[test]
    fn header_is_quoted_when_needed() {
        let csv = render("Serial, issued", &ids(&["2025GR00010"]));
        assert_eq!(csv, "\"Serial, issued\"\n2025GR00010\n");
    }

    #[test]
    fn export_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.csv");
        export(&path, "Serial", &ids(&["2024RF00007"])).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Serial\n2024RF00007\n");

        let missing = dir.path().join("missing").join("batch.csv");
        assert!(export(&missing, "Serial", &[]).is_err());
    }
}
