//! Roster import from CSV or spreadsheet files.
//!
//! A missing required column rejects the file. Rows that cannot be read are
//! skipped and counted; they never stop the import.

use crate::config::{delimiter_byte, RosterConfig};
use crate::error::RosterError;
use crate::types::RosterEntry;
use calamine::{open_workbook_auto, Data, Reader};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Split a "surname(s) given-name" field.
///
/// The last whitespace token is the given name, everything before it the
/// surname. A single token is taken as the given name.
pub fn split_name_column(full_name: &str) -> (String, String) {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.split_last() {
        None => (String::new(), String::new()),
        Some((given, [])) => (String::new(), given.to_string()),
        Some((given, surname)) => (surname.join(" "), given.to_string()),
    }
}

/// Result of importing a roster file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterImport {
    pub entries: Vec<RosterEntry>,
    pub skipped: usize,
}

impl RosterImport {
    /// One-line status for the operator
    pub fn summary(&self) -> String {
        let mut message = format!("Loaded {} people.", self.entries.len());
        if self.skipped > 0 {
            message.push_str(&format!(" Skipped {} invalid records.", self.skipped));
        }
        message
    }
}

/// Reads roster files laid out per [`RosterConfig`]
#[derive(Debug, Clone, Default)]
pub struct RosterImporter {
    config: RosterConfig,
}

struct Columns {
    name: usize,
    identifier: usize,
    address: usize,
}

impl RosterImporter {
    pub fn new(config: RosterConfig) -> Self {
        Self { config }
    }

    /// Import by file extension: `.csv`, or `.xlsx`/`.xlsm`/`.xls`/`.xlsb`/`.ods`
    pub fn load(&self, path: &Path) -> Result<RosterImport, RosterError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let import = match extension.as_str() {
            "csv" => {
                let file = std::fs::File::open(path)?;
                self.load_csv(std::io::BufReader::new(file))?
            }
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => self.load_spreadsheet(path)?,
            other => return Err(RosterError::UnsupportedFormat(format!(".{}", other))),
        };

        info!("Roster {}: {}", path.display(), import.summary());
        Ok(import)
    }

    pub fn load_csv<R: Read>(&self, reader: R) -> Result<RosterImport, RosterError> {
        let delimiter = delimiter_byte(self.config.delimiter)
            .ok_or(RosterError::InvalidDelimiter(self.config.delimiter))?;
        let mut csv = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(reader);

        let headers: Vec<String> = csv.headers()?.iter().map(clean_cell).collect();
        let columns = self.columns(&headers)?;

        let mut import = RosterImport::default();
        for (line, record) in csv.records().enumerate() {
            let fields: Vec<String> = match record {
                Ok(record) => record.iter().map(clean_cell).collect(),
                Err(e) => {
                    warn!("Skipping roster row {}: {}", line + 1, e);
                    import.skipped += 1;
                    continue;
                }
            };
            self.push_row(&mut import, line + 1, &columns, &fields);
        }

        Ok(import)
    }

    /// First sheet, first row as headers
    pub fn load_spreadsheet(&self, path: &Path) -> Result<RosterImport, RosterError> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| RosterError::Spreadsheet(format!("Failed to open {}: {}", path.display(), e)))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| RosterError::Spreadsheet("Workbook contains no sheets".to_string()))?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| RosterError::Spreadsheet(format!("Failed to read sheet '{}': {}", sheet_name, e)))?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|cells| cells.iter().map(|c| cell_text(c).unwrap_or_default()).collect())
            .unwrap_or_default();
        let columns = self.columns(&headers)?;

        let mut import = RosterImport::default();
        for (line, cells) in rows.enumerate() {
            if cells.iter().all(|c| matches!(c, Data::Empty)) {
                continue;
            }
            let fields: Option<Vec<String>> = cells.iter().map(cell_text).collect();
            match fields {
                Some(fields) => self.push_row(&mut import, line + 1, &columns, &fields),
                None => {
                    warn!("Skipping roster row {}: cell error", line + 1);
                    import.skipped += 1;
                }
            }
        }

        Ok(import)
    }

    fn columns(&self, headers: &[String]) -> Result<Columns, RosterError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let name = find(self.config.name_column.as_str());
        let identifier = find(self.config.identifier_column.as_str());
        let address = find(self.config.address_column.as_str());

        match (name, identifier, address) {
            (Some(name), Some(identifier), Some(address)) => Ok(Columns {
                name,
                identifier,
                address,
            }),
            _ => {
                let missing = [
                    (name, &self.config.name_column),
                    (identifier, &self.config.identifier_column),
                    (address, &self.config.address_column),
                ]
                .into_iter()
                .filter(|(position, _)| position.is_none())
                .map(|(_, column)| column.clone())
                .collect();
                Err(RosterError::MissingColumns(missing))
            }
        }
    }

    fn push_row(&self, import: &mut RosterImport, line: usize, columns: &Columns, fields: &[String]) {
        let field = move |i: usize| fields.get(i).map(String::as_str).unwrap_or_default();

        let (surname, given_name) = split_name_column(field(columns.name));
        if given_name.is_empty() {
            warn!("Skipping roster row {}: empty {}", line, self.config.name_column);
            import.skipped += 1;
            return;
        }

        import.entries.push(RosterEntry::new(
            given_name,
            surname,
            field(columns.identifier),
            field(columns.address),
        ));
    }
}

/// Import a roster on the blocking pool
pub fn spawn_import(importer: Arc<RosterImporter>, path: PathBuf) -> JoinHandle<Result<RosterImport, RosterError>> {
    tokio::task::spawn_blocking(move || importer.load(&path))
}

fn clean_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

// `None` marks an unreadable cell.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => Some(String::new()),
        Data::String(s) => Some(s.trim().to_string()),
        // identifiers typed as numbers must not gain a decimal point
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
        Data::Float(n) => Some(n.to_string()),
        Data::Int(n) => Some(n.to_string()),
        Data::Error(_) => None,
        other => Some(other.to_string().trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name_column() {
        assert_eq!(
            split_name_column("Horvat Ana"),
            ("Horvat".to_string(), "Ana".to_string())
        );
        assert_eq!(
            split_name_column("  Horvat  Kovač   Ana "),
            ("Horvat Kovač".to_string(), "Ana".to_string())
        );
        assert_eq!(split_name_column("Ana"), (String::new(), "Ana".to_string()));
        assert_eq!(split_name_column("   "), (String::new(), String::new()));
    }

    #[test]
    fn test_load_csv() {
        let data = "IME,OIB,ADRESA\n\
                    Petrov Ivan,12345678901,Ilica 1\n\
                    Horvat Kovač Ana,98765432109,\"Vukovarska 5, Split\"\n";

        let import = RosterImporter::default().load_csv(data.as_bytes()).unwrap();
        assert_eq!(import.skipped, 0);
        assert_eq!(import.entries.len(), 2);

        let ana = &import.entries[1];
        assert_eq!(ana.given_name, "Ana");
        assert_eq!(ana.surname, "Horvat Kovač");
        assert_eq!(ana.identifier, "98765432109");
        assert_eq!(ana.address, "Vukovarska 5, Split");
        assert_eq!(ana.match_count, 0);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let data = "IME,OIB,ADRESA\n\
                    Petrov Ivan,12345678901,Ilica 1\n\
                    ,11111111111,Nowhere\n\
                    Broken,Row\n\
                    Horvat Ana,98765432109,Split\n";

        let import = RosterImporter::default().load_csv(data.as_bytes()).unwrap();
        assert_eq!(import.entries.len(), 2);
        assert_eq!(import.skipped, 2);
        assert_eq!(import.summary(), "Loaded 2 people. Skipped 2 invalid records.");
    }

    #[test]
    fn test_missing_columns() {
        let data = "IME,ADRESA\nPetrov Ivan,Ilica 1\n";
        match RosterImporter::default().load_csv(data.as_bytes()) {
            Err(RosterError::MissingColumns(missing)) => assert_eq!(missing, vec!["OIB".to_string()]),
            other => panic!("expected missing columns, got {:?}", other),
        }
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let importer = RosterImporter::new(RosterConfig {
            delimiter: 'Ĭ',
            ..RosterConfig::default()
        });
        let data = "IME,OIB,ADRESA\nPetrov Ivan,1,Ilica 1\n";

        match importer.load_csv(data.as_bytes()) {
            Err(RosterError::InvalidDelimiter(c)) => assert_eq!(c, 'Ĭ'),
            other => panic!("expected invalid delimiter, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_format() {
        let err = RosterImporter::default()
            .load(Path::new("clients.txt"))
            .unwrap_err();
        assert!(matches!(err, RosterError::UnsupportedFormat(ref ext) if ext == ".txt"));
        assert_eq!(err.to_string(), "Unsupported file format: .txt. Use CSV or Excel.");
    }

    #[test]
    fn test_load_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.CSV");
        std::fs::write(&path, "IME,OIB,ADRESA\nPetrov Ivan,1,Ilica 1\n").unwrap();

        let import = RosterImporter::default().load(&path).unwrap();
        assert_eq!(import.entries.len(), 1);
        assert_eq!(import.summary(), "Loaded 1 people.");
    }

    #[test]
    fn test_load_spreadsheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in ["IME", "OIB", "ADRESA"].into_iter().enumerate() {
            sheet.write_string(0, col as u16, header).unwrap();
        }
        sheet.write_string(1, 0, "Petrov Ivan").unwrap();
        sheet.write_number(1, 1, 12345678901.0).unwrap();
        sheet.write_string(1, 2, "Ilica 1").unwrap();
        // row 2 left blank
        sheet.write_string(3, 0, "Horvat Kovač Ana").unwrap();
        sheet.write_number(3, 1, 98765432109.0).unwrap();
        sheet.write_string(3, 2, "Vukovarska 5, Split").unwrap();
        workbook.save(&path).unwrap();

        let import = RosterImporter::default().load(&path).unwrap();
        assert_eq!(import.skipped, 0);
        assert_eq!(import.entries.len(), 2);

        let ivan = &import.entries[0];
        assert_eq!(ivan.surname, "Petrov");
        assert_eq!(ivan.given_name, "Ivan");
        assert_eq!(ivan.identifier, "12345678901");
        assert_eq!(ivan.address, "Ilica 1");

        let ana = &import.entries[1];
        assert_eq!(ana.surname, "Horvat Kovač");
        assert_eq!(ana.identifier, "98765432109");
    }

    #[test]
    fn test_spreadsheet_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "IME").unwrap();
        sheet.write_string(1, 0, "Petrov Ivan").unwrap();
        workbook.save(&path).unwrap();

        let err = RosterImporter::default().load(&path).unwrap_err();
        match &err {
            RosterError::MissingColumns(missing) => {
                assert_eq!(missing, &vec!["OIB".to_string(), "ADRESA".to_string()])
            }
            other => panic!("expected missing columns, got {:?}", other),
        }
        assert_eq!(err.to_string(), "Missing columns: OIB, ADRESA");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Float(12345678901.0)), Some("12345678901".to_string()));
        assert_eq!(cell_text(&Data::String(" Ilica 1 ".to_string())), Some("Ilica 1".to_string()));
        assert_eq!(cell_text(&Data::Empty), Some(String::new()));
    }

    #[tokio::test]
    async fn test_spawn_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.csv");
        std::fs::write(&path, "IME,OIB,ADRESA\nPetrov Ivan,1,Ilica 1\nHorvat Ana,2,Split\n").unwrap();

        let import = spawn_import(Arc::new(RosterImporter::default()), path)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(import.entries.len(), 2);
    }
}
