use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use tracing::{debug, info};

use hv_core::{RawRecord, RowSource, Value};

use crate::config::{ColumnRules, NullConfig};
use crate::{DataError, SchemaError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Field delimiter of a delimited text file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
    Semicolon,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
            Delimiter::Semicolon => b';',
        }
    }

    /// Infer from the file extension (`.tsv`/`.tab` → tab, `.csv` → comma).
    /// A trailing `.gz` is skipped so `hits.tsv.gz` reads as tab-separated.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let mut extension = path.extension()?.to_str()?.to_ascii_lowercase();
        if extension == "gz" {
            extension = Path::new(path.file_stem()?).extension()?.to_str()?.to_ascii_lowercase();
        }
        match extension.as_str() {
            "tsv" | "tab" => Some(Delimiter::Tab),
            "csv" => Some(Delimiter::Comma),
            _ => None,
        }
    }

    /// Pick the candidate that occurs most often in the header line
    pub fn sniff(header: &str) -> Self {
        [Delimiter::Tab, Delimiter::Comma, Delimiter::Semicolon]
            .into_iter()
            .map(|d| (d, header.bytes().filter(|b| *b == d.as_byte()).count()))
            .fold((Delimiter::Comma, 0), |best, candidate| if candidate.1 > best.1 { candidate } else { best })
            .0
    }
}

/// Delimited text file (CSV/TSV) turned into raw records
pub struct CsvRowSource {
    /// Path to the file
    path: PathBuf,
    name: String,
    delimiter: Option<Delimiter>,
    null_config: NullConfig,
    column_rules: ColumnRules,
}

impl CsvRowSource {
    /// Create a new source; the delimiter is inferred on load
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.csv")
            .to_string();
        Self {
            path,
            name,
            delimiter: None,
            null_config: NullConfig::default(),
            column_rules: ColumnRules::default(),
        }
    }

    /// Force a delimiter instead of inferring one
    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_null_config(mut self, null_config: NullConfig) -> Self {
        self.null_config = null_config;
        self
    }

    pub fn with_column_rules(mut self, column_rules: ColumnRules) -> Self {
        self.column_rules = column_rules;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record on a blocking thread
    pub async fn read_records(&self) -> Result<Vec<RawRecord>, DataError> {
        let path = self.path.clone();
        let delimiter = self.delimiter;
        let null_config = self.null_config.clone();
        let column_rules = self.column_rules.clone();

        tokio::task::spawn_blocking(move || Self::read_file(&path, delimiter, &null_config, &column_rules)).await?
    }

    fn read_file(
        path: &Path,
        delimiter: Option<Delimiter>,
        null_config: &NullConfig,
        column_rules: &ColumnRules,
    ) -> Result<Vec<RawRecord>, DataError> {
        let mut contents = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut contents)?;

        // Detected by content, not by name
        if contents.starts_with(&GZIP_MAGIC) {
            let mut inflated = Vec::new();
            GzDecoder::new(contents.as_slice()).read_to_end(&mut inflated)?;
            debug!("Inflated {} ({} -> {} bytes)", path.display(), contents.len(), inflated.len());
            contents = inflated;
        }

        let delimiter = match delimiter.or_else(|| Delimiter::from_extension(path)) {
            Some(delimiter) => delimiter,
            None => {
                let header = contents.split(|b| *b == b'\n').next().unwrap_or_default();
                Delimiter::sniff(&String::from_utf8_lossy(header))
            }
        };
        debug!("Reading {} with delimiter {:?}", path.display(), delimiter);

        parse_records(&contents, delimiter, null_config, column_rules)
    }
}

/// Parse delimited text with a header row into typed records
pub fn parse_records(
    contents: &[u8],
    delimiter: Delimiter,
    null_config: &NullConfig,
    column_rules: &ColumnRules,
) -> Result<Vec<RawRecord>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter.as_byte())
        .flexible(true)
        .from_reader(contents);

    // (position in the file, output column name)
    let columns: Vec<(usize, String)> = reader
        .headers()?
        .iter()
        .enumerate()
        .filter_map(|(position, name)| column_rules.apply(name.trim()).map(|name| (position, name)))
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let row: RawRecord = columns
            .iter()
            .map(|(position, name)| {
                let value = record
                    .get(*position)
                    .map(|field| parse_value(field, null_config))
                    .unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();
        records.push(row);
    }

    if records.is_empty() || columns.is_empty() {
        return Err(SchemaError::EmptyInput.into());
    }
    Ok(records)
}

/// Dynamic typing of one cell
fn parse_value(field: &str, null_config: &NullConfig) -> Value {
    if null_config.is_null(field) {
        return Value::Null;
    }
    let trimmed = field.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Value::Int(v);
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return Value::Float(v);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Text(trimmed.to_string()),
    }
}

#[async_trait]
impl RowSource for CsvRowSource {
    async fn load(&self) -> anyhow::Result<Vec<RawRecord>> {
        let records = self.read_records().await?;
        info!("Loaded {} records from {}", records.len(), self.name);
        Ok(records)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TSV: &str = "library\taxis\tc1_smiles\tcount_PSA\tAC_zscore_n_PSA\tPSA_bar_1\n\
                       L1\t6\tCCO\t4\t1.25\tx\n\
                       L1\t6\tCCN\tNA\t\tx\n";

    #[test]
    fn test_parse_applies_rules_and_types() {
        let records = parse_records(TSV.as_bytes(), Delimiter::Tab, &NullConfig::default(), &ColumnRules::default()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.keys().cloned().collect::<Vec<_>>(), vec!["library", "axis", "c1_smiles", "count_PSA", "zscore_PSA"]);
        assert_eq!(first["axis"], Value::Int(6));
        assert_eq!(first["zscore_PSA"], Value::Float(1.25));
        assert_eq!(first["c1_smiles"], Value::from("CCO"));
        assert_eq!(records[1]["count_PSA"], Value::Null);
        assert_eq!(records[1]["zscore_PSA"], Value::Null);
    }

    #[test]
    fn test_header_only_is_empty_input() {
        let err = parse_records(b"a,b\n", Delimiter::Comma, &NullConfig::default(), &ColumnRules::default()).unwrap_err();
        assert!(matches!(err, DataError::Schema(SchemaError::EmptyInput)));
    }

    #[test]
    fn test_delimiter_inference() {
        assert_eq!(Delimiter::from_extension(Path::new("hits.TSV")), Some(Delimiter::Tab));
        assert_eq!(Delimiter::from_extension(Path::new("hits.csv")), Some(Delimiter::Comma));
        assert_eq!(Delimiter::from_extension(Path::new("hits.txt")), None);
        assert_eq!(Delimiter::sniff("a\tb\tc"), Delimiter::Tab);
        assert_eq!(Delimiter::sniff("a;b;c"), Delimiter::Semicolon);
        assert_eq!(Delimiter::sniff("abc"), Delimiter::Comma);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.txt");
        std::fs::write(&path, TSV).unwrap();

        let source = CsvRowSource::new(&path);
        assert_eq!(source.source_name(), "screen.txt");
        let records = source.load().await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_gzip_is_inflated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.tsv.gz");
        let mut encoder = flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        encoder.write_all(TSV.as_bytes()).unwrap();
        encoder.finish().unwrap();

        assert_eq!(Delimiter::from_extension(&path), Some(Delimiter::Tab));
        let records = CsvRowSource::new(&path).read_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["c1_smiles"], Value::from("CCO"));
        assert_eq!(records[0]["zscore_PSA"], Value::Float(1.25));
    }

    #[tokio::test]
    async fn test_gzip_detected_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.dat");
        let mut encoder = flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::fast());
        encoder.write_all(TSV.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let records = CsvRowSource::new(&path).read_records().await.unwrap();
        assert_eq!(records[1]["axis"], Value::Int(6));
    }

    #[tokio::test]
    async fn test_truncated_gzip_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.tsv.gz");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0x1f, 0x8b, 0x08, 0x00]).unwrap();

        let err = CsvRowSource::new(&path).read_records().await.unwrap_err();
        assert!(matches!(err, DataError::Io(_)));
    }
}
