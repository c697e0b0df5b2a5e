use crate::error::AppError;
use polars::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Where the accident table comes from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A file on disk; the format is picked from its extension.
    Path(PathBuf),
    /// CSV content handed over in memory, e.g. an uploaded file.
    Upload { name: String, bytes: Arc<[u8]> },
}

impl Source {
    /// A stable identity for caching: canonical path, or name + size + content hash.
    pub fn identity(&self) -> String {
        match self {
            Source::Path(path) => std::fs::canonicalize(path)
                .unwrap_or_else(|_| path.clone())
                .to_string_lossy()
                .to_string(),
            Source::Upload { name, bytes } => {
                let mut hasher = DefaultHasher::new();
                bytes.hash(&mut hasher);
                format!("upload:{}:{}:{:016x}", name, bytes.len(), hasher.finish())
            }
        }
    }
}

/// Picks the data source: the path if it exists, otherwise the upload.
///
/// Fails with [`AppError::SourceNotFound`] when neither is available; callers
/// must stop there rather than continue with an empty table.
pub fn resolve_source(path: &Path, upload: Option<(String, Vec<u8>)>) -> Result<Source, AppError> {
    if path.is_file() {
        return Ok(Source::Path(path.to_path_buf()));
    }
    match upload {
        Some((name, bytes)) if !bytes.is_empty() => Ok(Source::Upload {
            name,
            bytes: bytes.into(),
        }),
        _ => Err(AppError::SourceNotFound(path.to_path_buf())),
    }
}

/// Loads a supported source into a Polars DataFrame.
///
/// CSV columns are all read as strings; the normalizer does the typing.
pub fn load_dataframe(source: &Source) -> Result<DataFrame, AppError> {
    let df = match source {
        Source::Upload { bytes, .. } => csv_options()
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()?,
        Source::Path(path) => {
            if !path.is_file() {
                return Err(AppError::SourceNotFound(path.clone()));
            }
            let extension = path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_lowercase();

            match extension.as_str() {
                "csv" => csv_options()
                    .try_into_reader_with_file_path(Some(path.clone()))?
                    .finish()?,
                "parquet" => ParquetReader::new(File::open(path)?).finish()?,
                "json" | "jsonl" | "ndjson" => JsonReader::new(File::open(path)?)
                    .with_json_format(JsonFormat::JsonLines)
                    .finish()?,
                _ => {
                    return Err(AppError::UnsupportedFormat(
                        path.to_string_lossy().to_string(),
                    ))
                }
            }
        }
    };

    debug!(rows = df.height(), cols = df.width(), "loaded source");
    Ok(df)
}

fn csv_options() -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
}

/// Uniformly samples exactly `min(n, height)` rows without replacement.
///
/// The same input, `n` and `seed` always produce the same rows in the same order.
pub fn subsample(df: &DataFrame, n: usize, seed: u64) -> Result<DataFrame, AppError> {
    let n = n.min(df.height());
    Ok(df.sample_n_literal(n, false, false, Some(seed))?)
}

/// Subsampling parameters; part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sampling {
    pub size: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source: String,
    sampling: Option<Sampling>,
}

/// Loaded tables keyed by (source identity, sample size, seed).
///
/// Entries live as long as the cache; there is no invalidation.
#[derive(Debug, Default)]
pub struct TableCache {
    tables: HashMap<CacheKey, Arc<DataFrame>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached table, reading (and sampling) the source on first use.
    pub fn get_or_load(
        &mut self,
        source: &Source,
        sampling: Option<Sampling>,
    ) -> Result<Arc<DataFrame>, AppError> {
        let key = CacheKey {
            source: source.identity(),
            sampling,
        };
        if let Some(df) = self.tables.get(&key) {
            debug!(source = %key.source, "table cache hit");
            return Ok(Arc::clone(df));
        }

        let mut df = load_dataframe(source)?;
        if let Some(s) = sampling {
            let before = df.height();
            df = subsample(&df, s.size, s.seed)?;
            info!(from = before, to = df.height(), seed = s.seed, "subsampled input");
        }

        let df = Arc::new(df);
        self.tables.insert(key, Arc::clone(&df));
        Ok(df)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::fixtures::{frame, with_typed_timestamps, Row};
    use crate::normalize::normalize;
    use crate::schema::{PipelineConfig, Schema};

    const CSV: &str = "Weather Description,Number of Injuries\nRAIN,1\nCLEAR,\nFOG,0\nRAIN,2\n";

    fn upload(name: &str, body: &str) -> Source {
        Source::Upload {
            name: name.to_string(),
            bytes: body.as_bytes().into(),
        }
    }

    #[test]
    fn csv_upload_reads_strings_and_nulls() {
        let df = load_dataframe(&upload("a.csv", CSV)).unwrap();
        assert_eq!(df.height(), 4);
        let injuries = df.column("Number of Injuries").unwrap();
        assert_eq!(injuries.dtype(), &DataType::String);
        assert_eq!(injuries.null_count(), 1);
    }

    #[test]
    fn missing_path_without_upload_is_source_not_found() {
        let err = resolve_source(Path::new("does/not/exist.csv"), None).unwrap_err();
        assert!(matches!(err, AppError::SourceNotFound(_)));

        let err = resolve_source(Path::new("does/not/exist.csv"), Some(("u".into(), Vec::new())))
            .unwrap_err();
        assert!(matches!(err, AppError::SourceNotFound(_)));
    }

    #[test]
    fn missing_path_falls_back_to_upload() {
        let source =
            resolve_source(Path::new("does/not/exist.csv"), Some(("u.csv".into(), CSV.into()))).unwrap();
        assert!(matches!(source, Source::Upload { .. }));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let path = scratch("data.txt");
        std::fs::write(&path, CSV).unwrap();
        let err = load_dataframe(&Source::Path(path)).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    fn scratch(file: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("crashtab_loader_test");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(file)
    }

    #[test]
    fn parquet_keeps_typed_timestamps() {
        let rows = [
            Row::new("ignored", "RAIN", "DARK - LIGHTED", "1"),
            Row::new("ignored", "CLEAR", "DAYLIGHT", "0"),
        ];
        let mut df = with_typed_timestamps(frame(&rows), &[Some("2019-01-18 22:45"), Some("2019-01-19 08:05")]);
        let path = scratch("typed.parquet");
        ParquetWriter::new(File::create(&path).unwrap()).finish(&mut df).unwrap();

        let loaded = load_dataframe(&Source::Path(path)).unwrap();
        assert_eq!(loaded.height(), 2);
        assert!(matches!(loaded.column("Date and Time").unwrap().dtype(), DataType::Datetime(_, _)));

        let out = normalize(&loaded, &Schema::default(), &PipelineConfig::default()).unwrap();
        assert_eq!(out.report.rows_out, 2);
        assert_eq!(out.report.malformed_timestamp, 0);
        assert_eq!(out.table.records[0].time.hour, 22);
        assert_eq!(out.table.records[1].weather, "CLEAR");
    }

    #[test]
    fn ndjson_with_numbers_and_flags_normalizes() {
        let line = |number: u64, stamp: &str, injuries: u32, hit_and_run: bool, weather: &str| {
            format!(
                concat!(
                    r#"{{"Accident Number": {}, "Date and Time": "{}", "Number of Motor Vehicles": 2, "#,
                    r#""Number of Injuries": {}, "Number of Fatalities": 0, "Hit and Run": {}, "#,
                    r#""Reporting Officer": "4521", "Collision Type Description": "ANGLE", "#,
                    r#""Weather Description": "{}", "Illumination Description": "DAYLIGHT", "#,
                    r#""Street Address": "100 BROADWAY", "Precinct": "CENTRAL", "#,
                    r#""Latitude": 36.1627, "Longitude": -86.7816, "#,
                    r#""HarmfulDescriptions": "MOTOR VEHICLE IN TRANSPORT"}}"#
                ),
                number, stamp, injuries, hit_and_run, weather
            )
        };
        let body = [
            line(20190001, "01/18/2019 10:45:00 PM", 1, true, "RAIN"),
            line(20190002, "01/19/2019 08:05:00 AM", 0, false, "CLEAR"),
            line(20190003, "01/20/2019 09:00:00 AM", 0, false, "UNKNOWN"),
        ]
        .join("\n");
        let path = scratch("accidents.ndjson");
        std::fs::write(&path, body).unwrap();

        let loaded = load_dataframe(&Source::Path(path)).unwrap();
        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.column("Hit and Run").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(loaded.column("Number of Injuries").unwrap().dtype(), &DataType::Int64);

        let out = normalize(&loaded, &Schema::default(), &PipelineConfig::default()).unwrap();
        assert_eq!(out.report.rows_out, 2);
        assert_eq!(out.report.excluded, 1);
        let first = &out.table.records[0];
        assert_eq!(first.accident_number, "20190001");
        assert_eq!((first.injuries, first.vehicles), (1, 2));
        assert!(first.hit_and_run);
        assert!(!out.table.records[1].hit_and_run);
        assert!((first.latitude - 36.1627).abs() < 1e-9);
    }

    #[test]
    fn subsample_is_bounded_and_reproducible() {
        let df = load_dataframe(&upload("a.csv", CSV)).unwrap();
        let a = subsample(&df, 2, 7).unwrap();
        let b = subsample(&df, 2, 7).unwrap();
        assert_eq!(a.height(), 2);
        assert!(a.equals_missing(&b));

        let all = subsample(&df, 100, 7).unwrap();
        assert_eq!(all.height(), 4);
    }

    #[test]
    fn cache_returns_same_table_per_key() {
        let mut cache = TableCache::new();
        let source = upload("a.csv", CSV);
        let sampling = Some(Sampling { size: 3, seed: 1 });

        let first = cache.get_or_load(&source, sampling).unwrap();
        let second = cache.get_or_load(&source, sampling).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let other = cache.get_or_load(&source, Some(Sampling { size: 3, seed: 2 })).unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn upload_identity_depends_on_content() {
        assert_eq!(upload("a", CSV).identity(), upload("a", CSV).identity());
        assert_ne!(upload("a", CSV).identity(), upload("a", "x\n1\n").identity());
    }
}
