use thiserror::Error;

/// Failures from the resilient fetch layer. `Request`, `Status` and `Body`
/// are transient and retried internally; callers only see them wrapped in
/// `Exhausted` once the retry budget is spent.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },

    #[error("failed to read ZIP archive: {0}")]
    ZipArchive(#[from] zip::result::ZipError),

    #[error("failed to extract ZIP member: {0}")]
    ZipRead(#[from] std::io::Error),

    #[error("invalid member pattern {pattern:?}: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("no file matching pattern {0:?} found in ZIP")]
    NoZipMember(String),
}

/// Fatal adapter failures. A parse either fully succeeds (possibly with a
/// warning in the series meta) or fails with one of these; there is no
/// partial result.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("CSV header row not found (no row matched anchor {anchor:?})")]
    HeaderNotFound { anchor: &'static str },

    #[error("required columns {missing:?} not found in header {found:?}")]
    MissingColumns {
        missing: Vec<&'static str>,
        found: Vec<String>,
    },

    #[error("invalid time format at line {line}: {value:?}")]
    InvalidTime { line: usize, value: String },

    #[error("invalid hour at line {line}: {value:?}")]
    InvalidHour { line: usize, value: String },

    #[error("hour out of range (0-23) at line {line}: {value}")]
    HourOutOfRange { line: usize, value: i64 },

    #[error("invalid {column} value at line {line}: {value:?}")]
    InvalidValue {
        line: usize,
        column: &'static str,
        value: String,
    },

    #[error("invalid date {0:?} (expected YYYY-MM-DD, YYYY/MM/DD or YYYYMMDD)")]
    InvalidDate(String),

    #[error("no data found for date {date}")]
    NoData { date: String },

    #[error("failed to decode {encoding} input")]
    Encoding { encoding: &'static str },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV read error at line {line}: {source}")]
    Csv {
        line: usize,
        #[source]
        source: csv::Error,
    },
}

/// Validation failures from the generation estimator.
#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("empty demand or price series")]
    EmptyInput,

    #[error("demand and price series lengths differ ({demand} vs {prices})")]
    LengthMismatch { demand: usize, prices: usize },

    #[error("demand and price timestamps diverge at index {index}")]
    Misaligned { index: usize },

    #[error("invalid series date {0:?}")]
    BadDate(String),
}
