use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoilcastError {
    /// Missing sources, too-short series, or values that are invalid after cleaning.
    #[error("data error: {0}")]
    Data(String),

    #[error("scaler error: {0}")]
    Scaler(String),

    #[error("predictor error: {0}")]
    Predictor(String),

    #[error("anomaly error: {0}")]
    Anomaly(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl SoilcastError {
    /// Short stable name of the error kind, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SoilcastError::Data(_) => "DataError",
            SoilcastError::Scaler(_) => "ScalerError",
            SoilcastError::Predictor(_) => "PredictorError",
            SoilcastError::Anomaly(_) => "AnomalyError",
            SoilcastError::Io(_) => "IoError",
            SoilcastError::Serialize(_) => "SerializationError",
            SoilcastError::Csv(_) => "CsvError",
            SoilcastError::Config(_) => "ConfigError",
            SoilcastError::Other(_) => "Error",
        }
    }
}
