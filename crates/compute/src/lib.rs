pub mod pipeline;
pub mod predictor;

pub use pipeline::align::{Aligner, BinnedSeries};
pub use pipeline::anomaly::{
    calibrate, classify, compute_errors, AnomalyProfile, AnomalySummary, RankedAnomaly,
};
pub use pipeline::evaluate::{evaluate, EvaluationReport};
pub use pipeline::forecast::{denormalize, first_crossing, ForecastResult, ForecastRoller};
pub use pipeline::metrics::PipelineMetrics;
pub use pipeline::scaler::{ChannelRange, ScalerModel, ScalerParams, SCALER_PARAMS_VERSION};
pub use pipeline::split::{split, train_row_count, Split};
pub use pipeline::window::{build_windows, latest_window, LabeledWindow, Window};
pub use pipeline::{Pipeline, PreparedData};
pub use predictor::{
    predict_checked, LinearModelFile, LinearPredictor, PersistencePredictor, Predictor,
};
