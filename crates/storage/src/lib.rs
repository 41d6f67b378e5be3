pub mod array;
pub mod error;
pub mod reports;
pub mod store;

pub use array::{labeled_windows, NumericArray, ARRAY_FORMAT_VERSION};
pub use error::StorageError;
pub use reports::{AnomalyReport, ForecastReport};
pub use store::{ArtifactStore, StoredWindows};
