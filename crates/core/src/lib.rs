pub mod config;
pub mod error;
pub mod sample;
pub mod series;

pub use config::Config;
pub use error::*;
pub use sample::*;
pub use series::AlignedSeries;
