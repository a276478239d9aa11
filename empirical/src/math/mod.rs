pub use arima::*;
pub use decompose::*;
pub use metrics::*;
pub use optimize::*;
pub use regression::*;
pub use stationarity::*;
pub use statistics::*;

pub mod arima;
pub mod decompose;
pub mod metrics;
pub mod optimize;
pub mod regression;
pub mod stationarity;
pub mod statistics;
