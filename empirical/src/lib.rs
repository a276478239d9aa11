pub use bar::*;
pub use data::*;
pub use error::*;
pub use logger::*;
pub use math::*;
pub use plot::*;
pub use provider::*;
pub use self::time::*;

pub mod bar;
pub mod data;
pub mod error;
pub mod logger;
pub mod macros;
pub mod math;
pub mod plot;
pub mod provider;
pub mod time;
