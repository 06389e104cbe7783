pub mod annotated;
pub mod config;
pub mod error;
pub mod series;
pub mod stats;
pub mod traits;
pub mod types;

pub use annotated::*;
pub use config::*;
pub use error::*;
pub use series::*;
pub use traits::*;
pub use types::*;
