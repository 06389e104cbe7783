pub mod models;
pub mod engine;
pub mod signals;
pub mod statistical;


pub use models::*;
pub use engine::{evaluate, evaluate_signal, BacktestEngine};
pub use signals::{IndicatorSignal, PatternSource, SignalRule};
