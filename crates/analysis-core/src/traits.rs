use crate::{AnnotatedSeries, Direction, Occurrence};

/// Anything that can scan an annotated series for occurrences of a named,
/// directional event: a candlestick pattern, an indicator threshold, a crossover.
///
/// Implementations must be pure: the same series yields the same occurrences.
pub trait SignalSource: Send + Sync {
    /// Stable identifier, used as the backtest's signal name.
    fn name(&self) -> &str;

    /// Price direction the event is expected to precede.
    fn expected(&self) -> Direction;

    fn scan(&self, series: &AnnotatedSeries) -> Vec<Occurrence>;
}
