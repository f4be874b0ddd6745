//! Per-slot activation statistics
//!
//! A slot's accumulator holds the running minimum and maximum of every value
//! observed during calibration. The first observation initializes the range
//! directly; later ones widen it. Merging is associative and commutative, so
//! the order of calibration batches never changes the derived parameters.

mod accumulator;


pub use accumulator::StatisticsAccumulator;
