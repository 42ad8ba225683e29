//! Input containers
//!
//! - [`FeatureTable`]: samples x features numeric matrix
//! - [`TargetSeries`]: one trait value per sample
//! - [`AlignedDataset`]: the two, inner-joined on sample id

mod align;
mod table;
mod target;

pub use align::AlignedDataset;
pub use table::FeatureTable;
pub use target::{TargetSeries, TargetValues};
