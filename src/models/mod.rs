//! Regression model and encoder artifacts

pub mod aggregator;
pub mod encoders;
pub mod inference;
pub mod loader;
pub mod reference;

pub use aggregator::PriceAggregator;
pub use encoders::EncoderTable;
pub use inference::{InferenceEngine, PricePredictor};
pub use loader::ModelLoader;
