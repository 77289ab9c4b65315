pub mod classifier;
pub mod probe;
pub mod rates;
pub mod source;
pub mod stats;
pub mod window;
