pub mod collector;
pub mod executor;
pub mod model;
pub mod report;
pub mod resolver;
pub mod traits;

// Re-export common types for convenience
pub use collector::*;
pub use executor::*;
pub use model::*;
pub use report::*;
pub use resolver::{GoContext, GoResolver};
pub use traits::*;
