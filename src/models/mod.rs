pub mod alert;
pub mod cycle;
pub mod item;
pub mod snapshot;

// Re-exports for convenience
pub use alert::*;
pub use cycle::*;
pub use item::*;
pub use snapshot::*;
