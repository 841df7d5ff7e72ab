pub mod error;
pub mod reducer;
pub mod runner;
pub mod storage;

// Re-export commonly used types
pub use error::{FlowError, Result};
pub use reducer::Reducer;
pub use runner::FlowRunner;
pub use storage::{InMemorySessionStorage, Session, SessionStorage, SessionUpdate};
