pub mod soul;
pub mod store;

pub use soul::Soul;
pub use store::{is_structured, kind_of, GraphStore, Stored};
