pub mod desk;
pub mod failing_store;
pub mod fixtures;

pub use desk::TestDesk;
pub use failing_store::FailingStore;
pub use fixtures::*;
