pub mod storage;
pub mod tree;
pub mod report;
pub mod loader;
pub mod cli;
pub mod error;

pub use error::{DbError, DbResult};
pub use storage::layout::Schema;
pub use storage::record::Record;
pub use tree::cursor::NodeEntry;
pub use tree::{AvlTree, InsertOutcome, TreeStats};
