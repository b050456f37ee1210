pub mod layout;
pub mod record;
pub mod node_file;
pub mod freelist;
