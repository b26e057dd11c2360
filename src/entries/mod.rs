pub mod normalize;
pub mod repository;
pub mod store;

pub use repository::{new_entry_id, EntryRepository};
pub use store::{EntryStore, STORAGE_KEY};
