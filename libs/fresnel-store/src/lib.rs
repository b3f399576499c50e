pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use fresnel_api::record::Record;

/// Next identifier for a collection: smallest positive integer greater
/// than every existing numeric id, as a decimal string. Non-numeric ids
/// are ignored for the purpose of the counter.
pub(crate) fn next_id(records: &[Record]) -> String {
    let max = records
        .iter()
        .filter_map(|r| r.id.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    (max + 1).to_string()
}
