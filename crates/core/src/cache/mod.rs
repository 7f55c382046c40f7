mod error;
mod keys;
mod serialization;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{
    build_cache_key, build_items_cache_map, build_key, cache_key_for_record, record_to_item,
    CACHE_KEY_PREFIX,
};
pub use serialization::{deserialize_record, serialize_record, SerializationError};
pub use traits::Cache;
