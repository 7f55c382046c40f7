mod error;
mod http_mapping;
mod traits;
mod types;

pub use error::{KeyError, Result, StoreError, TableError};
pub use http_mapping::table_error_to_status_code;
pub use traits::TableStore;
pub use types::{
    AttributeNames, Condition, GetItemInput, Item, ItemsDetails, ItemsPage, KeySchema,
    KeySchemaElement, KeyType, PrimaryKey, QueryInput, ScanInput, UpdateRequest,
};
