//! Data models for requests, task configurations and results.

mod request;
mod result;
mod task;

pub use request::{encode_params, select_method, serialized_len, HttpMethod, RequestSpec, MAX_GET_URI_LEN};
pub use result::{FetchRecord, MetadataTable, ResultSet, SearchPage};
pub use task::{endpoint, FetchTaskConfig, SearchTaskConfig, EFETCH_PATH, ESEARCH_PATH};
