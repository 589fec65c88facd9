use serde::Deserialize;

/// One entry of `GET /api/datasets/{repo}/tree/{revision}/{path}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn is_parquet_file(&self) -> bool {
        self.kind == "file" && self.path.ends_with(".parquet")
    }
}

/// Represents an error response from the hub API.
#[derive(Debug, Clone, Deserialize)]
pub struct HubErrorResponse {
    pub error: String,
}
