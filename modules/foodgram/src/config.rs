use serde::{Deserialize, Serialize};

/// `modules.foodgram` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct FoodgramConfig {
    /// Page size when the request has no `limit`.
    pub default_page_size: u64,
    /// Upper bound for `limit`.
    pub max_page_size: u64,
    /// Directory for uploaded recipe images, served under `/media`.
    pub media_root: String,
    /// Default directory for `import-data`.
    pub data_dir: String,
}

impl Default for FoodgramConfig {
    fn default() -> Self {
        Self {
            default_page_size: 6,
            max_page_size: 100,
            media_root: "media".to_string(),
            data_dir: "data".to_string(),
        }
    }
}
