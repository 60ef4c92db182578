use serde::{Deserialize, Serialize};

// Body of a successful lookup: {"CountryName": "..."}
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LookupResponse {
    #[serde(rename = "CountryName")]
    pub country_name: String,
}
