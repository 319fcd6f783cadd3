use super::{PropertiesQuantity, PropertiesSet};
use serde::{Deserialize, Serialize};

/// Search-engine metadata, one value per site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoPropertiesSet {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub canonical_url: Option<String>,
    pub no_index: bool,
}

impl PropertiesSet for SeoPropertiesSet {
    const KEY: &'static str = "seo";
    const TITLE: &'static str = "SEO";
    const QUANTITY: PropertiesQuantity = PropertiesQuantity::OnePerSite;
}
