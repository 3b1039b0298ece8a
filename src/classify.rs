use serde::{Deserialize, Serialize};

pub const DEFAULT_BRAND: &str = "Generic";
pub const DEFAULT_CATEGORY: &str = "Electronics";

/// Ordered brand/category vocabulary for one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub brands: Vec<String>,
    pub categories: Vec<String>,
    #[serde(default = "default_brand")]
    pub default_brand: String,
    #[serde(default = "default_category")]
    pub default_category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub brand: String,
    pub category: String,
}

impl Vocabulary {
    pub fn new(brands: &[&str], categories: &[&str]) -> Self {
        Self {
            brands: brands.iter().map(|s| s.to_string()).collect(),
            categories: categories.iter().map(|s| s.to_string()).collect(),
            default_brand: default_brand(),
            default_category: default_category(),
        }
    }

    /// First vocabulary entry found in `name` wins, case-insensitively.
    pub fn classify(&self, name: &str) -> Classification {
        let haystack = name.to_lowercase();
        Classification {
            brand: self
                .brand_of(&haystack)
                .unwrap_or(self.default_brand.as_str())
                .to_string(),
            category: self
                .category_of(&haystack)
                .unwrap_or(self.default_category.as_str())
                .to_string(),
        }
    }

    /// `haystack` must already be lowercased.
    pub fn brand_of(&self, haystack: &str) -> Option<&str> {
        first_match(&self.brands, haystack)
    }

    /// `haystack` must already be lowercased.
    pub fn category_of(&self, haystack: &str) -> Option<&str> {
        first_match(&self.categories, haystack)
    }
}

fn first_match<'a>(entries: &'a [String], haystack: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|entry| !entry.is_empty() && haystack.contains(&entry.to_lowercase()))
        .map(String::as_str)
}

fn default_brand() -> String {
    DEFAULT_BRAND.to_string()
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}
