use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;

/// Required config fields, in the order they are reported when missing.
const REQUIRED_FIELDS: &[&str] = &[
    "view_name",
    "output_file",
    "header_logo",
    "header_title",
    "page_title",
];

/// One catalog variant: which view to pull and how to present it.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub view_name: String,
    pub output_file: PathBuf,
    pub header_logo: String,
    pub header_title: String,
    pub page_title: String,
    pub include_purchase_button: bool,
}

/// Raw parse target: every field optional so a single load can report
/// all missing fields at once instead of failing on the first.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    view_name: Option<String>,
    output_file: Option<String>,
    header_logo: Option<String>,
    header_title: Option<String>,
    page_title: Option<String>,
    include_purchase_button: Option<bool>,
}

impl CatalogConfig {
    /// Load and validate a catalog configuration from a JSON file.
    ///
    /// Only presence of the required keys is checked; malformed values
    /// (bad paths, broken asset references) surface later as empty output
    /// or write failures.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CatalogError::ConfigNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(CatalogError::ConfigInvalid(e.to_string())),
        };

        let raw: RawConfig = serde_json::from_str(&content)
            .map_err(|e| CatalogError::ConfigInvalid(e.to_string()))?;

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|&&field| match field {
                "view_name" => raw.view_name.is_none(),
                "output_file" => raw.output_file.is_none(),
                "header_logo" => raw.header_logo.is_none(),
                "header_title" => raw.header_title.is_none(),
                "page_title" => raw.page_title.is_none(),
                _ => unreachable!(),
            })
            .map(|&field| field.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(CatalogError::ConfigIncomplete(missing));
        }

        Ok(CatalogConfig {
            view_name: raw.view_name.unwrap(),
            output_file: PathBuf::from(raw.output_file.unwrap()),
            header_logo: raw.header_logo.unwrap(),
            header_title: raw.header_title.unwrap(),
            page_title: raw.page_title.unwrap(),
            include_purchase_button: raw.include_purchase_button.unwrap_or(false),
        })
    }
}
