//! Dataset name rules and the identifiers derived from a name.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{WmsError, WmsResult};

/// Longest accepted dataset name.
pub const MAX_NAME_LEN: usize = 200;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[_0-9A-Za-z]+$").unwrap());
static SLUG_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SLUG_DASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Check a dataset name: `_`, digits and ASCII letters only.
pub fn validate_dataset_name(name: &str) -> WmsResult<()> {
    let invalid = |reason: &str| WmsError::InvalidDatasetName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is longer than 200 characters"));
    }
    if !NAME_RE.is_match(name) {
        return Err(invalid("only '_', digits and A-Z are allowed"));
    }
    Ok(())
}

/// File-system safe stem for cache files: alphanumerics only, trailing
/// whitespace trimmed.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// URL slug: lowercase, punctuation dropped, whitespace and dash runs
/// collapsed into a single dash.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = SLUG_STRIP_RE.replace_all(&lowered, "");
    SLUG_DASH_RE
        .replace_all(stripped.trim(), "-")
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("gfs_ocean_2015"), "gfsocean2015");
        assert_eq!(safe_filename("my data!"), "mydata");
        assert_eq!(safe_filename("___"), "");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("COAWST_4_use_best"), "coawst_4_use_best");
        assert_eq!(slugify("  Gulf of Maine -- forecast "), "gulf-of-maine-forecast");
        assert_eq!(slugify("sst (daily)"), "sst-daily");
    }

    #[test]
    fn test_validate_dataset_name() {
        assert!(validate_dataset_name("sci_wms_2015").is_ok());
        assert!(validate_dataset_name("").is_err());
        assert!(validate_dataset_name("has space").is_err());
        assert!(validate_dataset_name("dash-ed").is_err());
        assert!(validate_dataset_name(&"a".repeat(201)).is_err());
        assert!(matches!(
            validate_dataset_name("bad.name"),
            Err(WmsError::InvalidDatasetName { .. })
        ));
    }
}
