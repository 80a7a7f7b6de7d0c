//! Request parameters handed to a dataset and the responses it produces.

use std::collections::HashMap;

use wms_common::{WmsError, WmsResult};

/// Content type of empty responses unless the caller asks otherwise.
pub const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Largest WIDTH or HEIGHT accepted for an image response.
pub const MAX_IMAGE_DIMENSION: usize = 8192;

/// Query parameters of a WMS request. Keys are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WmsRequest {
    params: HashMap<String, String>,
}

impl WmsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> WmsResult<&str> {
        self.get(key)
            .ok_or_else(|| WmsError::MissingParameter(key.to_ascii_uppercase()))
    }

    /// A required parameter that must be a positive integer.
    pub fn positive_int(&self, key: &str) -> WmsResult<usize> {
        let raw = self.require(key)?;
        match raw.trim().parse::<usize>() {
            Ok(v) if v > 0 => Ok(v),
            _ => Err(WmsError::InvalidParameter {
                param: key.to_ascii_uppercase(),
                message: format!("'{}' is not a positive integer", raw),
            }),
        }
    }

    /// An image WIDTH or HEIGHT: a positive integer up to
    /// [`MAX_IMAGE_DIMENSION`].
    pub fn image_dimension(&self, key: &str) -> WmsResult<usize> {
        let value = self.positive_int(key)?;
        if value > MAX_IMAGE_DIMENSION {
            return Err(WmsError::InvalidParameter {
                param: key.to_ascii_uppercase(),
                message: format!("{} exceeds the maximum of {}", value, MAX_IMAGE_DIMENSION),
            });
        }
        Ok(value)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for WmsRequest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
                .collect(),
        }
    }
}

/// An encoded response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WmsResponse {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// A transparent canvas sized by the request's `width` and `height`.
pub fn empty_response(request: &WmsRequest, content_type: Option<&str>) -> WmsResult<WmsResponse> {
    let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
    if content_type != DEFAULT_CONTENT_TYPE {
        return Err(WmsError::UnsupportedFormat(content_type.to_string()));
    }

    let width = request.image_dimension("width")?;
    let height = request.image_dimension("height")?;
    let body = renderer::blank_canvas(width, height).map_err(WmsError::InternalError)?;

    Ok(WmsResponse {
        content_type: content_type.to_string(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_case_insensitive() {
        let req: WmsRequest = [("WIDTH", "256"), ("Height", "128")].into_iter().collect();
        assert_eq!(req.get("width"), Some("256"));
        assert_eq!(req.positive_int("HEIGHT").unwrap(), 128);
    }

    #[test]
    fn test_empty_response_png() {
        let req = WmsRequest::new().with("width", "64").with("height", "32");
        let resp = empty_response(&req, None).unwrap();
        assert_eq!(resp.content_type, "image/png");
        assert_eq!(&resp.body[1..4], b"PNG");
        // IHDR width and height
        assert_eq!(&resp.body[16..20], &64u32.to_be_bytes());
        assert_eq!(&resp.body[20..24], &32u32.to_be_bytes());
    }

    #[test]
    fn test_empty_response_bad_params() {
        let req = WmsRequest::new().with("width", "0").with("height", "32");
        assert!(matches!(
            empty_response(&req, None),
            Err(WmsError::InvalidParameter { .. })
        ));

        let req = WmsRequest::new().with("width", "64");
        assert!(matches!(
            empty_response(&req, None),
            Err(WmsError::MissingParameter(p)) if p == "HEIGHT"
        ));

        let req = WmsRequest::new().with("width", "64").with("height", "32");
        assert!(matches!(
            empty_response(&req, Some("image/jpeg")),
            Err(WmsError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_empty_response_rejects_oversized_images() {
        let huge = (usize::MAX / 2).to_string();
        let req = WmsRequest::new().with("width", huge).with("height", "3");
        assert!(matches!(
            empty_response(&req, None),
            Err(WmsError::InvalidParameter { param, .. }) if param == "WIDTH"
        ));

        let req = WmsRequest::new().with("width", "4294967297").with("height", "1");
        assert!(matches!(
            empty_response(&req, None),
            Err(WmsError::InvalidParameter { .. })
        ));

        let req = WmsRequest::new().with("width", "1").with("height", "8193");
        assert!(matches!(
            empty_response(&req, None),
            Err(WmsError::InvalidParameter { param, .. }) if param == "HEIGHT"
        ));

        let max = MAX_IMAGE_DIMENSION.to_string();
        let req = WmsRequest::new().with("width", max).with("height", "1");
        assert!(empty_response(&req, None).is_ok());
    }
}
