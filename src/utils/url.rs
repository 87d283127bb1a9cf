//! URL utilities for consistent URL handling
//!
//! Gemini endpoints are addressed as `{base}/models/{model}:{method}`; these
//! helpers keep trailing slashes and `models/` prefixes from doubling up.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use gemchat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://example.com/v1beta"), "https://example.com/v1beta");
/// assert_eq!(normalize_base_url("https://example.com/v1beta///"), "https://example.com/v1beta");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path
///
/// # Examples
///
/// ```
/// use gemchat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://example.com/v1beta/", "/models"),
///     "https://example.com/v1beta/models"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// URL of a model method such as `generateContent`.
///
/// Accepts the model either bare (`gemini-1.5-pro`) or as a resource name
/// (`models/gemini-1.5-pro`).
pub fn model_method_url(base_url: &str, model: &str, method: &str) -> String {
    let model = model.trim().trim_start_matches("models/");
    construct_api_url(base_url, &format!("models/{model}:{method}"))
}
