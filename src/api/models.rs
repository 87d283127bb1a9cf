use crate::api::{ApiError, ModelInfo, ModelsResponse};
use crate::utils::url::construct_api_url;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Lists every model visible to `api_key`, following pagination.
pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<Vec<ModelInfo>, ApiError> {
    let models_url = construct_api_url(base_url, "models");
    let mut models = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut request = client
            .get(&models_url)
            .header(API_KEY_HEADER, api_key)
            .query(&[("pageSize", "1000")]);
        if let Some(token) = page_token.as_deref() {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::from_response(status, &error_text));
        }

        let page = response.json::<ModelsResponse>().await?;
        models.extend(page.models);
        match page.next_page_token.filter(|token| !token.is_empty()) {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(models)
}

/// Chat-capable models first, each group ordered by id.
pub fn sort_models(models: &mut [ModelInfo]) {
    models.sort_by(|a, b| {
        b.supports_chat()
            .cmp(&a.supports_chat())
            .then_with(|| a.id().cmp(b.id()))
    });
}
