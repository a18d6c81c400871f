use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Image backend contract: one prompt in, one displayable data URL out.
#[async_trait]
pub trait ImageClient: Send + Sync + Debug {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub fn create_image_client(config: &Config) -> Result<Box<dyn ImageClient>> {
    let api_key = config
        .image_api_key()
        .context("No API key available for image generation")?;
    Ok(Box::new(ImagenClient::new(
        api_key,
        &config.image.model,
        &config.image.aspect_ratio,
    )))
}

#[derive(Debug)]
pub struct ImagenClient {
    api_key: String,
    model: String,
    aspect_ratio: String,
    client: reqwest::Client,
}

impl ImagenClient {
    pub fn new(api_key: &str, model: &str, aspect_ratio: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            aspect_ratio: aspect_ratio.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    aspect_ratio: String,
    output_mime_type: String,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: Option<String>,
}

#[async_trait]
impl ImageClient for ImagenClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:predict?key={}",
            self.model, self.api_key
        );

        let request_body = PredictRequest {
            instances: vec![PredictInstance {
                prompt: prompt.to_string(),
            }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: self.aspect_ratio.clone(),
                output_mime_type: "image/png".to_string(),
            },
        };

        log::debug!("Imagen request to {} for prompt: {}", self.model, prompt);

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Imagen API error: {}", error_text));
        }

        let response_text = resp.text().await?;
        let result: PredictResponse = serde_json::from_str(&response_text).map_err(|e| {
            anyhow!(
                "Failed to parse Imagen response: {}. Body: {}",
                e,
                truncate(&response_text, 500)
            )
        })?;

        let bytes = result
            .predictions
            .first()
            .and_then(|p| p.bytes_base64_encoded.as_ref())
            .ok_or_else(|| anyhow!("Imagen API did not return any images."))?;

        Ok(format!("data:image/png;base64,{}", bytes))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_response_parsing_success() {
        let json = r#"{
            "predictions": [
                { "bytesBase64Encoded": "aGVsbG8=", "mimeType": "image/png" }
            ]
        }"#;
        let result: PredictResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            result.predictions[0].bytes_base64_encoded.as_deref(),
            Some("aGVsbG8=")
        );
    }

    #[test]
    fn predict_response_parsing_empty() {
        let result: PredictResponse = serde_json::from_str("{}").unwrap();
        assert!(result.predictions.is_empty());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
