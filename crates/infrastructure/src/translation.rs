//! HTTP 翻译服务客户端（LibreTranslate 兼容接口）

use std::time::Duration;

use application::{HealthProbe, TranslationError, Translator};
use async_trait::async_trait;
use config::TranslationConfig;
use domain::LanguageCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

#[derive(Clone)]
pub struct HttpTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(config: &TranslationConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(
            client,
            &config.base_url,
            config.api_key.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

fn request_error(err: reqwest::Error) -> TranslationError {
    if err.is_timeout() {
        TranslationError::Timeout
    } else {
        TranslationError::Provider(err.to_string())
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<String, TranslationError> {
        let request = TranslateRequest {
            q: text,
            source: source.as_str(),
            target: target.as_str(),
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(self.endpoint("translate"))
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::Provider(format!("HTTP {status}: {body}")));
        }

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|err| TranslationError::Malformed(err.to_string()))?;

        match body.translated_text {
            Some(text) if !text.trim().is_empty() => {
                debug!(source = %source, target = %target, "翻译完成");
                Ok(text)
            }
            _ => Err(TranslationError::Malformed("missing translatedText".into())),
        }
    }
}

#[async_trait]
impl HealthProbe for HttpTranslator {
    fn name(&self) -> &'static str {
        "translation"
    }

    async fn is_healthy(&self) -> bool {
        match self.client.get(self.endpoint("languages")).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(error = %err, "翻译服务探测失败");
                false
            }
        }
    }
}
