// src/extractor/gemini.rs

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::extractor::ExtracaoError;
use crate::extractor::engine::{MotorExtracao, PROMPT_EXTRACAO};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Motor de extração sobre o Google Gemini (`generateContent` com resposta
/// forçada a JSON).
#[derive(Clone)]
pub struct MotorGemini {
    client: reqwest::Client,
    api_key: String,
    modelo: String,
}

impl MotorGemini {
    pub fn new(api_key: impl Into<String>, modelo: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            modelo: modelo.into(),
        })
    }
}

#[async_trait]
impl MotorExtracao for MotorGemini {
    async fn extrair_campos(&self, texto: &str) -> Result<Value, ExtracaoError> {
        let payload = json!({
            "contents": [{
                "parts": [{ "text": format!("{PROMPT_EXTRACAO}\n\n{texto}") }],
            }],
            "generationConfig": {
                "temperature": 0,
                "responseMimeType": "application/json",
            },
        });

        let url = format!(
            "{API_BASE}/models/{}:generateContent?key={}",
            self.modelo, self.api_key
        );
        let resposta = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ExtracaoError::Motor(e.to_string()))?;

        if !resposta.status().is_success() {
            let status = resposta.status();
            let corpo = resposta.text().await.unwrap_or_default();
            return Err(ExtracaoError::Motor(format!("{status}: {corpo}")));
        }

        let corpo: Value = resposta
            .json()
            .await
            .map_err(|e| ExtracaoError::Motor(e.to_string()))?;
        let conteudo = corpo["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                ExtracaoError::Motor("resposta sem candidates[0].content.parts[0].text".into())
            })?;

        serde_json::from_str(conteudo)
            .map_err(|e| ExtracaoError::PayloadInvalido(format!("conteúdo não é JSON: {e}")))
    }
}
