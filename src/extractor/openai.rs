// src/extractor/openai.rs

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::extractor::ExtracaoError;
use crate::extractor::engine::{MotorExtracao, PROMPT_EXTRACAO};

/// Motor de extração sobre uma API compatível com OpenAI (chat completions
/// com `response_format: json_object`).
#[derive(Clone)]
pub struct MotorOpenAi {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    modelo: String,
}

impl MotorOpenAi {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        modelo: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            modelo: modelo.into(),
        })
    }
}

#[async_trait]
impl MotorExtracao for MotorOpenAi {
    async fn extrair_campos(&self, texto: &str) -> Result<Value, ExtracaoError> {
        let payload = json!({
            "model": self.modelo,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": PROMPT_EXTRACAO },
                { "role": "user", "content": texto },
            ],
        });

        let resposta = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
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
        let conteudo = corpo["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ExtracaoError::Motor("resposta sem choices[0].message.content".into()))?;

        serde_json::from_str(conteudo)
            .map_err(|e| ExtracaoError::PayloadInvalido(format!("conteúdo não é JSON: {e}")))
    }
}
