// src/gateway/http.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::gateway::{CodigoPendente, DistribuidoraGateway, GatewayError, Sessao, UnidadeDescritor};
use crate::models::unidade::ChaveUnidade;

// --- Formas de fio da agência virtual ---

#[derive(Debug, Serialize)]
struct LoginRequisicao<'a> {
    login: &'a str,
    senha: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResposta {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnidadeRemota {
    codigo: String,
    digito_verificador: String,
    codigo_empresa: String,
    #[serde(default)]
    endereco: Option<String>,
    #[serde(default)]
    titular_documento: Option<String>,
    #[serde(default)]
    geradora: bool,
    #[serde(default)]
    ativa: bool,
    #[serde(default)]
    cortada: bool,
    #[serde(default)]
    desligada: bool,
    #[serde(default)]
    contrato_ativo: bool,
    #[serde(default)]
    geradora_codigo: Option<String>,
    #[serde(default)]
    geradora_digito_verificador: Option<String>,
    #[serde(default)]
    percentual_rateio: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct ProtocoloResposta {
    protocolo: String,
}

#[derive(Debug, Deserialize)]
struct MensagemResposta {
    mensagem: String,
}

/// Cliente HTTP da agência virtual da distribuidora.
#[derive(Clone)]
pub struct GatewayHttp {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayHttp {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, caminho: &str) -> String {
        format!("{}{}", self.base_url, caminho)
    }
}

/// Converte falhas do próprio `reqwest` (timeout, conexão recusada) em erro
/// de transporte, sempre retentável.
fn erro_envio(e: reqwest::Error) -> GatewayError {
    GatewayError::Transporte(e.to_string())
}

/// Mapeia um status HTTP de erro para a taxonomia do gateway.
fn erro_por_status(status: StatusCode, corpo: String) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Autenticacao(corpo),
        StatusCode::NOT_FOUND => GatewayError::NaoEncontrado,
        StatusCode::UNPROCESSABLE_ENTITY => GatewayError::CodigoInvalido,
        StatusCode::GONE => GatewayError::Expirado,
        s if s.is_server_error() => GatewayError::Transporte(format!("{s}: {corpo}")),
        s => GatewayError::Protocolo(format!("{s}: {corpo}")),
    }
}

async fn checar(resposta: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = resposta.status();
    if status.is_success() {
        return Ok(resposta);
    }
    let corpo = resposta.text().await.unwrap_or_default();
    Err(erro_por_status(status, corpo))
}

impl From<UnidadeRemota> for UnidadeDescritor {
    fn from(u: UnidadeRemota) -> Self {
        let geradora_chave = match (u.geradora_codigo, u.geradora_digito_verificador) {
            (Some(codigo), Some(digito_verificador)) => Some(ChaveUnidade {
                codigo,
                digito_verificador,
                codigo_empresa: u.codigo_empresa.clone(),
            }),
            _ => None,
        };
        UnidadeDescritor {
            chave: ChaveUnidade {
                codigo: u.codigo,
                digito_verificador: u.digito_verificador,
                codigo_empresa: u.codigo_empresa,
            },
            endereco: u.endereco,
            titular_documento: u.titular_documento,
            geradora: u.geradora,
            ativa: u.ativa,
            cortada: u.cortada,
            desligada: u.desligada,
            contrato_ativo: u.contrato_ativo,
            geradora_chave,
            percentual_rateio: u.percentual_rateio,
        }
    }
}

#[async_trait]
impl DistribuidoraGateway for GatewayHttp {
    async fn autenticar(&self, login: &str, senha: &str) -> Result<Sessao, GatewayError> {
        let resposta = self
            .client
            .post(self.url("/api/v1/sessao"))
            .json(&LoginRequisicao { login, senha })
            .send()
            .await
            .map_err(erro_envio)?;
        let corpo: LoginResposta = checar(resposta)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Protocolo(e.to_string()))?;
        Ok(Sessao { token: corpo.token })
    }

    async fn listar_unidades(&self, sessao: &Sessao) -> Result<Vec<UnidadeDescritor>, GatewayError> {
        let resposta = self
            .client
            .get(self.url("/api/v1/unidades"))
            .bearer_auth(&sessao.token)
            .send()
            .await
            .map_err(erro_envio)?;
        let remotas: Vec<UnidadeRemota> = checar(resposta)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Protocolo(e.to_string()))?;
        Ok(remotas.into_iter().map(Into::into).collect())
    }

    async fn buscar_fatura(
        &self,
        sessao: &Sessao,
        chave: &ChaveUnidade,
        mes: i32,
        ano: i32,
    ) -> Result<String, GatewayError> {
        let caminho = format!(
            "/api/v1/unidades/{}/{}-{}/faturas/{}/{:02}",
            chave.codigo_empresa, chave.codigo, chave.digito_verificador, ano, mes
        );
        let resposta = self
            .client
            .get(self.url(&caminho))
            .bearer_auth(&sessao.token)
            .send()
            .await
            .map_err(erro_envio)?;
        checar(resposta)
            .await?
            .text()
            .await
            .map_err(|e| GatewayError::Protocolo(e.to_string()))
    }

    async fn solicitar_codigo_gestor(
        &self,
        sessao: &Sessao,
        chave: &ChaveUnidade,
        documento: &str,
    ) -> Result<CodigoPendente, GatewayError> {
        let resposta = self
            .client
            .post(self.url("/api/v1/gestor/codigos"))
            .bearer_auth(&sessao.token)
            .json(&serde_json::json!({
                "codigo": chave.codigo,
                "digitoVerificador": chave.digito_verificador,
                "codigoEmpresa": chave.codigo_empresa,
                "documento": documento,
            }))
            .send()
            .await
            .map_err(erro_envio)?;
        let corpo: ProtocoloResposta = checar(resposta)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Protocolo(e.to_string()))?;
        Ok(CodigoPendente {
            protocolo: corpo.protocolo,
        })
    }

    async fn confirmar_codigo_gestor(
        &self,
        sessao: &Sessao,
        protocolo: &str,
        codigo: &str,
    ) -> Result<String, GatewayError> {
        let caminho = format!("/api/v1/gestor/codigos/{protocolo}/confirmacao");
        let resposta = self
            .client
            .post(self.url(&caminho))
            .bearer_auth(&sessao.token)
            .json(&serde_json::json!({ "codigo": codigo }))
            .send()
            .await
            .map_err(erro_envio)?;
        let corpo: MensagemResposta = checar(resposta)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Protocolo(e.to_string()))?;
        Ok(corpo.mensagem)
    }

    async fn conceder_acesso_direto(
        &self,
        sessao: &Sessao,
        chave: &ChaveUnidade,
        documento: &str,
    ) -> Result<String, GatewayError> {
        let resposta = self
            .client
            .post(self.url("/api/v1/gestor/acessos"))
            .bearer_auth(&sessao.token)
            .json(&serde_json::json!({
                "codigo": chave.codigo,
                "digitoVerificador": chave.digito_verificador,
                "codigoEmpresa": chave.codigo_empresa,
                "documento": documento,
            }))
            .send()
            .await
            .map_err(erro_envio)?;
        let corpo: MensagemResposta = checar(resposta)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Protocolo(e.to_string()))?;
        Ok(corpo.mensagem)
    }

    async fn encerrar_sessao(&self, sessao: Sessao) {
        let resultado = self
            .client
            .delete(self.url("/api/v1/sessao"))
            .bearer_auth(&sessao.token)
            .send()
            .await;
        if let Err(e) = resultado {
            tracing::debug!("falha ao encerrar sessão na distribuidora: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_http_mapeia_para_taxonomia() {
        assert!(matches!(
            erro_por_status(StatusCode::UNAUTHORIZED, String::new()),
            GatewayError::Autenticacao(_)
        ));
        assert!(matches!(
            erro_por_status(StatusCode::NOT_FOUND, String::new()),
            GatewayError::NaoEncontrado
        ));
        assert!(matches!(
            erro_por_status(StatusCode::UNPROCESSABLE_ENTITY, String::new()),
            GatewayError::CodigoInvalido
        ));
        assert!(matches!(
            erro_por_status(StatusCode::GONE, String::new()),
            GatewayError::Expirado
        ));
        assert!(matches!(
            erro_por_status(StatusCode::BAD_GATEWAY, String::new()),
            GatewayError::Transporte(_)
        ));
        assert!(matches!(
            erro_por_status(StatusCode::IM_A_TEAPOT, String::new()),
            GatewayError::Protocolo(_)
        ));
    }

    #[test]
    fn somente_transporte_e_retentavel() {
        assert!(GatewayError::Transporte("timeout".into()).retentavel());
        assert!(!GatewayError::Autenticacao("senha".into()).retentavel());
        assert!(!GatewayError::NaoEncontrado.retentavel());
        assert!(!GatewayError::Protocolo("html".into()).retentavel());
    }
}
