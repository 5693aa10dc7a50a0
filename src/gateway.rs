// src/gateway.rs
//
// Adaptador de protocolo para o sistema da distribuidora (agência virtual).
// Nenhuma lógica de máquina de estados vive aqui: só chamadas com efeito
// colateral e a classificação dos erros.

pub mod http;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::unidade::ChaveUnidade;

/// Sessão autenticada na distribuidora. Escopada a uma unidade de trabalho:
/// quem abre, encerra, em todos os caminhos de saída.
#[derive(Debug, Clone)]
pub struct Sessao {
    pub token: String,
}

/// A visão atual da distribuidora sobre uma unidade do cliente.
#[derive(Debug, Clone, PartialEq)]
pub struct UnidadeDescritor {
    pub chave: ChaveUnidade,
    pub endereco: Option<String>,
    pub titular_documento: Option<String>,
    pub geradora: bool,
    pub ativa: bool,
    pub cortada: bool,
    pub desligada: bool,
    pub contrato_ativo: bool,
    /// Para beneficiárias: a chave da geradora à qual estão vinculadas e o
    /// percentual de rateio reportado pela distribuidora.
    pub geradora_chave: Option<ChaveUnidade>,
    pub percentual_rateio: Option<Decimal>,
}

/// Token devolvido ao disparar o envio de um código de verificação.
#[derive(Debug, Clone, PartialEq)]
pub struct CodigoPendente {
    pub protocolo: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Falha de rede/timeout ou 5xx. Elegível a retentativa.
    #[error("falha de transporte com a distribuidora: {0}")]
    Transporte(String),

    /// Credenciais ou sessão rejeitadas. Não adianta repetir.
    #[error("autenticação rejeitada pela distribuidora: {0}")]
    Autenticacao(String),

    /// Recurso ausente (fatura inexistente no período, unidade desconhecida).
    /// Benigno para o orquestrador.
    #[error("recurso não encontrado na distribuidora")]
    NaoEncontrado,

    /// Código de verificação incorreto; a solicitação permanece aguardando.
    #[error("código de verificação inválido")]
    CodigoInvalido,

    /// Código de verificação vencido; a solicitação expira.
    #[error("código de verificação expirado")]
    Expirado,

    /// Resposta fora do contrato esperado. Não elegível a retentativa.
    #[error("resposta inesperada da distribuidora: {0}")]
    Protocolo(String),
}

impl GatewayError {
    pub fn retentavel(&self) -> bool {
        matches!(self, GatewayError::Transporte(_))
    }
}

/// Contrato com a agência virtual da distribuidora. Implementações são
/// adaptadores finos; a política de retentativa mora no orquestrador.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DistribuidoraGateway: Send + Sync {
    /// Abre uma sessão. Falha não-retentável com credenciais inválidas,
    /// retentável em erro de transporte.
    async fn autenticar(&self, login: &str, senha: &str) -> Result<Sessao, GatewayError>;

    /// Lista as unidades que a distribuidora enxerga para o titular da sessão.
    async fn listar_unidades(&self, sessao: &Sessao) -> Result<Vec<UnidadeDescritor>, GatewayError>;

    /// Busca o texto (OCR) da fatura de um período. `NaoEncontrado` quando o
    /// período não tem fatura.
    async fn buscar_fatura(
        &self,
        sessao: &Sessao,
        chave: &ChaveUnidade,
        mes: i32,
        ano: i32,
    ) -> Result<String, GatewayError>;

    /// Dispara o envio do código de verificação ao canal de contato do
    /// titular da unidade.
    async fn solicitar_codigo_gestor(
        &self,
        sessao: &Sessao,
        chave: &ChaveUnidade,
        documento: &str,
    ) -> Result<CodigoPendente, GatewayError>;

    /// Confirma o código digitado pelo gestor. Devolve a mensagem de
    /// desfecho da distribuidora.
    async fn confirmar_codigo_gestor(
        &self,
        sessao: &Sessao,
        protocolo: &str,
        codigo: &str,
    ) -> Result<String, GatewayError>;

    /// API de gestão: concede acesso direto quando o solicitante já é o
    /// titular da unidade (sem código).
    async fn conceder_acesso_direto(
        &self,
        sessao: &Sessao,
        chave: &ChaveUnidade,
        documento: &str,
    ) -> Result<String, GatewayError>;

    /// Invalida logicamente a sessão. Erros aqui são apenas logados.
    async fn encerrar_sessao(&self, sessao: Sessao);
}
