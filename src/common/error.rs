use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::models::gestor::StatusSolicitacao;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Cliente não encontrado")]
    ClienteNaoEncontrado,

    #[error("Unidade consumidora não encontrada")]
    UnidadeNaoEncontrada,

    #[error("Solicitação não encontrada")]
    SolicitacaoNaoEncontrada,

    // O status SINCRONIZANDO funciona como trava: um disparo concorrente é
    // rejeitado na hora, nunca enfileirado.
    #[error("Já existe uma sincronização em andamento para este cliente")]
    SincronizacaoEmAndamento,

    #[error("Já existe uma solicitação ativa para esta unidade e gestor")]
    SolicitacaoDuplicada,

    #[error("A solicitação em estado {de:?} não admite esta operação")]
    TransicaoInvalida { de: StatusSolicitacao },

    #[error("Código de verificação inválido")]
    CodigoInvalido,

    #[error("A solicitação expirou")]
    SolicitacaoExpirada,

    #[error("Percentual de rateio inválido: {0}")]
    RateioInvalido(Decimal),

    #[error("Rateio excederia 100%; disponível: {disponivel}%")]
    RateioExcedido { disponivel: Decimal },

    #[error("O vínculo criaria um ciclo entre geradora e beneficiária")]
    CicloDetectado,

    // Erros vindos da distribuidora, repassados com a classe preservada.
    #[error("Erro na comunicação com a distribuidora: {0}")]
    Gateway(#[from] GatewayError),

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            AppError::ClienteNaoEncontrado => {
                (StatusCode::NOT_FOUND, "Cliente não encontrado.".to_string())
            }
            AppError::UnidadeNaoEncontrada => (
                StatusCode::NOT_FOUND,
                "Unidade consumidora não encontrada.".to_string(),
            ),
            AppError::SolicitacaoNaoEncontrada => (
                StatusCode::NOT_FOUND,
                "Solicitação não encontrada.".to_string(),
            ),
            AppError::SincronizacaoEmAndamento => (
                StatusCode::CONFLICT,
                "Já existe uma sincronização em andamento para este cliente.".to_string(),
            ),
            AppError::SolicitacaoDuplicada => (
                StatusCode::CONFLICT,
                "Já existe uma solicitação ativa para esta unidade e gestor.".to_string(),
            ),
            AppError::TransicaoInvalida { de } => (
                StatusCode::CONFLICT,
                format!("A solicitação em estado {de:?} não admite esta operação."),
            ),
            AppError::CodigoInvalido => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Código de verificação inválido.".to_string(),
            ),
            AppError::SolicitacaoExpirada => {
                (StatusCode::GONE, "A solicitação expirou.".to_string())
            }
            AppError::RateioInvalido(p) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Percentual de rateio inválido: {p}."),
            ),
            AppError::RateioExcedido { disponivel } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Rateio excederia 100%; disponível: {disponivel}%."),
            ),
            AppError::CicloDetectado => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "O vínculo criaria um ciclo entre geradora e beneficiária.".to_string(),
            ),

            // A classe do erro da distribuidora decide o status HTTP.
            AppError::Gateway(GatewayError::NaoEncontrado) => (
                StatusCode::NOT_FOUND,
                "Recurso não encontrado na distribuidora.".to_string(),
            ),
            AppError::Gateway(GatewayError::CodigoInvalido) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Código de verificação inválido.".to_string(),
            ),
            AppError::Gateway(GatewayError::Expirado) => (
                StatusCode::GONE,
                "Código de verificação expirado.".to_string(),
            ),
            AppError::Gateway(e) => {
                tracing::error!("Erro na comunicação com a distribuidora: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "Falha na comunicação com a distribuidora.".to_string(),
                )
            }

            // Todos os outros erros (DatabaseError, InternalServerError) viram 500.
            // O `tracing` vai logar a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
