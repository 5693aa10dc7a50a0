// src/handlers/sincronizacao.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{common::error::AppError, config::AppState};

// POST /api/clientes/{cliente_id}/sincronizacao
#[utoipa::path(
    post,
    path = "/api/clientes/{cliente_id}/sincronizacao",
    tag = "Sincronizacao",
    responses(
        (status = 202, description = "Sincronização aceita; roda em segundo plano"),
        (status = 404, description = "Cliente não encontrado"),
        (status = 409, description = "Já existe uma sincronização em andamento")
    ),
    params(
        ("cliente_id" = Uuid, Path, description = "ID do cliente")
    )
)]
pub async fn iniciar_sincronizacao(
    State(app_state): State<AppState>,
    Path(cliente_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.sincronizacao_service.iniciar(cliente_id).await?;

    // O trabalho segue em segundo plano; o progresso sai pelo GET.
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "mensagem": "Sincronização iniciada." })),
    ))
}

// GET /api/clientes/{cliente_id}/sincronizacao
#[utoipa::path(
    get,
    path = "/api/clientes/{cliente_id}/sincronizacao",
    tag = "Sincronizacao",
    responses(
        (status = 200, description = "Situação atual da sincronização",
            body = crate::services::sincronizacao_service::SituacaoSincronizacao),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(
        ("cliente_id" = Uuid, Path, description = "ID do cliente")
    )
)]
pub async fn consultar_sincronizacao(
    State(app_state): State<AppState>,
    Path(cliente_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let situacao = app_state.sincronizacao_service.situacao(cliente_id).await?;
    Ok((StatusCode::OK, Json(situacao)))
}
