// src/handlers/gestor.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError, config::AppState, models::gestor::SolicitacaoGestor,
    models::unidade::ChaveUnidade,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolicitarAcessoPayload {
    #[validate(length(min = 1, message = "O código da unidade é obrigatório."))]
    #[schema(example = "7001234567")]
    pub codigo: String,

    #[validate(length(min = 1, message = "O dígito verificador é obrigatório."))]
    #[schema(example = "4")]
    pub digito_verificador: String,

    #[validate(length(min = 1, message = "O código da empresa é obrigatório."))]
    #[schema(example = "82")]
    pub codigo_empresa: String,

    #[validate(length(min = 11, max = 14, message = "Documento do gestor inválido."))]
    #[schema(example = "52998224725")]
    pub gestor_documento: String,

    #[validate(length(min = 1, message = "O nome do gestor é obrigatório."))]
    #[schema(example = "Maria Gestora")]
    pub gestor_nome: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmarCodigoPayload {
    #[validate(length(min = 4, max = 10, message = "Código de verificação inválido."))]
    #[schema(example = "482913")]
    pub codigo: String,
}

// POST /api/clientes/{cliente_id}/gestor/solicitacoes
#[utoipa::path(
    post,
    path = "/api/clientes/{cliente_id}/gestor/solicitacoes",
    tag = "Gestor",
    request_body = SolicitarAcessoPayload,
    responses(
        (status = 201, description = "Solicitação registrada", body = SolicitacaoGestor),
        (status = 404, description = "Cliente ou unidade não encontrados"),
        (status = 409, description = "Já existe solicitação ativa para esta unidade e gestor")
    ),
    params(
        ("cliente_id" = Uuid, Path, description = "ID do cliente")
    )
)]
pub async fn solicitar_acesso(
    State(app_state): State<AppState>,
    Path(cliente_id): Path<Uuid>,
    Json(payload): Json<SolicitarAcessoPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let chave = ChaveUnidade {
        codigo: payload.codigo,
        digito_verificador: payload.digito_verificador,
        codigo_empresa: payload.codigo_empresa,
    };

    let solicitacao = app_state
        .gestor_service
        .solicitar(
            cliente_id,
            &chave,
            &payload.gestor_documento,
            &payload.gestor_nome,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(solicitacao)))
}

// GET /api/gestor/solicitacoes/{id}
#[utoipa::path(
    get,
    path = "/api/gestor/solicitacoes/{id}",
    tag = "Gestor",
    responses(
        (status = 200, description = "Solicitação (com expiração aplicada na leitura)",
            body = SolicitacaoGestor),
        (status = 404, description = "Solicitação não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da solicitação")
    )
)]
pub async fn consultar_solicitacao(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let solicitacao = app_state.gestor_service.buscar(id).await?;
    Ok((StatusCode::OK, Json(solicitacao)))
}

// POST /api/gestor/solicitacoes/{id}/confirmar
#[utoipa::path(
    post,
    path = "/api/gestor/solicitacoes/{id}/confirmar",
    tag = "Gestor",
    request_body = ConfirmarCodigoPayload,
    responses(
        (status = 200, description = "Acesso do gestor concluído", body = SolicitacaoGestor),
        (status = 404, description = "Solicitação não encontrada"),
        (status = 409, description = "Estado atual não admite confirmação"),
        (status = 410, description = "Solicitação ou código expirados"),
        (status = 422, description = "Código de verificação incorreto")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da solicitação")
    )
)]
pub async fn confirmar_codigo(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmarCodigoPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let solicitacao = app_state.gestor_service.confirmar(id, &payload.codigo).await?;
    Ok((StatusCode::OK, Json(solicitacao)))
}

// POST /api/gestor/solicitacoes/{id}/cancelar
#[utoipa::path(
    post,
    path = "/api/gestor/solicitacoes/{id}/cancelar",
    tag = "Gestor",
    responses(
        (status = 200, description = "Solicitação cancelada", body = SolicitacaoGestor),
        (status = 404, description = "Solicitação não encontrada"),
        (status = 409, description = "Solicitação já em estado terminal")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da solicitação")
    )
)]
pub async fn cancelar_solicitacao(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let solicitacao = app_state.gestor_service.cancelar(id).await?;
    Ok((StatusCode::OK, Json(solicitacao)))
}
