// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Sincronizacao ---
        handlers::sincronizacao::iniciar_sincronizacao,
        handlers::sincronizacao::consultar_sincronizacao,

        // --- Gestor ---
        handlers::gestor::solicitar_acesso,
        handlers::gestor::consultar_solicitacao,
        handlers::gestor::confirmar_codigo,
        handlers::gestor::cancelar_solicitacao,
    ),
    components(
        schemas(
            // --- Sincronizacao ---
            models::cliente::StatusConexao,
            models::cliente::StatusSync,
            services::sincronizacao_service::SituacaoSincronizacao,

            // --- Unidades & Faturas ---
            models::unidade::UnidadeConsumidora,
            models::fatura::StatusFatura,
            models::fatura::Fatura,

            // --- Gestor ---
            models::gestor::StatusSolicitacao,
            models::gestor::SolicitacaoGestor,
            handlers::gestor::SolicitarAcessoPayload,
            handlers::gestor::ConfirmarCodigoPayload,
        )
    ),
    tags(
        (name = "Sincronizacao", description = "Sincronização de unidades e faturas com a distribuidora"),
        (name = "Gestor", description = "Acesso delegado de gestores às unidades consumidoras")
    )
)]
pub struct ApiDoc;
