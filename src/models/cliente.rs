// src/models/cliente.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enums (Mapeando o Postgres) ---

/// Situação da sessão do cliente junto à agência virtual da distribuidora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "status_conexao", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusConexao {
    Desconectado,
    Conectado,
    Falha,
}

/// Máquina de estados da sincronização: PENDENTE -> SINCRONIZANDO -> (CONCLUIDA | ERRO).
/// CONCLUIDA e ERRO são reentráveis no próximo disparo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "status_sync", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusSync {
    Pendente,
    Sincronizando,
    Concluida,
    Erro,
}

// --- Structs ---

/// O dono da conta: um titular registrado na cooperativa, com as credenciais
/// de acesso à distribuidora e o estado da sua última sincronização.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cliente {
    pub id: Uuid,

    #[schema(example = "Cooperativa Solar do Vale")]
    pub nome: String,

    #[schema(example = "12345678000190")]
    pub documento: String,

    // Credenciais da agência virtual. Nunca saem na serialização.
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub gateway_login: String,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub gateway_senha: String,

    pub status_conexao: StatusConexao,
    pub status_sync: StatusSync,

    pub ultima_sincronizacao: Option<DateTime<Utc>>,

    #[schema(example = "12 unidades; 34 faturas importadas")]
    pub mensagem_sync: Option<String>,

    pub created_at: Option<DateTime<Utc>>,
}
