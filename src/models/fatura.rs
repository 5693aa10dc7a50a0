// src/models/fatura.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "status_fatura", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusFatura {
    Aberta,
    Paga,
    Vencida,
    /// A extração não recuperou todos os campos críticos; a fatura foi
    /// persistida com o que havia e aguarda revisão humana.
    RevisaoPendente,
}

/// Uma fatura de energia de uma unidade consumidora, identificada pela chave
/// natural `(unidade, mes, ano)`. Criada somente pelo orquestrador de
/// sincronização; re-sincronizações fazem upsert, nunca duplicam.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Fatura {
    pub id: Uuid,

    #[schema(ignore)]
    pub unidade_id: Uuid,

    #[schema(example = 3)]
    pub mes: i32,
    #[schema(example = 2025)]
    pub ano: i32,

    #[schema(value_type = String, format = Date, example = "2025-03-25")]
    pub vencimento: Option<NaiveDate>,

    #[schema(example = "110.37")]
    pub valor_total: Option<Decimal>,

    #[schema(example = 245)]
    pub consumo_kwh: Option<i32>,

    pub status: StatusFatura,

    /// Bloco estruturado produzido pelo extrator: itens de injeção de
    /// energia, painel de atenção e, em caso de revisão, o payload parcial.
    #[schema(value_type = Object)]
    pub detalhes: Option<serde_json::Value>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Dados de uma fatura a persistir (o repositório resolve criação vs.
/// atualização pela chave natural).
#[derive(Debug, Clone, PartialEq)]
pub struct NovaFatura {
    pub unidade_id: Uuid,
    pub mes: i32,
    pub ano: i32,
    pub vencimento: Option<NaiveDate>,
    pub valor_total: Option<Decimal>,
    pub consumo_kwh: Option<i32>,
    pub status: StatusFatura,
    pub detalhes: Option<serde_json::Value>,
}
