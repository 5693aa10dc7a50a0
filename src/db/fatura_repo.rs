// src/db/fatura_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    models::fatura::{Fatura, NovaFatura},
};

/// Operações de persistência sobre a tabela 'faturas'.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaturaStore: Send + Sync {
    /// Upsert pela chave natural `(unidade, mes, ano)`: re-sincronizar o
    /// mesmo período nunca duplica a fatura.
    async fn upsert(&self, nova: &NovaFatura) -> Result<Fatura, AppError>;
}

#[derive(Clone)]
pub struct PgFaturaRepository {
    pool: PgPool,
}

impl PgFaturaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FaturaStore for PgFaturaRepository {
    async fn upsert(&self, nova: &NovaFatura) -> Result<Fatura, AppError> {
        let fatura = sqlx::query_as::<_, Fatura>(
            r#"
            INSERT INTO faturas (
                unidade_id, mes, ano, vencimento, valor_total, consumo_kwh, status, detalhes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (unidade_id, mes, ano)
            DO UPDATE SET
                vencimento = EXCLUDED.vencimento,
                valor_total = EXCLUDED.valor_total,
                consumo_kwh = EXCLUDED.consumo_kwh,
                status = EXCLUDED.status,
                detalhes = EXCLUDED.detalhes,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(nova.unidade_id)
        .bind(nova.mes)
        .bind(nova.ano)
        .bind(nova.vencimento)
        .bind(nova.valor_total)
        .bind(nova.consumo_kwh)
        .bind(nova.status)
        .bind(&nova.detalhes)
        .fetch_one(&self.pool)
        .await?;

        Ok(fatura)
    }
}
