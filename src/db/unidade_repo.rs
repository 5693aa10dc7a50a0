// src/db/unidade_repo.rs

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    gateway::UnidadeDescritor,
    models::unidade::{ChaveUnidade, UnidadeConsumidora},
};

/// Operações de persistência sobre a tabela 'unidades_consumidoras'.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UnidadeStore: Send + Sync {
    async fn buscar(&self, id: Uuid) -> Result<Option<UnidadeConsumidora>, AppError>;

    async fn buscar_por_chave(
        &self,
        cliente_id: Uuid,
        chave: &ChaveUnidade,
    ) -> Result<Option<UnidadeConsumidora>, AppError>;

    /// Upsert pela chave natural `(cliente, chave da distribuidora)`: cria a
    /// unidade ausente ou atualiza os campos mutáveis da presente.
    async fn upsert(
        &self,
        cliente_id: Uuid,
        descritor: &UnidadeDescritor,
    ) -> Result<UnidadeConsumidora, AppError>;

    /// Marca como obsoletas as unidades do cliente fora da lista vista na
    /// sincronização. Nunca remove: o histórico de faturas fica preservado.
    async fn marcar_obsoletas(&self, cliente_id: Uuid, vistas: &[Uuid]) -> Result<u64, AppError>;

    /// Grava (ou limpa) o vínculo beneficiária -> geradora com o percentual
    /// de rateio. As invariantes são checadas no serviço, antes de persistir.
    async fn definir_geradora(
        &self,
        id: Uuid,
        geradora_id: Option<Uuid>,
        percentual: Option<Decimal>,
    ) -> Result<(), AppError>;

    /// Soma dos percentuais de rateio das beneficiárias de uma geradora,
    /// opcionalmente excluindo uma unidade (a que está sendo revinculada).
    async fn soma_rateio(
        &self,
        geradora_id: Uuid,
        excluir: Option<Uuid>,
    ) -> Result<Decimal, AppError>;
}

#[derive(Clone)]
pub struct PgUnidadeRepository {
    pool: PgPool,
}

impl PgUnidadeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnidadeStore for PgUnidadeRepository {
    async fn buscar(&self, id: Uuid) -> Result<Option<UnidadeConsumidora>, AppError> {
        let unidade = sqlx::query_as::<_, UnidadeConsumidora>(
            "SELECT * FROM unidades_consumidoras WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(unidade)
    }

    async fn buscar_por_chave(
        &self,
        cliente_id: Uuid,
        chave: &ChaveUnidade,
    ) -> Result<Option<UnidadeConsumidora>, AppError> {
        let unidade = sqlx::query_as::<_, UnidadeConsumidora>(
            r#"
            SELECT * FROM unidades_consumidoras
            WHERE cliente_id = $1
              AND codigo = $2
              AND digito_verificador = $3
              AND codigo_empresa = $4
            "#,
        )
        .bind(cliente_id)
        .bind(&chave.codigo)
        .bind(&chave.digito_verificador)
        .bind(&chave.codigo_empresa)
        .fetch_optional(&self.pool)
        .await?;
        Ok(unidade)
    }

    async fn upsert(
        &self,
        cliente_id: Uuid,
        descritor: &UnidadeDescritor,
    ) -> Result<UnidadeConsumidora, AppError> {
        let unidade = sqlx::query_as::<_, UnidadeConsumidora>(
            r#"
            INSERT INTO unidades_consumidoras (
                cliente_id, codigo, digito_verificador, codigo_empresa,
                endereco, titular_documento, geradora,
                ativa, cortada, desligada, contrato_ativo
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (cliente_id, codigo, digito_verificador, codigo_empresa)
            DO UPDATE SET
                endereco = EXCLUDED.endereco,
                titular_documento = EXCLUDED.titular_documento,
                geradora = EXCLUDED.geradora,
                ativa = EXCLUDED.ativa,
                cortada = EXCLUDED.cortada,
                desligada = EXCLUDED.desligada,
                contrato_ativo = EXCLUDED.contrato_ativo,
                obsoleta = FALSE,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(cliente_id)
        .bind(&descritor.chave.codigo)
        .bind(&descritor.chave.digito_verificador)
        .bind(&descritor.chave.codigo_empresa)
        .bind(&descritor.endereco)
        .bind(&descritor.titular_documento)
        .bind(descritor.geradora)
        .bind(descritor.ativa)
        .bind(descritor.cortada)
        .bind(descritor.desligada)
        .bind(descritor.contrato_ativo)
        .fetch_one(&self.pool)
        .await?;

        Ok(unidade)
    }

    async fn marcar_obsoletas(&self, cliente_id: Uuid, vistas: &[Uuid]) -> Result<u64, AppError> {
        let resultado = sqlx::query(
            r#"
            UPDATE unidades_consumidoras
            SET obsoleta = TRUE, updated_at = now()
            WHERE cliente_id = $1
              AND obsoleta = FALSE
              AND id <> ALL($2)
            "#,
        )
        .bind(cliente_id)
        .bind(vistas)
        .execute(&self.pool)
        .await?;

        Ok(resultado.rows_affected())
    }

    async fn definir_geradora(
        &self,
        id: Uuid,
        geradora_id: Option<Uuid>,
        percentual: Option<Decimal>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE unidades_consumidoras
            SET geradora_id = $2, percentual_rateio = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(geradora_id)
        .bind(percentual)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn soma_rateio(
        &self,
        geradora_id: Uuid,
        excluir: Option<Uuid>,
    ) -> Result<Decimal, AppError> {
        let soma: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(percentual_rateio), 0)
            FROM unidades_consumidoras
            WHERE geradora_id = $1
              AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
        .bind(geradora_id)
        .bind(excluir)
        .fetch_one(&self.pool)
        .await?;

        Ok(soma)
    }
}
