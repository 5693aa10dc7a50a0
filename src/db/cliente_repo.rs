// src/db/cliente_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::cliente::{Cliente, StatusConexao, StatusSync},
};

/// Operações de persistência sobre a tabela 'clientes' que o núcleo usa.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClienteStore: Send + Sync {
    async fn buscar(&self, id: Uuid) -> Result<Option<Cliente>, AppError>;

    /// Tenta adquirir a trava de sincronização: só transiciona para
    /// SINCRONIZANDO se o cliente não estiver sincronizando. Devolve `false`
    /// quando a trava já está tomada (o chamador rejeita, não enfileira).
    async fn iniciar_sincronizacao(&self, id: Uuid) -> Result<bool, AppError>;

    /// Libera a trava em qualquer caminho de saída, registrando o desfecho.
    async fn finalizar_sincronizacao(
        &self,
        id: Uuid,
        status: StatusSync,
        mensagem: Option<String>,
        ultima_sincronizacao: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;

    async fn atualizar_status_conexao(
        &self,
        id: Uuid,
        status: StatusConexao,
    ) -> Result<(), AppError>;
}

// O repositório de clientes, responsável pelas interações com a tabela 'clientes'
#[derive(Clone)]
pub struct PgClienteRepository {
    pool: PgPool,
}

impl PgClienteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClienteStore for PgClienteRepository {
    async fn buscar(&self, id: Uuid) -> Result<Option<Cliente>, AppError> {
        let cliente = sqlx::query_as::<_, Cliente>("SELECT * FROM clientes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cliente)
    }

    async fn iniciar_sincronizacao(&self, id: Uuid) -> Result<bool, AppError> {
        // UPDATE condicional: a cláusula WHERE é a aquisição transacional da
        // trava. Zero linhas afetadas significa que outra execução a detém.
        let resultado = sqlx::query(
            r#"
            UPDATE clientes
            SET status_sync = 'SINCRONIZANDO', mensagem_sync = NULL
            WHERE id = $1 AND status_sync <> 'SINCRONIZANDO'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(resultado.rows_affected() == 1)
    }

    async fn finalizar_sincronizacao(
        &self,
        id: Uuid,
        status: StatusSync,
        mensagem: Option<String>,
        ultima_sincronizacao: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE clientes
            SET status_sync = $2,
                mensagem_sync = $3,
                ultima_sincronizacao = COALESCE($4, ultima_sincronizacao)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(mensagem)
        .bind(ultima_sincronizacao)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn atualizar_status_conexao(
        &self,
        id: Uuid,
        status: StatusConexao,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE clientes SET status_conexao = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
