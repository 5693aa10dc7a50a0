// src/db/gestor_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, models::gestor::SolicitacaoGestor};

/// Operações de persistência sobre a tabela 'solicitacoes_gestor'.
/// Solicitações nunca são apagadas; estados terminais ficam para auditoria.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SolicitacaoStore: Send + Sync {
    /// Cria a solicitação já em PENDENTE; o fluxo a promove depois.
    async fn criar(
        &self,
        cliente_id: Uuid,
        unidade_id: Uuid,
        gestor_documento: &str,
        gestor_nome: &str,
    ) -> Result<SolicitacaoGestor, AppError>;

    async fn buscar(&self, id: Uuid) -> Result<Option<SolicitacaoGestor>, AppError>;

    /// Guarda de idempotência: existe solicitação não-terminal para o mesmo
    /// `(cliente, unidade, documento do gestor)`?
    async fn existe_ativa(
        &self,
        cliente_id: Uuid,
        unidade_id: Uuid,
        gestor_documento: &str,
    ) -> Result<bool, AppError>;

    /// Persiste os campos mutáveis de uma transição de estado.
    async fn atualizar(&self, solicitacao: &SolicitacaoGestor)
    -> Result<SolicitacaoGestor, AppError>;
}

/// Violação do índice único parcial de solicitações ativas vira o erro de
/// negócio; duas criações concorrentes nunca passam ambas.
fn mapear_erro_criacao(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::SolicitacaoDuplicada,
        _ => AppError::DatabaseError(e),
    }
}

#[derive(Clone)]
pub struct PgSolicitacaoRepository {
    pool: PgPool,
}

impl PgSolicitacaoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SolicitacaoStore for PgSolicitacaoRepository {
    async fn criar(
        &self,
        cliente_id: Uuid,
        unidade_id: Uuid,
        gestor_documento: &str,
        gestor_nome: &str,
    ) -> Result<SolicitacaoGestor, AppError> {
        let solicitacao = sqlx::query_as::<_, SolicitacaoGestor>(
            r#"
            INSERT INTO solicitacoes_gestor (cliente_id, unidade_id, gestor_documento, gestor_nome)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(cliente_id)
        .bind(unidade_id)
        .bind(gestor_documento)
        .bind(gestor_nome)
        .fetch_one(&self.pool)
        .await
        .map_err(mapear_erro_criacao)?;

        Ok(solicitacao)
    }

    async fn buscar(&self, id: Uuid) -> Result<Option<SolicitacaoGestor>, AppError> {
        let solicitacao =
            sqlx::query_as::<_, SolicitacaoGestor>("SELECT * FROM solicitacoes_gestor WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(solicitacao)
    }

    async fn existe_ativa(
        &self,
        cliente_id: Uuid,
        unidade_id: Uuid,
        gestor_documento: &str,
    ) -> Result<bool, AppError> {
        let existe: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM solicitacoes_gestor
                WHERE cliente_id = $1
                  AND unidade_id = $2
                  AND gestor_documento = $3
                  AND status IN ('PENDENTE', 'AGUARDANDO_CODIGO')
            )
            "#,
        )
        .bind(cliente_id)
        .bind(unidade_id)
        .bind(gestor_documento)
        .fetch_one(&self.pool)
        .await?;

        Ok(existe)
    }

    async fn atualizar(
        &self,
        solicitacao: &SolicitacaoGestor,
    ) -> Result<SolicitacaoGestor, AppError> {
        let atualizada = sqlx::query_as::<_, SolicitacaoGestor>(
            r#"
            UPDATE solicitacoes_gestor
            SET status = $2,
                protocolo = $3,
                expira_em = $4,
                concluida_em = $5,
                mensagem = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(solicitacao.id)
        .bind(solicitacao.status)
        .bind(&solicitacao.protocolo)
        .bind(solicitacao.expira_em)
        .bind(solicitacao.concluida_em)
        .bind(&solicitacao.mensagem)
        .fetch_one(&self.pool)
        .await?;

        Ok(atualizada)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ViolacaoDeUnicidade;

    impl std::fmt::Display for ViolacaoDeUnicidade {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(
                f,
                "duplicate key value violates unique constraint \"uq_solicitacoes_ativas\""
            )
        }
    }

    impl std::error::Error for ViolacaoDeUnicidade {}

    impl sqlx::error::DatabaseError for ViolacaoDeUnicidade {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"uq_solicitacoes_ativas\""
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn violacao_de_unicidade_vira_solicitacao_duplicada() {
        let erro = mapear_erro_criacao(sqlx::Error::Database(Box::new(ViolacaoDeUnicidade)));
        assert!(matches!(erro, AppError::SolicitacaoDuplicada));
    }

    #[test]
    fn outros_erros_de_banco_sao_preservados() {
        let erro = mapear_erro_criacao(sqlx::Error::PoolClosed);
        assert!(matches!(erro, AppError::DatabaseError(_)));
    }
}
