// src/models/unidade.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Chave composta com que a distribuidora identifica uma unidade consumidora.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChaveUnidade {
    #[schema(example = "7001234567")]
    pub codigo: String,

    #[schema(example = "4")]
    pub digito_verificador: String,

    #[schema(example = "82")]
    pub codigo_empresa: String,
}

impl std::fmt::Display for ChaveUnidade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{} ({})",
            self.codigo, self.digito_verificador, self.codigo_empresa
        )
    }
}

/// Uma unidade consumidora (UC) de um cliente. Geradoras apontam para si
/// mesmas via `geradora_id` das beneficiárias: a relação é uma floresta com
/// ponteiro opcional para a "mãe", nunca um grafo geral.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnidadeConsumidora {
    pub id: Uuid,

    #[schema(ignore)]
    pub cliente_id: Uuid,

    #[schema(example = "7001234567")]
    pub codigo: String,
    #[schema(example = "4")]
    pub digito_verificador: String,
    #[schema(example = "82")]
    pub codigo_empresa: String,

    pub endereco: Option<String>,

    /// Documento (CPF/CNPJ) do titular registrado na distribuidora.
    pub titular_documento: Option<String>,

    /// Se a unidade injeta energia excedente na rede.
    pub geradora: bool,

    /// Geradora à qual esta beneficiária está vinculada, se houver.
    pub geradora_id: Option<Uuid>,

    /// Percentual do rateio de créditos da geradora (0..=100).
    #[schema(example = "35.50")]
    pub percentual_rateio: Option<Decimal>,

    /// Saldo acumulado de créditos de energia (kWh), mantido para geradoras.
    #[schema(example = "1523.00")]
    pub saldo_creditos_kwh: Decimal,

    pub ativa: bool,
    pub cortada: bool,
    pub desligada: bool,
    pub contrato_ativo: bool,

    /// Unidade que deixou de ser reportada pela distribuidora. Nunca é
    /// removida, para não destruir o histórico de faturas.
    pub obsoleta: bool,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UnidadeConsumidora {
    pub fn chave(&self) -> ChaveUnidade {
        ChaveUnidade {
            codigo: self.codigo.clone(),
            digito_verificador: self.digito_verificador.clone(),
            codigo_empresa: self.codigo_empresa.clone(),
        }
    }
}
