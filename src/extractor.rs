// src/extractor.rs
//
// Transforma o texto OCR de uma fatura em um registro estruturado. O motor
// (IA) é plugável e devolve JSON bruto; toda a validação e normalização
// acontece aqui, independente de provedor.

pub mod engine;
pub mod gemini;
pub mod openai;

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::extractor::engine::MotorExtracao;

/// Uma linha de energia injetada/compensada da fatura.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemInjecao {
    pub descricao: String,
    pub quantidade_kwh: Decimal,
}

/// O "painel de atenção" da fatura: saldo acumulado e créditos a expirar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PainelAtencao {
    pub saldo_acumulado_kwh: Option<Decimal>,
    pub creditos_a_expirar_kwh: Option<Decimal>,
}

/// Registro completo e validado de uma fatura extraída.
#[derive(Debug, Clone, PartialEq)]
pub struct FaturaExtraida {
    pub vencimento: NaiveDate,
    pub valor_total: Decimal,
    pub consumo_kwh: i32,
    pub itens_injecao: Vec<ItemInjecao>,
    pub painel_atencao: Option<PainelAtencao>,
}

/// O que foi recuperável de uma extração que não fechou. Serve para
/// diagnóstico e para persistir a fatura em revisão; nunca é devolvido
/// como se fosse um registro completo.
#[derive(Debug, Clone, Default)]
pub struct FaturaParcial {
    pub vencimento: Option<NaiveDate>,
    pub valor_total: Option<Decimal>,
    pub consumo_kwh: Option<i32>,
    pub itens_injecao: Vec<ItemInjecao>,
    pub painel_atencao: Option<PainelAtencao>,
    /// Payload bruto do motor, retido em `detalhes` para revisão humana.
    pub bruto: Value,
}

#[derive(Debug, Error)]
pub enum ExtracaoError {
    /// Faltou (ou veio inválido) ao menos um campo crítico. Carrega o
    /// registro parcial para que o chamador persista o que houver.
    #[error("extração incompleta; campos ausentes ou inválidos: {}", faltantes.join(", "))]
    Incompleta {
        faltantes: Vec<&'static str>,
        parcial: Box<FaturaParcial>,
    },

    /// O motor em si falhou (transporte, quota, resposta truncada).
    #[error("motor de extração falhou: {0}")]
    Motor(String),

    /// O motor respondeu, mas fora do contrato "objeto JSON".
    #[error("payload do motor inválido: {0}")]
    PayloadInvalido(String),
}

/// Extrator de faturas. O contrato e as regras de validação são os mesmos
/// para qualquer motor.
#[derive(Clone)]
pub struct ExtratorFatura {
    motor: Arc<dyn MotorExtracao>,
}

impl ExtratorFatura {
    pub fn new(motor: Arc<dyn MotorExtracao>) -> Self {
        Self { motor }
    }

    pub async fn extrair(&self, texto: &str) -> Result<FaturaExtraida, ExtracaoError> {
        let bruto = self.motor.extrair_campos(texto).await?;
        Self::validar(bruto)
    }

    /// Valida e normaliza o payload bruto de um motor. Campos críticos:
    /// vencimento, valor total, consumo e ao menos um item de injeção.
    pub fn validar(bruto: Value) -> Result<FaturaExtraida, ExtracaoError> {
        if !bruto.is_object() {
            return Err(ExtracaoError::PayloadInvalido(format!(
                "esperado objeto JSON, veio: {bruto}"
            )));
        }

        let vencimento = campo(&bruto, &["vencimento", "data_vencimento"]).and_then(normalizar_data);
        let valor_total = campo(&bruto, &["valor_total", "total_a_pagar"])
            .and_then(normalizar_valor)
            .filter(|v| !v.is_sign_negative());
        let consumo_kwh = campo(&bruto, &["consumo_kwh", "consumo"])
            .and_then(normalizar_inteiro)
            .filter(|c| *c >= 0);
        let itens_injecao = campo(&bruto, &["itens_injecao", "energia_injetada"])
            .map(normalizar_itens)
            .unwrap_or_default();
        let painel_atencao = campo(&bruto, &["painel_atencao"]).and_then(normalizar_painel);

        if let (Some(vencimento), Some(valor_total), Some(consumo_kwh), false) =
            (vencimento, valor_total, consumo_kwh, itens_injecao.is_empty())
        {
            return Ok(FaturaExtraida {
                vencimento,
                valor_total,
                consumo_kwh,
                itens_injecao,
                painel_atencao,
            });
        }

        let mut faltantes = Vec::new();
        if vencimento.is_none() {
            faltantes.push("vencimento");
        }
        if valor_total.is_none() {
            faltantes.push("valor_total");
        }
        if consumo_kwh.is_none() {
            faltantes.push("consumo_kwh");
        }
        if itens_injecao.is_empty() {
            faltantes.push("itens_injecao");
        }

        Err(ExtracaoError::Incompleta {
            faltantes,
            parcial: Box::new(FaturaParcial {
                vencimento,
                valor_total,
                consumo_kwh,
                itens_injecao,
                painel_atencao,
                bruto,
            }),
        })
    }
}

/// Primeiro campo não-nulo entre os apelidos aceitos.
fn campo<'a>(bruto: &'a Value, nomes: &[&str]) -> Option<&'a Value> {
    nomes
        .iter()
        .filter_map(|nome| bruto.get(nome))
        .find(|v| !v.is_null())
}

/// Datas em ISO (AAAA-MM-DD) ou no formato brasileiro (DD/MM/AAAA).
fn normalizar_data(v: &Value) -> Option<NaiveDate> {
    let texto = v.as_str()?.trim();
    NaiveDate::parse_from_str(texto, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(texto, "%d/%m/%Y"))
        .ok()
}

/// Valores monetários/quantidades: número JSON ou string, inclusive na
/// convenção brasileira ("R$ 1.234,56").
fn normalizar_valor(v: &Value) -> Option<Decimal> {
    if v.is_number() {
        return Decimal::from_str(&v.to_string()).ok();
    }
    let texto = v.as_str()?.trim().trim_start_matches("R$").trim();
    if texto.contains(',') {
        let sem_milhar = texto.replace('.', "").replace(',', ".");
        return Decimal::from_str(&sem_milhar).ok();
    }
    Decimal::from_str(texto).ok()
}

fn normalizar_inteiro(v: &Value) -> Option<i32> {
    if let Some(n) = v.as_i64() {
        return i32::try_from(n).ok();
    }
    v.as_str()?.trim().parse().ok()
}

/// Itens de injeção: descrição obrigatória, quantidade não-negativa.
/// Itens que não fecham são descartados (contam como ausentes se sobrar zero).
fn normalizar_itens(v: &Value) -> Vec<ItemInjecao> {
    let Some(lista) = v.as_array() else {
        return Vec::new();
    };
    lista
        .iter()
        .filter_map(|item| {
            let descricao = item.get("descricao")?.as_str()?.trim().to_string();
            let quantidade_kwh = campo(item, &["quantidade_kwh", "quantidade"])
                .and_then(normalizar_valor)
                .filter(|q| !q.is_sign_negative())?;
            if descricao.is_empty() {
                return None;
            }
            Some(ItemInjecao {
                descricao,
                quantidade_kwh,
            })
        })
        .collect()
}

fn normalizar_painel(v: &Value) -> Option<PainelAtencao> {
    if !v.is_object() {
        return None;
    }
    Some(PainelAtencao {
        saldo_acumulado_kwh: campo(v, &["saldo_acumulado_kwh", "saldo_acumulado"])
            .and_then(normalizar_valor),
        creditos_a_expirar_kwh: campo(v, &["creditos_a_expirar_kwh", "creditos_a_expirar"])
            .and_then(normalizar_valor),
    })
}
