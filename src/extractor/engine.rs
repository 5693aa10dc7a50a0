// src/extractor/engine.rs

use async_trait::async_trait;
use serde_json::Value;

use crate::extractor::ExtracaoError;

/// Instrução comum aos motores: os adaptadores só diferem no transporte.
pub(crate) const PROMPT_EXTRACAO: &str = "\
Você receberá o texto OCR de uma fatura de energia elétrica brasileira. \
Extraia e devolva SOMENTE um objeto JSON com os campos: \
vencimento (data, formato AAAA-MM-DD), \
valor_total (número, total a pagar em reais), \
consumo_kwh (inteiro, consumo do mês em kWh), \
itens_injecao (lista de objetos {descricao, quantidade_kwh} com as linhas de \
energia injetada/compensada), \
painel_atencao (objeto {saldo_acumulado_kwh, creditos_a_expirar_kwh} com o \
quadro de saldo acumulado e créditos a expirar, ou null se ausente). \
Use null para campos que não constam no texto. Não invente valores.";

/// Capacidade de um motor de extração: dado o texto de uma fatura, devolver
/// um payload JSON bruto. A validação é responsabilidade do extrator, nunca
/// do motor; motores são intercambiáveis na construção.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MotorExtracao: Send + Sync {
    async fn extrair_campos(&self, texto: &str) -> Result<Value, ExtracaoError>;
}
