// src/models/gestor.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Máquina de estados da solicitação de acesso delegado:
/// PENDENTE -> AGUARDANDO_CODIGO -> CONCLUIDA, com atalho
/// PENDENTE -> CONCLUIDA quando o solicitante já é o titular.
/// EXPIRADA e CANCELADA são alcançáveis a partir dos dois estados
/// não-terminais; os três estados finais são terminais.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "status_solicitacao", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusSolicitacao {
    Pendente,
    AguardandoCodigo,
    Concluida,
    Expirada,
    Cancelada,
}

impl StatusSolicitacao {
    /// Estados terminais são retidos para auditoria e não admitem transição.
    pub fn terminal(&self) -> bool {
        matches!(
            self,
            StatusSolicitacao::Concluida | StatusSolicitacao::Expirada | StatusSolicitacao::Cancelada
        )
    }
}

/// Solicitação de acesso de um gestor a uma unidade consumidora. Nunca é
/// apagada: o histórico completo do handshake fica registrado.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolicitacaoGestor {
    pub id: Uuid,

    #[schema(ignore)]
    pub cliente_id: Uuid,

    pub unidade_id: Uuid,

    #[schema(example = "52998224725")]
    pub gestor_documento: String,

    #[schema(example = "Maria Gestora")]
    pub gestor_nome: String,

    pub status: StatusSolicitacao,

    /// Token devolvido pela distribuidora ao solicitar o código de verificação.
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub protocolo: Option<String>,

    pub criada_em: DateTime<Utc>,
    pub expira_em: Option<DateTime<Utc>>,
    pub concluida_em: Option<DateTime<Utc>>,

    #[schema(example = "Acesso concedido ao gestor.")]
    pub mensagem: Option<String>,
}

impl SolicitacaoGestor {
    /// Expiração preguiçosa: uma solicitação aguardando código cujo prazo já
    /// passou deve ser tratada como expirada em qualquer leitura, mesmo sem
    /// varredura de fundo.
    pub fn prazo_vencido(&self, agora: DateTime<Utc>) -> bool {
        self.status == StatusSolicitacao::AguardandoCodigo
            && self.expira_em.is_some_and(|limite| limite <= agora)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn solicitacao(status: StatusSolicitacao, expira_em: Option<DateTime<Utc>>) -> SolicitacaoGestor {
        SolicitacaoGestor {
            id: Uuid::new_v4(),
            cliente_id: Uuid::new_v4(),
            unidade_id: Uuid::new_v4(),
            gestor_documento: "52998224725".into(),
            gestor_nome: "Maria Gestora".into(),
            status,
            protocolo: None,
            criada_em: Utc::now(),
            expira_em,
            concluida_em: None,
            mensagem: None,
        }
    }

    #[test]
    fn estados_finais_sao_terminais() {
        assert!(StatusSolicitacao::Concluida.terminal());
        assert!(StatusSolicitacao::Expirada.terminal());
        assert!(StatusSolicitacao::Cancelada.terminal());
        assert!(!StatusSolicitacao::Pendente.terminal());
        assert!(!StatusSolicitacao::AguardandoCodigo.terminal());
    }

    #[test]
    fn prazo_vencido_somente_aguardando_codigo() {
        let agora = Utc::now();
        let passado = Some(agora - Duration::hours(1));

        assert!(solicitacao(StatusSolicitacao::AguardandoCodigo, passado).prazo_vencido(agora));
        assert!(!solicitacao(StatusSolicitacao::AguardandoCodigo, Some(agora + Duration::hours(1)))
            .prazo_vencido(agora));
        // Sem prazo registrado, nunca expira por leitura.
        assert!(!solicitacao(StatusSolicitacao::AguardandoCodigo, None).prazo_vencido(agora));
        // Estados terminais não expiram.
        assert!(!solicitacao(StatusSolicitacao::Concluida, passado).prazo_vencido(agora));
    }
}
