// src/services/gestor_service.rs
//
// Fluxo de acesso delegado (gestor): criação da solicitação, atalho do
// titular, envio e confirmação do código de verificação, cancelamento e
// expiração preguiçosa. Toda transição de estado passa por aqui.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClienteStore, SolicitacaoStore, UnidadeStore},
    gateway::{DistribuidoraGateway, GatewayError, Sessao},
    models::{
        cliente::Cliente,
        gestor::{SolicitacaoGestor, StatusSolicitacao},
        unidade::ChaveUnidade,
    },
};

#[derive(Clone)]
pub struct GestorService {
    clientes: Arc<dyn ClienteStore>,
    unidades: Arc<dyn UnidadeStore>,
    solicitacoes: Arc<dyn SolicitacaoStore>,
    gateway: Arc<dyn DistribuidoraGateway>,
    /// Prazo para o gestor digitar o código depois do envio.
    validade: Duration,
}

impl GestorService {
    pub fn new(
        clientes: Arc<dyn ClienteStore>,
        unidades: Arc<dyn UnidadeStore>,
        solicitacoes: Arc<dyn SolicitacaoStore>,
        gateway: Arc<dyn DistribuidoraGateway>,
        validade: Duration,
    ) -> Self {
        Self {
            clientes,
            unidades,
            solicitacoes,
            gateway,
            validade,
        }
    }

    /// Abre uma solicitação de acesso para o gestor sobre a unidade. Se o
    /// documento do gestor for o do próprio titular, o acesso é concedido
    /// direto, sem código; caso contrário a distribuidora envia um código
    /// ao canal de contato do titular e a solicitação fica aguardando.
    pub async fn solicitar(
        &self,
        cliente_id: Uuid,
        chave: &ChaveUnidade,
        gestor_documento: &str,
        gestor_nome: &str,
    ) -> Result<SolicitacaoGestor, AppError> {
        let cliente = self
            .clientes
            .buscar(cliente_id)
            .await?
            .ok_or(AppError::ClienteNaoEncontrado)?;
        let unidade = self
            .unidades
            .buscar_por_chave(cliente_id, chave)
            .await?
            .ok_or(AppError::UnidadeNaoEncontrada)?;

        if self
            .solicitacoes
            .existe_ativa(cliente_id, unidade.id, gestor_documento)
            .await?
        {
            return Err(AppError::SolicitacaoDuplicada);
        }

        // Registrada antes de qualquer chamada externa: nenhuma interação
        // com a distribuidora acontece sem rastro.
        let solicitacao = self
            .solicitacoes
            .criar(cliente_id, unidade.id, gestor_documento, gestor_nome)
            .await?;

        let sessao = match self.abrir_sessao(&cliente).await {
            Ok(sessao) => sessao,
            Err(erro) => {
                self.registrar_falha(solicitacao, &erro).await;
                return Err(erro.into());
            }
        };

        let titular = unidade
            .titular_documento
            .as_deref()
            .is_some_and(|documento| documento == gestor_documento);

        let resultado = if titular {
            self.gateway
                .conceder_acesso_direto(&sessao, chave, gestor_documento)
                .await
                .map(DesfechoDisparo::AcessoDireto)
        } else {
            self.gateway
                .solicitar_codigo_gestor(&sessao, chave, gestor_documento)
                .await
                .map(DesfechoDisparo::CodigoEnviado)
        };

        self.gateway.encerrar_sessao(sessao).await;

        let mut atual = solicitacao;
        match resultado {
            Ok(DesfechoDisparo::AcessoDireto(mensagem)) => {
                atual.status = StatusSolicitacao::Concluida;
                atual.concluida_em = Some(Utc::now());
                atual.mensagem = Some(mensagem);
                Ok(self.solicitacoes.atualizar(&atual).await?)
            }
            Ok(DesfechoDisparo::CodigoEnviado(pendente)) => {
                atual.status = StatusSolicitacao::AguardandoCodigo;
                atual.protocolo = Some(pendente.protocolo);
                atual.expira_em = Some(Utc::now() + self.validade);
                atual.mensagem = Some(
                    "Código de verificação enviado ao contato do titular.".to_string(),
                );
                Ok(self.solicitacoes.atualizar(&atual).await?)
            }
            Err(erro) => {
                // Permanece PENDENTE com o motivo registrado; o cooperado
                // pode tentar de novo ou cancelar.
                self.registrar_falha(atual, &erro).await;
                Err(erro.into())
            }
        }
    }

    /// Consulta com expiração preguiçosa: um prazo vencido é persistido como
    /// EXPIRADA no momento da leitura.
    pub async fn buscar(&self, id: Uuid) -> Result<SolicitacaoGestor, AppError> {
        self.carregar(id).await
    }

    /// Confirma o código digitado pelo gestor. Código errado não queima a
    /// solicitação; código vencido na distribuidora expira a solicitação.
    pub async fn confirmar(&self, id: Uuid, codigo: &str) -> Result<SolicitacaoGestor, AppError> {
        let solicitacao = self.carregar(id).await?;
        match solicitacao.status {
            StatusSolicitacao::AguardandoCodigo => {}
            StatusSolicitacao::Expirada => return Err(AppError::SolicitacaoExpirada),
            de => return Err(AppError::TransicaoInvalida { de }),
        }
        let protocolo = solicitacao.protocolo.clone().ok_or_else(|| {
            AppError::InternalServerError(anyhow::anyhow!(
                "solicitação {id} aguardando código sem protocolo registrado"
            ))
        })?;

        let cliente = self
            .clientes
            .buscar(solicitacao.cliente_id)
            .await?
            .ok_or(AppError::ClienteNaoEncontrado)?;
        let sessao = self.abrir_sessao(&cliente).await?;
        let resultado = self
            .gateway
            .confirmar_codigo_gestor(&sessao, &protocolo, codigo)
            .await;
        self.gateway.encerrar_sessao(sessao).await;

        match resultado {
            Ok(mensagem) => {
                // Releitura antes de concluir: um cancelamento concorrente
                // durante a chamada externa prevalece sobre a confirmação.
                let mut atual = self
                    .solicitacoes
                    .buscar(id)
                    .await?
                    .ok_or(AppError::SolicitacaoNaoEncontrada)?;
                if atual.status != StatusSolicitacao::AguardandoCodigo {
                    tracing::warn!(
                        solicitacao = %id,
                        "confirmação descartada; estado mudou para {:?} durante a chamada",
                        atual.status
                    );
                    return Ok(atual);
                }
                atual.status = StatusSolicitacao::Concluida;
                atual.concluida_em = Some(Utc::now());
                atual.mensagem = Some(mensagem);
                Ok(self.solicitacoes.atualizar(&atual).await?)
            }
            // A solicitação segue aguardando; o gestor pode digitar de novo.
            Err(GatewayError::CodigoInvalido) => Err(AppError::CodigoInvalido),
            Err(GatewayError::Expirado) => {
                // Releitura também aqui: um cancelamento concorrente não pode
                // ser sobrescrito por EXPIRADA.
                let mut atual = self
                    .solicitacoes
                    .buscar(id)
                    .await?
                    .ok_or(AppError::SolicitacaoNaoEncontrada)?;
                if atual.status == StatusSolicitacao::AguardandoCodigo {
                    atual.status = StatusSolicitacao::Expirada;
                    atual.mensagem =
                        Some("Código de verificação expirado na distribuidora.".into());
                    self.solicitacoes.atualizar(&atual).await?;
                }
                Err(AppError::SolicitacaoExpirada)
            }
            Err(erro) => Err(erro.into()),
        }
    }

    /// Cancela uma solicitação ainda não terminal.
    pub async fn cancelar(&self, id: Uuid) -> Result<SolicitacaoGestor, AppError> {
        let mut solicitacao = self.carregar(id).await?;
        if solicitacao.status.terminal() {
            return Err(AppError::TransicaoInvalida {
                de: solicitacao.status,
            });
        }
        solicitacao.status = StatusSolicitacao::Cancelada;
        solicitacao.mensagem = Some("Solicitação cancelada pelo cooperado.".into());
        Ok(self.solicitacoes.atualizar(&solicitacao).await?)
    }

    async fn carregar(&self, id: Uuid) -> Result<SolicitacaoGestor, AppError> {
        let solicitacao = self
            .solicitacoes
            .buscar(id)
            .await?
            .ok_or(AppError::SolicitacaoNaoEncontrada)?;
        if solicitacao.prazo_vencido(Utc::now()) {
            let mut expirada = solicitacao;
            expirada.status = StatusSolicitacao::Expirada;
            expirada.mensagem = Some("Prazo para confirmação do código vencido.".into());
            return Ok(self.solicitacoes.atualizar(&expirada).await?);
        }
        Ok(solicitacao)
    }

    async fn abrir_sessao(&self, cliente: &Cliente) -> Result<Sessao, GatewayError> {
        self.gateway
            .autenticar(&cliente.gateway_login, &cliente.gateway_senha)
            .await
    }

    async fn registrar_falha(&self, mut solicitacao: SolicitacaoGestor, erro: &GatewayError) {
        solicitacao.mensagem = Some(format!("Falha junto à distribuidora: {erro}"));
        if let Err(persistencia) = self.solicitacoes.atualizar(&solicitacao).await {
            tracing::error!(
                solicitacao = %solicitacao.id,
                "falha ao registrar erro da distribuidora: {persistencia}"
            );
        }
    }
}

enum DesfechoDisparo {
    AcessoDireto(String),
    CodigoEnviado(crate::gateway::CodigoPendente),
}
