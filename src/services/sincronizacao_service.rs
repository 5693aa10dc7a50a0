// src/services/sincronizacao_service.rs
//
// O orquestrador de sincronização: dono do ciclo PENDENTE -> SINCRONIZANDO
// -> (CONCLUIDA | ERRO) de cada cliente. Puxa unidades e faturas pelo
// gateway, passa o texto pelo extrator e persiste os resultados. Uma
// execução por cliente de cada vez; progresso parcial é durável.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClienteStore, FaturaStore, UnidadeStore},
    extractor::{ExtracaoError, ExtratorFatura},
    gateway::{DistribuidoraGateway, GatewayError, Sessao, UnidadeDescritor},
    models::{
        cliente::{Cliente, StatusConexao, StatusSync},
        fatura::{NovaFatura, StatusFatura},
        unidade::ChaveUnidade,
    },
    services::unidade_service::UnidadeService,
};

#[derive(Clone)]
pub struct SincronizacaoConfig {
    /// Quantos meses para trás buscar faturas.
    pub meses: u32,
    /// Orçamento de retentativas para falhas de transporte.
    pub tentativas: u32,
    pub backoff_inicial: Duration,
}

impl Default for SincronizacaoConfig {
    fn default() -> Self {
        Self {
            meses: 12,
            tentativas: 3,
            backoff_inicial: Duration::from_millis(500),
        }
    }
}

/// O que a camada de consulta enxerga de uma sincronização.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SituacaoSincronizacao {
    pub status: StatusSync,
    pub ultima_sincronizacao: Option<DateTime<Utc>>,
    pub mensagem: Option<String>,
}

/// Contadores de uma execução, resumidos na mensagem final do cliente.
#[derive(Debug, Default)]
struct ResumoExecucao {
    unidades: usize,
    faturas_importadas: usize,
    em_revisao: usize,
    periodos_sem_fatura: usize,
    unidades_obsoletas: u64,
    vinculos_rejeitados: usize,
}

impl ResumoExecucao {
    fn mensagem(&self) -> String {
        let mut partes = vec![
            format!("{} unidades", self.unidades),
            format!(
                "{} faturas importadas ({} para revisão)",
                self.faturas_importadas, self.em_revisao
            ),
        ];
        if self.periodos_sem_fatura > 0 {
            partes.push(format!("{} períodos sem fatura", self.periodos_sem_fatura));
        }
        if self.unidades_obsoletas > 0 {
            partes.push(format!("{} unidades obsoletas", self.unidades_obsoletas));
        }
        if self.vinculos_rejeitados > 0 {
            partes.push(format!("{} vínculos rejeitados", self.vinculos_rejeitados));
        }
        partes.join("; ")
    }
}

/// Os últimos `meses` períodos `(mes, ano)`, do mais recente para trás.
fn periodos(meses: u32, referencia: NaiveDate) -> Vec<(i32, i32)> {
    let mut mes = referencia.month() as i32;
    let mut ano = referencia.year();
    (0..meses)
        .map(|_| {
            let periodo = (mes, ano);
            mes -= 1;
            if mes == 0 {
                mes = 12;
                ano -= 1;
            }
            periodo
        })
        .collect()
}

#[derive(Clone)]
pub struct SincronizacaoService {
    clientes: Arc<dyn ClienteStore>,
    unidades: Arc<dyn UnidadeStore>,
    faturas: Arc<dyn FaturaStore>,
    vinculos: UnidadeService,
    gateway: Arc<dyn DistribuidoraGateway>,
    extrator: Arc<ExtratorFatura>,
    config: SincronizacaoConfig,
}

impl SincronizacaoService {
    pub fn new(
        clientes: Arc<dyn ClienteStore>,
        unidades: Arc<dyn UnidadeStore>,
        faturas: Arc<dyn FaturaStore>,
        gateway: Arc<dyn DistribuidoraGateway>,
        extrator: Arc<ExtratorFatura>,
        config: SincronizacaoConfig,
    ) -> Self {
        let vinculos = UnidadeService::new(unidades.clone());
        Self {
            clientes,
            unidades,
            faturas,
            vinculos,
            gateway,
            extrator,
            config,
        }
    }

    /// Dispara uma sincronização para o cliente. Se já houver uma em
    /// andamento, rejeita na hora: o status SINCRONIZANDO é a trava.
    pub async fn iniciar(&self, cliente_id: Uuid) -> Result<(), AppError> {
        let cliente = self
            .clientes
            .buscar(cliente_id)
            .await?
            .ok_or(AppError::ClienteNaoEncontrado)?;

        if !self.clientes.iniciar_sincronizacao(cliente_id).await? {
            return Err(AppError::SincronizacaoEmAndamento);
        }

        let servico = self.clone();
        tokio::spawn(async move {
            servico.executar(cliente).await;
        });

        Ok(())
    }

    /// Estado legível da sincronização, sempre com mensagem significativa.
    pub async fn situacao(&self, cliente_id: Uuid) -> Result<SituacaoSincronizacao, AppError> {
        let cliente = self
            .clientes
            .buscar(cliente_id)
            .await?
            .ok_or(AppError::ClienteNaoEncontrado)?;

        Ok(SituacaoSincronizacao {
            status: cliente.status_sync,
            ultima_sincronizacao: cliente.ultima_sincronizacao,
            mensagem: cliente.mensagem_sync,
        })
    }

    /// Corpo de uma execução. Todo caminho de saída libera a trava com um
    /// desfecho legível; as faturas já persistidas ficam.
    async fn executar(&self, cliente: Cliente) {
        tracing::info!(cliente = %cliente.id, "sincronização iniciada");

        let registro = match self.sincronizar(&cliente).await {
            Ok(resumo) => {
                tracing::info!(cliente = %cliente.id, "sincronização concluída: {}", resumo.mensagem());
                self.clientes
                    .finalizar_sincronizacao(
                        cliente.id,
                        StatusSync::Concluida,
                        Some(resumo.mensagem()),
                        Some(Utc::now()),
                    )
                    .await
            }
            Err(erro) => {
                tracing::warn!(cliente = %cliente.id, "sincronização falhou: {erro}");
                self.clientes
                    .finalizar_sincronizacao(
                        cliente.id,
                        StatusSync::Erro,
                        Some(format!("Sincronização falhou: {erro}")),
                        None,
                    )
                    .await
            }
        };

        if let Err(erro) = registro {
            tracing::error!(cliente = %cliente.id, "falha ao registrar desfecho da sincronização: {erro}");
        }
    }

    async fn sincronizar(&self, cliente: &Cliente) -> Result<ResumoExecucao, AppError> {
        let sessao = match self.autenticar_com_retentativa(cliente).await {
            Ok(sessao) => sessao,
            Err(erro) => {
                self.clientes
                    .atualizar_status_conexao(cliente.id, StatusConexao::Falha)
                    .await?;
                return Err(erro.into());
            }
        };

        // A partir daqui existe sessão aberta: qualquer desfecho, inclusive
        // falha ao registrar a conexão, passa pelo encerramento.
        let resultado = async {
            self.clientes
                .atualizar_status_conexao(cliente.id, StatusConexao::Conectado)
                .await?;
            self.percorrer_unidades(cliente, &sessao).await
        }
        .await;

        self.gateway.encerrar_sessao(sessao).await;

        resultado
    }

    async fn autenticar_com_retentativa(&self, cliente: &Cliente) -> Result<Sessao, GatewayError> {
        let mut espera = self.config.backoff_inicial;
        let mut tentativa = 1u32;
        loop {
            match self
                .gateway
                .autenticar(&cliente.gateway_login, &cliente.gateway_senha)
                .await
            {
                Ok(sessao) => return Ok(sessao),
                Err(erro) if erro.retentavel() && tentativa < self.config.tentativas => {
                    tracing::warn!(
                        cliente = %cliente.id,
                        tentativa,
                        "autenticação falhou de forma retentável: {erro}"
                    );
                    tokio::time::sleep(espera).await;
                    espera *= 2;
                    tentativa += 1;
                }
                Err(erro) => return Err(erro),
            }
        }
    }

    async fn percorrer_unidades(
        &self,
        cliente: &Cliente,
        sessao: &Sessao,
    ) -> Result<ResumoExecucao, AppError> {
        let descritores = self.gateway.listar_unidades(sessao).await?;
        let mut resumo = ResumoExecucao {
            unidades: descritores.len(),
            ..Default::default()
        };

        // Primeira passada: upsert de todas as unidades reportadas.
        let mut locais: HashMap<ChaveUnidade, Uuid> = HashMap::new();
        for descritor in &descritores {
            let unidade = self.unidades.upsert(cliente.id, descritor).await?;
            locais.insert(descritor.chave.clone(), unidade.id);
        }

        // Segunda passada: vínculos geradora/beneficiária, com as duas
        // pontas já resolvidas localmente. Violação de invariante nunca
        // persiste; derruba só o vínculo, não a execução.
        for descritor in &descritores {
            let (Some(chave_geradora), Some(percentual)) =
                (&descritor.geradora_chave, descritor.percentual_rateio)
            else {
                continue;
            };
            let (Some(&geradora_id), Some(&beneficiaria_id)) =
                (locais.get(chave_geradora), locais.get(&descritor.chave))
            else {
                tracing::warn!(
                    unidade = %descritor.chave,
                    "geradora {} não reportada pela distribuidora; vínculo ignorado",
                    chave_geradora
                );
                resumo.vinculos_rejeitados += 1;
                continue;
            };
            if let Err(erro) = self
                .vinculos
                .vincular_beneficiaria(geradora_id, beneficiaria_id, percentual)
                .await
            {
                tracing::warn!(unidade = %descritor.chave, "vínculo rejeitado: {erro}");
                resumo.vinculos_rejeitados += 1;
            }
        }

        // Unidades que sumiram do relatório viram obsoletas, nunca removidas:
        // uma omissão transitória da distribuidora não destrói histórico.
        let vistas: Vec<Uuid> = locais.values().copied().collect();
        resumo.unidades_obsoletas = self.unidades.marcar_obsoletas(cliente.id, &vistas).await?;

        // Faturas: unidade a unidade, período a período, sequencialmente.
        let alvos = periodos(self.config.meses, Utc::now().date_naive());
        for descritor in &descritores {
            let unidade_id = locais[&descritor.chave];
            for &(mes, ano) in &alvos {
                let Some(texto) = self
                    .buscar_fatura_com_retentativa(sessao, &descritor.chave, mes, ano)
                    .await?
                else {
                    tracing::debug!(unidade = %descritor.chave, mes, ano, "sem fatura no período");
                    resumo.periodos_sem_fatura += 1;
                    continue;
                };

                let nova = self
                    .montar_fatura(unidade_id, mes, ano, &texto, &mut resumo)
                    .await;
                self.faturas.upsert(&nova).await?;
                resumo.faturas_importadas += 1;
            }
        }

        Ok(resumo)
    }

    /// `NaoEncontrado` é benigno (devolve `None`); falha de transporte ganha
    /// o mesmo orçamento de retentativas da autenticação.
    async fn buscar_fatura_com_retentativa(
        &self,
        sessao: &Sessao,
        chave: &ChaveUnidade,
        mes: i32,
        ano: i32,
    ) -> Result<Option<String>, AppError> {
        let mut espera = self.config.backoff_inicial;
        let mut tentativa = 1u32;
        loop {
            match self.gateway.buscar_fatura(sessao, chave, mes, ano).await {
                Ok(texto) => return Ok(Some(texto)),
                Err(GatewayError::NaoEncontrado) => return Ok(None),
                Err(erro) if erro.retentavel() && tentativa < self.config.tentativas => {
                    tracing::warn!(unidade = %chave, mes, ano, tentativa, "busca de fatura falhou: {erro}");
                    tokio::time::sleep(espera).await;
                    espera *= 2;
                    tentativa += 1;
                }
                Err(erro) => return Err(erro.into()),
            }
        }
    }

    /// Extração incompleta (ou motor fora do ar) rebaixa a fatura para
    /// REVISAO_PENDENTE com o que foi recuperável; nunca aborta a execução.
    async fn montar_fatura(
        &self,
        unidade_id: Uuid,
        mes: i32,
        ano: i32,
        texto: &str,
        resumo: &mut ResumoExecucao,
    ) -> NovaFatura {
        match self.extrator.extrair(texto).await {
            Ok(fatura) => NovaFatura {
                unidade_id,
                mes,
                ano,
                vencimento: Some(fatura.vencimento),
                valor_total: Some(fatura.valor_total),
                consumo_kwh: Some(fatura.consumo_kwh),
                status: StatusFatura::Aberta,
                detalhes: Some(json!({
                    "itensInjecao": fatura.itens_injecao,
                    "painelAtencao": fatura.painel_atencao,
                })),
            },
            Err(ExtracaoError::Incompleta { faltantes, parcial }) => {
                tracing::warn!(
                    %unidade_id, mes, ano,
                    "extração incompleta (faltando: {}); fatura marcada para revisão",
                    faltantes.join(", ")
                );
                resumo.em_revisao += 1;
                NovaFatura {
                    unidade_id,
                    mes,
                    ano,
                    vencimento: parcial.vencimento,
                    valor_total: parcial.valor_total,
                    consumo_kwh: parcial.consumo_kwh,
                    status: StatusFatura::RevisaoPendente,
                    detalhes: Some(json!({
                        "itensInjecao": parcial.itens_injecao,
                        "painelAtencao": parcial.painel_atencao,
                        "camposAusentes": faltantes,
                        "payloadBruto": parcial.bruto,
                    })),
                }
            }
            Err(erro) => {
                tracing::warn!(%unidade_id, mes, ano, "motor de extração falhou: {erro}");
                resumo.em_revisao += 1;
                NovaFatura {
                    unidade_id,
                    mes,
                    ano,
                    vencimento: None,
                    valor_total: None,
                    consumo_kwh: None,
                    status: StatusFatura::RevisaoPendente,
                    detalhes: Some(json!({
                        "erroExtracao": erro.to_string(),
                        "textoBruto": texto,
                    })),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::cliente_repo::MockClienteStore;
    use crate::db::fatura_repo::MockFaturaStore;
    use crate::db::unidade_repo::MockUnidadeStore;
    use crate::extractor::engine::MockMotorExtracao;
    use crate::gateway::MockDistribuidoraGateway;
    use crate::models::fatura::Fatura;
    use crate::models::unidade::UnidadeConsumidora;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn cliente() -> Cliente {
        Cliente {
            id: Uuid::new_v4(),
            nome: "Cooperativa Solar do Vale".into(),
            documento: "12345678000190".into(),
            gateway_login: "coop".into(),
            gateway_senha: "segredo".into(),
            status_conexao: StatusConexao::Desconectado,
            status_sync: StatusSync::Pendente,
            ultima_sincronizacao: None,
            mensagem_sync: None,
            created_at: None,
        }
    }

    fn chave(codigo: &str) -> ChaveUnidade {
        ChaveUnidade {
            codigo: codigo.into(),
            digito_verificador: "4".into(),
            codigo_empresa: "82".into(),
        }
    }

    fn descritor(codigo: &str) -> UnidadeDescritor {
        UnidadeDescritor {
            chave: chave(codigo),
            endereco: Some("Rua das Placas, 100".into()),
            titular_documento: Some("12345678000190".into()),
            geradora: false,
            ativa: true,
            cortada: false,
            desligada: false,
            contrato_ativo: true,
            geradora_chave: None,
            percentual_rateio: None,
        }
    }

    fn unidade_de(cliente_id: Uuid, descritor: &UnidadeDescritor, id: Uuid) -> UnidadeConsumidora {
        UnidadeConsumidora {
            id,
            cliente_id,
            codigo: descritor.chave.codigo.clone(),
            digito_verificador: descritor.chave.digito_verificador.clone(),
            codigo_empresa: descritor.chave.codigo_empresa.clone(),
            endereco: descritor.endereco.clone(),
            titular_documento: descritor.titular_documento.clone(),
            geradora: descritor.geradora,
            geradora_id: None,
            percentual_rateio: None,
            saldo_creditos_kwh: Decimal::ZERO,
            ativa: descritor.ativa,
            cortada: descritor.cortada,
            desligada: descritor.desligada,
            contrato_ativo: descritor.contrato_ativo,
            obsoleta: false,
            created_at: None,
            updated_at: None,
        }
    }

    fn fatura_de(nova: &NovaFatura) -> Fatura {
        Fatura {
            id: Uuid::new_v4(),
            unidade_id: nova.unidade_id,
            mes: nova.mes,
            ano: nova.ano,
            vencimento: nova.vencimento,
            valor_total: nova.valor_total,
            consumo_kwh: nova.consumo_kwh,
            status: nova.status,
            detalhes: nova.detalhes.clone(),
            created_at: None,
            updated_at: None,
        }
    }

    fn payload_completo() -> serde_json::Value {
        json!({
            "vencimento": "2025-03-25",
            "valor_total": 110.37,
            "consumo_kwh": 245,
            "itens_injecao": [
                { "descricao": "ENERGIA INJETADA GD I", "quantidade_kwh": 180 }
            ],
            "painel_atencao": null,
        })
    }

    fn servico(
        clientes: MockClienteStore,
        unidades: MockUnidadeStore,
        faturas: MockFaturaStore,
        gateway: MockDistribuidoraGateway,
        motor: MockMotorExtracao,
        meses: u32,
    ) -> SincronizacaoService {
        SincronizacaoService::new(
            Arc::new(clientes),
            Arc::new(unidades),
            Arc::new(faturas),
            Arc::new(gateway),
            Arc::new(ExtratorFatura::new(Arc::new(motor))),
            SincronizacaoConfig {
                meses,
                tentativas: 3,
                backoff_inicial: Duration::from_millis(10),
            },
        )
    }

    #[tokio::test]
    async fn rejeita_disparo_com_sincronizacao_em_andamento() {
        let alvo = cliente();
        let cliente_id = alvo.id;

        let mut clientes = MockClienteStore::new();
        clientes
            .expect_buscar()
            .returning(move |_| Ok(Some(alvo.clone())));
        // Trava já tomada: nenhum outro efeito pode acontecer.
        clientes
            .expect_iniciar_sincronizacao()
            .times(1)
            .returning(|_| Ok(false));

        let servico = servico(
            clientes,
            MockUnidadeStore::new(),
            MockFaturaStore::new(),
            MockDistribuidoraGateway::new(),
            MockMotorExtracao::new(),
            1,
        );

        let erro = servico.iniciar(cliente_id).await.unwrap_err();
        assert!(matches!(erro, AppError::SincronizacaoEmAndamento));
    }

    #[tokio::test(start_paused = true)]
    async fn conclui_apos_retentativa_de_autenticacao() {
        let alvo = cliente();
        let cliente_id = alvo.id;
        let d = descritor("7001234567");
        let unidade_id = Uuid::new_v4();

        let mut gateway = MockDistribuidoraGateway::new();
        // Primeira tentativa: transporte (retentável). Segunda: sucesso.
        gateway
            .expect_autenticar()
            .times(1)
            .returning(|_, _| Err(GatewayError::Transporte("timeout".into())));
        gateway.expect_autenticar().times(1).returning(|_, _| {
            Ok(Sessao {
                token: "tk".into(),
            })
        });
        let d_listagem = d.clone();
        gateway
            .expect_listar_unidades()
            .times(1)
            .returning(move |_| Ok(vec![d_listagem.clone()]));
        gateway
            .expect_buscar_fatura()
            .times(1)
            .returning(|_, _, _, _| Ok("texto ocr da fatura".into()));
        gateway
            .expect_encerrar_sessao()
            .times(1)
            .returning(|_| ());

        let mut motor = MockMotorExtracao::new();
        motor
            .expect_extrair_campos()
            .returning(|_| Ok(payload_completo()));

        let mut unidades = MockUnidadeStore::new();
        unidades
            .expect_upsert()
            .times(1)
            .returning(move |cid, desc| Ok(unidade_de(cid, desc, unidade_id)));
        unidades
            .expect_marcar_obsoletas()
            .times(1)
            .returning(|_, _| Ok(0));

        let mut faturas = MockFaturaStore::new();
        faturas
            .expect_upsert()
            .withf(move |nova| {
                nova.unidade_id == unidade_id && nova.status == StatusFatura::Aberta
            })
            .times(1)
            .returning(|nova| Ok(fatura_de(nova)));

        let mut clientes = MockClienteStore::new();
        clientes
            .expect_atualizar_status_conexao()
            .withf(|_, status| *status == StatusConexao::Conectado)
            .times(1)
            .returning(|_, _| Ok(()));
        clientes
            .expect_finalizar_sincronizacao()
            .withf(move |id, status, mensagem, ultima| {
                *id == cliente_id
                    && *status == StatusSync::Concluida
                    && mensagem.is_some()
                    && ultima.is_some()
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let servico = servico(clientes, unidades, faturas, gateway, motor, 1);
        servico.executar(alvo).await;
    }

    #[tokio::test]
    async fn falha_de_credencial_vira_erro_sem_retentativa() {
        let alvo = cliente();
        let cliente_id = alvo.id;

        let mut gateway = MockDistribuidoraGateway::new();
        gateway
            .expect_autenticar()
            .times(1)
            .returning(|_, _| Err(GatewayError::Autenticacao("senha inválida".into())));
        // Sem sessão aberta, nada a encerrar.

        let mut clientes = MockClienteStore::new();
        clientes
            .expect_atualizar_status_conexao()
            .withf(|_, status| *status == StatusConexao::Falha)
            .times(1)
            .returning(|_, _| Ok(()));
        clientes
            .expect_finalizar_sincronizacao()
            .withf(move |id, status, mensagem, ultima| {
                *id == cliente_id
                    && *status == StatusSync::Erro
                    && mensagem.as_deref().is_some_and(|m| !m.is_empty())
                    && ultima.is_none()
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let servico = servico(
            clientes,
            MockUnidadeStore::new(),
            MockFaturaStore::new(),
            gateway,
            MockMotorExtracao::new(),
            1,
        );
        servico.executar(alvo).await;
    }

    #[tokio::test]
    async fn periodo_sem_fatura_e_benigno_e_extracao_incompleta_vira_revisao() {
        let alvo = cliente();
        let d = descritor("7001234567");
        let unidade_id = Uuid::new_v4();

        let mut gateway = MockDistribuidoraGateway::new();
        gateway.expect_autenticar().returning(|_, _| {
            Ok(Sessao {
                token: "tk".into(),
            })
        });
        let d_listagem = d.clone();
        gateway
            .expect_listar_unidades()
            .returning(move |_| Ok(vec![d_listagem.clone()]));
        // Período mais recente tem fatura; o anterior não.
        gateway
            .expect_buscar_fatura()
            .times(1)
            .returning(|_, _, _, _| Ok("texto ocr".into()));
        gateway
            .expect_buscar_fatura()
            .times(1)
            .returning(|_, _, _, _| Err(GatewayError::NaoEncontrado));
        gateway.expect_encerrar_sessao().times(1).returning(|_| ());

        // Motor devolve payload sem vencimento: extração incompleta.
        let mut motor = MockMotorExtracao::new();
        motor.expect_extrair_campos().returning(|_| {
            let mut payload = payload_completo();
            payload["vencimento"] = serde_json::Value::Null;
            Ok(payload)
        });

        let mut unidades = MockUnidadeStore::new();
        unidades
            .expect_upsert()
            .returning(move |cid, desc| Ok(unidade_de(cid, desc, unidade_id)));
        unidades
            .expect_marcar_obsoletas()
            .returning(|_, _| Ok(0));

        let mut faturas = MockFaturaStore::new();
        faturas
            .expect_upsert()
            .withf(|nova| {
                nova.status == StatusFatura::RevisaoPendente
                    && nova.vencimento.is_none()
                    && nova.valor_total.is_some()
            })
            .times(1)
            .returning(|nova| Ok(fatura_de(nova)));

        let mut clientes = MockClienteStore::new();
        clientes
            .expect_atualizar_status_conexao()
            .returning(|_, _| Ok(()));
        clientes
            .expect_finalizar_sincronizacao()
            .withf(|_, status, mensagem, _| {
                *status == StatusSync::Concluida
                    && mensagem.as_deref().is_some_and(|m| m.contains("revisão"))
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let servico = servico(clientes, unidades, faturas, gateway, motor, 2);
        servico.executar(alvo).await;
    }

    #[tokio::test]
    async fn sessao_e_encerrada_mesmo_quando_a_listagem_falha() {
        let alvo = cliente();

        let mut gateway = MockDistribuidoraGateway::new();
        gateway.expect_autenticar().returning(|_, _| {
            Ok(Sessao {
                token: "tk".into(),
            })
        });
        gateway
            .expect_listar_unidades()
            .returning(|_| Err(GatewayError::Protocolo("resposta truncada".into())));
        gateway.expect_encerrar_sessao().times(1).returning(|_| ());

        let mut clientes = MockClienteStore::new();
        clientes
            .expect_atualizar_status_conexao()
            .returning(|_, _| Ok(()));
        clientes
            .expect_finalizar_sincronizacao()
            .withf(|_, status, _, _| *status == StatusSync::Erro)
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let servico = servico(
            clientes,
            MockUnidadeStore::new(),
            MockFaturaStore::new(),
            gateway,
            MockMotorExtracao::new(),
            1,
        );
        servico.executar(alvo).await;
    }

    #[tokio::test]
    async fn sessao_e_encerrada_quando_o_registro_da_conexao_falha() {
        let alvo = cliente();

        let mut gateway = MockDistribuidoraGateway::new();
        gateway.expect_autenticar().returning(|_, _| {
            Ok(Sessao {
                token: "tk".into(),
            })
        });
        gateway.expect_encerrar_sessao().times(1).returning(|_| ());

        let mut clientes = MockClienteStore::new();
        // O banco cai logo após a autenticação: a sessão aberta não pode vazar.
        clientes
            .expect_atualizar_status_conexao()
            .withf(|_, status| *status == StatusConexao::Conectado)
            .times(1)
            .returning(|_, _| Err(AppError::DatabaseError(sqlx::Error::PoolClosed)));
        clientes
            .expect_finalizar_sincronizacao()
            .withf(|_, status, _, _| *status == StatusSync::Erro)
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let servico = servico(
            clientes,
            MockUnidadeStore::new(),
            MockFaturaStore::new(),
            gateway,
            MockMotorExtracao::new(),
            1,
        );
        servico.executar(alvo).await;
    }

    #[tokio::test]
    async fn resincronizacao_passa_a_mesma_chave_natural_pelo_upsert() {
        let alvo = cliente();
        let d = descritor("7001234567");
        let unidade_id = Uuid::new_v4();

        let mut gateway = MockDistribuidoraGateway::new();
        gateway.expect_autenticar().returning(|_, _| {
            Ok(Sessao {
                token: "tk".into(),
            })
        });
        let d_listagem = d.clone();
        gateway
            .expect_listar_unidades()
            .returning(move |_| Ok(vec![d_listagem.clone()]));
        gateway
            .expect_buscar_fatura()
            .returning(|_, _, _, _| Ok("texto ocr da fatura".into()));
        gateway.expect_encerrar_sessao().times(2).returning(|_| ());

        let mut motor = MockMotorExtracao::new();
        motor
            .expect_extrair_campos()
            .returning(|_| Ok(payload_completo()));

        let mut unidades = MockUnidadeStore::new();
        unidades
            .expect_upsert()
            .returning(move |cid, desc| Ok(unidade_de(cid, desc, unidade_id)));
        unidades
            .expect_marcar_obsoletas()
            .returning(|_, _| Ok(0));

        // Duas execuções sobre os mesmos dados: o mesmo período segue sempre
        // pelo upsert com a mesma chave natural, nunca por outro caminho.
        let mut faturas = MockFaturaStore::new();
        faturas
            .expect_upsert()
            .withf(move |nova| nova.unidade_id == unidade_id)
            .times(2)
            .returning(|nova| Ok(fatura_de(nova)));

        let mut clientes = MockClienteStore::new();
        clientes
            .expect_atualizar_status_conexao()
            .returning(|_, _| Ok(()));
        clientes
            .expect_finalizar_sincronizacao()
            .withf(|_, status, _, _| *status == StatusSync::Concluida)
            .times(2)
            .returning(|_, _, _, _| Ok(()));

        let servico = servico(clientes, unidades, faturas, gateway, motor, 1);
        servico.executar(alvo.clone()).await;
        servico.executar(alvo).await;
    }

    #[tokio::test]
    async fn aplica_vinculo_geradora_beneficiaria_reportado() {
        let alvo = cliente();
        let geradora_id = Uuid::new_v4();
        let beneficiaria_id = Uuid::new_v4();

        let mut geradora = descritor("7009876543");
        geradora.geradora = true;
        let mut beneficiaria = descritor("7001234567");
        beneficiaria.geradora_chave = Some(geradora.chave.clone());
        beneficiaria.percentual_rateio = Some(Decimal::from(40));

        let mut gateway = MockDistribuidoraGateway::new();
        gateway.expect_autenticar().returning(|_, _| {
            Ok(Sessao {
                token: "tk".into(),
            })
        });
        let lista = vec![geradora.clone(), beneficiaria.clone()];
        gateway
            .expect_listar_unidades()
            .returning(move |_| Ok(lista.clone()));
        gateway.expect_encerrar_sessao().returning(|_| ());

        let mut unidades = MockUnidadeStore::new();
        let chave_geradora = geradora.chave.clone();
        unidades.expect_upsert().times(2).returning(move |cid, desc| {
            let id = if desc.chave == chave_geradora {
                geradora_id
            } else {
                beneficiaria_id
            };
            Ok(unidade_de(cid, desc, id))
        });
        unidades
            .expect_buscar()
            .returning(move |id| {
                let desc = descritor("qualquer");
                Ok(Some(unidade_de(Uuid::new_v4(), &desc, id)))
            });
        unidades
            .expect_soma_rateio()
            .returning(|_, _| Ok(Decimal::ZERO));
        unidades
            .expect_definir_geradora()
            .withf(move |id, g, p| {
                *id == beneficiaria_id
                    && *g == Some(geradora_id)
                    && *p == Some(Decimal::from(40))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        unidades
            .expect_marcar_obsoletas()
            .returning(|_, _| Ok(0));

        let mut clientes = MockClienteStore::new();
        clientes
            .expect_atualizar_status_conexao()
            .returning(|_, _| Ok(()));
        clientes
            .expect_finalizar_sincronizacao()
            .withf(|_, status, _, _| *status == StatusSync::Concluida)
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        // Zero meses: este cenário só exercita unidades e vínculos.
        let servico = servico(
            clientes,
            unidades,
            MockFaturaStore::new(),
            gateway,
            MockMotorExtracao::new(),
            0,
        );
        servico.executar(alvo).await;
    }

    #[test]
    fn periodos_andam_para_tras_cruzando_o_ano() {
        let referencia = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
        assert_eq!(
            periodos(3, referencia),
            vec![(2, 2025), (1, 2025), (12, 2024)]
        );
        assert!(periodos(0, referencia).is_empty());
    }
}
