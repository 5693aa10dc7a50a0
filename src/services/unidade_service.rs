// src/services/unidade_service.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{common::error::AppError, db::UnidadeStore};

/// Guarda contra dados corrompidos: nenhuma floresta real chega perto disso.
const PROFUNDIDADE_MAXIMA: usize = 32;

/// Regras da árvore geradora/beneficiária. Toda invariante é checada aqui,
/// antes de qualquer escrita: percentual na faixa, soma do rateio <= 100 e
/// ausência de ciclos (caminhada explícita pelos ancestrais).
#[derive(Clone)]
pub struct UnidadeService {
    unidades: Arc<dyn UnidadeStore>,
}

impl UnidadeService {
    pub fn new(unidades: Arc<dyn UnidadeStore>) -> Self {
        Self { unidades }
    }

    /// Vincula uma beneficiária a uma geradora com o percentual de rateio.
    pub async fn vincular_beneficiaria(
        &self,
        geradora_id: Uuid,
        beneficiaria_id: Uuid,
        percentual: Decimal,
    ) -> Result<(), AppError> {
        if percentual.is_sign_negative() || percentual > Decimal::from(100) {
            return Err(AppError::RateioInvalido(percentual));
        }
        if geradora_id == beneficiaria_id {
            return Err(AppError::CicloDetectado);
        }

        let geradora = self
            .unidades
            .buscar(geradora_id)
            .await?
            .ok_or(AppError::UnidadeNaoEncontrada)?;
        self.unidades
            .buscar(beneficiaria_id)
            .await?
            .ok_or(AppError::UnidadeNaoEncontrada)?;

        // A aresta nova é beneficiária -> geradora. Haveria ciclo se a
        // beneficiária já fosse ancestral (direta ou indireta) da geradora.
        let mut ancestral = geradora.geradora_id;
        let mut profundidade = 0;
        while let Some(atual) = ancestral {
            if atual == beneficiaria_id {
                return Err(AppError::CicloDetectado);
            }
            profundidade += 1;
            if profundidade > PROFUNDIDADE_MAXIMA {
                return Err(AppError::InternalServerError(anyhow::anyhow!(
                    "cadeia de geradoras excede {PROFUNDIDADE_MAXIMA} níveis"
                )));
            }
            ancestral = match self.unidades.buscar(atual).await? {
                Some(unidade) => unidade.geradora_id,
                None => None,
            };
        }

        // Soma das demais beneficiárias; a própria fica de fora para que um
        // revínculo com percentual novo não conte duas vezes.
        let soma = self
            .unidades
            .soma_rateio(geradora_id, Some(beneficiaria_id))
            .await?;
        if soma + percentual > Decimal::from(100) {
            return Err(AppError::RateioExcedido {
                disponivel: Decimal::from(100) - soma,
            });
        }

        self.unidades
            .definir_geradora(beneficiaria_id, Some(geradora_id), Some(percentual))
            .await
    }

    /// Desfaz o vínculo de uma beneficiária com sua geradora.
    pub async fn desvincular_beneficiaria(&self, beneficiaria_id: Uuid) -> Result<(), AppError> {
        self.unidades
            .buscar(beneficiaria_id)
            .await?
            .ok_or(AppError::UnidadeNaoEncontrada)?;
        self.unidades
            .definir_geradora(beneficiaria_id, None, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::unidade_repo::MockUnidadeStore;
    use crate::models::unidade::UnidadeConsumidora;
    use std::str::FromStr;

    fn unidade(id: Uuid, geradora_id: Option<Uuid>) -> UnidadeConsumidora {
        UnidadeConsumidora {
            id,
            cliente_id: Uuid::new_v4(),
            codigo: "7001234567".into(),
            digito_verificador: "4".into(),
            codigo_empresa: "82".into(),
            endereco: None,
            titular_documento: None,
            geradora: geradora_id.is_none(),
            geradora_id,
            percentual_rateio: None,
            saldo_creditos_kwh: Decimal::ZERO,
            ativa: true,
            cortada: false,
            desligada: false,
            contrato_ativo: true,
            obsoleta: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn vincula_dentro_do_limite_de_rateio() {
        let geradora_id = Uuid::new_v4();
        let beneficiaria_id = Uuid::new_v4();

        let mut store = MockUnidadeStore::new();
        store
            .expect_buscar()
            .withf(move |id| *id == geradora_id)
            .returning(move |id| Ok(Some(unidade(id, None))));
        store
            .expect_buscar()
            .withf(move |id| *id == beneficiaria_id)
            .returning(move |id| Ok(Some(unidade(id, None))));
        store
            .expect_soma_rateio()
            .withf(move |g, excluir| *g == geradora_id && *excluir == Some(beneficiaria_id))
            .returning(|_, _| Ok(Decimal::from(60)));
        store
            .expect_definir_geradora()
            .withf(move |id, g, p| {
                *id == beneficiaria_id
                    && *g == Some(geradora_id)
                    && *p == Some(Decimal::from(40))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let servico = UnidadeService::new(Arc::new(store));
        servico
            .vincular_beneficiaria(geradora_id, beneficiaria_id, Decimal::from(40))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejeita_soma_de_rateio_acima_de_100() {
        let geradora_id = Uuid::new_v4();
        let beneficiaria_id = Uuid::new_v4();

        let mut store = MockUnidadeStore::new();
        store
            .expect_buscar()
            .returning(move |id| Ok(Some(unidade(id, None))));
        store
            .expect_soma_rateio()
            .returning(|_, _| Ok(Decimal::from_str("70.5").unwrap()));
        // Nenhuma expectativa de definir_geradora: persistir aqui é defeito.

        let servico = UnidadeService::new(Arc::new(store));
        let erro = servico
            .vincular_beneficiaria(geradora_id, beneficiaria_id, Decimal::from(40))
            .await
            .unwrap_err();

        match erro {
            AppError::RateioExcedido { disponivel } => {
                assert_eq!(disponivel, Decimal::from_str("29.5").unwrap());
            }
            outro => panic!("esperava RateioExcedido, veio {outro:?}"),
        }
    }

    #[tokio::test]
    async fn rejeita_percentual_fora_da_faixa() {
        let servico = UnidadeService::new(Arc::new(MockUnidadeStore::new()));
        let geradora_id = Uuid::new_v4();
        let beneficiaria_id = Uuid::new_v4();

        let erro = servico
            .vincular_beneficiaria(geradora_id, beneficiaria_id, Decimal::from(-1))
            .await
            .unwrap_err();
        assert!(matches!(erro, AppError::RateioInvalido(_)));

        let erro = servico
            .vincular_beneficiaria(geradora_id, beneficiaria_id, Decimal::from(101))
            .await
            .unwrap_err();
        assert!(matches!(erro, AppError::RateioInvalido(_)));
    }

    #[tokio::test]
    async fn rejeita_auto_vinculo() {
        let servico = UnidadeService::new(Arc::new(MockUnidadeStore::new()));
        let id = Uuid::new_v4();

        let erro = servico
            .vincular_beneficiaria(id, id, Decimal::from(10))
            .await
            .unwrap_err();
        assert!(matches!(erro, AppError::CicloDetectado));
    }

    #[tokio::test]
    async fn rejeita_ciclo_indireto_pela_cadeia_de_ancestrais() {
        // Cadeia existente: geradora -> intermediaria -> beneficiaria.
        // Vincular a beneficiária sob a geradora fecharia o ciclo.
        let beneficiaria_id = Uuid::new_v4();
        let intermediaria_id = Uuid::new_v4();
        let geradora_id = Uuid::new_v4();

        let mut store = MockUnidadeStore::new();
        store
            .expect_buscar()
            .withf(move |id| *id == geradora_id)
            .returning(move |id| Ok(Some(unidade(id, Some(intermediaria_id)))));
        store
            .expect_buscar()
            .withf(move |id| *id == beneficiaria_id)
            .returning(move |id| Ok(Some(unidade(id, None))));
        store
            .expect_buscar()
            .withf(move |id| *id == intermediaria_id)
            .returning(move |id| Ok(Some(unidade(id, Some(beneficiaria_id)))));

        let servico = UnidadeService::new(Arc::new(store));
        let erro = servico
            .vincular_beneficiaria(geradora_id, beneficiaria_id, Decimal::from(10))
            .await
            .unwrap_err();
        assert!(matches!(erro, AppError::CicloDetectado));
    }

    #[tokio::test]
    async fn desvincula_beneficiaria() {
        let beneficiaria_id = Uuid::new_v4();
        let geradora_id = Uuid::new_v4();

        let mut store = MockUnidadeStore::new();
        store
            .expect_buscar()
            .returning(move |id| Ok(Some(unidade(id, Some(geradora_id)))));
        store
            .expect_definir_geradora()
            .withf(move |id, g, p| *id == beneficiaria_id && g.is_none() && p.is_none())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let servico = UnidadeService::new(Arc::new(store));
        servico
            .desvincular_beneficiaria(beneficiaria_id)
            .await
            .unwrap();
    }
}
