// src/config.rs

use std::{env, sync::Arc, time::Duration};

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    db::{PgClienteRepository, PgFaturaRepository, PgSolicitacaoRepository, PgUnidadeRepository},
    extractor::{
        ExtratorFatura,
        engine::MotorExtracao,
        gemini::MotorGemini,
        openai::MotorOpenAi,
    },
    gateway::http::GatewayHttp,
    services::{
        GestorService, SincronizacaoService, UnidadeService,
        sincronizacao_service::SincronizacaoConfig,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub sincronizacao_service: SincronizacaoService,
    pub gestor_service: GestorService,
    pub unidade_service: UnidadeService,
}

impl AppState {
    // A assinatura retorna um Result: configuração inválida impede o boot.
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL deve ser definida"))?;
        let gateway_base_url = env::var("GATEWAY_BASE_URL")
            .map_err(|_| anyhow::anyhow!("GATEWAY_BASE_URL deve ser definida"))?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let sync_meses = var_ou("SYNC_MESES", 12u32)?;
        let expiracao_horas = var_ou("GESTOR_EXPIRACAO_HORAS", 48i64)?;

        // --- Monta o gráfico de dependências ---
        let clientes = Arc::new(PgClienteRepository::new(db_pool.clone()));
        let unidades = Arc::new(PgUnidadeRepository::new(db_pool.clone()));
        let faturas = Arc::new(PgFaturaRepository::new(db_pool.clone()));
        let solicitacoes = Arc::new(PgSolicitacaoRepository::new(db_pool.clone()));

        let gateway = Arc::new(GatewayHttp::new(&gateway_base_url)?);
        let extrator = Arc::new(ExtratorFatura::new(motor_extracao()?));

        let sincronizacao_service = SincronizacaoService::new(
            clientes.clone(),
            unidades.clone(),
            faturas,
            gateway.clone(),
            extrator,
            SincronizacaoConfig {
                meses: sync_meses,
                ..SincronizacaoConfig::default()
            },
        );
        let gestor_service = GestorService::new(
            clientes,
            unidades.clone(),
            solicitacoes,
            gateway,
            chrono::Duration::hours(expiracao_horas),
        );
        let unidade_service = UnidadeService::new(unidades);

        Ok(Self {
            db_pool,
            sincronizacao_service,
            gestor_service,
            unidade_service,
        })
    }
}

/// Escolhe o motor de extração pela variável EXTRACTION_PROVIDER
/// (`openai`, padrão, ou `gemini`), com a chave e o modelo do provedor.
fn motor_extracao() -> anyhow::Result<Arc<dyn MotorExtracao>> {
    let provedor = env::var("EXTRACTION_PROVIDER").unwrap_or_else(|_| "openai".to_string());
    match provedor.as_str() {
        "openai" => {
            let api_base = env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
            let api_key = env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY deve ser definida"))?;
            let modelo =
                env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            Ok(Arc::new(MotorOpenAi::new(api_base, api_key, modelo)?))
        }
        "gemini" => {
            let api_key = env::var("GEMINI_API_KEY")
                .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY deve ser definida"))?;
            let modelo =
                env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
            Ok(Arc::new(MotorGemini::new(api_key, modelo)?))
        }
        outro => Err(anyhow::anyhow!(
            "EXTRACTION_PROVIDER desconhecido: {outro} (use 'openai' ou 'gemini')"
        )),
    }
}

fn var_ou<T: std::str::FromStr>(nome: &str, padrao: T) -> anyhow::Result<T> {
    match env::var(nome) {
        Ok(valor) => valor
            .parse()
            .map_err(|_| anyhow::anyhow!("{nome} inválida: {valor}")),
        Err(_) => Ok(padrao),
    }
}
