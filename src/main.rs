//src/main.rs

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// Declaração dos nossos módulos
mod common;
mod config;
mod db;
mod docs;
mod extractor;
mod gateway;
mod handlers;
mod models;
mod services;

use crate::config::AppState;

#[tokio::main]
async fn main() {
    // Inicializa o logger.
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rotas de sincronização, por cliente
    let sincronizacao_routes = Router::new().route(
        "/{cliente_id}/sincronizacao",
        post(handlers::sincronizacao::iniciar_sincronizacao)
            .get(handlers::sincronizacao::consultar_sincronizacao),
    );

    // Rotas do fluxo de acesso delegado (gestor)
    let gestor_routes = Router::new()
        .route(
            "/solicitacoes/{id}",
            get(handlers::gestor::consultar_solicitacao),
        )
        .route(
            "/solicitacoes/{id}/confirmar",
            post(handlers::gestor::confirmar_codigo),
        )
        .route(
            "/solicitacoes/{id}/cancelar",
            post(handlers::gestor::cancelar_solicitacao),
        );

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route(
            "/api/clientes/{cliente_id}/gestor/solicitacoes",
            post(handlers::gestor::solicitar_acesso),
        )
        .nest("/api/clientes", sincronizacao_routes)
        .nest("/api/gestor", gestor_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .with_state(app_state);

    // Inicia o servidor
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
