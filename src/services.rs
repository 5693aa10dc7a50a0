pub mod gestor_service;
pub use gestor_service::GestorService;
pub mod sincronizacao_service;
pub use sincronizacao_service::SincronizacaoService;
pub mod unidade_service;
pub use unidade_service::UnidadeService;
