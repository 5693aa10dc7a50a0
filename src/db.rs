pub mod cliente_repo;
pub use cliente_repo::{ClienteStore, PgClienteRepository};
pub mod unidade_repo;
pub use unidade_repo::{PgUnidadeRepository, UnidadeStore};
pub mod fatura_repo;
pub use fatura_repo::{FaturaStore, PgFaturaRepository};
pub mod gestor_repo;
pub use gestor_repo::{PgSolicitacaoRepository, SolicitacaoStore};
