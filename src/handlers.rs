pub mod gestor;
pub mod sincronizacao;
