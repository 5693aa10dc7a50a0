pub mod cliente;
pub mod fatura;
pub mod gestor;
pub mod unidade;
