pub mod fiscal;
pub mod payment;
pub mod production;
pub mod tier;
pub mod vault;
