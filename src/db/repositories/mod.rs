pub mod payment_repository;
pub mod production_repository;
pub mod tier_repository;
pub mod vault_repository;
