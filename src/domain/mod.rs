pub mod container;
pub mod constants;
pub mod crypto;
pub mod types;
pub mod verification;
