pub mod audit;
pub mod health;
pub mod instances;
pub mod recommendations;
pub mod usage;
