pub mod admin;
pub mod assistant;
pub mod health;
