pub mod health;
pub mod requests;
pub mod tiers;
