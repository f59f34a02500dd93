pub mod amount;
pub mod approval;
pub mod bribe;
pub mod chain;
pub mod collector;
pub mod config;
pub mod currency;
pub mod error;
pub mod fees;
pub mod min_trade;
pub mod preferences;
pub mod pricing;
pub mod quoter;
pub mod relay;
pub mod route;
pub mod routing;
pub mod swap;
pub mod trade;
pub mod validation;

#[cfg(test)]
mod testing;
