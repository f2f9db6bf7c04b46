pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod routing;
pub mod visibility;

#[cfg(test)]
mod test_support;

pub use config::GateConfig;
pub use context::AuthContext;
pub use error::{GateError, GateResult};
