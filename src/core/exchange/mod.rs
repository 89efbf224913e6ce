// Peer bot data exchange - envelopes and the receiving side.

pub mod exchange_models;
pub mod exchange_service;

pub use exchange_models::ExchangeMessage;
pub use exchange_service::ExchangeService;
