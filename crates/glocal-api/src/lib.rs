// glocal-api: HTTP boundary for Google account token exchanges and the
// Home Foyer graph service.

pub mod auth;
pub mod error;
pub mod foyer;

pub use auth::{AuthClient, ExchangeResponse, TokenExchange};
pub use error::Error;
pub use foyer::{FoyerClient, GraphService, Hardware, Home, HomeGraph, HomeGraphDevice};
