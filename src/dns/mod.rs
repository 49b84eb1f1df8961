//! DNS relay core: wire codec, filter policy, record store, correlation
//! table, and the relay engine.

pub mod correlation;
pub mod filter;
pub mod relay;
pub mod store;
pub mod wire;

pub use relay::{route_query, RelayEngine, RouteAction};
