//! WebSocket connectors: the generic reconnect loop and its three
//! channel-specific specializations (SPEC_FULL §4.2-§4.3).

pub mod connector;
pub mod private;
pub mod public;
pub mod user_data;

pub use connector::{Connector, ConnectorHandle, ConnectorHooks};
pub use private::{private_connector, PrivateSessionHandle};
pub use public::public_connector;
pub use user_data::user_data_connector;
