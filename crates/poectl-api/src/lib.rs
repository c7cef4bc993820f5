// poectl-api: Async client for the controller's session + device endpoints

pub mod device;
pub mod error;
pub mod models;
pub mod session;
pub mod transport;

pub use error::Error;
pub use models::DeviceState;
pub use session::{CsrfTokenHeader, SessionClient};
pub use transport::{TlsMode, TransportConfig};
