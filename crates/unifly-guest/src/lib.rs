//! Async session client for UniFi controller guest authorization.
//!
//! Log in, authorize guests through `cmd/stamgr`, log out. A 200 answer
//! is not a logical success; check `meta.rc` with [`parse_envelope`].
//!
//! ```no_run
//! use unifly_guest::{RequestContext, Session, TransportConfig};
//!
//! # async fn demo() -> Result<(), unifly_guest::Error> {
//! let transport = TransportConfig::default().accept_invalid_certs();
//! let mut session = Session::new(
//!     "https://10.0.1.100:8443",
//!     "",
//!     "admin",
//!     "admin".to_string().into(),
//!     &transport,
//! )?;
//!
//! let ctx = RequestContext::with_timeout(std::time::Duration::from_secs(5));
//! session.login(&ctx).await?;
//! let resp = session.authorize_guest(&ctx, "aa:bb:cc:dd:ee:ff", 60).await?;
//! if !resp.envelope()?.is_ok() {
//!     // delivered, but the controller refused it
//! }
//! session.logout(&ctx).await?;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod context;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod session;
pub mod transport;

pub use command::{GuestAuthorization, GuestLimits};
pub use context::RequestContext;
pub use endpoints::{DEFAULT_SITE, Endpoints};
pub use envelope::{ResponseEnvelope, parse_envelope};
pub use error::{CancelReason, Error};
pub use session::{RawResponse, Session, SessionState};
pub use transport::{TlsMode, TransportConfig};
