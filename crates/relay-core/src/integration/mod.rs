//! Universal platform integrator.
//!
//! Given only a platform name, the integrator discovers enough about the
//! platform's REST API to make a correctly-authenticated call:
//!
//! ```text
//! "slack" ──► PlatformId ──► PlatformDiscovery ──► PlatformConfig
//!                                  │ (probe OpenAPI/Swagger, else fallback)
//!                                  ▼
//!            credentials ──► build_auth ──► UniversalApiCaller ──► HTTP
//! ```

pub mod auth;
pub mod caller;
pub mod discovery;
pub mod platform;

pub use auth::{build_auth, AuthMaterial, Credentials};
pub use caller::UniversalApiCaller;
pub use discovery::{PlatformDiscovery, SharedDiscoveryCache};
pub use platform::{
    AuthConfig, AuthLocation, AuthType, ConfigSource, EndpointSpec, PlatformCatalog, PlatformConfig,
    PlatformId, UNIVERSAL_CALL,
};
