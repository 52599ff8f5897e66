pub mod identity;
pub mod json_error;
pub mod login;
pub mod register;
pub mod server_config;
pub mod session;
pub mod token;

pub use self::identity::{Identity, UserRecord};
pub use self::json_error::ErrorResponse;
pub use self::login::{AuthnRequest, LoginData, LoginError, LoginResponse, TokenResponse};
pub use self::register::{RegisterData, RegisterError, RegisterResponse};
pub use self::server_config::{AppConfig, ConfigError, SessionBackendKind};
pub use self::session::SessionRecord;
pub use self::token::{TokenClaims, TokenHeader};
