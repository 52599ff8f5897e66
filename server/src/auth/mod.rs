pub mod codec;
pub mod signer;
pub mod token;

pub use self::codec::DecodeError;
pub use self::signer::SecretKey;
pub use self::token::{TokenError, TokenService};
