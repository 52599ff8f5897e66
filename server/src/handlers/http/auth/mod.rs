pub mod login;
pub mod logout;
pub mod register;
pub mod token;

// Re-export main handlers
pub use login::handle_login;
pub use logout::handle_logout;
pub use register::handle_register;
pub use token::{handle_authn, handle_token};
