//! Auth HTTP handlers: signup, login, current user.

pub mod login;
pub mod me;
pub mod signup;
pub mod types;

pub use login::login;
pub use me::get_me;
pub use signup::signup;
