pub mod login_activity;
pub mod otp;
pub mod user;

pub use login_activity::*;
pub use otp::*;
pub use user::*;
