pub mod auth;
pub mod email;
pub mod otp;
pub mod seed;
pub mod social;
pub mod token;
pub mod users;
