//! Token and password primitives used by the users service

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtIssuer, TokenError, TokenKind, ISSUER};
pub use password::PasswordHasher;
