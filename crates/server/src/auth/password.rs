// crates/server/src/auth/password.rs
//! bcrypt password hashing

use bcrypt::{hash, verify, DEFAULT_COST};

/// One-way password hasher with constant-time verification
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        hash(password, self.cost)
    }

    pub fn verify(&self, password: &str, password_hash: &str) -> Result<bool, bcrypt::BcryptError> {
        verify(password, password_hash)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(4);
        let hashed = hasher.hash("hunter22").unwrap();

        assert_ne!(hashed, "hunter22");
        assert!(hasher.verify("hunter22", &hashed).unwrap());
        assert!(!hasher.verify("hunter23", &hashed).unwrap());
    }

    #[test]
    fn test_default_cost() {
        assert_eq!(PasswordHasher::default().cost(), DEFAULT_COST);
    }
}
