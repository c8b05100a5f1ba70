use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

use crate::config::BootstrapAdmin;
use crate::error::{AppError, Result};
use crate::models::account::Account;
use crate::repositories::account::AccountStore;
use crate::validation::auth::{validate_login_email, validate_password};

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 2;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Hashes a password using Argon2id.
///
/// Returns the PHC string, which embeds the salt and parameters.
pub fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to generate salt: {}", e)))?;

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(ARGON2_MEMORY_MB * 1024)
            .t_cost(ARGON2_ITERATIONS)
            .p_cost(ARGON2_PARALLELISM)
            .build()
            .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Internal(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    Ok(password_hash)
}

/// Verifies a password against a PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let mut password_bytes = password.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;
    let result = Argon2::default()
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    Ok(result)
}

/// Checks `email` and `password` against the stored account.
///
/// Unknown emails and wrong passwords fail the same way.
pub async fn authenticate(
    accounts: &dyn AccountStore,
    email: &str,
    password: &str,
) -> Result<Account> {
    tracing::debug!("🔐 Authenticating {}", email);

    let account = accounts
        .find_by_email(email)
        .await?
        .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(password, &account.password_hash)? {
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    }

    tracing::info!("✅ Authenticated {}", account.email);
    Ok(account)
}

/// Creates the bootstrap account unless it already exists.
pub async fn ensure_bootstrap_account(
    accounts: &dyn AccountStore,
    admin: &BootstrapAdmin,
) -> Result<()> {
    validate_login_email(&admin.email)?;
    validate_password(&admin.password)?;

    if accounts.find_by_email(&admin.email).await?.is_some() {
        tracing::debug!("Bootstrap account {} already exists", admin.email);
        return Ok(());
    }

    tracing::warn!("⚠️  No account for {}, creating it", admin.email);
    let hash = hash_password(&admin.password)?;
    match accounts.create(&admin.email, &hash).await {
        Ok(_) => {
            tracing::info!("✅ Bootstrap account created: {}", admin.email);
            Ok(())
        }
        // another instance won the race
        Err(AppError::Conflict(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::MemoryAccountStore;
    use zeroize::Zeroizing;

    fn admin() -> BootstrapAdmin {
        BootstrapAdmin {
            email: "admin@gmail.com".to_string(),
            password: Zeroizing::new("correct horse".to_string()),
        }
    }

    #[test]
    fn hashes_verify_only_the_right_password() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[tokio::test]
    async fn bootstrap_then_authenticate() {
        let accounts = MemoryAccountStore::new();
        ensure_bootstrap_account(&accounts, &admin()).await.unwrap();
        // idempotent
        ensure_bootstrap_account(&accounts, &admin()).await.unwrap();

        let account = authenticate(&accounts, "admin@gmail.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(account.email, "admin@gmail.com");
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let accounts = MemoryAccountStore::new();
        ensure_bootstrap_account(&accounts, &admin()).await.unwrap();

        let wrong_password = authenticate(&accounts, "admin@gmail.com", "nope").await;
        let unknown = authenticate(&accounts, "nobody@gmail.com", "correct horse").await;

        match (wrong_password, unknown) {
            (Err(AppError::Authentication(a)), Err(AppError::Authentication(b))) => {
                assert_eq!(a, b)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
