use bcrypt::BcryptError;
use log::warn;

/// bcrypt work factor for every stored password.
pub const PASSWORD_COST: u32 = 10;

/// Hashes `password` with a fresh salt. The output embeds salt and cost.
pub fn hash(password: &str) -> Result<String, BcryptError> {
    bcrypt::hash(password, PASSWORD_COST)
}

/// Checks `password` against a stored bcrypt hash.
///
/// A mismatch and an unreadable stored hash both come back as `false`.
pub fn verify(password: &str, hashed: &str) -> bool {
    match bcrypt::verify(password, hashed) {
        Ok(matches) => matches,
        Err(err) => {
            warn!("stored password hash could not be checked: {err}");
            false
        }
    }
}
