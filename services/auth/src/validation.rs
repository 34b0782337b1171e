//! Input validation for credentials

/// Longest accepted login
pub const MAX_LOGIN_LEN: usize = 64;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 64;

/// Validate login
pub fn validate_login(login: &str) -> Result<(), String> {
    if login.trim().is_empty() {
        return Err("Login is required".to_string());
    }

    if login.chars().count() > MAX_LOGIN_LEN {
        return Err(format!(
            "Login must be at most {} characters long",
            MAX_LOGIN_LEN
        ));
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();

    if len < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        ));
    }

    if len > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LEN
        ));
    }

    Ok(())
}
