//! Password handling for CLI operations.

use rpassword::prompt_password;

/// Uses the provided password, or prompts when the archive needs one
pub fn get_password(provided: Option<String>, needed: bool) -> Option<String> {
    if provided.is_some() || !needed {
        return provided;
    }

    match prompt_password("Enter password: ") {
        Ok(pwd) if !pwd.is_empty() => Some(pwd),
        _ => None,
    }
}

/// Prompts for password confirmation (for encrypting new entries)
pub fn confirm_password() -> Option<String> {
    let pwd1 = prompt_password("Enter password: ").ok()?;

    if pwd1.is_empty() {
        eprintln!("Password cannot be empty");
        return None;
    }

    let pwd2 = prompt_password("Confirm password: ").ok()?;

    if pwd1 == pwd2 {
        Some(pwd1)
    } else {
        eprintln!("Passwords do not match");
        None
    }
}

/// Uses the provided password or prompts twice for a new one
pub fn get_or_confirm_password(provided: Option<String>) -> Option<String> {
    provided.or_else(confirm_password)
}
