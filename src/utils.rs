use axum::http::HeaderValue;
use color_eyre::Result;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn cookie(name: &str, value: &str, secure: bool, max_age_secs: i64) -> Result<HeaderValue> {
    let secure = if secure { " Secure;" } else { "" };
    let cookie =
        format!("{name}={value}; HttpOnly; Max-Age={max_age_secs};{secure} Path=/; SameSite=Lax");
    Ok(cookie.parse()?)
}

pub fn expired_cookie(name: &str) -> Result<HeaderValue> {
    Ok(format!("{name}=; HttpOnly; Max-Age=0; Path=/; SameSite=Lax").parse()?)
}

/// Full name for display, falling back to the username when both parts are blank.
pub fn full_name(first_name: &str, last_name: &str, username: &str) -> String {
    let full = format!("{first_name} {last_name}");
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_sets_secure_only_when_asked() {
        let plain = cookie("auth_token", "abc", false, 60).unwrap();
        assert!(!plain.to_str().unwrap().contains("Secure"));
        let secure = cookie("auth_token", "abc", true, 60).unwrap();
        assert!(secure.to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn full_name_falls_back_to_username() {
        assert_eq!(full_name("", " ", "sara"), "sara");
        assert_eq!(full_name("Sara", "Karimi", "sara"), "Sara Karimi");
    }
}
