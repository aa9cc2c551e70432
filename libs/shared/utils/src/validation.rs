use std::sync::OnceLock;

use regex::Regex;

const PASSWORD_SYMBOLS: &str = "@$!%*?&";

fn national_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{7,8}$").expect("national id pattern"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"))
}

pub fn validate_required(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("El campo {} es obligatorio", field));
    }
    Ok(())
}

/// National ID: 7 or 8 digits.
pub fn validate_national_id(dni: &str) -> Result<(), String> {
    if !national_id_regex().is_match(dni.trim()) {
        return Err("El DNI debe tener 7 u 8 dígitos".to_string());
    }
    Ok(())
}

pub fn validate_age(age: i32) -> Result<(), String> {
    if !(0..=120).contains(&age) {
        return Err("La edad debe estar entre 0 y 120 años".to_string());
    }
    Ok(())
}

/// At least 8 characters from letters, digits and `@$!%*?&`, with one
/// lowercase letter, one uppercase letter and one digit.
pub fn validate_password(password: &str) -> Result<(), String> {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c));
    let valid = allowed
        && password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit());

    if !valid {
        return Err(
            "La contraseña debe tener al menos 8 caracteres, una mayúscula, una minúscula y un número"
                .to_string(),
        );
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if !email_regex().is_match(email) {
        return Err("El email no es válido".to_string());
    }
    Ok(())
}

pub fn passwords_match(password: &str, confirmation: &str) -> Result<(), String> {
    if password != confirmation {
        return Err("Las contraseñas no coinciden".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn national_id_needs_seven_or_eight_digits() {
        assert!(validate_national_id("1234567").is_ok());
        assert!(validate_national_id("12345678").is_ok());
        assert!(validate_national_id("123456").is_err());
        assert!(validate_national_id("123456789").is_err());
        assert!(validate_national_id("12a45678").is_err());
    }

    #[test]
    fn age_bounds_are_inclusive() {
        assert!(validate_age(0).is_ok());
        assert!(validate_age(120).is_ok());
        assert!(validate_age(-1).is_err());
        assert!(validate_age(121).is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("Secreta123").is_ok());
        assert!(validate_password("Secr@t12").is_ok());
        assert!(validate_password("secreta123").is_err());
        assert!(validate_password("SECRETA123").is_err());
        assert!(validate_password("Secretaaa").is_err());
        assert!(validate_password("Sec123").is_err());
        assert!(validate_password("Secreta 123").is_err());
        assert!(validate_password("Secreta#123").is_err());
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("ana@clinica.com").is_ok());
        assert!(validate_email("ana@clinica").is_err());
        assert!(validate_email("ana @clinica.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn required_and_matching() {
        assert!(validate_required("  ", "nombre").is_err());
        assert!(validate_required("Ana", "nombre").is_ok());
        assert!(passwords_match("a", "a").is_ok());
        assert!(passwords_match("a", "b").is_err());
    }
}
