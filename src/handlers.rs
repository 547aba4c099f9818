//! Ready-made checkers, processors and computed defaults for account-like
//! models. Signatures match the hooks of [`Attribute`](crate::Attribute),
//! so they plug in directly:
//!
//! ```ignore
//! Attribute::of(ValueKind::String)
//!     .checker(handlers::check_login)
//!     .pre_processor(handlers::process_lower)
//!     .default_with(handlers::default_login)
//! ```

use crate::core::{ConsysError, Result};
use crate::state::InstanceView;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

lazy_static! {
    /// Logins that cannot be claimed by users.
    pub static ref RESERVED: HashSet<&'static str> = [
        "admin", "admins", "administrator", "administrators", "administration",
        "author", "support", "manager", "client",
        "account", "profile", "login", "sign", "signin", "signup", "password",
        "root", "server", "info", "no-reply",
        "dev", "test", "tests", "tester", "testers",
        "user", "users", "bot", "bots", "robot", "robots",
        "phone", "code", "codes", "mail",
        "google", "facebook", "telegram", "instagram", "twitter",
        "anon", "anonym", "anonymous", "undefined", "ufo",
    ]
    .into_iter()
    .collect();

    static ref MAIL: Option<Regex> = Regex::new(r"^.+@.+\..+").ok();
}

const PASSWORD_SYMBOLS: &str = "!@#$%&*-+=,./?|~";

/// 3 to 20 ASCII letters, digits or underscores, at least one letter, not
/// reserved, and not another account's `id<N>` login.
pub fn check_login(id: &Value, value: &Value) -> bool {
    let Some(login) = value.as_str() else {
        return false;
    };

    if !(3..=20).contains(&login.len())
        || !login.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        || !login.chars().any(|c| c.is_ascii_alphabetic())
    {
        return false;
    }

    if let Some(number) = login.strip_prefix("id") {
        if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
            let own = match id {
                Value::String(id) => id.as_str() == number,
                Value::Number(id) => id.to_string() == number,
                _ => false,
            };
            if !own {
                return false;
            }
        }
    }

    !RESERVED.contains(login)
}

pub fn check_password(_id: &Value, value: &Value) -> bool {
    let Some(password) = value.as_str() else {
        return false;
    };

    (6..=40).contains(&password.chars().count())
        && password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c))
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Replaces a plain password with its bcrypt hash.
pub fn hash_password(value: Value) -> Result<Value> {
    hash_password_with_cost(value, bcrypt::DEFAULT_COST)
}

pub fn hash_password_with_cost(value: Value, cost: u32) -> Result<Value> {
    match value {
        Value::String(password) => Ok(Value::String(bcrypt::hash(password, cost)?)),
        other => Ok(other),
    }
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).map_err(ConsysError::from)
}

pub fn check_name(_id: &Value, value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|name| !name.is_empty() && name.chars().all(char::is_alphabetic))
}

/// Like [`check_name`], also allowing hyphens.
pub fn check_surname(_id: &Value, value: &Value) -> bool {
    value.as_str().is_some_and(|surname| {
        let letters: Vec<char> = surname.chars().filter(|&c| c != '-').collect();
        !letters.is_empty() && letters.iter().all(|c| c.is_alphabetic())
    })
}

pub fn check_phone(_id: &Value, value: &Value) -> bool {
    let length = match value {
        Value::Number(number) => number.to_string().len(),
        Value::String(text) => text.chars().count(),
        _ => return false,
    };
    (11..=18).contains(&length)
}

/// Normalizes a phone number to its digits, reading a leading `8` as the
/// `7` country code. Anything without digits becomes `0`.
pub fn pre_process_phone(value: Value) -> Result<Value> {
    let text = match &value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return Ok(value),
    };

    let text = match text.strip_prefix('8') {
        Some(rest) => format!("7{}", rest),
        None => text,
    };
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Ok(Value::from(0));
    }

    digits
        .parse::<i64>()
        .map(Value::from)
        .map_err(|_| ConsysError::validation("phone", value))
}

pub fn check_mail(_id: &Value, value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|mail| MAIL.as_ref().is_some_and(|pattern| pattern.is_match(mail)))
}

/// Capitalizes every word and lowercases the rest.
pub fn process_title(value: Value) -> Result<Value> {
    let Value::String(text) = value else {
        return Ok(value);
    };

    let mut titled = String::with_capacity(text.len());
    let mut word_start = true;
    for c in text.chars() {
        if word_start {
            titled.extend(c.to_uppercase());
        } else {
            titled.extend(c.to_lowercase());
        }
        word_start = !c.is_alphabetic();
    }
    Ok(Value::String(titled))
}

pub fn process_lower(value: Value) -> Result<Value> {
    match value {
        Value::String(text) => Ok(Value::String(text.to_lowercase())),
        other => Ok(other),
    }
}

/// Timestamps given as integers are stored as floats.
pub fn pre_process_time(value: Value) -> Result<Value> {
    match value.as_i64() {
        Some(seconds) if !value.is_f64() => Ok(Value::from(seconds as f64)),
        _ => Ok(value),
    }
}

pub fn default_login(instance: &InstanceView<'_>) -> Value {
    match instance.id() {
        Value::Null => Value::Null,
        Value::String(id) => Value::String(format!("id{}", id)),
        id => Value::String(format!("id{}", id)),
    }
}

/// `3` for saved accounts, `2` while the account has no id.
pub fn default_status(instance: &InstanceView<'_>) -> Value {
    let has_id = match instance.id() {
        Value::Null => false,
        Value::String(id) => !id.is_empty(),
        Value::Number(id) => id.as_f64().is_some_and(|id| id != 0.0),
        _ => true,
    };
    Value::from(if has_id { 3 } else { 2 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attribute;
    use crate::core::ValueKind;
    use crate::schema::Schema;
    use crate::state::InstanceState;
    use serde_json::json;

    #[test]
    fn login_rules() {
        let id = json!(5);
        assert!(check_login(&id, &json!("kosyachniy")));
        assert!(check_login(&id, &json!("id5")));
        assert!(!check_login(&id, &json!("id6")));
        assert!(!check_login(&id, &json!("ad")));
        assert!(!check_login(&id, &json!("admin")));
        assert!(!check_login(&id, &json!("no spaces")));
        assert!(!check_login(&id, &json!("12345")));
        assert!(!check_login(&id, &json!(12345)));
    }

    #[test]
    fn password_rules() {
        assert!(check_password(&Value::Null, &json!("s3cret!")));
        assert!(!check_password(&Value::Null, &json!("sh0rt")));
        assert!(!check_password(&Value::Null, &json!("onlyletters")));
        assert!(!check_password(&Value::Null, &json!("with space 1")));
    }

    #[test]
    fn password_hash_verifies() {
        let hashed = hash_password_with_cost(json!("s3cret!"), 4).unwrap();
        let hashed = hashed.as_str().unwrap();
        assert!(verify_password("s3cret!", hashed).unwrap());
        assert!(!verify_password("other1", hashed).unwrap());
    }

    #[test]
    fn names_and_phones() {
        assert!(check_name(&Value::Null, &json!("Alexey")));
        assert!(!check_name(&Value::Null, &json!("Alexey2")));
        assert!(check_surname(&Value::Null, &json!("Rimsky-Korsakov")));
        assert!(!check_surname(&Value::Null, &json!("-")));

        assert_eq!(
            pre_process_phone(json!("8 (912) 345-67-89")).unwrap(),
            json!(79123456789i64)
        );
        assert_eq!(pre_process_phone(json!("none")).unwrap(), json!(0));
        assert!(check_phone(&Value::Null, &json!(79123456789i64)));
        assert!(!check_phone(&Value::Null, &json!(0)));
    }

    #[test]
    fn mail_and_text_processors() {
        assert!(check_mail(&Value::Null, &json!("a@b.co")));
        assert!(!check_mail(&Value::Null, &json!("a@b")));

        assert_eq!(process_title(json!("hello wORLD")).unwrap(), json!("Hello World"));
        assert_eq!(process_lower(json!("MiXeD")).unwrap(), json!("mixed"));
        assert_eq!(pre_process_time(json!(12)).unwrap(), json!(12.0));
        assert_eq!(pre_process_time(json!(1.5)).unwrap(), json!(1.5));
    }

    #[test]
    fn defaults_follow_id() {
        let schema = Schema::builder("users")
            .field(
                "login",
                Attribute::of(ValueKind::String).default_with(default_login),
            )
            .field(
                "status",
                Attribute::of(ValueKind::Integer).default_with(default_status),
            )
            .build();

        let mut state = InstanceState::new();
        assert_eq!(state.resolve(&schema, "status"), json!(2));
        assert_eq!(state.resolve(&schema, "login"), Value::Null);

        state.assign("id", json!(17));
        assert_eq!(state.resolve(&schema, "status"), json!(3));
        assert_eq!(state.resolve(&schema, "login"), json!("id17"));
    }
}
