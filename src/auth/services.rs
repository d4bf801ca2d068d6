use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicAccount, RegisterRequest, RegisterResponse},
        password::{hash_password, verify_password, PasswordPolicy, UserAttributes},
        repo::StoreError,
        repo_types::{Account, NewAccount},
    },
    error::{AppError, AppResult, FieldErrors, NON_FIELD_ERRORS},
    state::AppState,
};

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "Email already exists.";
const NAME_MAX_LEN: usize = 150;
const EMAIL_MAX_LEN: usize = 254;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

/// 40 hex characters from 20 bytes of OS randomness.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<String>, trim: bool) -> Option<String> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    let value = if trim { value.trim().to_string() } else { value };
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    Some(value)
}

fn optional_name(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.chars().count() > NAME_MAX_LEN {
        errors.add(field, format!("Ensure this field has no more than {NAME_MAX_LEN} characters."));
    }
    value
}

fn max_len(errors: &mut FieldErrors, field: &str, value: &str, max: usize) -> bool {
    if value.chars().count() > max {
        errors.add(field, format!("Ensure this field has no more than {max} characters."));
        return false;
    }
    true
}

/// Validates a registration, creates the account and issues its token.
pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<RegisterResponse> {
    let mut errors = FieldErrors::new();

    let username = required(&mut errors, "username", req.username, true);
    let email = required(&mut errors, "email", req.email, true).map(|e| e.to_lowercase());
    let password = required(&mut errors, "password", req.password, false);
    let first_name = optional_name(&mut errors, "first_name", req.first_name);
    let last_name = optional_name(&mut errors, "last_name", req.last_name);

    info!(username = ?username, email = ?email, "registration attempt");

    if let Some(username) = &username {
        if max_len(&mut errors, "username", username, NAME_MAX_LEN) {
            if !is_valid_username(username) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            } else if state.accounts.username_exists(username).await? {
                errors.add("username", USERNAME_TAKEN);
            }
        }
    }
    if let Some(email) = &email {
        if max_len(&mut errors, "email", email, EMAIL_MAX_LEN) && !is_valid_email(email) {
            errors.add("email", "Enter a valid email address.");
        }
    }
    if let Some(password) = &password {
        let user = UserAttributes {
            username: username.as_deref().unwrap_or_default(),
            email: email.as_deref().unwrap_or_default(),
            first_name: &first_name,
            last_name: &last_name,
        };
        for problem in PasswordPolicy::from(&state.config.auth).validate(password, &user) {
            errors.add("password", problem);
        }
    }

    let (Some(username), Some(email), Some(password)) = (username, email, password) else {
        warn!(errors = ?errors, "registration rejected");
        return Err(errors.into());
    };
    if !errors.is_empty() {
        warn!(errors = ?errors, "registration rejected");
        return Err(errors.into());
    }

    // Object-level checks run only once every field is individually valid.
    let object_error = match req.password2.as_deref() {
        None | Some("") => Some(("password2", "Password confirmation is required.")),
        Some(confirmation) if confirmation != password => {
            Some(("password", "Password fields didn't match."))
        }
        Some(_) => None,
    };
    let object_error = match object_error {
        None => state
            .accounts
            .email_exists(&email)
            .await?
            .then_some(("email", EMAIL_TAKEN)),
        other => other,
    };
    if let Some((field, message)) = object_error {
        warn!(username = %username, field, "registration rejected");
        return Err(FieldErrors::single(field, message).into());
    }

    let password_hash = hash_password(&password)?;
    let new_account = NewAccount {
        username,
        email,
        password_hash,
        first_name,
        last_name,
    };
    let token = generate_token();
    let account = match state.accounts.create_with_token(new_account, &token).await {
        Ok(a) => a,
        Err(StoreError::Conflict(field)) => {
            warn!(field, "registration lost a uniqueness race");
            let message = if field == "email" { EMAIL_TAKEN } else { USERNAME_TAKEN };
            return Err(FieldErrors::single(field, message).into());
        }
        Err(StoreError::Other(e)) => return Err(e.into()),
    };

    info!(user_id = %account.id, username = %account.username, "user registered");
    Ok(RegisterResponse {
        user: PublicAccount::from(&account),
        token,
    })
}

fn invalid_credentials() -> AppError {
    FieldErrors::single(NON_FIELD_ERRORS, "Unable to log in with provided credentials.").into()
}

/// Checks credentials and returns the account's token, issuing one if needed.
pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<LoginResponse> {
    let mut errors = FieldErrors::new();
    let username = required(&mut errors, "username", req.username, true);
    let password = required(&mut errors, "password", req.password, false);
    let (Some(username), Some(password)) = (username, password) else {
        return Err(errors.into());
    };

    info!(username = %username, "login attempt");

    let Some(account) = state.accounts.find_by_username(&username).await? else {
        warn!(username = %username, "login unknown username");
        return Err(invalid_credentials());
    };
    if !verify_password(&password, &account.password_hash)? {
        warn!(username = %username, user_id = %account.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let token = state.accounts.token_for(account.id, &generate_token()).await?;

    info!(user_id = %account.id, username = %account.username, "user logged in");
    Ok(LoginResponse {
        token,
        user_id: account.id,
        username: account.username,
        email: account.email,
    })
}

/// Resolves a bearer token to its account.
pub async fn current_account(state: &AppState, token: &str) -> AppResult<Account> {
    state
        .accounts
        .find_by_token(token)
        .await?
        .ok_or(AppError::Authentication("Invalid token."))
}
