use std::path::Path;

use crate::{
    error::AppError,
    models::{CreateRoomForm, RegisterRequest, SendMessageData},
};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const ROOM_NAME_MAX: usize = 50;
pub const ROOM_DESCRIPTION_MAX: usize = 200;
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    /// Checks run in the order the user sees them; the first failure wins.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }
        if self.email.is_empty() {
            return Err(AppError::validation("email is required"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.password != self.confirm_password {
            return Err(AppError::validation("passwords do not match"));
        }
        Ok(())
    }

    pub fn into_request(self) -> Result<RegisterRequest, AppError> {
        self.validate()?;
        Ok(RegisterRequest {
            email: self.email,
            password: self.password,
            name: self.name,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthLabel {
    Weak,
    Fair,
    Strong,
}

impl StrengthLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Fair => "fair",
            Self::Strong => "strong",
        }
    }
}

/// One point each for length, upper case, lower case, digit and symbol.
pub fn password_strength(password: &str) -> u8 {
    let checks = [
        password.chars().count() >= MIN_PASSWORD_LEN,
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    checks.into_iter().filter(|passed| *passed).count() as u8
}

pub fn strength_label(score: u8) -> StrengthLabel {
    match score {
        0..=2 => StrengthLabel::Weak,
        3..=4 => StrengthLabel::Fair,
        _ => StrengthLabel::Strong,
    }
}

/// Field errors for the create-room form; empty when the form is valid.
pub fn validate_room_form(form: &CreateRoomForm) -> Vec<String> {
    let mut errors = Vec::new();

    if form.name.trim().is_empty() {
        errors.push("room name is required".to_string());
    } else if form.name.chars().count() > ROOM_NAME_MAX {
        errors.push(format!(
            "room name must be at most {ROOM_NAME_MAX} characters"
        ));
    }

    if form
        .description
        .as_ref()
        .is_some_and(|d| d.chars().count() > ROOM_DESCRIPTION_MAX)
    {
        errors.push(format!(
            "description must be at most {ROOM_DESCRIPTION_MAX} characters"
        ));
    }

    errors
}

/// Validates and normalizes the form: blank descriptions are dropped.
pub fn prepare_room_form(mut form: CreateRoomForm) -> Result<CreateRoomForm, AppError> {
    let errors = validate_room_form(&form);
    if !errors.is_empty() {
        return Err(AppError::validation(errors.join("; ")));
    }
    form.description = form.description.filter(|d| !d.trim().is_empty());
    Ok(form)
}

/// Turns composer input into a text message. Blank input yields `None`.
pub fn compose_message(input: &str) -> Option<SendMessageData> {
    let content = input.trim();
    if content.is_empty() {
        return None;
    }
    Some(SendMessageData::text(content))
}

/// Content type for an image upload, chosen from the file extension. Only
/// the formats the server stores are accepted.
pub fn image_content_type(path: &Path) -> Result<&'static str, AppError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        _ => Err(AppError::validation(format!(
            "{} is not a supported image (jpeg, png, gif, webp)",
            path.display()
        ))),
    }
}

pub fn check_image_size(len: u64) -> Result<(), AppError> {
    if len > MAX_IMAGE_BYTES {
        return Err(AppError::validation("image must be 10MB or smaller"));
    }
    Ok(())
}
