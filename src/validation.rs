//! Field rules for film and user payloads. Checks run in a fixed order and
//! stop at the first violation.

use crate::error::ValidationError;
use crate::model::{Film, FilmForm, Genre, Mpa, User, UserForm};
use chrono::{Local, NaiveDate};
use std::collections::BTreeSet;
use std::convert::TryFrom;

pub const MAX_DESCRIPTION_LEN: usize = 200;

pub fn first_film_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1895, 12, 28).unwrap_or(NaiveDate::MIN)
}

fn is_blank(s: Option<&str>) -> bool {
    s.map_or(true, |s| s.trim().is_empty())
}

/// Checks a film payload. On success returns the film with catalog
/// references carrying ids only; resolving them is the caller's job.
pub fn validate_film(form: &FilmForm) -> Result<Film, ValidationError> {
    if is_blank(form.name.as_deref()) {
        return Err(ValidationError::NameBlank);
    }
    if let Some(description) = &form.description {
        let len = description.chars().count();
        if len > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::DescriptionTooLong {
                len,
                max: MAX_DESCRIPTION_LEN,
            });
        }
    }
    let release_date = form
        .release_date
        .ok_or(ValidationError::ReleaseDateMissing)?;
    if release_date < first_film_date() {
        return Err(ValidationError::ReleaseDateTooEarly);
    }
    let duration = match form.duration {
        Some(d) if d > 0 => u32::try_from(d).map_err(|_| ValidationError::DurationOutOfRange)?,
        _ => return Err(ValidationError::DurationNotPositive),
    };

    Ok(Film {
        id: form.id.unwrap_or(0),
        name: form.name.clone().unwrap_or_default(),
        description: form.description.clone(),
        release_date,
        duration,
        mpa: form.mpa.map(|r| Mpa {
            id: r.id,
            name: String::new(),
            description: None,
        }),
        genres: form
            .genres
            .iter()
            .flatten()
            .map(|r| Genre {
                id: r.id,
                name: String::new(),
            })
            .collect(),
        likes: BTreeSet::new(),
    })
}

pub fn validate_user(form: &UserForm) -> Result<User, ValidationError> {
    validate_user_at(form, Local::now().date_naive())
}

/// Same as [`validate_user`] with an explicit notion of "today".
pub fn validate_user_at(form: &UserForm, today: NaiveDate) -> Result<User, ValidationError> {
    let email = match form.email.as_deref() {
        Some(email) if !email.trim().is_empty() && email.contains('@') => email,
        _ => return Err(ValidationError::EmailInvalid),
    };
    let login = match form.login.as_deref() {
        Some(login) if !login.is_empty() && !login.chars().any(char::is_whitespace) => login,
        _ => return Err(ValidationError::LoginInvalid),
    };
    let birthday = form.birthday.ok_or(ValidationError::BirthdayMissing)?;
    if birthday > today {
        return Err(ValidationError::BirthdayInFuture);
    }

    Ok(User {
        id: form.id.unwrap_or(0),
        email: email.to_owned(),
        login: login.to_owned(),
        name: form.name.clone().unwrap_or_default(),
        birthday,
    })
}
