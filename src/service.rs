use crate::catalog::Catalog;
use crate::database::{FilmDb, FriendshipDb, UserDb};
use crate::error::{Error, Result};
use crate::model::{Film, FilmForm, User, UserForm};
use crate::relations;
use crate::validation::{validate_film, validate_user};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

/// Replaces the id-only mpa and genre references with catalog entries.
/// Genres come out de-duplicated and ordered by id.
fn resolve_references(catalog: &Catalog, mut film: Film) -> Result<Film> {
    film.mpa = film
        .mpa
        .map(|mpa| {
            catalog
                .find_mpa(mpa.id)
                .ok_or_else(|| Error::NotFound(format!("MPA rating with id={} not found", mpa.id)))
        })
        .transpose()?;
    let mut genres = BTreeMap::new();
    for genre in &film.genres {
        let genre = catalog
            .find_genre(genre.id)
            .ok_or_else(|| Error::NotFound(format!("genre with id={} not found", genre.id)))?;
        genres.insert(genre.id, genre);
    }
    film.genres = genres.into_iter().map(|(_, genre)| genre).collect();
    Ok(film)
}

pub fn all_films<D: FilmDb>(db: &D) -> Result<Vec<Film>> {
    db.all_films()
}

pub fn get_film<D: FilmDb>(db: &D, id: u64) -> Result<Film> {
    db.get_film(id)?.ok_or_else(|| Error::film_not_found(id))
}

pub fn create_film<D: FilmDb>(db: &D, catalog: &Catalog, form: &FilmForm) -> Result<Film> {
    debug!("creating film {:?}", form.name);
    let film = resolve_references(catalog, validate_film(form)?)?;
    let film = db.create_film(film)?;
    info!("film {} created", film.id);
    Ok(film)
}

/// Likes are never taken from the payload; the stored set is kept.
pub fn update_film<D: FilmDb>(db: &D, catalog: &Catalog, form: &FilmForm) -> Result<Film> {
    debug!("updating film {:?}", form.id);
    let film = resolve_references(catalog, validate_film(form)?)?;
    if form.id.is_none() {
        return Err(Error::NotFound("film id must be specified".to_owned()));
    }
    let film = db.update_film(film)?;
    info!("film {} updated", film.id);
    Ok(film)
}

pub fn all_users<D: UserDb>(db: &D) -> Result<Vec<User>> {
    db.all_users()
}

pub fn get_user<D: UserDb>(db: &D, id: u64) -> Result<User> {
    db.get_user(id)?.ok_or_else(|| Error::user_not_found(id))
}

pub fn create_user<D: UserDb>(db: &D, form: &UserForm) -> Result<User> {
    debug!("creating user {:?}", form.login);
    let user = validate_user(form)?.with_default_name();
    let user = db.create_user(user)?;
    info!("user {} created", user.id);
    Ok(user)
}

pub fn update_user<D: UserDb>(db: &D, form: &UserForm) -> Result<User> {
    debug!("updating user {:?}", form.id);
    let user = validate_user(form)?.with_default_name();
    if form.id.is_none() {
        return Err(Error::NotFound("user id must be specified".to_owned()));
    }
    let user = db.update_user(user)?;
    info!("user {} updated", user.id);
    Ok(user)
}

fn users_by_id<D: UserDb>(db: &D, ids: BTreeSet<u64>) -> Result<Vec<User>> {
    let mut users = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = db.get_user(id)? {
            users.push(user);
        }
    }
    Ok(users)
}

pub fn friends<D: UserDb + FriendshipDb>(db: &D, user_id: u64) -> Result<Vec<User>> {
    users_by_id(db, relations::friend_ids(db, user_id)?)
}

pub fn common_friends<D: UserDb + FriendshipDb>(
    db: &D,
    user_id: u64,
    other_id: u64,
) -> Result<Vec<User>> {
    users_by_id(db, relations::common_friend_ids(db, user_id, other_id)?)
}
