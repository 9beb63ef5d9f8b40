use crate::database::FilmDb;
use crate::error::Result;
use crate::model::Film;
use log::debug;
use std::cmp::Reverse;
use std::convert::TryFrom;

pub const DEFAULT_POPULAR_COUNT: usize = 10;

/// The `count` most liked films. Ties keep their order in `films`.
///
/// A missing or non-positive `count` means [`DEFAULT_POPULAR_COUNT`].
/// Sorts the whole list on every call, which is fine for an in-memory
/// catalogue but would want an incrementally maintained top-k at scale.
pub fn popular(mut films: Vec<Film>, count: Option<i64>) -> Vec<Film> {
    let limit = match count {
        Some(count) if count > 0 => usize::try_from(count).unwrap_or(usize::MAX),
        _ => DEFAULT_POPULAR_COUNT,
    };
    films.sort_by_key(|film| Reverse(film.like_count()));
    films.truncate(limit);
    films
}

pub fn get_popular<D: FilmDb>(db: &D, count: Option<i64>) -> Result<Vec<Film>> {
    let films = popular(db.all_films()?, count);
    debug!("{} popular films for count {:?}", films.len(), count);
    Ok(films)
}
