mod catalog;
mod config;
mod database;
mod error;
mod model;
mod ranking;
mod relations;
mod service;
mod validation;

use actix_web::{
    error::InternalError, http::StatusCode, middleware::Logger, web, App, HttpResponse,
    HttpServer, ResponseError,
};
use catalog::Catalog;
use config::Config;
use database::{FilmDb, UserDb};
use error::Error;
use log::{error, info, warn};
use model::*;
use serde::{Deserialize, Serialize};

type Db = web::Data<sled::Db>;
type Catalogue = web::Data<Catalog>;
type Settings = web::Data<Config>;
type Response = Result<HttpResponse, Error>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    field: Option<&'static str>,
}

fn log_error(err: &Error) -> String {
    if err.is_internal() {
        error!("{:?}", err);
        "internal server error".to_owned()
    } else {
        warn!("request rejected: {}", err);
        err.to_string()
    }
}

/// Rejections raised by actix extractors, rendered like domain errors.
fn extractor_error<E>(err: E, status: StatusCode) -> actix_web::Error
where
    E: std::fmt::Debug + std::fmt::Display + 'static,
{
    let message = err.to_string();
    warn!("request rejected: {}", message);
    let response = HttpResponse::build(status).json(ErrorBody {
        error: message,
        field: None,
    });
    InternalError::from_response(err, response).into()
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let field = match self {
            Error::Validation(err) => Some(err.field()),
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: log_error(self),
            field,
        })
    }
}

async fn all_films(db: Db) -> Response {
    Ok(HttpResponse::Ok().json(service::all_films(db.get_ref())?))
}

async fn get_film(db: Db, path: web::Path<u64>) -> Response {
    Ok(HttpResponse::Ok().json(service::get_film(db.get_ref(), path.into_inner())?))
}

async fn create_film(db: Db, catalog: Catalogue, form: web::Json<FilmForm>) -> Response {
    let film = service::create_film(db.get_ref(), &catalog, &form)?;
    Ok(HttpResponse::Created().json(film))
}

async fn update_film(db: Db, catalog: Catalogue, form: web::Json<FilmForm>) -> Response {
    Ok(HttpResponse::Ok().json(service::update_film(db.get_ref(), &catalog, &form)?))
}

async fn add_like(db: Db, path: web::Path<(u64, u64)>) -> Response {
    let (film_id, user_id) = path.into_inner();
    relations::add_like(db.get_ref(), film_id, user_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn remove_like(db: Db, path: web::Path<(u64, u64)>) -> Response {
    let (film_id, user_id) = path.into_inner();
    relations::remove_like(db.get_ref(), film_id, user_id)?;
    Ok(HttpResponse::Ok().finish())
}

#[derive(Deserialize)]
struct PopularParams {
    count: Option<i64>,
}

async fn popular_films(db: Db, params: web::Query<PopularParams>) -> Response {
    Ok(HttpResponse::Ok().json(ranking::get_popular(db.get_ref(), params.count)?))
}

async fn clear_films(db: Db) -> Response {
    db.clear_films()?;
    info!("films cleared");
    Ok(HttpResponse::Ok().finish())
}

async fn all_genres(catalog: Catalogue) -> HttpResponse {
    HttpResponse::Ok().json(catalog.list_genres())
}

async fn get_genre(catalog: Catalogue, path: web::Path<u32>) -> Response {
    let id = path.into_inner();
    let genre = catalog
        .find_genre(id)
        .ok_or_else(|| Error::NotFound(format!("genre with id={} not found", id)))?;
    Ok(HttpResponse::Ok().json(genre))
}

async fn all_mpa(catalog: Catalogue) -> HttpResponse {
    HttpResponse::Ok().json(catalog.list_mpa())
}

async fn get_mpa(catalog: Catalogue, path: web::Path<u32>) -> Response {
    let id = path.into_inner();
    let mpa = catalog
        .find_mpa(id)
        .ok_or_else(|| Error::NotFound(format!("MPA rating with id={} not found", id)))?;
    Ok(HttpResponse::Ok().json(mpa))
}

async fn all_users(db: Db) -> Response {
    Ok(HttpResponse::Ok().json(service::all_users(db.get_ref())?))
}

async fn get_user(db: Db, path: web::Path<u64>) -> Response {
    Ok(HttpResponse::Ok().json(service::get_user(db.get_ref(), path.into_inner())?))
}

async fn create_user(db: Db, form: web::Json<UserForm>) -> Response {
    let user = service::create_user(db.get_ref(), &form)?;
    Ok(HttpResponse::Created().json(user))
}

async fn update_user(db: Db, form: web::Json<UserForm>) -> Response {
    Ok(HttpResponse::Ok().json(service::update_user(db.get_ref(), &form)?))
}

async fn add_friend(db: Db, settings: Settings, path: web::Path<(u64, u64)>) -> Response {
    let (user_id, friend_id) = path.into_inner();
    let friendship = if settings.auto_confirm_friends {
        relations::add_friend_mutual(db.get_ref(), user_id, friend_id)?
    } else {
        relations::request_friendship(db.get_ref(), user_id, friend_id)?
    };
    Ok(HttpResponse::Ok().json(friendship))
}

async fn confirm_friend(db: Db, path: web::Path<(u64, u64)>) -> Response {
    let (user_id, friend_id) = path.into_inner();
    let friendship = relations::confirm_friendship(db.get_ref(), user_id, friend_id)?;
    Ok(HttpResponse::Ok().json(friendship))
}

async fn remove_friend(db: Db, path: web::Path<(u64, u64)>) -> Response {
    let (user_id, friend_id) = path.into_inner();
    relations::remove_friendship(db.get_ref(), user_id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn friends(db: Db, path: web::Path<u64>) -> Response {
    Ok(HttpResponse::Ok().json(service::friends(db.get_ref(), path.into_inner())?))
}

async fn common_friends(db: Db, path: web::Path<(u64, u64)>) -> Response {
    let (user_id, other_id) = path.into_inner();
    Ok(HttpResponse::Ok().json(service::common_friends(db.get_ref(), user_id, other_id)?))
}

async fn friendship_statuses(db: Db, path: web::Path<u64>) -> Response {
    let statuses = relations::friendship_statuses(db.get_ref(), path.into_inner())?;
    Ok(HttpResponse::Ok().json(statuses))
}

async fn clear_users(db: Db) -> Response {
    db.clear_users()?;
    info!("users cleared");
    Ok(HttpResponse::Ok().finish())
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| extractor_error(err, StatusCode::BAD_REQUEST)),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| extractor_error(err, StatusCode::BAD_REQUEST)),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| extractor_error(err, StatusCode::NOT_FOUND)),
    )
    .route("/films", web::get().to(all_films))
    .route("/films", web::post().to(create_film))
    .route("/films", web::put().to(update_film))
    .route("/films/popular", web::get().to(popular_films))
    .route("/films/clear", web::delete().to(clear_films))
    .route("/films/genres", web::get().to(all_genres))
    .route("/films/genres/{id}", web::get().to(get_genre))
    .route("/films/mpa", web::get().to(all_mpa))
    .route("/films/mpa/{id}", web::get().to(get_mpa))
    .route("/films/{id}", web::get().to(get_film))
    .route("/films/{id}/like/{user_id}", web::put().to(add_like))
    .route("/films/{id}/like/{user_id}", web::delete().to(remove_like))
    .route("/genres", web::get().to(all_genres))
    .route("/genres/{id}", web::get().to(get_genre))
    .route("/mpa", web::get().to(all_mpa))
    .route("/mpa/{id}", web::get().to(get_mpa))
    .route("/users", web::get().to(all_users))
    .route("/users", web::post().to(create_user))
    .route("/users", web::put().to(update_user))
    .route("/users/clear", web::delete().to(clear_users))
    .route("/users/{id}", web::get().to(get_user))
    .route("/users/{id}/friends", web::get().to(friends))
    .route("/users/{id}/friends/status", web::get().to(friendship_statuses))
    .route(
        "/users/{id}/friends/common/{other_id}",
        web::get().to(common_friends),
    )
    .route("/users/{id}/friends/{friend_id}", web::put().to(add_friend))
    .route(
        "/users/{id}/friends/{friend_id}",
        web::delete().to(remove_friend),
    )
    .route(
        "/users/{id}/friends/{friend_id}/confirm",
        web::put().to(confirm_friend),
    );
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    std::env::set_var("RUST_BACKTRACE", "1");
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config::DEFAULT_LOG_FILTER),
    )
    .init();

    let config = Config::from_env()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let db = config
        .open_db()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;
    info!("serving on {}", config.bind);

    let bind = config.bind.clone();
    let db = web::Data::new(db);
    let catalog = web::Data::new(Catalog::standard());
    let settings = web::Data::new(config);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db.clone())
            .app_data(catalog.clone())
            .app_data(settings.clone())
            .configure(routes)
    })
    .bind(bind.as_str())?
    .run()
    .await
}
