use crate::model::{Genre, Mpa};
use log::debug;
use std::collections::BTreeMap;

const GENRES: &[(u32, &str)] = &[
    (1, "Comedy"),
    (2, "Drama"),
    (3, "Animation"),
    (4, "Thriller"),
    (5, "Documentary"),
    (6, "Action"),
];

const MPA_RATINGS: &[(u32, &str, &str)] = &[
    (1, "G", "no age restrictions"),
    (2, "PG", "children are advised to watch with parents"),
    (3, "PG-13", "not recommended for children under 13"),
    (4, "R", "under 17 requires an accompanying adult"),
    (5, "NC-17", "no one 17 and under admitted"),
];

/// Read-only genre and MPA rating lookup, fixed at construction.
#[derive(Debug, Clone)]
pub struct Catalog {
    genres: BTreeMap<u32, Genre>,
    mpa: BTreeMap<u32, Mpa>,
}

impl Catalog {
    pub fn new(genres: Vec<Genre>, mpa: Vec<Mpa>) -> Self {
        Catalog {
            genres: genres.into_iter().map(|g| (g.id, g)).collect(),
            mpa: mpa.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    pub fn standard() -> Self {
        let catalog = Catalog::new(
            GENRES
                .iter()
                .map(|&(id, name)| Genre {
                    id,
                    name: name.to_owned(),
                })
                .collect(),
            MPA_RATINGS
                .iter()
                .map(|&(id, name, description)| Mpa {
                    id,
                    name: name.to_owned(),
                    description: Some(description.to_owned()),
                })
                .collect(),
        );
        debug!(
            "catalog seeded with {} genres and {} MPA ratings",
            catalog.genres.len(),
            catalog.mpa.len()
        );
        catalog
    }

    pub fn find_genre(&self, id: u32) -> Option<Genre> {
        self.genres.get(&id).cloned()
    }

    pub fn find_mpa(&self, id: u32) -> Option<Mpa> {
        self.mpa.get(&id).cloned()
    }

    pub fn exists_genre(&self, id: u32) -> bool {
        self.genres.contains_key(&id)
    }

    pub fn exists_mpa(&self, id: u32) -> bool {
        self.mpa.contains_key(&id)
    }

    /// Ordered by id.
    pub fn list_genres(&self) -> Vec<Genre> {
        self.genres.values().cloned().collect()
    }

    /// Ordered by id.
    pub fn list_mpa(&self) -> Vec<Mpa> {
        self.mpa.values().cloned().collect()
    }
}
