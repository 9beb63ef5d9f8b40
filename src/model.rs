use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Mpa {
    pub id: u32,
    pub name: String,
    pub description: Option<String>,
}

/// A stored film. `mpa` and `genres` hold catalog entries resolved at write time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub release_date: NaiveDate,
    pub duration: u32,
    pub mpa: Option<Mpa>,
    pub genres: Vec<Genre>,
    pub likes: BTreeSet<u64>,
}

impl Film {
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub login: String,
    pub name: String,
    pub birthday: NaiveDate,
}

impl User {
    /// Falls back to the login when no display name was given.
    pub fn with_default_name(mut self) -> Self {
        if self.name.trim().is_empty() {
            self.name = self.login.clone();
        }
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum FriendshipStatus {
    Pending,
    Confirmed,
}

/// A friend request sent by `user_id` to `friend_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub user_id: u64,
    pub friend_id: u64,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
}

impl Friendship {
    pub fn pending(user_id: u64, friend_id: u64) -> Self {
        Friendship {
            user_id,
            friend_id,
            status: FriendshipStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == FriendshipStatus::Confirmed
    }

    /// The user on the other side of the record, as seen from `user_id`.
    pub fn counterpart(&self, user_id: u64) -> u64 {
        if self.user_id == user_id {
            self.friend_id
        } else {
            self.user_id
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRef {
    pub id: u32,
}

/// Film payload as received from a client, before validation.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FilmForm {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub duration: Option<i64>,
    pub mpa: Option<IdRef>,
    pub genres: Option<Vec<IdRef>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct UserForm {
    pub id: Option<u64>,
    pub email: Option<String>,
    pub login: Option<String>,
    pub name: Option<String>,
    pub birthday: Option<NaiveDate>,
}
