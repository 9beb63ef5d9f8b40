use crate::error::{Error, Result};
use crate::model::*;
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, Transactional,
    TransactionalTree,
};
use sled::IVec;
use std::collections::BTreeSet;
use std::convert::TryInto;

const FILMS: &[u8] = b"films";
const USERS: &[u8] = b"users";
const FRIENDSHIPS: &[u8] = b"friendships";
const FRIENDSHIPS_BY_FRIEND: &[u8] = b"friendships_by_friend";
const SEQUENCES: &[u8] = b"sequences";

// Big-endian, so tree iteration follows id order.
fn serialize_id(id: u64) -> IVec {
    IVec::from(&id.to_be_bytes()[..])
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Result<u64> {
    id.as_ref()
        .try_into()
        .map(u64::from_be_bytes)
        .map_err(|_| Error::Corrupted(format!("malformed id {:?}", id.as_ref())))
}

fn pair_key(user_id: u64, friend_id: u64) -> IVec {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&user_id.to_be_bytes());
    key.extend_from_slice(&friend_id.to_be_bytes());
    IVec::from(key)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

fn abortable<T>(result: Result<T>) -> ConflictableTransactionResult<T, Error> {
    result.map_err(ConflictableTransactionError::Abort)
}

fn next_id(sequences: &TransactionalTree, name: &[u8]) -> ConflictableTransactionResult<u64, Error> {
    let current = match sequences.get(name)? {
        Some(bytes) => abortable(deserialize_id(bytes))?,
        None => 0,
    };
    let next = current + 1;
    sequences.insert(name, serialize_id(next))?;
    Ok(next)
}

trait Record: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
}

impl Record for Film {
    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

impl Record for User {
    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

fn all_records<T: Record>(db: &sled::Db, name: &[u8]) -> Result<Vec<T>> {
    db.open_tree(name)?
        .iter()
        .values()
        .map(|bytes| -> Result<T> { decode(&bytes?) })
        .collect()
}

fn get_record<T: Record>(db: &sled::Db, name: &[u8], id: u64) -> Result<Option<T>> {
    db.open_tree(name)?
        .get(serialize_id(id))?
        .map(|bytes| decode(&bytes))
        .transpose()
}

fn record_exists(db: &sled::Db, name: &[u8], id: u64) -> Result<bool> {
    Ok(db.open_tree(name)?.contains_key(serialize_id(id))?)
}

/// Issues the next id from the tree's sequence and stores the record under
/// it, in one transaction.
fn create_record<T: Record>(db: &sled::Db, name: &[u8], record: T) -> Result<T> {
    let tree = db.open_tree(name)?;
    let sequences = db.open_tree(SEQUENCES)?;
    let created = (&tree, &sequences).transaction(
        |(tree, sequences)| -> ConflictableTransactionResult<T, Error> {
            let mut record = record.clone();
            record.set_id(next_id(sequences, name)?);
            tree.insert(serialize_id(record.id()), abortable(encode(&record))?)?;
            Ok(record)
        },
    )?;
    Ok(created)
}

/// Replaces a stored record. `merge` may carry fields over from the stored
/// version before the write.
fn update_record<T, M>(
    db: &sled::Db,
    name: &[u8],
    record: T,
    merge: M,
    not_found: fn(u64) -> Error,
) -> Result<T>
where
    T: Record,
    M: Fn(&T, &mut T),
{
    let tree = db.open_tree(name)?;
    let key = serialize_id(record.id());
    let updated = tree.transaction(|tree| -> ConflictableTransactionResult<T, Error> {
        let stored: T = match tree.get(&key)? {
            Some(bytes) => abortable(decode(&bytes))?,
            None => return abort(not_found(record.id())),
        };
        let mut record = record.clone();
        merge(&stored, &mut record);
        tree.insert(key.clone(), abortable(encode(&record))?)?;
        Ok(record)
    })?;
    Ok(updated)
}

fn clear_records(db: &sled::Db, name: &[u8]) -> Result<()> {
    db.open_tree(name)?.clear()?;
    db.open_tree(SEQUENCES)?.remove(name)?;
    Ok(())
}

pub trait FilmDb {
    /// All films in creation order.
    fn all_films(&self) -> Result<Vec<Film>>;
    /// Stores a new film under a freshly issued id.
    fn create_film(&self, film: Film) -> Result<Film>;
    /// Replaces a stored film. The stored like set is kept.
    fn update_film(&self, film: Film) -> Result<Film>;
    fn get_film(&self, id: u64) -> Result<Option<Film>>;
    fn film_exists(&self, id: u64) -> Result<bool>;
    fn clear_films(&self) -> Result<()>;
    /// Applies `f` to the film's like set as one atomic read-modify-write.
    /// `None` when the film does not exist.
    fn modify_likes<F>(&self, id: u64, f: F) -> Result<Option<Film>>
    where
        F: Fn(&mut BTreeSet<u64>);
}

impl FilmDb for sled::Db {
    fn all_films(&self) -> Result<Vec<Film>> {
        all_records(self, FILMS)
    }

    fn create_film(&self, film: Film) -> Result<Film> {
        create_record(self, FILMS, film)
    }

    fn update_film(&self, film: Film) -> Result<Film> {
        update_record(
            self,
            FILMS,
            film,
            |stored: &Film, film| film.likes = stored.likes.clone(),
            Error::film_not_found,
        )
    }

    fn get_film(&self, id: u64) -> Result<Option<Film>> {
        get_record(self, FILMS, id)
    }

    fn film_exists(&self, id: u64) -> Result<bool> {
        record_exists(self, FILMS, id)
    }

    fn clear_films(&self) -> Result<()> {
        clear_records(self, FILMS)
    }

    fn modify_likes<F>(&self, id: u64, f: F) -> Result<Option<Film>>
    where
        F: Fn(&mut BTreeSet<u64>),
    {
        let films = self.open_tree(FILMS)?;
        let key = serialize_id(id);
        let film = films.transaction(|films| -> ConflictableTransactionResult<Option<Film>, Error> {
            let mut film: Film = match films.get(&key)? {
                Some(bytes) => abortable(decode(&bytes))?,
                None => return Ok(None),
            };
            f(&mut film.likes);
            films.insert(key.clone(), abortable(encode(&film))?)?;
            Ok(Some(film))
        })?;
        Ok(film)
    }
}

pub trait UserDb {
    /// All users in creation order.
    fn all_users(&self) -> Result<Vec<User>>;
    fn create_user(&self, user: User) -> Result<User>;
    fn update_user(&self, user: User) -> Result<User>;
    fn get_user(&self, id: u64) -> Result<Option<User>>;
    fn user_exists(&self, id: u64) -> Result<bool>;
    /// Drops all users together with every friendship record and every like
    /// they gave, so reissued ids start clean.
    fn clear_users(&self) -> Result<()>;
}

impl UserDb for sled::Db {
    fn all_users(&self) -> Result<Vec<User>> {
        all_records(self, USERS)
    }

    fn create_user(&self, user: User) -> Result<User> {
        create_record(self, USERS, user)
    }

    fn update_user(&self, user: User) -> Result<User> {
        update_record(
            self,
            USERS,
            user,
            |_: &User, _: &mut User| {},
            Error::user_not_found,
        )
    }

    fn get_user(&self, id: u64) -> Result<Option<User>> {
        get_record(self, USERS, id)
    }

    fn user_exists(&self, id: u64) -> Result<bool> {
        record_exists(self, USERS, id)
    }

    fn clear_users(&self) -> Result<()> {
        self.open_tree(FRIENDSHIPS)?.clear()?;
        self.open_tree(FRIENDSHIPS_BY_FRIEND)?.clear()?;
        for key in self.open_tree(FILMS)?.iter().keys() {
            self.modify_likes(deserialize_id(key?)?, |likes| likes.clear())?;
        }
        clear_records(self, USERS)
    }
}

/// Both directed friendship records between two users: `forward` is the
/// request from the first user to the second, `backward` the opposite one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FriendshipPair {
    pub forward: Option<Friendship>,
    pub backward: Option<Friendship>,
}

pub trait FriendshipDb {
    /// Every record in which the user is either the requester or the target.
    fn friendships_of(&self, user_id: u64) -> Result<Vec<Friendship>>;

    /// Loads the records between `user_id` and `friend_id`, lets `f` change
    /// them, and writes the changes back atomically. An error from `f`
    /// discards the changes.
    fn with_friendship_pair<T, F>(&self, user_id: u64, friend_id: u64, f: F) -> Result<T>
    where
        F: Fn(&mut FriendshipPair) -> Result<T>;
}

fn read_friendship(
    friendships: &TransactionalTree,
    user_id: u64,
    friend_id: u64,
) -> ConflictableTransactionResult<Option<Friendship>, Error> {
    match friendships.get(pair_key(user_id, friend_id))? {
        Some(bytes) => Ok(Some(abortable(decode(&bytes))?)),
        None => Ok(None),
    }
}

fn write_friendship(
    friendships: &TransactionalTree,
    by_friend: &TransactionalTree,
    user_id: u64,
    friend_id: u64,
    record: Option<&Friendship>,
) -> ConflictableTransactionResult<(), Error> {
    match record {
        Some(friendship) => {
            friendships.insert(pair_key(user_id, friend_id), abortable(encode(friendship))?)?;
            by_friend.insert(pair_key(friend_id, user_id), serialize_id(user_id))?;
        }
        None => {
            friendships.remove(pair_key(user_id, friend_id))?;
            by_friend.remove(pair_key(friend_id, user_id))?;
        }
    }
    Ok(())
}

impl FriendshipDb for sled::Db {
    fn friendships_of(&self, user_id: u64) -> Result<Vec<Friendship>> {
        let friendships = self.open_tree(FRIENDSHIPS)?;
        let by_friend = self.open_tree(FRIENDSHIPS_BY_FRIEND)?;
        let prefix = serialize_id(user_id);

        let mut records = friendships
            .scan_prefix(&prefix)
            .values()
            .map(|bytes| -> Result<Friendship> { decode(&bytes?) })
            .collect::<Result<Vec<_>>>()?;
        for key in by_friend.scan_prefix(&prefix).keys() {
            let key = key?;
            let requester = deserialize_id(key.get(8..).unwrap_or_default())?;
            if let Some(bytes) = friendships.get(pair_key(requester, user_id))? {
                records.push(decode(&bytes)?);
            }
        }
        Ok(records)
    }

    fn with_friendship_pair<T, F>(&self, user_id: u64, friend_id: u64, f: F) -> Result<T>
    where
        F: Fn(&mut FriendshipPair) -> Result<T>,
    {
        let friendships = self.open_tree(FRIENDSHIPS)?;
        let by_friend = self.open_tree(FRIENDSHIPS_BY_FRIEND)?;
        let value = (&friendships, &by_friend).transaction(
            |(friendships, by_friend)| -> ConflictableTransactionResult<T, Error> {
                let stored = FriendshipPair {
                    forward: read_friendship(friendships, user_id, friend_id)?,
                    backward: read_friendship(friendships, friend_id, user_id)?,
                };
                let mut pair = stored.clone();
                let value = abortable(f(&mut pair))?;
                if pair.forward != stored.forward {
                    write_friendship(
                        friendships,
                        by_friend,
                        user_id,
                        friend_id,
                        pair.forward.as_ref(),
                    )?;
                }
                if pair.backward != stored.backward {
                    write_friendship(
                        friendships,
                        by_friend,
                        friend_id,
                        user_id,
                        pair.backward.as_ref(),
                    )?;
                }
                Ok(value)
            },
        )?;
        Ok(value)
    }
}
