//! Likes on films and friendships between users.
//!
//! A friendship starts as a PENDING request from one user to another and
//! becomes CONFIRMED once the target accepts it. Either side may remove it at
//! any time. Only CONFIRMED friendships count as friends.

use crate::database::{FilmDb, FriendshipDb, UserDb};
use crate::error::{Error, Result, ValidationError};
use crate::model::{Friendship, FriendshipStatus};
use log::{debug, info};
use std::collections::BTreeSet;

fn ensure_film<D: FilmDb>(db: &D, film_id: u64) -> Result<()> {
    if db.film_exists(film_id)? {
        Ok(())
    } else {
        Err(Error::film_not_found(film_id))
    }
}

fn ensure_user<D: UserDb>(db: &D, user_id: u64) -> Result<()> {
    if db.user_exists(user_id)? {
        Ok(())
    } else {
        Err(Error::user_not_found(user_id))
    }
}

fn ensure_pair<D: UserDb>(db: &D, user_id: u64, friend_id: u64) -> Result<()> {
    ensure_user(db, user_id)?;
    ensure_user(db, friend_id)?;
    if user_id == friend_id {
        return Err(ValidationError::SelfFriendship.into());
    }
    Ok(())
}

/// Adding a like that already exists is a no-op.
pub fn add_like<D: FilmDb + UserDb>(db: &D, film_id: u64, user_id: u64) -> Result<()> {
    debug!("user {} likes film {}", user_id, film_id);
    ensure_film(db, film_id)?;
    ensure_user(db, user_id)?;
    let film = db
        .modify_likes(film_id, |likes| {
            likes.insert(user_id);
        })?
        .ok_or_else(|| Error::film_not_found(film_id))?;
    info!("film {} now has {} likes", film_id, film.like_count());
    Ok(())
}

/// Removing a like that does not exist is a no-op.
pub fn remove_like<D: FilmDb + UserDb>(db: &D, film_id: u64, user_id: u64) -> Result<()> {
    debug!("user {} withdraws like from film {}", user_id, film_id);
    ensure_film(db, film_id)?;
    ensure_user(db, user_id)?;
    let film = db
        .modify_likes(film_id, |likes| {
            likes.remove(&user_id);
        })?
        .ok_or_else(|| Error::film_not_found(film_id))?;
    info!("film {} now has {} likes", film_id, film.like_count());
    Ok(())
}

pub fn like_count<D: FilmDb>(db: &D, film_id: u64) -> Result<usize> {
    Ok(likes(db, film_id)?.len())
}

/// Snapshot of the users who like the film.
pub fn likes<D: FilmDb>(db: &D, film_id: u64) -> Result<BTreeSet<u64>> {
    db.get_film(film_id)?
        .map(|film| film.likes)
        .ok_or_else(|| Error::film_not_found(film_id))
}

/// Sends a friend request from `user_id` to `friend_id`.
///
/// If `friend_id` already asked `user_id`, the pending request is confirmed
/// instead. Repeating a request, or requesting an existing friend, changes
/// nothing and returns the current record.
pub fn request_friendship<D: UserDb + FriendshipDb>(
    db: &D,
    user_id: u64,
    friend_id: u64,
) -> Result<Friendship> {
    debug!("user {} requests friendship with user {}", user_id, friend_id);
    ensure_pair(db, user_id, friend_id)?;
    let friendship = db.with_friendship_pair(user_id, friend_id, |pair| {
        if let Some(existing) = &pair.forward {
            return Ok(existing.clone());
        }
        match &mut pair.backward {
            Some(reverse) => {
                reverse.status = FriendshipStatus::Confirmed;
                Ok(reverse.clone())
            }
            None => {
                let request = Friendship::pending(user_id, friend_id);
                pair.forward = Some(request.clone());
                Ok(request)
            }
        }
    })?;
    info!(
        "friendship {} -> {} is {:?}",
        friendship.user_id, friendship.friend_id, friendship.status
    );
    Ok(friendship)
}

/// `user_id` accepts the pending request that `friend_id` sent them.
pub fn confirm_friendship<D: UserDb + FriendshipDb>(
    db: &D,
    user_id: u64,
    friend_id: u64,
) -> Result<Friendship> {
    debug!("user {} confirms friendship with user {}", user_id, friend_id);
    ensure_pair(db, user_id, friend_id)?;
    let friendship = db.with_friendship_pair(user_id, friend_id, |pair| match &mut pair.backward {
        Some(request) if !request.is_confirmed() => {
            request.status = FriendshipStatus::Confirmed;
            Ok(request.clone())
        }
        Some(_) => Err(Error::Conflict(format!(
            "friend request from user {} to user {} is already confirmed",
            friend_id, user_id
        ))),
        None => Err(Error::Conflict(format!(
            "no pending friend request from user {} to user {}",
            friend_id, user_id
        ))),
    })?;
    info!("users {} and {} are now friends", friend_id, user_id);
    Ok(friendship)
}

/// Deletes the friendship or request in either direction. Returns whether
/// anything was removed.
pub fn remove_friendship<D: UserDb + FriendshipDb>(
    db: &D,
    user_id: u64,
    friend_id: u64,
) -> Result<bool> {
    debug!("user {} removes user {} from friends", user_id, friend_id);
    ensure_pair(db, user_id, friend_id)?;
    let removed = db.with_friendship_pair(user_id, friend_id, |pair| {
        let removed = pair.forward.is_some() || pair.backward.is_some();
        pair.forward = None;
        pair.backward = None;
        Ok(removed)
    })?;
    if removed {
        info!("users {} and {} are no longer friends", user_id, friend_id);
    }
    Ok(removed)
}

/// Makes both users friends in one step, skipping the request.
///
/// This is the older mutual-add behaviour; it is only reachable when the
/// server runs with friend requests auto-confirmed.
pub fn add_friend_mutual<D: UserDb + FriendshipDb>(
    db: &D,
    user_id: u64,
    friend_id: u64,
) -> Result<Friendship> {
    debug!("users {} and {} become friends directly", user_id, friend_id);
    ensure_pair(db, user_id, friend_id)?;
    let friendship = db.with_friendship_pair(user_id, friend_id, |pair| {
        let slot = if pair.backward.is_some() {
            &mut pair.backward
        } else {
            &mut pair.forward
        };
        let friendship = slot.get_or_insert_with(|| Friendship::pending(user_id, friend_id));
        friendship.status = FriendshipStatus::Confirmed;
        Ok(friendship.clone())
    })?;
    info!("users {} and {} are now friends", user_id, friend_id);
    Ok(friendship)
}

/// Ids of all users with a confirmed friendship to `user_id`.
pub fn friend_ids<D: UserDb + FriendshipDb>(db: &D, user_id: u64) -> Result<BTreeSet<u64>> {
    ensure_user(db, user_id)?;
    Ok(db
        .friendships_of(user_id)?
        .into_iter()
        .filter(Friendship::is_confirmed)
        .map(|f| f.counterpart(user_id))
        .collect())
}

pub fn common_friend_ids<D: UserDb + FriendshipDb>(
    db: &D,
    user_id: u64,
    other_id: u64,
) -> Result<BTreeSet<u64>> {
    let ours = friend_ids(db, user_id)?;
    let theirs = friend_ids(db, other_id)?;
    Ok(ours
        .intersection(&theirs)
        .copied()
        .filter(|&id| id != user_id && id != other_id)
        .collect())
}

/// Every request or friendship involving `user_id`, in either direction.
pub fn friendship_statuses<D: UserDb + FriendshipDb>(
    db: &D,
    user_id: u64,
) -> Result<Vec<Friendship>> {
    ensure_user(db, user_id)?;
    db.friendships_of(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Film, User};
    use chrono::NaiveDate;
    use std::thread;

    fn temporary() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    fn add_users(db: &sled::Db, count: usize) -> Vec<u64> {
        (0..count)
            .map(|i| {
                db.create_user(User {
                    id: 0,
                    email: format!("user{}@example.com", i),
                    login: format!("user{}", i),
                    name: String::new(),
                    birthday: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                })
                .unwrap()
                .id
            })
            .collect()
    }

    fn add_film(db: &sled::Db) -> u64 {
        db.create_film(Film {
            id: 0,
            name: "Stalker".to_owned(),
            description: None,
            release_date: NaiveDate::from_ymd_opt(1979, 5, 25).unwrap(),
            duration: 161,
            mpa: None,
            genres: vec![],
            likes: BTreeSet::new(),
        })
        .unwrap()
        .id
    }

    #[test]
    fn likes_are_a_set() {
        let db = temporary();
        let users = add_users(&db, 2);
        let film = add_film(&db);

        add_like(&db, film, users[0]).unwrap();
        add_like(&db, film, users[0]).unwrap();
        assert_eq!(like_count(&db, film).unwrap(), 1);
        add_like(&db, film, users[1]).unwrap();
        assert_eq!(like_count(&db, film).unwrap(), 2);

        remove_like(&db, film, users[1]).unwrap();
        remove_like(&db, film, users[1]).unwrap();
        assert_eq!(like_count(&db, film).unwrap(), 1);
    }

    #[test]
    fn like_round_trip_leaves_count_unchanged() {
        let db = temporary();
        let users = add_users(&db, 2);
        let film = add_film(&db);
        add_like(&db, film, users[0]).unwrap();
        let before = like_count(&db, film).unwrap();

        add_like(&db, film, users[1]).unwrap();
        remove_like(&db, film, users[1]).unwrap();
        assert_eq!(like_count(&db, film).unwrap(), before);
    }

    #[test]
    fn likes_require_existing_film_and_user() {
        let db = temporary();
        let users = add_users(&db, 1);
        let film = add_film(&db);

        assert!(matches!(add_like(&db, 99, users[0]), Err(Error::NotFound(_))));
        assert!(matches!(add_like(&db, film, 99), Err(Error::NotFound(_))));
        assert!(matches!(remove_like(&db, film, 99), Err(Error::NotFound(_))));
        assert!(matches!(like_count(&db, 99), Err(Error::NotFound(_))));
        assert!(likes(&db, film).unwrap().is_empty());
    }

    #[test]
    fn likes_snapshot_is_independent() {
        let db = temporary();
        let users = add_users(&db, 1);
        let film = add_film(&db);
        add_like(&db, film, users[0]).unwrap();

        let mut snapshot = likes(&db, film).unwrap();
        snapshot.insert(1000);
        assert_eq!(like_count(&db, film).unwrap(), 1);
    }

    #[test]
    fn request_then_confirm_makes_friends_on_both_sides() {
        let db = temporary();
        let users = add_users(&db, 2);
        let (a, b) = (users[0], users[1]);

        let request = request_friendship(&db, a, b).unwrap();
        assert_eq!(request.status, FriendshipStatus::Pending);
        assert!(friend_ids(&db, a).unwrap().is_empty());
        assert!(friend_ids(&db, b).unwrap().is_empty());

        let confirmed = confirm_friendship(&db, b, a).unwrap();
        assert_eq!(confirmed.status, FriendshipStatus::Confirmed);
        assert_eq!((confirmed.user_id, confirmed.friend_id), (a, b));
        assert!(friend_ids(&db, a).unwrap().contains(&b));
        assert!(friend_ids(&db, b).unwrap().contains(&a));
    }

    #[test]
    fn only_the_target_may_confirm() {
        let db = temporary();
        let users = add_users(&db, 2);
        let (a, b) = (users[0], users[1]);

        request_friendship(&db, a, b).unwrap();
        assert!(matches!(
            confirm_friendship(&db, a, b),
            Err(Error::Conflict(_))
        ));
        confirm_friendship(&db, b, a).unwrap();
        assert!(matches!(
            confirm_friendship(&db, b, a),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn confirming_without_request_conflicts() {
        let db = temporary();
        let users = add_users(&db, 2);
        assert!(matches!(
            confirm_friendship(&db, users[0], users[1]),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn crossing_requests_confirm_each_other() {
        let db = temporary();
        let users = add_users(&db, 2);
        let (a, b) = (users[0], users[1]);

        request_friendship(&db, a, b).unwrap();
        let friendship = request_friendship(&db, b, a).unwrap();
        assert!(friendship.is_confirmed());
        assert_eq!(friendship_statuses(&db, a).unwrap().len(), 1);
        assert!(friend_ids(&db, a).unwrap().contains(&b));
    }

    #[test]
    fn repeated_request_is_a_no_op() {
        let db = temporary();
        let users = add_users(&db, 2);
        let first = request_friendship(&db, users[0], users[1]).unwrap();
        let second = request_friendship(&db, users[0], users[1]).unwrap();
        assert_eq!(first, second);
        assert_eq!(friendship_statuses(&db, users[1]).unwrap().len(), 1);
    }

    #[test]
    fn self_friendship_is_rejected() {
        let db = temporary();
        let users = add_users(&db, 1);
        let err = request_friendship(&db, users[0], users[0]).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::SelfFriendship)
        ));
        assert!(matches!(
            add_friend_mutual(&db, users[0], users[0]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            remove_friendship(&db, users[0], users[0]),
            Err(Error::Validation(ValidationError::SelfFriendship))
        ));
    }

    #[test]
    fn unknown_users_are_not_found() {
        let db = temporary();
        let users = add_users(&db, 1);
        assert!(matches!(
            request_friendship(&db, users[0], 42),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            remove_friendship(&db, 42, users[0]),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(friend_ids(&db, 42), Err(Error::NotFound(_))));
    }

    #[test]
    fn removal_works_from_either_side() {
        let db = temporary();
        let users = add_users(&db, 2);
        let (a, b) = (users[0], users[1]);

        request_friendship(&db, a, b).unwrap();
        assert!(remove_friendship(&db, b, a).unwrap());
        assert!(friendship_statuses(&db, a).unwrap().is_empty());

        request_friendship(&db, a, b).unwrap();
        confirm_friendship(&db, b, a).unwrap();
        assert!(remove_friendship(&db, a, b).unwrap());
        assert!(friend_ids(&db, b).unwrap().is_empty());
        assert!(!remove_friendship(&db, a, b).unwrap());

        assert!(matches!(
            confirm_friendship(&db, b, a),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn mutual_add_confirms_immediately() {
        let db = temporary();
        let users = add_users(&db, 3);
        let (a, b, c) = (users[0], users[1], users[2]);

        let friendship = add_friend_mutual(&db, a, b).unwrap();
        assert!(friendship.is_confirmed());
        assert!(friend_ids(&db, a).unwrap().contains(&b));
        assert!(friend_ids(&db, b).unwrap().contains(&a));

        request_friendship(&db, c, a).unwrap();
        add_friend_mutual(&db, a, c).unwrap();
        assert_eq!(friendship_statuses(&db, c).unwrap().len(), 1);
        assert!(friend_ids(&db, c).unwrap().contains(&a));
    }

    #[test]
    fn common_friends_exclude_the_pair() {
        let db = temporary();
        let users = add_users(&db, 4);
        let (a, b, c, d) = (users[0], users[1], users[2], users[3]);

        for &(x, y) in &[(a, b), (a, c), (b, c), (a, d)] {
            add_friend_mutual(&db, x, y).unwrap();
        }
        let common = common_friend_ids(&db, a, b).unwrap();
        assert_eq!(common.into_iter().collect::<Vec<_>>(), vec![c]);
        assert!(common_friend_ids(&db, c, d).unwrap().contains(&a));
        assert!(matches!(
            common_friend_ids(&db, a, 42),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn pending_requests_are_not_friends() {
        let db = temporary();
        let users = add_users(&db, 3);
        let (a, b, c) = (users[0], users[1], users[2]);

        add_friend_mutual(&db, a, c).unwrap();
        request_friendship(&db, b, c).unwrap();
        assert!(common_friend_ids(&db, a, b).unwrap().is_empty());
    }

    #[test]
    fn concurrent_likes_are_all_kept() {
        let db = temporary();
        let users = add_users(&db, 16);
        let film = add_film(&db);

        let threads: Vec<_> = users
            .iter()
            .map(|&user| {
                let db = db.clone();
                thread::spawn(move || {
                    add_like(&db, film, user).unwrap();
                    add_like(&db, film, user).unwrap();
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }
        assert_eq!(like_count(&db, film).unwrap(), users.len());
        let expected: BTreeSet<u64> = users.iter().copied().collect();
        assert_eq!(likes(&db, film).unwrap(), expected);
    }

    #[test]
    fn concurrent_crossing_requests_end_confirmed() {
        let db = temporary();
        let users = add_users(&db, 8);
        let pairs: Vec<(u64, u64)> = users.chunks(2).map(|p| (p[0], p[1])).collect();

        let threads: Vec<_> = pairs
            .iter()
            .flat_map(|&(a, b)| vec![(a, b), (b, a)])
            .map(|(from, to)| {
                let db = db.clone();
                thread::spawn(move || request_friendship(&db, from, to).unwrap())
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        for &(a, b) in &pairs {
            let statuses = friendship_statuses(&db, a).unwrap();
            assert_eq!(statuses.len(), 1);
            assert!(statuses[0].is_confirmed());
            assert!(friend_ids(&db, a).unwrap().contains(&b));
            assert!(friend_ids(&db, b).unwrap().contains(&a));
        }
    }
}
