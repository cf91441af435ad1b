//! Index builder (C11): full rebuild of the inverted indexes and recommend
//! buckets, plus re-sorting of each account's adjacency lists. Triggered by
//! the quiescence scheduler in `main`/`http` after a quiet period with no
//! writes (default 1.2s, see `config::RebuildConfig`). The group cache (C6)
//! is deliberately untouched here — it is maintained strictly incrementally.

use crate::engine::Engine;
use crate::model::Account;

/// Re-sorts one account's forward likes, backward likes, and interests
/// descending. The reference update path does not do this inline, relying on
/// the next rebuild (§9) — readers of suggest/interests can observe
/// temporarily disordered lists between rebuilds; that is a tolerated
/// weakness, not a bug, and is preserved here.
fn resort_adjacency(a: &Account) -> Account {
    let mut out = a.clone();
    out.likes.sort_unstable_by(|x, y| y.id.cmp(&x.id));
    out.backward_likes.sort_unstable_by(|x, y| y.id.cmp(&x.id));
    out.interests.sort_unstable_by(|x, y| y.cmp(x));
    out.interests.dedup();
    out
}

/// Rebuilds everything C11 owns. Takes a full snapshot of the store before
/// mutating any slot, since `AccountStore::for_each` holds a read lock on the
/// whole slot vector for its duration and `put` needs the write lock.
pub fn rebuild_all(engine: &Engine) {
    let mut resorted: Vec<Account> = Vec::new();
    engine.store.for_each(|a| resorted.push(resort_adjacency(a)));
    for account in resorted {
        engine.store.put(account);
    }
    engine.index.rebuild_from(&engine.store);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LikeEdge, Sex, Status};

    fn account(id: u32, likes: Vec<LikeEdge>, interests: Vec<i8>) -> Account {
        Account {
            id,
            fname: String::new(),
            sname: String::new(),
            email: String::new(),
            phone: String::new(),
            sex: Sex::Male,
            status: Status::Single,
            country: String::new(),
            city: String::new(),
            birth: 0,
            joined: 0,
            premium: None,
            likes,
            backward_likes: Vec::new(),
            interests,
            email_domain: String::new(),
            birth_year_offset: 0,
            joined_year_offset: 0,
            country_id: -1,
            city_id: -1,
            has_premium_now: false,
        }
    }

    #[test]
    fn rebuild_sorts_adjacency_descending_and_dedups_interests() {
        let engine = Engine::new(1000);
        let likes = vec![
            LikeEdge { id: 3, ts: 1 },
            LikeEdge { id: 9, ts: 2 },
            LikeEdge { id: 5, ts: 3 },
        ];
        engine.store.put(account(1, likes, vec![2, 5, 2, 1]));

        rebuild_all(&engine);

        let a = engine.store.get(1).unwrap();
        let ids: Vec<u32> = a.likes.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![9, 5, 3]);
        assert_eq!(a.interests, vec![5, 2, 1]);
    }
}
