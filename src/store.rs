//! Account store (C2): a dense, pre-allocated vector of account records
//! indexed by id. An empty slot is detected by a sentinel id of 0 (no `Account`
//! stored). Reads iterate from `MAX_ACCOUNT_ID` down to 1.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::{Account, EMPTY_ACCOUNT_ID, MAX_ACCOUNT_ID};

pub struct AccountStore {
    slots: RwLock<Vec<Option<Arc<Account>>>>,
}

impl AccountStore {
    pub fn new() -> Self {
        AccountStore {
            slots: RwLock::new(vec![None; (MAX_ACCOUNT_ID + 1) as usize]),
        }
    }

    /// Cheap snapshot read: an `Arc` clone, never the record itself.
    pub fn get(&self, id: u32) -> Option<Arc<Account>> {
        if id == EMPTY_ACCOUNT_ID || id > MAX_ACCOUNT_ID {
            return None;
        }
        self.slots.read()[id as usize].clone()
    }

    pub fn exists(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    /// Installs a record in the given slot. Used by create, update (after the
    /// new record has been computed), and the bulk loader.
    pub fn put(&self, account: Account) {
        let id = account.id as usize;
        self.slots.write()[id] = Some(Arc::new(account));
    }

    pub fn len_live(&self) -> usize {
        self.slots.read().iter().filter(|s| s.is_some()).count()
    }

    /// Full descending scan, from `MAX_ACCOUNT_ID` down to 1, skipping empty
    /// slots. Used as the fallback plan when no filter supports lookup.
    pub fn iter_descending(&self) -> impl Iterator<Item = Arc<Account>> + '_ {
        let slots = self.slots.read();
        let max = slots.len();
        (1..max).rev().filter_map(move |id| slots[id].clone())
    }

    /// Applies `f` to every live account, for rebuild-time full passes.
    pub fn for_each(&self, mut f: impl FnMut(&Account)) {
        let slots = self.slots.read();
        for slot in slots.iter().flatten() {
            f(slot);
        }
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Sex, Status};

    fn dummy(id: u32) -> Account {
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
            likes: Vec::new(),
            backward_likes: Vec::new(),
            interests: Vec::new(),
            email_domain: String::new(),
            birth_year_offset: 0,
            joined_year_offset: 0,
            country_id: -1,
            city_id: -1,
            has_premium_now: false,
        }
    }

    #[test]
    fn empty_slot_is_none() {
        let store = AccountStore::new();
        assert!(store.get(1).is_none());
        assert!(store.get(0).is_none());
    }

    #[test]
    fn put_then_get_roundtrips() {
        let store = AccountStore::new();
        store.put(dummy(5));
        assert!(store.exists(5));
        assert_eq!(store.get(5).unwrap().id, 5);
    }

    #[test]
    fn iter_descending_visits_largest_first() {
        let store = AccountStore::new();
        store.put(dummy(3));
        store.put(dummy(9));
        store.put(dummy(1));
        let ids: Vec<u32> = store.iter_descending().map(|a| a.id).collect();
        assert_eq!(ids, vec![9, 3, 1]);
    }
}
