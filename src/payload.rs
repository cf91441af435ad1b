//! Wire-format JSON shapes accepted by the loader (C14) and the mutation
//! controller (C10). These are the *input* side; response rendering lives in
//! `http::dto`.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PremiumPayload {
    pub start: i64,
    pub finish: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikeItemPayload {
    pub id: u32,
    pub ts: i64,
}

/// `Option<Option<T>>` double-option trick: distinguishes a key that is
/// absent from the JSON object (outer `None`, meaning "leave unchanged" in an
/// update payload) from a key present with an explicit `null` (`Some(None)`,
/// meaning "clear this field").
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// A create/update request body. Every field is optional here; required-field
/// enforcement for `create` happens in `mutation`, not at parse time, so that
/// unknown-field and type errors can be told apart from "missing field".
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AccountPayload {
    pub id: Option<u32>,
    pub fname: Option<String>,
    pub sname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub sex: Option<String>,
    pub status: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub birth: Option<i64>,
    pub joined: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub premium: Option<Option<PremiumPayload>>,
    pub likes: Option<Vec<LikeItemPayload>>,
    pub interests: Option<Vec<String>>,
}

/// The shape of each `*.json` file the loader (C14) reads from the data
/// directory: `{"accounts": [...]}`.
#[derive(Debug, Deserialize)]
pub struct AccountsFile {
    pub accounts: Vec<AccountPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikeBatchItem {
    pub liker: u32,
    pub likee: u32,
    pub ts: i64,
}

#[derive(Debug, Deserialize)]
pub struct LikesBatchPayload {
    pub likes: Vec<LikeBatchItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premium_absent_is_outer_none() {
        let p: AccountPayload = serde_json::from_str(r#"{}"#).unwrap();
        assert!(p.premium.is_none());
    }

    #[test]
    fn premium_explicit_null_is_some_none() {
        let p: AccountPayload = serde_json::from_str(r#"{"premium": null}"#).unwrap();
        assert_eq!(p.premium, Some(None));
    }

    #[test]
    fn premium_object_is_some_some() {
        let p: AccountPayload =
            serde_json::from_str(r#"{"premium": {"start": 1, "finish": 2}}"#).unwrap();
        let inner = p.premium.unwrap().unwrap();
        assert_eq!(inner.start, 1);
        assert_eq!(inner.finish, 2);
    }

    #[test]
    fn non_numeric_birth_is_rejected() {
        let r: Result<AccountPayload, _> = serde_json::from_str(r#"{"birth": "not-a-number"}"#);
        assert!(r.is_err());
    }
}
