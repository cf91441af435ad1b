//! Response rendering: account/group JSON shapes per §6's response
//! conventions (empty strings omitted, `premium` omitted when absent, status
//! as the literal Cyrillic strings).

use serde_json::{json, Map, Value};

use crate::dictionary::Dictionaries;
use crate::model::Account;

/// Renders one account to the subset of `selected` fields the client asked
/// for (always including `id`/`email`, per `ParsedQuery`). Empty string
/// fields and an absent `premium` are omitted rather than emitted as `""`/
/// `null` (§6).
pub fn account_to_json(a: &Account, selected: &[String], dict: &Dictionaries) -> Value {
    let mut map = Map::new();
    for field in selected {
        match field.as_str() {
            "id" => {
                map.insert("id".to_string(), json!(a.id));
            }
            "email" => {
                if !a.email.is_empty() {
                    map.insert("email".to_string(), json!(a.email));
                }
            }
            "fname" => {
                if !a.fname.is_empty() {
                    map.insert("fname".to_string(), json!(a.fname));
                }
            }
            "sname" => {
                if !a.sname.is_empty() {
                    map.insert("sname".to_string(), json!(a.sname));
                }
            }
            "phone" => {
                if !a.phone.is_empty() {
                    map.insert("phone".to_string(), json!(a.phone));
                }
            }
            "sex" => {
                map.insert("sex".to_string(), json!(a.sex.as_str()));
            }
            "status" => {
                map.insert("status".to_string(), json!(a.status.as_str()));
            }
            "country" => {
                if !a.country.is_empty() {
                    map.insert("country".to_string(), json!(a.country));
                }
            }
            "city" => {
                if !a.city.is_empty() {
                    map.insert("city".to_string(), json!(a.city));
                }
            }
            "birth" => {
                map.insert("birth".to_string(), json!(a.birth));
            }
            "joined" => {
                map.insert("joined".to_string(), json!(a.joined));
            }
            "premium" => {
                if let Some(p) = a.premium {
                    map.insert(
                        "premium".to_string(),
                        json!({"start": p.start, "finish": p.finish}),
                    );
                }
            }
            "interests" => {
                let names: Vec<String> = a
                    .interests
                    .iter()
                    .filter_map(|&id| dict.interest.value(id as i32))
                    .collect();
                if !names.is_empty() {
                    map.insert("interests".to_string(), json!(names));
                }
            }
            "likes" => {
                let likes: Vec<Value> = a
                    .likes
                    .iter()
                    .map(|e| json!({"id": e.id, "ts": e.ts}))
                    .collect();
                map.insert("likes".to_string(), json!(likes));
            }
            _ => {}
        }
    }
    Value::Object(map)
}

/// Renders a plain `{id, email}` row for recommend/suggest results, which
/// share the filter endpoint's account envelope but always select the
/// default field set.
pub fn account_summary_json(a: &Account) -> Value {
    let mut map = Map::new();
    map.insert("id".to_string(), json!(a.id));
    if !a.email.is_empty() {
        map.insert("email".to_string(), json!(a.email));
    }
    Value::Object(map)
}

pub fn group_row_to_json(values: &[(&'static str, String)], count: i64) -> Value {
    let mut map = Map::new();
    map.insert("count".to_string(), json!(count));
    for (name, value) in values {
        map.insert((*name).to_string(), json!(value));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Sex, Status};

    fn account() -> Account {
        Account {
            id: 7,
            fname: String::new(),
            sname: "Smith".to_string(),
            email: "a@b.com".to_string(),
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
    fn omits_empty_fields_and_absent_premium() {
        let dict = Dictionaries::new();
        let a = account();
        let selected = vec![
            "id".to_string(),
            "email".to_string(),
            "fname".to_string(),
            "country".to_string(),
            "premium".to_string(),
            "sname".to_string(),
        ];
        let v = account_to_json(&a, &selected, &dict);
        let obj = v.as_object().unwrap();
        assert!(obj.contains_key("id"));
        assert!(obj.contains_key("email"));
        assert!(obj.contains_key("sname"));
        assert!(!obj.contains_key("fname"));
        assert!(!obj.contains_key("country"));
        assert!(!obj.contains_key("premium"));
    }
}
