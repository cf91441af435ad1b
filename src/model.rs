//! Fixed account schema: raw fields plus the derived fields computed from them and `NOW`.

use serde::{Deserialize, Serialize};

/// Compile-time upper bound on account ids (reference: 1,320,000).
pub const MAX_ACCOUNT_ID: u32 = 1_320_000;
pub const EMPTY_ACCOUNT_ID: u32 = 0;
pub const BASE_YEAR: i32 = 1900;

pub const STATUS_CNT: i32 = 3;
pub const PREMIUM_CNT: i32 = 2;
pub const SEX_CNT: i32 = 2;
pub const BUCKETS_CNT: usize = (STATUS_CNT * PREMIUM_CNT * SEX_CNT) as usize;

pub type InterestId = i8;
pub type CountryId = i8;
pub type CityId = i16;
pub const INVALID_ID: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[serde(rename = "m")]
    Male = 0,
    #[serde(rename = "f")]
    Female = 1,
}

impl Sex {
    pub fn from_str(s: &str) -> Option<Sex> {
        match s {
            "m" => Some(Sex::Male),
            "f" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "m",
            Sex::Female => "f",
        }
    }

    pub fn opposite(self) -> Sex {
        match self {
            Sex::Male => Sex::Female,
            Sex::Female => Sex::Male,
        }
    }
}

/// The three fixed relationship statuses. The Cyrillic strings are part of the
/// external contract, not a translation artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Single = 0,
    Complicated = 1,
    InRelationship = 2,
}

pub const STATUS_SINGLE_STR: &str = "свободны";
pub const STATUS_COMPLICATED_STR: &str = "всё сложно";
pub const STATUS_IN_RELATIONSHIP_STR: &str = "заняты";

impl Status {
    pub fn from_str(s: &str) -> Option<Status> {
        match s {
            STATUS_SINGLE_STR => Some(Status::Single),
            STATUS_COMPLICATED_STR => Some(Status::Complicated),
            STATUS_IN_RELATIONSHIP_STR => Some(Status::InRelationship),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Single => STATUS_SINGLE_STR,
            Status::Complicated => STATUS_COMPLICATED_STR,
            Status::InRelationship => STATUS_IN_RELATIONSHIP_STR,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(v: i32) -> Option<Status> {
        match v {
            0 => Some(Status::Single),
            1 => Some(Status::Complicated),
            2 => Some(Status::InRelationship),
            _ => None,
        }
    }
}

/// A like edge: the peer account id and the timestamp the like was recorded at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeEdge {
    pub id: u32,
    pub ts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PremiumWindow {
    pub start: i64,
    pub finish: i64,
}

/// One account. Derived fields (email domain, year offsets, dictionary ids,
/// `has_premium_now`) are recomputed whenever a raw field they depend on changes,
/// inside the write critical section — never lazily at read time.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: u32,
    pub fname: String,
    pub sname: String,
    pub email: String,
    pub phone: String,
    pub sex: Sex,
    pub status: Status,
    pub country: String,
    pub city: String,
    pub birth: i64,
    pub joined: i64,
    pub premium: Option<PremiumWindow>,
    pub likes: Vec<LikeEdge>,
    pub backward_likes: Vec<LikeEdge>,
    pub interests: Vec<InterestId>,

    // Derived
    pub email_domain: String,
    pub birth_year_offset: i8,
    pub joined_year_offset: i8,
    pub country_id: CountryId,
    pub city_id: CityId,
    pub has_premium_now: bool,
}

impl Account {
    pub fn birth_year(&self) -> i32 {
        BASE_YEAR + self.birth_year_offset as i32
    }

    pub fn joined_year(&self) -> i32 {
        BASE_YEAR + self.joined_year_offset as i32
    }

    pub fn recommend_bucket(&self) -> usize {
        recommend_bucket(self.sex, self.has_premium_now, self.status)
    }
}

pub fn recommend_bucket(sex: Sex, premium_now: bool, status: Status) -> usize {
    let premium_now = premium_now as i32;
    let sex = sex as i32;
    (status.as_i32() + STATUS_CNT * (premium_now + sex * PREMIUM_CNT)) as usize
}

pub fn has_premium_now(premium: Option<PremiumWindow>, now: i64) -> bool {
    match premium {
        Some(w) => w.start > 0 && w.start <= now && now <= w.finish,
        None => false,
    }
}

/// `yearFromTimestamp(893884157) == 1998`.
pub fn year_from_timestamp(ts: i64) -> i32 {
    use chrono::{DateTime, Datelike, Utc};
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.year())
        .unwrap_or(BASE_YEAR)
}

pub fn year_offset_from_timestamp(ts: i64) -> i8 {
    (year_from_timestamp(ts) - BASE_YEAR) as i8
}

/// Splits an address into its domain. Malformed addresses (not exactly one `@`)
/// yield an empty domain rather than erroring — the loader/mutation layer is
/// responsible for rejecting those earlier.
pub fn get_email_domain(email: &str) -> String {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() == 2 {
        parts[1].to_string()
    } else {
        String::new()
    }
}

/// `getPhoneCode("8(974)1210264") == "974"`; `getPhoneCode("8()1210264") == ""`.
pub fn get_phone_code(phone: &str) -> String {
    let Some(open) = phone.find('(') else {
        return String::new();
    };
    let Some(close) = phone[open + 1..].find(')') else {
        return String::new();
    };
    phone[open + 1..open + 1 + close].to_string()
}
