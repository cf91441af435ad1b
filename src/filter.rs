//! Filter algebra (C5): a closed set of per-attribute predicate variants,
//! dispatched as a tagged sum type rather than an open trait hierarchy (see
//! design notes). Each variant can always `matches()` a record; some also
//! expose a lookup iterator with a size estimate for the planner (C7).

use std::sync::Arc;

use crate::dictionary::Dictionaries;
use crate::error::EngineError;
use crate::index::IndexData;
use crate::iterator::{BoxedIdIterator, EdgeIter, Intersect, ListIter};
use crate::model::{get_phone_code, year_from_timestamp, Account, Sex, Status, BASE_YEAR, INVALID_ID};
use crate::store::AccountStore;

/// Borrowed context a filter needs to resolve dictionary ids and build lookup
/// iterators. Cheap to construct per-request; never stored past the request.
pub struct FilterCtx<'a> {
    pub dict: &'a Dictionaries,
    pub index: &'a IndexData,
    pub store: &'a AccountStore,
}

#[derive(Debug, Clone)]
pub enum Filter {
    SexEq(Sex),
    EmailLt(String),
    EmailGt(String),
    EmailDomain(String),
    StatusEq(Status),
    StatusNeq(Status),
    FnameEq(String),
    FnameAny(Vec<String>),
    FnameNull(bool),
    SnameEq(String),
    SnameStarts(String),
    SnameNull(bool),
    PhoneCode(String),
    PhoneNull(bool),
    /// Resolved country dictionary id (`INVALID_ID` if the string was never interned).
    CountryEq(i32),
    CountryNull(bool),
    CityEq(i32),
    CityAny(Vec<i32>),
    CityNull(bool),
    BirthLt(i64),
    BirthGt(i64),
    BirthYear(i32),
    JoinedYear(i32),
    /// Resolved interest ids; unresolved strings become `INVALID_ID` and can
    /// never be present on any account, which correctly yields zero matches.
    InterestsContains(Vec<i32>),
    InterestsAny(Vec<i32>),
    LikesContains(Vec<u32>),
    PremiumNow(bool),
    PremiumNull(bool),
}

fn parse_bool_flag(value: &str) -> Result<bool, EngineError> {
    match value {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(EngineError::BadRequest(format!(
            "expected boolean flag 0/1, got {value}"
        ))),
    }
}

fn parse_order(value: &str) -> Result<i32, EngineError> {
    value
        .parse::<i32>()
        .map_err(|_| EngineError::BadRequest(format!("not an integer: {value}")))
}

/// Dialect selector: the group API accepts a restricted, partly-coerced
/// subset of the regular filter grammar (see §4.3).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Regular,
    Group,
}

impl Filter {
    pub fn parse(
        field: &str,
        predicate: &str,
        value: &str,
        mode: ParseMode,
        dict: &Dictionaries,
    ) -> Result<Filter, EngineError> {
        if mode == ParseMode::Group && matches!(field, "email" | "phone" | "premium") {
            return Err(EngineError::Unsupported(format!(
                "field {field} is not supported in group queries"
            )));
        }

        match field {
            "sex" => match predicate {
                "eq" => Sex::from_str(value)
                    .map(Filter::SexEq)
                    .ok_or_else(|| EngineError::BadRequest(format!("bad sex value {value}"))),
                _ => Err(unknown_predicate(field, predicate)),
            },
            "email" => match predicate {
                "lt" => Ok(Filter::EmailLt(value.to_string())),
                "gt" => Ok(Filter::EmailGt(value.to_string())),
                "domain" => Ok(Filter::EmailDomain(value.to_string())),
                _ => Err(unknown_predicate(field, predicate)),
            },
            "status" => {
                let want_eq = if mode == ParseMode::Group { true } else { predicate == "eq" };
                if mode == ParseMode::Regular && predicate == "neq" {
                    let status = Status::from_str(value)
                        .ok_or_else(|| EngineError::BadRequest(format!("bad status value {value}")))?;
                    return Ok(Filter::StatusNeq(status));
                }
                if want_eq {
                    let status = Status::from_str(value)
                        .ok_or_else(|| EngineError::BadRequest(format!("bad status value {value}")))?;
                    Ok(Filter::StatusEq(status))
                } else {
                    Err(unknown_predicate(field, predicate))
                }
            }
            "fname" => match predicate {
                "eq" => Ok(Filter::FnameEq(value.to_string())),
                "any" => Ok(Filter::FnameAny(value.split(',').map(str::to_string).collect())),
                "null" => Ok(Filter::FnameNull(parse_bool_flag(value)?)),
                _ => Err(unknown_predicate(field, predicate)),
            },
            "sname" => match predicate {
                "eq" => Ok(Filter::SnameEq(value.to_string())),
                "starts" => Ok(Filter::SnameStarts(value.to_string())),
                "null" => Ok(Filter::SnameNull(parse_bool_flag(value)?)),
                _ => Err(unknown_predicate(field, predicate)),
            },
            "phone" => match predicate {
                "code" => Ok(Filter::PhoneCode(value.to_string())),
                "null" => Ok(Filter::PhoneNull(parse_bool_flag(value)?)),
                _ => Err(unknown_predicate(field, predicate)),
            },
            "country" => match predicate {
                "eq" => Ok(Filter::CountryEq(dict.country.lookup(value).unwrap_or(INVALID_ID))),
                "null" => Ok(Filter::CountryNull(parse_bool_flag(value)?)),
                _ => Err(unknown_predicate(field, predicate)),
            },
            "city" => match predicate {
                "eq" => Ok(Filter::CityEq(dict.city.lookup(value).unwrap_or(INVALID_ID))),
                "any" => Ok(Filter::CityAny(
                    value
                        .split(',')
                        .map(|s| dict.city.lookup(s).unwrap_or(INVALID_ID))
                        .collect(),
                )),
                "null" => Ok(Filter::CityNull(parse_bool_flag(value)?)),
                _ => Err(unknown_predicate(field, predicate)),
            },
            "birth" => {
                let effective = if mode == ParseMode::Group { "year" } else { predicate };
                match effective {
                    "lt" => Ok(Filter::BirthLt(
                        value.parse().map_err(|_| bad_number(field, value))?,
                    )),
                    "gt" => Ok(Filter::BirthGt(
                        value.parse().map_err(|_| bad_number(field, value))?,
                    )),
                    "year" => Ok(Filter::BirthYear(
                        value.parse().map_err(|_| bad_number(field, value))?,
                    )),
                    _ => Err(unknown_predicate(field, predicate)),
                }
            }
            "joined" => {
                if mode != ParseMode::Group {
                    return Err(unknown_field(field));
                }
                Ok(Filter::JoinedYear(value.parse().map_err(|_| bad_number(field, value))?))
            }
            "interests" => {
                let ids: Vec<i32> = value
                    .split(',')
                    .map(|s| dict.interest.lookup(s).unwrap_or(INVALID_ID))
                    .collect();
                let effective = if mode == ParseMode::Group { "contains" } else { predicate };
                match effective {
                    "contains" => Ok(Filter::InterestsContains(ids)),
                    "any" => Ok(Filter::InterestsAny(ids)),
                    _ => Err(unknown_predicate(field, predicate)),
                }
            }
            "likes" => {
                let effective = if mode == ParseMode::Group { "contains" } else { predicate };
                if effective != "contains" {
                    return Err(unknown_predicate(field, predicate));
                }
                let ids: Result<Vec<u32>, EngineError> = value
                    .split(',')
                    .map(|s| s.parse::<u32>().map_err(|_| bad_number(field, s)))
                    .collect();
                Ok(Filter::LikesContains(ids?))
            }
            "premium" => match predicate {
                "now" => Ok(Filter::PremiumNow(parse_bool_flag(value)?)),
                "null" => Ok(Filter::PremiumNull(parse_bool_flag(value)?)),
                _ => Err(unknown_predicate(field, predicate)),
            },
            _ => Err(unknown_field(field)),
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            Filter::SexEq(_) => "sex",
            Filter::EmailLt(_) | Filter::EmailGt(_) | Filter::EmailDomain(_) => "email",
            Filter::StatusEq(_) | Filter::StatusNeq(_) => "status",
            Filter::FnameEq(_) | Filter::FnameAny(_) | Filter::FnameNull(_) => "fname",
            Filter::SnameEq(_) | Filter::SnameStarts(_) | Filter::SnameNull(_) => "sname",
            Filter::PhoneCode(_) | Filter::PhoneNull(_) => "phone",
            Filter::CountryEq(_) | Filter::CountryNull(_) => "country",
            Filter::CityEq(_) | Filter::CityAny(_) | Filter::CityNull(_) => "city",
            Filter::BirthLt(_) | Filter::BirthGt(_) | Filter::BirthYear(_) => "birth",
            Filter::JoinedYear(_) => "joined",
            Filter::InterestsContains(_) | Filter::InterestsAny(_) => "interests",
            Filter::LikesContains(_) => "likes",
            Filter::PremiumNow(_) | Filter::PremiumNull(_) => "premium",
        }
    }

    pub fn matches(&self, a: &Account) -> bool {
        match self {
            Filter::SexEq(s) => a.sex == *s,
            Filter::EmailLt(v) => a.email < *v,
            Filter::EmailGt(v) => a.email > *v,
            Filter::EmailDomain(v) => a.email_domain == *v,
            Filter::StatusEq(s) => a.status == *s,
            Filter::StatusNeq(s) => a.status != *s,
            Filter::FnameEq(v) => a.fname == *v,
            Filter::FnameAny(vs) => vs.iter().any(|v| *v == a.fname),
            Filter::FnameNull(want_missing) => a.fname.is_empty() == *want_missing,
            Filter::SnameEq(v) => a.sname == *v,
            Filter::SnameStarts(v) => a.sname.starts_with(v.as_str()),
            Filter::SnameNull(want_missing) => a.sname.is_empty() == *want_missing,
            Filter::PhoneCode(v) => get_phone_code(&a.phone) == *v,
            Filter::PhoneNull(want_missing) => a.phone.is_empty() == *want_missing,
            Filter::CountryEq(id) => *id != INVALID_ID && a.country_id as i32 == *id,
            Filter::CountryNull(want_missing) => a.country.is_empty() == *want_missing,
            Filter::CityEq(id) => *id != INVALID_ID && a.city_id as i32 == *id,
            Filter::CityAny(ids) => ids.iter().any(|id| *id != INVALID_ID && a.city_id as i32 == *id),
            Filter::CityNull(want_missing) => a.city.is_empty() == *want_missing,
            Filter::BirthLt(t) => a.birth < *t,
            Filter::BirthGt(t) => a.birth > *t,
            Filter::BirthYear(y) => year_from_timestamp(a.birth) == *y,
            Filter::JoinedYear(y) => year_from_timestamp(a.joined) == *y,
            Filter::InterestsContains(ids) => contains_all_desc(&a.interests, ids),
            Filter::InterestsAny(ids) => contains_any_desc(&a.interests, ids),
            Filter::LikesContains(ids) => {
                ids.iter().all(|id| a.likes.iter().any(|e| e.id == *id))
            }
            Filter::PremiumNow(want) => a.has_premium_now == *want,
            Filter::PremiumNull(want_missing) => a.premium.is_none() == *want_missing,
        }
    }

    pub fn supports_lookup(&self) -> bool {
        matches!(
            self,
            Filter::SexEq(_)
                | Filter::StatusEq(_)
                | Filter::EmailDomain(_)
                | Filter::CountryEq(_)
                | Filter::CityEq(_)
                | Filter::BirthYear(_)
                | Filter::JoinedYear(_)
                | Filter::InterestsContains(_)
        ) || matches!(self, Filter::InterestsAny(ids) if ids.len() == 1)
            || matches!(self, Filter::CountryNull(true) | Filter::CityNull(true))
            || matches!(self, Filter::LikesContains(ids) if !ids.is_empty() && ids.len() <= 3)
    }

    pub fn estimate_output_size(&self, ctx: &FilterCtx) -> usize {
        match self {
            Filter::SexEq(s) => ctx.index.by_sex(*s).len(),
            Filter::StatusEq(s) => ctx.index.by_status(s.as_i32()).len(),
            Filter::EmailDomain(d) => ctx.index.by_email_domain(d).len(),
            Filter::CountryEq(id) => {
                if *id == INVALID_ID {
                    0
                } else {
                    ctx.index.by_country(*id as i8).len()
                }
            }
            Filter::CountryNull(true) => ctx.index.by_country(empty_bucket_id(ctx.dict, true)).len(),
            Filter::CityEq(id) => {
                if *id == INVALID_ID {
                    0
                } else {
                    ctx.index.by_city(*id as i16).len()
                }
            }
            Filter::CityNull(true) => ctx.index.by_city(empty_bucket_id(ctx.dict, false) as i16).len(),
            Filter::BirthYear(y) => ctx.index.by_birth_year((*y - BASE_YEAR) as i8).len(),
            Filter::JoinedYear(y) => ctx.index.by_joined_year((*y - BASE_YEAR) as i8).len(),
            Filter::InterestsContains(ids) => smallest_interest_list(ctx, ids),
            Filter::InterestsAny(ids) if ids.len() == 1 => {
                if ids[0] == INVALID_ID {
                    0
                } else {
                    ctx.index.by_interest(ids[0] as i8).len()
                }
            }
            Filter::LikesContains(ids) => likes_lookup_estimate(ctx, ids),
            _ => usize::MAX,
        }
    }

    pub fn open_lookup(&self, ctx: &FilterCtx) -> BoxedIdIterator {
        match self {
            Filter::SexEq(s) => Box::new(ListIter::new(ctx.index.by_sex(*s))),
            Filter::StatusEq(s) => Box::new(ListIter::new(ctx.index.by_status(s.as_i32()))),
            Filter::EmailDomain(d) => Box::new(ListIter::new(ctx.index.by_email_domain(d))),
            Filter::CountryEq(id) => {
                if *id == INVALID_ID {
                    Box::new(ListIter::empty())
                } else {
                    Box::new(ListIter::new(ctx.index.by_country(*id as i8)))
                }
            }
            Filter::CountryNull(true) => Box::new(ListIter::new(ctx.index.by_country(empty_bucket_id(ctx.dict, true)))),
            Filter::CityEq(id) => {
                if *id == INVALID_ID {
                    Box::new(ListIter::empty())
                } else {
                    Box::new(ListIter::new(ctx.index.by_city(*id as i16)))
                }
            }
            Filter::CityNull(true) => {
                Box::new(ListIter::new(ctx.index.by_city(empty_bucket_id(ctx.dict, false) as i16)))
            }
            Filter::BirthYear(y) => Box::new(ListIter::new(ctx.index.by_birth_year((*y - BASE_YEAR) as i8))),
            Filter::JoinedYear(y) => Box::new(ListIter::new(ctx.index.by_joined_year((*y - BASE_YEAR) as i8))),
            Filter::InterestsContains(ids) => {
                let driver = smallest_interest_id(ctx, ids);
                match driver {
                    Some(id) => Box::new(ListIter::new(ctx.index.by_interest(id))),
                    None => Box::new(ListIter::empty()),
                }
            }
            Filter::InterestsAny(ids) if ids.len() == 1 => {
                if ids[0] == INVALID_ID {
                    Box::new(ListIter::empty())
                } else {
                    Box::new(ListIter::new(ctx.index.by_interest(ids[0] as i8)))
                }
            }
            Filter::LikesContains(ids) => likes_lookup_iter(ctx, ids),
            _ => Box::new(ListIter::empty()),
        }
    }

    /// The dictionary-equality value this filter pins a field to, when it has
    /// exactly one — used by the group planner's filter-as-extra-key rewrite
    /// to check a cached bucket's value against the filter without rescanning.
    pub fn value_id(&self) -> Option<i32> {
        match self {
            Filter::SexEq(s) => Some(*s as i32),
            Filter::StatusEq(s) => Some(s.as_i32()),
            Filter::CountryEq(id) => Some(*id),
            Filter::CityEq(id) => Some(*id),
            Filter::BirthYear(y) => Some(*y - BASE_YEAR),
            Filter::JoinedYear(y) => Some(*y - BASE_YEAR),
            Filter::InterestsContains(ids) | Filter::InterestsAny(ids) if ids.len() == 1 => Some(ids[0]),
            _ => None,
        }
    }
}

fn empty_bucket_id(dict: &Dictionaries, country: bool) -> i8 {
    let d = if country { &dict.country } else { &dict.city };
    d.lookup("").unwrap_or(INVALID_ID) as i8
}

fn smallest_interest_id(ctx: &FilterCtx, ids: &[i32]) -> Option<i8> {
    ids.iter()
        .filter(|&&id| id != INVALID_ID)
        .map(|&id| id as i8)
        .min_by_key(|&id| ctx.index.by_interest(id).len())
}

fn smallest_interest_list(ctx: &FilterCtx, ids: &[i32]) -> usize {
    if ids.iter().any(|&id| id == INVALID_ID) {
        return 0;
    }
    match smallest_interest_id(ctx, ids) {
        Some(id) => ctx.index.by_interest(id).len(),
        None => 0,
    }
}

fn likes_lookup_estimate(ctx: &FilterCtx, ids: &[u32]) -> usize {
    ids.iter()
        .map(|&id| {
            ctx.store
                .get(id)
                .map(|a| a.backward_likes.len())
                .unwrap_or(0)
        })
        .min()
        .unwrap_or(0)
}

fn likes_lookup_iter(ctx: &FilterCtx, ids: &[u32]) -> BoxedIdIterator {
    let mut iters: Vec<BoxedIdIterator> = ids
        .iter()
        .map(|&id| -> BoxedIdIterator {
            match ctx.store.get(id) {
                Some(a) => Box::new(EdgeIter::new(Arc::new(a.backward_likes.clone()))),
                None => Box::new(ListIter::empty()),
            }
        })
        .collect();
    match iters.len() {
        0 => Box::new(ListIter::empty()),
        1 => iters.pop().unwrap(),
        _ => {
            let mut acc = iters.remove(0);
            for next in iters {
                acc = Box::new(Intersect::new(BoxedAdapter(acc), BoxedAdapter(next)));
            }
            acc
        }
    }
}

/// Adapter so a `BoxedIdIterator` (already a trait object) can itself be
/// composed as one side of an `Intersect`, which is generic over `IdIterator`.
struct BoxedAdapter(BoxedIdIterator);

impl Iterator for BoxedAdapter {
    type Item = u32;
    fn next(&mut self) -> Option<u32> {
        self.0.next()
    }
}

impl crate::iterator::IdIterator for BoxedAdapter {
    fn size(&self) -> usize {
        self.0.size()
    }
}

fn contains_all_desc(data: &[i8], query: &[i32]) -> bool {
    query.iter().all(|&q| {
        if q == INVALID_ID {
            return false;
        }
        data.contains(&(q as i8))
    })
}

fn contains_any_desc(data: &[i8], query: &[i32]) -> bool {
    query.iter().any(|&q| q != INVALID_ID && data.contains(&(q as i8)))
}

fn unknown_field(field: &str) -> EngineError {
    EngineError::BadRequest(format!("unknown field: {field}"))
}

fn unknown_predicate(field: &str, predicate: &str) -> EngineError {
    EngineError::BadRequest(format!("unknown predicate {predicate} for field {field}"))
}

fn bad_number(field: &str, value: &str) -> EngineError {
    EngineError::BadRequest(format!("not a number for {field}: {value}"))
}

/// A parsed request: the ordered filter list, the fields the client asked to
/// see, and the result limit. `order` is only meaningful for group queries.
pub struct ParsedQuery {
    pub filters: Vec<Filter>,
    pub selected_fields: Vec<String>,
    pub limit: usize,
    pub order: i32,
}

impl ParsedQuery {
    pub fn parse_filter_query(
        params: &[(String, String)],
        dict: &Dictionaries,
    ) -> Result<ParsedQuery, EngineError> {
        let mut filters = Vec::new();
        let mut selected_fields = vec!["id".to_string(), "email".to_string()];
        let mut limit: Option<usize> = None;

        for (key, value) in params {
            if key == "query_id" {
                continue;
            }
            if key == "limit" {
                let n: i64 = value
                    .parse()
                    .map_err(|_| EngineError::BadRequest("limit must be an integer".into()))?;
                if n <= 0 {
                    return Err(EngineError::BadRequest("limit must be positive".into()));
                }
                limit = Some(n as usize);
                continue;
            }
            let (field, predicate) = split_field_predicate(key)?;
            if !selected_fields.iter().any(|f| f == field) {
                selected_fields.push(field.to_string());
            }
            filters.push(Filter::parse(field, predicate, value, ParseMode::Regular, dict)?);
        }

        Ok(ParsedQuery {
            filters,
            selected_fields,
            limit: limit.ok_or_else(|| EngineError::BadRequest("limit is required".into()))?,
            order: 1,
        })
    }

    pub fn parse_group_query(
        params: &[(String, String)],
        dict: &Dictionaries,
    ) -> Result<(ParsedQuery, Vec<String>), EngineError> {
        let mut filters = Vec::new();
        let mut limit: Option<usize> = None;
        let mut order = -1;
        let mut keys: Vec<String> = Vec::new();

        for (key, value) in params {
            match key.as_str() {
                "query_id" => continue,
                "limit" => {
                    let n: i64 = value
                        .parse()
                        .map_err(|_| EngineError::BadRequest("limit must be an integer".into()))?;
                    if n <= 0 {
                        return Err(EngineError::BadRequest("limit must be positive".into()));
                    }
                    limit = Some(n as usize);
                }
                "keys" => {
                    let mut seen = std::collections::HashSet::new();
                    for k in value.split(',') {
                        if !seen.insert(k.to_string()) {
                            return Err(EngineError::BadRequest(format!("duplicate group key {k}")));
                        }
                        keys.push(k.to_string());
                    }
                }
                "order" => {
                    order = parse_order(value)?;
                    if order != 1 && order != -1 {
                        return Err(EngineError::BadRequest("order must be 1 or -1".into()));
                    }
                }
                _ => {
                    // The group dialect takes the bare field name as the query
                    // key (`country=Russia`, not `country_eq=Russia`) — there is
                    // no predicate suffix to split off. `Filter::parse` already
                    // coerces the predicate internally per field under
                    // `ParseMode::Group`; "eq" is passed as a placeholder for the
                    // fields whose dispatch requires it to be literally "eq".
                    filters.push(Filter::parse(key, "eq", value, ParseMode::Group, dict)?);
                }
            }
        }

        Ok((
            ParsedQuery {
                filters,
                selected_fields: Vec::new(),
                limit: limit.ok_or_else(|| EngineError::BadRequest("limit is required".into()))?,
                order,
            },
            keys,
        ))
    }
}

fn split_field_predicate(key: &str) -> Result<(&str, &str), EngineError> {
    let mut parts = key.splitn(2, '_');
    let field = parts
        .next()
        .ok_or_else(|| EngineError::BadRequest(format!("malformed query key {key}")))?;
    let predicate = parts
        .next()
        .ok_or_else(|| EngineError::BadRequest(format!("malformed query key {key}")))?;
    Ok((field, predicate))
}
