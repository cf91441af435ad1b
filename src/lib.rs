//! # Accounts Query Engine
//!
//! An in-memory query server for a fixed "dating site" account schema,
//! built around a read-optimized analytical index rather than a general
//! query planner: attribute filters, multi-dimensional group-bys, an
//! interest-based recommend engine, and a collaborative-filter suggest
//! engine, all served out of a dense in-process account store under
//! concurrent point updates.
//!
//! ## Module map
//!
//! | Module | Component | Responsibility |
//! |--------|-----------|----------------|
//! | `model` | C1/C2 | Account schema, derived fields, dictionary id types |
//! | `dictionary` | C1 | String interning for country/city/interest |
//! | `store` | C2 | Dense account slots, descending full scan |
//! | `index` | C3 | Inverted indexes + recommend buckets, rebuilt wholesale |
//! | `iterator` | C4 | Lazy descending-id streams with intersection |
//! | `filter` | C5 | The closed filter algebra and query parsing |
//! | `group` | C6 | Multi-key histograms and the precomputed group cache |
//! | `planner` | C7 | Driver selection and group-cache rewrites |
//! | `recommend` | C8 | Bucketed interest-compatibility ranking |
//! | `suggest` | C9 | Collaborative filtering over the like graph |
//! | `mutation` | C10 | create/update/likes, single-writer critical section |
//! | `rebuild` | C11 | Wholesale index rebuild on write quiescence |
//! | `config` | C12 | Hierarchical TOML + env configuration |
//! | `http` | C13 | axum router, handlers, rebuild-gate middleware |
//! | `loader` | C14 | Directory-of-JSON bulk loader + `options.txt` |
//!
//! `engine::Engine` is the shared object every handler, the loader, and the
//! rebuild scheduler hold one `Arc` of.

pub mod config;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod filter;
pub mod group;
pub mod http;
pub mod index;
pub mod iterator;
pub mod loader;
pub mod model;
pub mod mutation;
pub mod payload;
pub mod planner;
pub mod rebuild;
pub mod recommend;
pub mod store;
pub mod suggest;

pub use config::Config;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
