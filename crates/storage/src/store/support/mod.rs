#![forbid(unsafe_code)]

mod branches_tx;
mod counters;
mod rows;
mod schema;
mod time;
mod versions_tx;

pub(super) use branches_tx::*;
pub(super) use counters::*;
pub(super) use rows::*;
pub(super) use schema::install_schema;
pub(super) use time::{format_ts_ms, now_ms};
pub(super) use versions_tx::*;
