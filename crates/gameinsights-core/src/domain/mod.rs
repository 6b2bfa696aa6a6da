//! # Domain Types
//!
//! Identifier and time primitives shared by adapters, the normalizer and the
//! collector.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AppId`] | Opaque, non-empty Steam app id, compared verbatim |
//! | [`SteamId`] | 64-bit Steam account id |
//! | [`UtcDateTime`] | UTC timestamp (collection clock, envelope metadata) |
//!
//! Date helpers ([`parse_calendar_date`], [`date_from_epoch`]) accept the
//! date layouts seen across providers and never fail loudly: an
//! unrecognised date is simply `None`.

mod app_id;
mod steam_id;
mod timestamp;

pub use app_id::AppId;
pub use steam_id::SteamId;
pub use timestamp::{date_from_epoch, format_calendar_date, parse_calendar_date, UtcDateTime};
