//! Text sinks (§4.7): dump and histogram, driven by the same `RecordSink`
//! vocabulary the database writers use.

pub mod dump;
pub mod histogram;
