// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

//! Event model shared by the collector and subscription components.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// A single event: string keys mapped to arbitrary JSON values. Key
/// order carries no meaning.
pub type Event = Map<String, Value>;

/// Reserved key holding an event's timestamp.
pub const TIMESTAMP_KEY: &str = "$timestamp";

/// Reserved key holding an event's unique id.
pub const ID_KEY: &str = "$id";

/// Sets the timestamp of an event, overwriting any existing value.
pub fn set_timestamp(event: &mut Event, ts: DateTime<Utc>) {
    event.insert(
        TIMESTAMP_KEY.to_string(),
        Value::String(ts.to_rfc3339_opts(SecondsFormat::Nanos, true)),
    );
}

/// Sets the id of an event, overwriting any existing value.
pub fn set_id(event: &mut Event, id: &str) {
    event.insert(ID_KEY.to_string(), Value::String(id.to_string()));
}
