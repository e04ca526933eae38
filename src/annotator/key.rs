//! Trip keys shared by the stop and prediction tables.

use std::fmt;

use serde::Serialize;

/// Which fields make up the trip key for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    /// `(hub, trip_ref)`
    HubTripRef,
    /// `(hub, trip_ref, trip_id)`, used when both tables carry `trip_id`.
    HubTripRefTripId,
}

impl KeyMode {
    pub fn resolve(stops_have_trip_id: bool, predictions_have_trip_id: bool) -> Self {
        if stops_have_trip_id && predictions_have_trip_id {
            KeyMode::HubTripRefTripId
        } else {
            KeyMode::HubTripRef
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyMode::HubTripRef => "hub_trip_ref",
            KeyMode::HubTripRefTripId => "hub_trip_ref_trip_id",
        }
    }
}

/// Composite trip identifier. `trip_id` is `None` under [`KeyMode::HubTripRef`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TripKey {
    pub hub: String,
    pub trip_ref: String,
    pub trip_id: Option<String>,
}

impl TripKey {
    pub fn new(mode: KeyMode, hub: &str, trip_ref: &str, trip_id: Option<&str>) -> Self {
        let trip_id = match mode {
            KeyMode::HubTripRef => None,
            KeyMode::HubTripRefTripId => trip_id.map(str::to_string),
        };
        Self {
            hub: hub.to_string(),
            trip_ref: trip_ref.to_string(),
            trip_id,
        }
    }
}

impl fmt::Display for TripKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hub={} trip_ref={}", self.hub, self.trip_ref)?;
        if let Some(trip_id) = &self.trip_id {
            write!(f, " trip_id={trip_id}")?;
        }
        Ok(())
    }
}
