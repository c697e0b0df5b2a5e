//! Typed accident rows and the axes they can be grouped or summed along.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

pub const WEEKDAY_LABELS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Calendar and time-bucket fields derived from the timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFields {
    /// Monday = 0 .. Sunday = 6.
    pub day_of_week: u8,
    pub hour: u8,
    pub weekend: bool,
    pub night: bool,
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl TimeFields {
    pub fn from_timestamp(ts: &NaiveDateTime) -> Self {
        let day_of_week = ts.weekday().num_days_from_monday() as u8;
        let hour = ts.hour() as u8;
        Self {
            day_of_week,
            hour,
            weekend: day_of_week >= 5,
            night: hour >= 20 || hour < 6,
            year: ts.year(),
            month: ts.month() as u8,
            day: ts.day() as u8,
        }
    }
}

/// One reported incident after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct AccidentRecord {
    pub accident_number: String,
    pub timestamp: NaiveDateTime,
    pub time: TimeFields,
    pub latitude: f64,
    pub longitude: f64,
    pub injuries: u32,
    pub fatalities: u32,
    pub vehicles: u32,
    pub hit_and_run: bool,
    pub weather: String,
    pub illumination: String,
    pub collision_type: String,
    pub reporting_officer: String,
    pub harmful_descriptions: String,
    pub street_address: String,
    pub precinct: String,
}

impl AccidentRecord {
    pub fn has_injury(&self) -> bool {
        self.injuries > 0
    }

    pub fn has_fatality(&self) -> bool {
        self.fatalities > 0
    }
}

/// A categorical axis a record can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Weather,
    Illumination,
    CollisionType,
    Hour,
    DayOfWeek,
    Weekend,
    Night,
    Year,
    Month,
    Precinct,
}

impl Dimension {
    /// The record's label on this axis.
    pub fn label(self, record: &AccidentRecord) -> String {
        match self {
            Dimension::Weather => record.weather.clone(),
            Dimension::Illumination => record.illumination.clone(),
            Dimension::CollisionType => record.collision_type.clone(),
            Dimension::Hour => record.time.hour.to_string(),
            Dimension::DayOfWeek => WEEKDAY_LABELS[record.time.day_of_week as usize].to_string(),
            Dimension::Weekend => bool_label(record.time.weekend, "Weekend", "Weekday"),
            Dimension::Night => bool_label(record.time.night, "Night", "Day"),
            Dimension::Year => record.time.year.to_string(),
            Dimension::Month => record.time.month.to_string(),
            Dimension::Precinct => record.precinct.clone(),
        }
    }

    /// Every possible label, for axes with a closed domain.
    pub fn domain(self) -> Option<Vec<String>> {
        match self {
            Dimension::Hour => Some((0..24).map(|h| h.to_string()).collect()),
            Dimension::DayOfWeek => Some(WEEKDAY_LABELS.iter().map(|d| d.to_string()).collect()),
            Dimension::Weekend => Some(vec!["Weekday".to_string(), "Weekend".to_string()]),
            Dimension::Night => Some(vec!["Day".to_string(), "Night".to_string()]),
            Dimension::Month => Some((1..=12).map(|m| m.to_string()).collect()),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Weather => "weather",
            Dimension::Illumination => "illumination",
            Dimension::CollisionType => "collision_type",
            Dimension::Hour => "hour",
            Dimension::DayOfWeek => "day_of_week",
            Dimension::Weekend => "weekend",
            Dimension::Night => "night",
            Dimension::Year => "year",
            Dimension::Month => "month",
            Dimension::Precinct => "precinct",
        }
    }
}

fn bool_label(flag: bool, yes: &str, no: &str) -> String {
    let label = if flag { yes } else { no };
    label.to_string()
}

/// A numeric column that can be summed per group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Injuries,
    Fatalities,
    Vehicles,
}

impl Metric {
    pub fn value(self, record: &AccidentRecord) -> u64 {
        u64::from(match self {
            Metric::Injuries => record.injuries,
            Metric::Fatalities => record.fatalities,
            Metric::Vehicles => record.vehicles,
        })
    }
}

/// The normalized, read-only accident table.
#[derive(Debug, Clone, Default)]
pub struct AccidentTable {
    pub records: Vec<AccidentRecord>,
}

impl AccidentTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AccidentRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A record at the given timestamp with the given categories and counts.
    pub fn record(ts: &str, weather: &str, illumination: &str, injuries: u32, fatalities: u32) -> AccidentRecord {
        let timestamp = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M").unwrap();
        AccidentRecord {
            accident_number: "20200000001".to_string(),
            timestamp,
            time: TimeFields::from_timestamp(&timestamp),
            latitude: 36.16,
            longitude: -86.78,
            injuries,
            fatalities,
            vehicles: 2,
            hit_and_run: false,
            weather: weather.to_string(),
            illumination: illumination.to_string(),
            collision_type: "ANGLE".to_string(),
            reporting_officer: "1234".to_string(),
            harmful_descriptions: "MOTOR VEHICLE IN TRANSPORT".to_string(),
            street_address: "BROADWAY".to_string(),
            precinct: "CENTRAL".to_string(),
        }
    }
}
