//! Reanimation bed data model.
//!
//! The bed exposes five integer fields. Three of them are section angles
//! that are always read, written and notified together; height and weight
//! stand on their own.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the five device fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// Back section angle, degrees.
    Back,
    /// Hip section angle, degrees.
    Hip,
    /// Ankle section angle, degrees.
    Ankle,
    /// Bed height, percent.
    Height,
    /// Weight on the hip section, kilograms.
    Weight,
}

impl Field {
    /// All fields in backing record order.
    pub const ALL: [Field; 5] = [
        Field::Back,
        Field::Hip,
        Field::Ankle,
        Field::Height,
        Field::Weight,
    ];

    /// Inclusive range of valid values.
    pub const fn range(self) -> RangeInclusive<i32> {
        match self {
            Field::Back => 0..=50,
            Field::Hip => -15..=15,
            Field::Ankle => 0..=30,
            Field::Height => 0..=100,
            Field::Weight => 0..=300,
        }
    }

    /// Wire name of the field.
    pub const fn name(self) -> &'static str {
        match self {
            Field::Back => "back",
            Field::Hip => "hip",
            Field::Ankle => "ankle",
            Field::Height => "height",
            Field::Weight => "weight",
        }
    }

    /// Human readable label used in validation messages.
    pub const fn label(self) -> &'static str {
        match self {
            Field::Back => "back angle",
            Field::Hip => "hip angle",
            Field::Ankle => "ankle angle",
            // Height is reported as a bed lift position, same wording as the angles.
            Field::Height => "height angle",
            Field::Weight => "weight",
        }
    }

    /// Notification topic a change of this field is published on.
    pub const fn topic(self) -> Topic {
        match self {
            Field::Back | Field::Hip | Field::Ankle => Topic::Angles,
            Field::Height => Topic::Height,
            Field::Weight => Topic::Weight,
        }
    }

    /// Check `value` against the field's range.
    pub fn validate(self, value: i32) -> Result<i32, ValidationError> {
        let range = self.range();
        if range.contains(&value) {
            Ok(value)
        } else {
            Err(ValidationError {
                field: self,
                value,
                min: *range.start(),
                max: *range.end(),
            })
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A proposed value falls outside its field's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{} is out of range: {value} not in [{min}, {max}]", .field.label())]
pub struct ValidationError {
    pub field: Field,
    pub value: i32,
    pub min: i32,
    pub max: i32,
}

/// Granularity at which clients subscribe to changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Angles,
    Height,
    Weight,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Angles, Topic::Height, Topic::Weight];

    pub const fn name(self) -> &'static str {
        match self {
            Topic::Angles => "angles",
            Topic::Height => "height",
            Topic::Weight => "weight",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown topic name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "angles" => Ok(Topic::Angles),
            "height" => Ok(Topic::Height),
            "weight" => Ok(Topic::Weight),
            other => Err(UnknownTopic(other.to_string())),
        }
    }
}

/// The three section angles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Angles {
    pub back: i32,
    pub hip: i32,
    pub ankle: i32,
}

impl Angles {
    pub fn new(back: i32, hip: i32, ankle: i32) -> Self {
        Self { back, hip, ankle }
    }

    /// Validate all three angles, reporting the first out-of-range one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Field::Back.validate(self.back)?;
        Field::Hip.validate(self.hip)?;
        Field::Ankle.validate(self.ankle)?;
        Ok(())
    }
}

/// Formats as `back,hip,ankle`, the `get_angles` response body.
impl fmt::Display for Angles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.back, self.hip, self.ankle)
    }
}

/// Full state of the bed.
///
/// Values held by a store always satisfy [`Field::range`]. Values parsed from
/// a backing record do not until they have been through [`DeviceState::validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub back: i32,
    pub hip: i32,
    pub ankle: i32,
    pub height: i32,
    pub weight: i32,
}

impl DeviceState {
    pub fn angles(&self) -> Angles {
        Angles::new(self.back, self.hip, self.ankle)
    }

    pub fn get(&self, field: Field) -> i32 {
        match field {
            Field::Back => self.back,
            Field::Hip => self.hip,
            Field::Ankle => self.ankle,
            Field::Height => self.height,
            Field::Weight => self.weight,
        }
    }

    fn set(&mut self, field: Field, value: i32) {
        match field {
            Field::Back => self.back = value,
            Field::Hip => self.hip = value,
            Field::Ankle => self.ankle = value,
            Field::Height => self.height = value,
            Field::Weight => self.weight = value,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for field in Field::ALL {
            field.validate(self.get(field))?;
        }
        Ok(())
    }

    /// Return a copy with every field present in `update` replaced.
    ///
    /// No validation happens here.
    pub fn merged(&self, update: &StateUpdate) -> DeviceState {
        let mut next = *self;
        for (field, value) in update.fields() {
            next.set(field, value);
        }
        next
    }
}

/// A partial update: fields left as `None` keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub back: Option<i32>,
    pub hip: Option<i32>,
    pub ankle: Option<i32>,
    pub height: Option<i32>,
    pub weight: Option<i32>,
}

impl StateUpdate {
    pub fn angles(angles: Angles) -> Self {
        Self {
            back: Some(angles.back),
            hip: Some(angles.hip),
            ankle: Some(angles.ankle),
            ..Default::default()
        }
    }

    pub fn height(height: i32) -> Self {
        Self {
            height: Some(height),
            ..Default::default()
        }
    }

    pub fn weight(weight: i32) -> Self {
        Self {
            weight: Some(weight),
            ..Default::default()
        }
    }

    /// Supplied fields in record order.
    pub fn fields(&self) -> impl Iterator<Item = (Field, i32)> + '_ {
        Field::ALL.into_iter().filter_map(move |field| {
            let value = match field {
                Field::Back => self.back,
                Field::Hip => self.hip,
                Field::Ankle => self.ankle,
                Field::Height => self.height,
                Field::Weight => self.weight,
            };
            value.map(|v| (field, v))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }

    /// Validate every supplied field and report the first failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut first = None;
        for (field, value) in self.fields() {
            if let Err(e) = field.validate(value) {
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
