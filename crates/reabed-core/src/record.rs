//! Backing file record codec.
//!
//! The device file holds one line of five comma separated integers:
//! `back,hip,ankle,height,weight`. The same comma separated form is used
//! for the values a client types after a `set_*` prompt.

use thiserror::Error;

use crate::model::{Angles, DeviceState};

/// A line could not be parsed into the expected integers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("expected {expected} comma-separated values, got {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),
}

/// Parse exactly `N` comma separated integers.
pub fn parse_values<const N: usize>(line: &str) -> Result<[i32; N], RecordError> {
    let parts: Vec<&str> = line.trim().split(',').collect();
    if parts.len() != N {
        return Err(RecordError::FieldCount {
            expected: N,
            found: parts.len(),
        });
    }

    let mut values = [0i32; N];
    for (slot, part) in values.iter_mut().zip(parts) {
        let part = part.trim();
        *slot = part
            .parse()
            .map_err(|_| RecordError::InvalidInteger(part.to_string()))?;
    }
    Ok(values)
}

/// Parse a full backing record. Ranges are not checked.
pub fn parse_state(line: &str) -> Result<DeviceState, RecordError> {
    let [back, hip, ankle, height, weight] = parse_values::<5>(line)?;
    Ok(DeviceState {
        back,
        hip,
        ankle,
        height,
        weight,
    })
}

/// Parse `back,hip,ankle`. Ranges are not checked.
pub fn parse_angles(line: &str) -> Result<Angles, RecordError> {
    let [back, hip, ankle] = parse_values::<3>(line)?;
    Ok(Angles::new(back, hip, ankle))
}

/// Parse a single integer value.
pub fn parse_value(line: &str) -> Result<i32, RecordError> {
    let [value] = parse_values::<1>(line)?;
    Ok(value)
}

/// Format a state as a backing record line (without line terminator).
pub fn format_state(state: &DeviceState) -> String {
    format!(
        "{},{},{},{},{}",
        state.back, state.hip, state.ankle, state.height, state.weight
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_state() {
        let state = parse_state("10,-5,20,50,80").unwrap();
        assert_eq!(
            state,
            DeviceState {
                back: 10,
                hip: -5,
                ankle: 20,
                height: 50,
                weight: 80,
            }
        );
    }

    #[test]
    fn test_parse_state_tolerates_whitespace() {
        let state = parse_state(" 1, 2 ,3,4,5\r\n").unwrap();
        assert_eq!(state.back, 1);
        assert_eq!(state.hip, 2);
        assert_eq!(state.weight, 5);
    }

    #[test]
    fn test_parse_state_rejects_garbage() {
        assert_eq!(
            parse_state("x,1,2,3,4"),
            Err(RecordError::InvalidInteger("x".to_string()))
        );
        assert_eq!(
            parse_state("1,2,3,4"),
            Err(RecordError::FieldCount {
                expected: 5,
                found: 4
            })
        );
        assert!(parse_state("").is_err());
    }

    #[test]
    fn test_parse_state_does_not_check_ranges() {
        let state = parse_state("99,0,0,0,0").unwrap();
        assert_eq!(state.back, 99);
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_parse_angles_and_value() {
        assert_eq!(parse_angles("10,0,0"), Ok(Angles::new(10, 0, 0)));
        assert!(parse_angles("10,0").is_err());
        assert_eq!(parse_value("150\n"), Ok(150));
        assert!(parse_value("abc").is_err());
        assert!(parse_value("1,2").is_err());
    }

    #[test]
    fn test_format_state() {
        let state = DeviceState {
            back: 10,
            hip: -15,
            ankle: 0,
            height: 100,
            weight: 300,
        };
        assert_eq!(format_state(&state), "10,-15,0,100,300");
        assert_eq!(parse_state(&format_state(&state)), Ok(state));
    }
}
