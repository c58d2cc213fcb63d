use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PaceError {
    #[error("distance must be a positive number of kilometers")]
    InvalidDistance,
    #[error("duration must be H:MM or HH:MM with minutes 00-59, got {0:?}")]
    InvalidDuration(String),
}

/// Parses an elapsed time in `H:MM` or `HH:MM` form into total minutes.
pub fn parse_duration_minutes(duration: &str) -> Result<u32, PaceError> {
    lazy_static! {
        static ref DURATION_RE: Regex = Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap();
    }
    let invalid = || PaceError::InvalidDuration(duration.to_string());
    let caps = DURATION_RE.captures(duration.trim()).ok_or_else(invalid)?;
    let hours: u32 = caps[1].parse().map_err(|_| invalid())?;
    let minutes: u32 = caps[2].parse().map_err(|_| invalid())?;
    if minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// Computes pace as `"M:SS/km"` from a distance in kilometers and an elapsed
/// time in `H:MM` form. Seconds that round up to 60 carry into the minutes.
pub fn calculate_pace(distance_km: f64, duration: &str) -> Result<String, PaceError> {
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return Err(PaceError::InvalidDistance);
    }
    let total_minutes = parse_duration_minutes(duration)? as f64;
    let pace_minutes = total_minutes / distance_km;

    let mut minutes = pace_minutes.floor() as u64;
    let mut seconds = ((pace_minutes - pace_minutes.floor()) * 60.0).round() as u64;
    if seconds == 60 {
        minutes += 1;
        seconds = 0;
    }

    Ok(format!("{}:{:02}/km", minutes, seconds))
}
