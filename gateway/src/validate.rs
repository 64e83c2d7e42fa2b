use crate::errors::{Error, Result};

/// Validates an ingestion request before it enters the pipeline.
pub fn validate(device_id: &str, temperature: f64, humidity: f64) -> Result<()> {
    if device_id.is_empty() {
        return Err(Error::Validation("Device ID cannot be empty".to_string()));
    }

    if !temperature.is_finite() {
        return Err(Error::Validation(format!(
            "Temperature {} is not a finite number",
            temperature
        )));
    }

    if !humidity.is_finite() {
        return Err(Error::Validation(format!(
            "Humidity {} is not a finite number",
            humidity
        )));
    }

    Ok(())
}
