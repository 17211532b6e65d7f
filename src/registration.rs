use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::firestore::{Document, RemoteStore, Value, PARKING_LOTS_COLLECTION, USERS_COLLECTION};

const FIRST_NAME_MAX_LENGTH: usize = 20;
const LAST_NAME_MAX_LENGTH: usize = 20;
const EMAIL_MAX_LENGTH: usize = 50;
const MOBILE_NUMBER_LENGTH: usize = 10;
const UNIANDES_CODE_MIN_LENGTH: usize = 6;
const UNIANDES_CODE_MAX_LENGTH: usize = 10;
const PASSWORD_MAX_LENGTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    FirstName,
    LastName,
    Email,
    MobileNumber,
    DateOfBirth,
    UniandesCode,
    Password,
    ParkingLotName,
    FarePerDay,
    OpenTime,
    CloseTime,
    AvailableSpots,
    Longitude,
    Latitude,
    AvailableEvSpots,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::Email => "email",
            Field::MobileNumber => "mobile_number",
            Field::DateOfBirth => "date_of_birth",
            Field::UniandesCode => "uniandes_code",
            Field::Password => "password",
            Field::ParkingLotName => "parking_lot_name",
            Field::FarePerDay => "fare_per_day",
            Field::OpenTime => "open_time",
            Field::CloseTime => "close_time",
            Field::AvailableSpots => "available_spots",
            Field::Longitude => "longitude",
            Field::Latitude => "latitude",
            Field::AvailableEvSpots => "available_ev_spots",
        };
        f.write_str(name)
    }
}

/// A form field that failed validation, with the message shown under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+$").expect("email pattern is valid")
    })
}

fn too_long(value: &str, max: usize) -> bool {
    value.chars().count() > max
}

/// The driver sign-up form.
#[derive(Debug, Clone, Default)]
pub struct UserSignUp {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_number: String,
    /// `DD/MM/YYYY`
    pub date_of_birth: String,
    pub uniandes_code: String,
    pub password: String,
}

impl UserSignUp {
    /// Check every field, collecting all failures in form order.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.first_name.trim().is_empty() {
            errors.push(FieldError::new(Field::FirstName, "First name cannot be empty"));
        } else if too_long(&self.first_name, FIRST_NAME_MAX_LENGTH) {
            errors.push(FieldError::new(
                Field::FirstName,
                format!("First name must be at most {FIRST_NAME_MAX_LENGTH} characters"),
            ));
        }

        if self.last_name.trim().is_empty() {
            errors.push(FieldError::new(Field::LastName, "Last name cannot be empty"));
        } else if too_long(&self.last_name, LAST_NAME_MAX_LENGTH) {
            errors.push(FieldError::new(
                Field::LastName,
                format!("Last name must be at most {LAST_NAME_MAX_LENGTH} characters"),
            ));
        }

        if self.email.trim().is_empty()
            || too_long(&self.email, EMAIL_MAX_LENGTH)
            || !email_pattern().is_match(&self.email)
        {
            errors.push(FieldError::new(Field::Email, "Invalid email format"));
        }

        if self.mobile_number.len() != MOBILE_NUMBER_LENGTH
            || !self.mobile_number.chars().all(|c| c.is_ascii_digit())
        {
            errors.push(FieldError::new(
                Field::MobileNumber,
                "Mobile number must be numeric and not exceed 10 digits",
            ));
        }

        if NaiveDate::parse_from_str(self.date_of_birth.trim(), "%d/%m/%Y").is_err() {
            errors.push(FieldError::new(
                Field::DateOfBirth,
                "Date of birth must be in format DD/MM/YYYY",
            ));
        }

        let code_len = self.uniandes_code.chars().count();
        if !(UNIANDES_CODE_MIN_LENGTH..=UNIANDES_CODE_MAX_LENGTH).contains(&code_len)
            || !self.uniandes_code.chars().all(|c| c.is_ascii_digit())
        {
            errors.push(FieldError::new(Field::UniandesCode, "Uniandes code must be numeric"));
        }

        if self.password.trim().is_empty() {
            errors.push(FieldError::new(Field::Password, "Password cannot be empty"));
        } else if too_long(&self.password, PASSWORD_MAX_LENGTH) {
            errors.push(FieldError::new(
                Field::Password,
                format!("Password must be at most {PASSWORD_MAX_LENGTH} characters"),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The profile document. The password is not part of it.
    pub fn to_fields(&self) -> BTreeMap<String, Value> {
        [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("mobileNumber", &self.mobile_number),
            ("dateOfBirth", &self.date_of_birth),
            ("uniandesCode", &self.uniandes_code),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::StringValue(value.trim().to_string())))
        .collect()
    }
}

/// The log-in form. Checked before any credentials leave the device.
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub mobile_number: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let mobile = self.mobile_number.trim();
        if mobile.is_empty() || !mobile.chars().all(|c| c.is_ascii_digit()) {
            errors.push(FieldError::new(Field::MobileNumber, "Mobile number must be numeric"));
        }
        if self.password.trim().is_empty() {
            errors.push(FieldError::new(Field::Password, "Password can't be empty"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// The parking lot owner form, as typed.
#[derive(Debug, Clone, Default)]
pub struct ParkingLotRegistration {
    pub name: String,
    pub fare_per_day: String,
    pub open_time: String,
    pub close_time: String,
    pub available_spots: String,
    pub latitude: String,
    pub longitude: String,
    pub available_ev_spots: String,
}

/// A registration whose numbers have been parsed and range checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRegistration {
    pub name: String,
    pub fare_per_day: i64,
    pub open_time: String,
    pub close_time: String,
    pub available_spots: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub available_ev_spots: i64,
}

fn parse_count(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|n| *n >= 0)
}

fn parse_in_range(raw: &str, limit: f64) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| (-limit..=limit).contains(v))
}

impl ParkingLotRegistration {
    /// Validate in form order; the first failing field is reported.
    pub fn validate(&self) -> Result<ValidRegistration, FieldError> {
        let required = |value: &str, field: Field, message: &str| {
            if value.trim().is_empty() {
                Err(FieldError::new(field, message))
            } else {
                Ok(value.trim().to_string())
            }
        };

        let name = required(&self.name, Field::ParkingLotName, "Parking Lot Name is required.")?;
        let fare_per_day = self
            .fare_per_day
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|fare| *fare > 0)
            .ok_or_else(|| {
                FieldError::new(Field::FarePerDay, "Fare Per Day must be a positive number.")
            })?;
        let open_time = required(&self.open_time, Field::OpenTime, "Open Time is required.")?;
        let close_time = required(&self.close_time, Field::CloseTime, "Close Time is required.")?;
        let available_spots = parse_count(&self.available_spots).ok_or_else(|| {
            FieldError::new(
                Field::AvailableSpots,
                "Available Spots must be a non-negative number.",
            )
        })?;
        let longitude = parse_in_range(&self.longitude, 180.0).ok_or_else(|| {
            FieldError::new(Field::Longitude, "Longitude must be between -180 and 180.")
        })?;
        let latitude = parse_in_range(&self.latitude, 90.0).ok_or_else(|| {
            FieldError::new(Field::Latitude, "Latitude must be between -90 and 90.")
        })?;
        let available_ev_spots = parse_count(&self.available_ev_spots).ok_or_else(|| {
            FieldError::new(
                Field::AvailableEvSpots,
                "Available EV Spots must be a non-negative number.",
            )
        })?;

        Ok(ValidRegistration {
            name,
            fare_per_day,
            open_time,
            close_time,
            available_spots,
            latitude,
            longitude,
            available_ev_spots,
        })
    }
}

impl ValidRegistration {
    /// Field names as the owner form has always written them.
    pub fn to_fields(&self) -> BTreeMap<String, Value> {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), Value::StringValue(self.name.clone()));
        fields.insert("farePerDay".to_string(), Value::IntegerValue(self.fare_per_day));
        fields.insert("open_time".to_string(), Value::StringValue(self.open_time.clone()));
        fields.insert("close_time".to_string(), Value::StringValue(self.close_time.clone()));
        fields.insert(
            "availableSpots".to_string(),
            Value::IntegerValue(self.available_spots),
        );
        fields.insert("longitude".to_string(), Value::DoubleValue(self.longitude));
        fields.insert("latitude".to_string(), Value::DoubleValue(self.latitude));
        fields.insert(
            "available_ev_spots".to_string(),
            Value::IntegerValue(self.available_ev_spots),
        );
        fields
    }
}

/// Validate the sign-up form and create the user document.
pub async fn register_user(remote: &dyn RemoteStore, sign_up: &UserSignUp) -> Result<Document> {
    sign_up.validate().map_err(Error::Validation)?;
    remote.create_document(USERS_COLLECTION, sign_up.to_fields()).await
}

/// Validate the owner form and create the parking lot document.
pub async fn register_parking_lot(
    remote: &dyn RemoteStore,
    registration: &ParkingLotRegistration,
) -> Result<Document> {
    let valid = registration
        .validate()
        .map_err(|e| Error::Validation(vec![e]))?;
    let document = remote
        .create_document(PARKING_LOTS_COLLECTION, valid.to_fields())
        .await?;
    tracing::info!(name = %valid.name, "Parking lot registered");
    Ok(document)
}
