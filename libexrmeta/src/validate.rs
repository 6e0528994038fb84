//! Advisory checks for documented attribute conventions
//!
//! The header store never enforces what values mean: a `captureRate` of
//! `0/0` is stored and written like any other rational. The checks here
//! report such values as [`Advisory`] findings without touching the header,
//! leaving it to the caller to decide what to do about them.

use std::collections::HashSet;
use std::fmt;

use log::debug;
use serde::Serialize;

use crate::header::Header;
use crate::standard::{self, STANDARD_ATTRIBUTES};

/// A non-fatal finding about one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub attribute: String,
    pub message: String,
}

impl Advisory {
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.attribute, self.message)
    }
}

/// A check run against a whole header
pub trait Check: Send + Sync {
    fn check(&self, header: &Header, advisories: &mut Vec<Advisory>);
}

impl<F> Check for F
where
    F: Fn(&Header, &mut Vec<Advisory>) + Send + Sync,
{
    fn check(&self, header: &Header, advisories: &mut Vec<Advisory>) {
        self(header, advisories);
    }
}

/// An ordered list of checks
#[derive(Default)]
pub struct Validator {
    checks: Vec<Box<dyn Check>>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("checks", &self.checks.len())
            .finish()
    }
}

impl Validator {
    /// A validator with no checks
    pub fn new() -> Self {
        Self::default()
    }

    /// A validator running every built-in check
    pub fn standard() -> Self {
        Self::new()
            .with_check(standard_types)
            .with_check(positive_rates)
            .with_check(lens_stops)
            .with_check(non_empty_strings)
            .with_check(capture_date)
            .with_check(wrap_modes)
            .with_check(views)
            .with_check(key_code_ranges)
            .with_check(deprecated_attributes)
    }

    #[must_use]
    pub fn with_check(mut self, check: impl Check + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    pub fn run(&self, header: &Header) -> Vec<Advisory> {
        let mut advisories = Vec::new();
        for check in &self.checks {
            check.check(header, &mut advisories);
        }
        debug!(
            "Ran {} checks, {} advisories",
            self.checks.len(),
            advisories.len()
        );
        advisories
    }
}

/// Run the built-in checks against `header`
pub fn check_header(header: &Header) -> Vec<Advisory> {
    Validator::standard().run(header)
}

fn standard_types(header: &Header, advisories: &mut Vec<Advisory>) {
    for attribute in header {
        let Some(entry) = standard::lookup(attribute.name) else {
            continue;
        };
        if attribute.type_name != entry.type_name {
            advisories.push(Advisory::new(
                attribute.name,
                format!(
                    "standard attribute should be {}, found {}",
                    entry.type_name, attribute.type_name
                ),
            ));
        }
    }
}

fn positive_rates(header: &Header, advisories: &mut Vec<Advisory>) {
    for key in [standard::CAPTURE_RATE, standard::FRAMES_PER_SECOND] {
        let Ok(rate) = key.get(header) else {
            continue;
        };
        if rate.numerator <= 0 || rate.denominator == 0 {
            advisories.push(Advisory::new(
                key.name(),
                format!("rate {rate} should have a positive numerator and denominator"),
            ));
        }
    }
}

fn lens_stops(header: &Header, advisories: &mut Vec<Advisory>) {
    let aperture = standard::APERTURE.get(header).ok().copied();
    let t_stop = standard::T_STOP.get(header).ok().copied();

    for (key, value) in [(standard::APERTURE, aperture), (standard::T_STOP, t_stop)] {
        match value {
            Some(value) if !(value > 0.0) => advisories.push(Advisory::new(
                key.name(),
                format!("{value} should be positive"),
            )),
            _ => {}
        }
    }

    if let (Some(aperture), Some(t_stop)) = (aperture, t_stop) {
        if aperture > 0.0 && t_stop < aperture {
            advisories.push(Advisory::new(
                standard::T_STOP.name(),
                format!("T-stop {t_stop} is smaller than the aperture {aperture}"),
            ));
        }
    }
}

fn non_empty_strings(header: &Header, advisories: &mut Vec<Advisory>) {
    for key in [
        standard::CAMERA_MAKE,
        standard::CAMERA_MODEL,
        standard::CAMERA_SERIAL_NUMBER,
        standard::CAMERA_FIRMWARE_VERSION,
        standard::CAMERA_UUID,
        standard::CAMERA_LABEL,
        standard::LENS_MAKE,
        standard::LENS_MODEL,
        standard::LENS_SERIAL_NUMBER,
        standard::LENS_FIRMWARE_VERSION,
        standard::OWNER,
        standard::REEL_NAME,
    ] {
        if key.get(header).map_or(false, |value| value.trim().is_empty()) {
            advisories.push(Advisory::new(key.name(), "should not be empty"));
        }
    }
}

/// True for `YYYY:MM:DD hh:mm:ss` with plausible field ranges
fn is_cap_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 19 {
        return false;
    }
    for (i, byte) in bytes.iter().enumerate() {
        let ok = match i {
            4 | 7 | 13 | 16 => *byte == b':',
            10 => *byte == b' ',
            _ => byte.is_ascii_digit(),
        };
        if !ok {
            return false;
        }
    }
    let field = |range: std::ops::Range<usize>| value[range].parse::<u32>().unwrap_or(u32::MAX);
    (1..=12).contains(&field(5..7))
        && (1..=31).contains(&field(8..10))
        && field(11..13) < 24
        && field(14..16) < 60
        && field(17..19) < 60
}

fn capture_date(header: &Header, advisories: &mut Vec<Advisory>) {
    if let Ok(value) = standard::CAP_DATE.get(header) {
        if !is_cap_date(value) {
            advisories.push(Advisory::new(
                standard::CAP_DATE.name(),
                format!("{value:?} is not formatted as YYYY:MM:DD hh:mm:ss"),
            ));
        }
    }
}

const WRAP_MODES: [&str; 4] = ["black", "clamp", "periodic", "mirror"];

fn wrap_modes(header: &Header, advisories: &mut Vec<Advisory>) {
    let Ok(value) = standard::WRAPMODES.get(header) else {
        return;
    };
    let modes: Vec<&str> = value.split(',').map(str::trim).collect();
    let message = if modes.len() > 2 {
        Some(format!("{value:?} names more than two modes"))
    } else {
        modes
            .iter()
            .find(|mode| !WRAP_MODES.contains(mode))
            .map(|mode| format!("unknown wrap mode {mode:?}"))
    };
    if let Some(message) = message {
        advisories.push(Advisory::new(standard::WRAPMODES.name(), message));
    }
}

fn views(header: &Header, advisories: &mut Vec<Advisory>) {
    let Ok(views) = standard::MULTI_VIEW.get(header) else {
        return;
    };
    if views.is_empty() {
        advisories.push(Advisory::new(
            standard::MULTI_VIEW.name(),
            "should list at least one view",
        ));
    }
    let mut seen = HashSet::new();
    for view in views {
        if view.is_empty() {
            advisories.push(Advisory::new(standard::MULTI_VIEW.name(), "view name is empty"));
        } else if !seen.insert(view.as_str()) {
            advisories.push(Advisory::new(
                standard::MULTI_VIEW.name(),
                format!("view {view:?} is listed more than once"),
            ));
        }
    }
}

fn key_code_ranges(header: &Header, advisories: &mut Vec<Advisory>) {
    let Ok(code) = standard::KEY_CODE.get(header) else {
        return;
    };
    let fields = [
        ("filmMfcCode", code.film_mfc_code, 0..=99),
        ("filmType", code.film_type, 0..=99),
        ("prefix", code.prefix, 0..=999_999),
        ("count", code.count, 0..=9999),
        ("perfOffset", code.perf_offset, 0..=119),
        ("perfsPerFrame", code.perfs_per_frame, 1..=15),
        ("perfsPerCount", code.perfs_per_count, 20..=120),
    ];
    for (field, value, range) in fields {
        if !range.contains(&value) {
            advisories.push(Advisory::new(
                standard::KEY_CODE.name(),
                format!(
                    "{field} {value} is outside {}..={}",
                    range.start(),
                    range.end()
                ),
            ));
        }
    }
}

fn deprecated_attributes(header: &Header, advisories: &mut Vec<Advisory>) {
    for entry in STANDARD_ATTRIBUTES {
        if let Some(note) = entry.deprecated {
            if header.contains(entry.name) {
                advisories.push(Advisory::new(entry.name, format!("deprecated: {note}")));
            }
        }
    }
}
