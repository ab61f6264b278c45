//! Decoded contents of one ARGO profile file, before cleaning.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::ingest::qc::{as_json, parse_qc, prefer_adjusted};
use crate::models::{ObservationRow, ProfileMeta};

/// Values at or above this are NetCDF fill values in ARGO files.
pub const FILL_THRESHOLD: f64 = 99_999.0;

/// Drop fill values and non-finite numbers.
pub fn valid(value: f64) -> Option<f64> {
    (value.is_finite() && value.abs() < FILL_THRESHOLD).then_some(value)
}

/// `JULD` is days since 1950-01-01 00:00 UTC.
pub fn juld_to_datetime(days: f64) -> Option<NaiveDateTime> {
    let days = valid(days)?;
    let epoch = NaiveDate::from_ymd_opt(1950, 1, 1)?.and_hms_opt(0, 0, 0)?;
    epoch.checked_add_signed(Duration::milliseconds((days * 86_400_000.0).round() as i64))
}

/// One measured parameter: raw and adjusted values with their per-level QC
/// flags, one flag character per level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub values: Vec<Option<f64>>,
    pub qc: String,
    pub adjusted: Vec<Option<f64>>,
    pub adjusted_qc: String,
}

fn flag_at(flags: &str, level: usize) -> Option<u8> {
    flags.chars().nth(level).and_then(|c| parse_qc(c.encode_utf8(&mut [0; 4])))
}

impl Channel {
    pub fn levels(&self) -> usize {
        self.values.len().max(self.adjusted.len())
    }

    /// QC-preferred value at `level`.
    pub fn at(&self, level: usize) -> Option<f64> {
        prefer_adjusted(
            self.values.get(level).copied().flatten(),
            flag_at(&self.qc, level),
            self.adjusted.get(level).copied().flatten(),
            flag_at(&self.adjusted_qc, level),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawProfile {
    pub platform_number: String,
    pub project_name: String,
    pub pi_name: String,
    pub cycle_number: Option<i64>,
    pub data_centre: String,
    pub data_mode: String,
    pub float_serial_no: String,
    pub firmware_version: String,
    pub platform_type: String,
    pub juld: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub positioning_system: String,
    pub pres: Channel,
    pub temp: Channel,
    pub psal: Channel,
    pub station_parameters: String,
    pub calib_equation: String,
    pub calib_coefficient: String,
    pub calib_comment: String,
    pub history_software: String,
}

fn digits(text: &str) -> Option<i64> {
    let text = text.trim();
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

impl RawProfile {
    pub fn meta(&self) -> ProfileMeta {
        ProfileMeta {
            platform_number: digits(&self.platform_number),
            project_name: self.project_name.trim().to_string(),
            pi_name: self.pi_name.trim().to_string(),
            cycle_num: self.cycle_number,
            data_centre: self.data_centre.trim().to_string(),
            data_mode: self.data_mode.trim().to_string(),
            float_no: digits(&self.float_serial_no),
            firmware: digits(&self.firmware_version),
            platform_type: self.platform_type.trim().to_string(),
            juld: self.juld.and_then(juld_to_datetime),
            latitude: self.latitude.and_then(valid),
            longitude: self.longitude.and_then(valid),
            position_system: self.positioning_system.trim().to_string(),
        }
    }

    /// Cleaned observations: one row per level with QC-preferred values.
    /// Levels with no measurement at all and repeated rows are dropped.
    pub fn observations(&self) -> Vec<ObservationRow> {
        let levels = self.pres.levels().max(self.temp.levels()).max(self.psal.levels());
        let station_param = as_json(&self.station_parameters);
        let equation = as_json(&self.calib_equation);
        let coefficient = as_json(&self.calib_coefficient);
        let comment = as_json(&self.calib_comment);
        let history_software = as_json(&self.history_software);

        let mut rows: Vec<ObservationRow> = Vec::with_capacity(levels);
        for level in 0..levels {
            let (pressure, temp, psal) = (self.pres.at(level), self.temp.at(level), self.psal.at(level));
            if pressure.is_none() && temp.is_none() && psal.is_none() {
                continue;
            }
            let row = ObservationRow {
                pressure,
                temp,
                psal,
                station_param: station_param.clone(),
                equation: equation.clone(),
                coefficient: coefficient.clone(),
                comment: comment.clone(),
                history_software: history_software.clone(),
            };
            if !rows.contains(&row) {
                rows.push(row);
            }
        }
        rows
    }
}
