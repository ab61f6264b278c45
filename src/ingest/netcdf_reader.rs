//! Reads ARGO profile NetCDF files. Only the first profile of a file is
//! loaded, matching the one-`Data`-row-per-file layout.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::ingest::profile::{valid, Channel, RawProfile};

struct ProfileFile {
    file: netcdf::File,
}

impl ProfileFile {
    fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self { file })
    }

    /// GADR files use lowercase variable names; raw GDAC files use uppercase.
    fn variable(&self, name: &str) -> Option<netcdf::Variable<'_>> {
        self.file
            .variable(name)
            .or_else(|| self.file.variable(&name.to_uppercase()))
    }

    /// Length of one profile's slice: the product of every dimension after
    /// the first.
    fn row_len(var: &netcdf::Variable<'_>) -> usize {
        var.dimensions().iter().skip(1).map(|d| d.len()).product::<usize>().max(1)
    }

    fn bytes(&self, name: &str) -> Result<Option<(Vec<u8>, usize)>> {
        let Some(var) = self.variable(name) else {
            return Ok(None);
        };
        let raw = var
            .get_raw_values(..)
            .with_context(|| format!("Failed to read {}", name))?;
        Ok(Some((raw, Self::row_len(&var))))
    }

    /// First profile's text for a char array variable.
    fn text(&self, name: &str) -> Result<String> {
        Ok(match self.bytes(name)? {
            Some((raw, row_len)) => decode(&raw[..row_len.min(raw.len())]),
            None => String::new(),
        })
    }

    /// Every string in a char array variable, space separated.
    fn all_text(&self, name: &str) -> Result<String> {
        Ok(self.bytes(name)?.map(|(raw, _)| decode(&raw)).unwrap_or_default())
    }

    /// Per-level QC flags of the first profile, one char per level.
    fn flags(&self, name: &str) -> Result<String> {
        Ok(match self.bytes(name)? {
            Some((raw, row_len)) => raw
                .iter()
                .take(row_len)
                .map(|b| if b.is_ascii_graphic() { *b as char } else { ' ' })
                .collect(),
            None => String::new(),
        })
    }

    fn numbers(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let Some(var) = self.variable(name) else {
            return Ok(Vec::new());
        };
        let row_len = Self::row_len(&var);
        let values = var
            .get_values::<f64, _>(..)
            .with_context(|| format!("Failed to read {}", name))?;
        Ok(values.into_iter().take(row_len).map(valid).collect())
    }

    fn number(&self, name: &str) -> Result<Option<f64>> {
        Ok(self.numbers(name)?.into_iter().next().flatten())
    }

    fn channel(&self, name: &str) -> Result<Channel> {
        Ok(Channel {
            values: self.numbers(name)?,
            qc: self.flags(&format!("{}_qc", name))?,
            adjusted: self.numbers(&format!("{}_adjusted", name))?,
            adjusted_qc: self.flags(&format!("{}_adjusted_qc", name))?,
        })
    }
}

/// Char array bytes to text: NUL padding becomes whitespace.
fn decode(raw: &[u8]) -> String {
    let cleaned: Vec<u8> = raw.iter().map(|b| if *b == 0 { b' ' } else { *b }).collect();
    String::from_utf8_lossy(&cleaned).trim().to_string()
}

pub fn load_profile(path: &Path) -> Result<RawProfile> {
    let nc = ProfileFile::open(path)?;
    if nc.variable("pres").is_none() {
        return Err(anyhow!("{} has no pressure variable", path.display()));
    }

    Ok(RawProfile {
        platform_number: nc.text("platform_number")?,
        project_name: nc.text("project_name")?,
        pi_name: nc.text("pi_name")?,
        cycle_number: nc.number("cycle_number")?.map(|n| n as i64),
        data_centre: nc.text("data_centre")?,
        data_mode: nc.text("data_mode")?,
        float_serial_no: nc.text("float_serial_no")?,
        firmware_version: nc.text("firmware_version")?,
        platform_type: nc.text("platform_type")?,
        juld: nc.number("juld")?,
        latitude: nc.number("latitude")?,
        longitude: nc.number("longitude")?,
        positioning_system: nc.text("positioning_system")?,
        pres: nc.channel("pres")?,
        temp: nc.channel("temp")?,
        psal: nc.channel("psal")?,
        station_parameters: nc.text("station_parameters")?,
        calib_equation: nc.all_text("scientific_calib_equation")?,
        calib_coefficient: nc.all_text("scientific_calib_coefficient")?,
        calib_comment: nc.all_text("scientific_calib_comment")?,
        history_software: nc.all_text("history_software")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_strips_padding() {
        assert_eq!(decode(b"AO\0\0"), "AO");
        assert_eq!(decode(b"  Argo USA   "), "Argo USA");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_profile(Path::new("does/not/exist.nc")).is_err());
    }
}
