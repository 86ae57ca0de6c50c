// Well/volume specifier normalization and well-ID helpers.
use crate::core::error::{Error, ErrorKind};

/// Explicit tagged variant for the wells addressed by an operation.
///
/// `Grid` is flattened column-major: all rows of column 1, then column 2, and
/// so on. This matches the order in which a tip bank walks a plate column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WellSpec {
    One(String),
    Many(Vec<String>),
    Grid(Vec<Vec<String>>),
}

impl WellSpec {
    pub fn flatten(&self) -> Vec<String> {
        match self {
            WellSpec::One(well) => vec![well.clone()],
            WellSpec::Many(wells) => wells.clone(),
            WellSpec::Grid(rows) => flatten_column_major(rows),
        }
    }
}

impl From<&str> for WellSpec {
    fn from(well: &str) -> Self {
        WellSpec::One(well.to_string())
    }
}

impl From<String> for WellSpec {
    fn from(well: String) -> Self {
        WellSpec::One(well)
    }
}

impl From<Vec<String>> for WellSpec {
    fn from(wells: Vec<String>) -> Self {
        WellSpec::Many(wells)
    }
}

impl From<Vec<&str>> for WellSpec {
    fn from(wells: Vec<&str>) -> Self {
        WellSpec::Many(wells.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for WellSpec {
    fn from(wells: &[String]) -> Self {
        WellSpec::Many(wells.to_vec())
    }
}

impl From<Vec<Vec<String>>> for WellSpec {
    fn from(rows: Vec<Vec<String>>) -> Self {
        WellSpec::Grid(rows)
    }
}

impl From<Vec<Vec<&str>>> for WellSpec {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        WellSpec::Grid(
            rows.into_iter()
                .map(|row| row.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}

/// Volumes for an operation; `One` broadcasts across all addressed wells.
#[derive(Clone, Debug, PartialEq)]
pub enum VolumeSpec {
    One(f64),
    Many(Vec<f64>),
    Grid(Vec<Vec<f64>>),
}

impl VolumeSpec {
    pub fn flatten(&self) -> Vec<f64> {
        match self {
            VolumeSpec::One(volume) => vec![*volume],
            VolumeSpec::Many(volumes) => volumes.clone(),
            VolumeSpec::Grid(rows) => flatten_column_major(rows),
        }
    }
}

impl From<f64> for VolumeSpec {
    fn from(volume: f64) -> Self {
        VolumeSpec::One(volume)
    }
}

impl From<Vec<f64>> for VolumeSpec {
    fn from(volumes: Vec<f64>) -> Self {
        VolumeSpec::Many(volumes)
    }
}

impl From<&[f64]> for VolumeSpec {
    fn from(volumes: &[f64]) -> Self {
        VolumeSpec::Many(volumes.to_vec())
    }
}

impl From<Vec<Vec<f64>>> for VolumeSpec {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        VolumeSpec::Grid(rows)
    }
}

fn flatten_column_major<T: Clone>(rows: &[Vec<T>]) -> Vec<T> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = Vec::with_capacity(rows.len() * columns);
    for c in 0..columns {
        for row in rows {
            if let Some(item) = row.get(c) {
                out.push(item.clone());
            }
        }
    }
    out
}

/// Splits an alphanumeric well ID into its row letters and 1-based column.
pub fn split_well_id(well: &str) -> Result<(&str, usize), Error> {
    let letters: usize = well.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let (row, digits) = well.split_at(letters);
    if row.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("this is not an alphanumeric well ID: '{well}'")));
    }
    let column: usize = digits.parse().map_err(|_| {
        Error::new(ErrorKind::Usage).with_message(format!("well column out of range: '{well}'"))
    })?;
    Ok((row, column))
}

/// Formats a well ID from row letter and 1-based column, zero-padded.
pub fn format_well(row: char, column: usize) -> String {
    format!("{row}{column:02}")
}

/// Broadcasts the volumes onto the flattened well list.
pub(crate) fn broadcast_volumes(wells: &[String], volumes: &VolumeSpec) -> Result<Vec<f64>, Error> {
    let flat = volumes.flatten();
    let volumes = if flat.len() == 1 {
        vec![flat[0]; wells.len()]
    } else {
        flat
    };
    if volumes.len() != wells.len() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!(
            "number of volumes ({}) must equal the number of wells ({})",
            volumes.len(),
            wells.len()
        )));
    }
    if volumes.iter().any(|v| *v < 0.0 || !v.is_finite()) {
        return Err(Error::new(ErrorKind::Usage).with_message("volumes must be positive or zero"));
    }
    Ok(volumes)
}

/// Broadcasts singleton sources/destinations/volumes to the longest length.
pub(crate) fn broadcast_transfer(
    sources: Vec<String>,
    destinations: Vec<String>,
    volumes: Vec<f64>,
) -> Result<(Vec<String>, Vec<String>, Vec<f64>), Error> {
    let nmax = sources.len().max(destinations.len()).max(volumes.len());
    let repeat_wells = |wells: Vec<String>| {
        if wells.len() == 1 {
            vec![wells[0].clone(); nmax]
        } else {
            wells
        }
    };
    let sources = repeat_wells(sources);
    let destinations = repeat_wells(destinations);
    let volumes = if volumes.len() == 1 {
        vec![volumes[0]; nmax]
    } else {
        volumes
    };
    if sources.len() != nmax || destinations.len() != nmax || volumes.len() != nmax {
        return Err(Error::new(ErrorKind::Usage).with_message(format!(
            "number of source/destination/volumes must be equal, they were ({}, {}, {})",
            sources.len(),
            destinations.len(),
            volumes.len()
        )));
    }
    Ok((sources, destinations, volumes))
}

/// Cycles the available trough wells to a list of `n` virtual wells.
///
/// When `n` exceeds the number of addressable trough rows, the wells repeat so
/// that every tip still has a position to aspirate from.
pub fn trough_wells(n: usize, available: &[String]) -> Result<Vec<String>, Error> {
    if available.is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("trough_wells requires at least one well")
        );
    }
    Ok(available.iter().cloned().cycle().take(n).collect())
}
