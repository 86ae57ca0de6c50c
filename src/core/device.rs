// Device-family well addressing for instruction records.
use crate::core::error::{Error, ErrorKind};
use crate::core::labware::Labware;
use crate::core::wells::split_well_id;

/// Capability interface for device families.
///
/// The worklist recorder is generic over this trait; everything that needs a
/// well number goes through [`Device::well_position`]. The device-agnostic
/// [`Generic`] family fails fast instead of guessing positions.
pub trait Device {
    /// Gate for operations that need well addressing at all.
    fn require_device() -> Result<(), Error> {
        Ok(())
    }

    /// Resolves a well ID to the 1-based position embedded in records.
    fn well_position(labware: &Labware, well: &str) -> Result<usize, Error>;
}

/// Device-agnostic family: well addressing is not available.
pub struct Generic;

/// Tecan Freedom EVO addressing: column-major positions, troughs counted
/// through their virtual rows.
pub struct Evo;

/// Tecan Fluent addressing: like EVO for plates, but trough positions ignore
/// rows entirely.
pub struct Fluent;

impl Device for Generic {
    fn require_device() -> Result<(), Error> {
        Err(Error::new(ErrorKind::Compatibility).with_message(
            "this operation is device-specific; use an EvoWorklist or FluentWorklist \
             instead of the generic worklist",
        ))
    }

    fn well_position(_labware: &Labware, _well: &str) -> Result<usize, Error> {
        Generic::require_device().map(|_| 0)
    }
}

impl Device for Evo {
    fn well_position(labware: &Labware, well: &str) -> Result<usize, Error> {
        let (r, c) = address(labware, well)?;
        Ok(1 + c * labware.addressable_rows() + r)
    }
}

impl Device for Fluent {
    fn well_position(labware: &Labware, well: &str) -> Result<usize, Error> {
        let (r, c) = address(labware, well)?;
        // The Fluent does not count rows inside troughs.
        if labware.is_trough() {
            return Ok(1 + c);
        }
        Ok(1 + c * labware.rows() + r)
    }
}

/// Addressable (row, column) indices; trough rows stay virtual here.
fn address(labware: &Labware, well: &str) -> Result<(usize, usize), Error> {
    let (row, column) =
        split_well_id(well).map_err(|err| err.with_labware(labware.name()).with_well(well))?;
    let unknown = || {
        Error::new(ErrorKind::Usage)
            .with_message("unknown well")
            .with_labware(labware.name())
            .with_well(well)
    };
    if row.len() != 1 {
        return Err(unknown());
    }
    let letter = row.as_bytes()[0] as char;
    let r = labware
        .row_ids()
        .iter()
        .position(|c| *c == letter)
        .ok_or_else(unknown)?;
    if column < 1 || column > labware.columns() {
        return Err(unknown());
    }
    Ok((r, column - 1))
}
