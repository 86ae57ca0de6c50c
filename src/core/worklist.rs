// Append-only instruction recorder and the transfer engine.
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use std::ptr;

use serde_json::json;

use crate::core::composition::Composition;
use crate::core::device::{Device, Evo, Fluent, Generic};
use crate::core::error::{Error, ErrorKind};
use crate::core::labware::{CondenseLabel, Labware};
use crate::core::partition::{self, PartitionBy};
use crate::core::wells::{
    VolumeSpec, WellSpec, broadcast_transfer, broadcast_volumes, format_well,
};
use crate::notice::{Notice, Notify, TracingNotify};

/// Largest volume the instruction format can carry at all.
const MAX_RECORD_VOLUME: f64 = 7_158_278.0;
const MAX_FIELD_LEN: usize = 32;

/// Tip selection for a single pipetting record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TipSelection {
    /// Let the device pick the next unused tip.
    #[default]
    Any,
    /// Bitmask over tips 1-8 (tip n contributes `1 << (n - 1)`).
    Mask(u8),
}

impl TipSelection {
    /// Selects a single tip, numbered 1-8.
    pub fn tip(number: u8) -> Result<Self, Error> {
        Self::tips(&[number])
    }

    /// Selects several tips, each numbered 1-8.
    pub fn tips(numbers: &[u8]) -> Result<Self, Error> {
        if numbers.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("at least one tip number is required"));
        }
        let mut mask = 0u8;
        for number in numbers {
            if !(1..=8).contains(number) {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("tip must be an int between 1 and 8, got {number}")));
            }
            mask |= 1 << (number - 1);
        }
        Ok(TipSelection::Mask(mask))
    }

    fn field(&self) -> String {
        match self {
            TipSelection::Any => String::new(),
            TipSelection::Mask(mask) => mask.to_string(),
        }
    }
}

/// Optional per-record parameters for aspirate/dispense records.
#[derive(Clone, Debug, Default)]
pub struct PipettingParams {
    pub liquid_class: String,
    pub tip: TipSelection,
    pub rack_id: String,
    pub tube_id: String,
    pub rack_type: String,
    pub forced_rack_type: String,
}

impl PipettingParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn liquid_class(mut self, liquid_class: &str) -> Self {
        self.liquid_class = liquid_class.to_string();
        self
    }

    pub fn tip(mut self, tip: TipSelection) -> Self {
        self.tip = tip;
        self
    }
}

/// Per-transfer tip handling between steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WashScheme {
    /// Wash/replace the tip with the numbered scheme (1-4).
    Wash(u8),
    /// Blow out the tip contents without washing or dropping.
    Flush,
    /// Keep using the tip as-is.
    Reuse,
}

impl Default for WashScheme {
    fn default() -> Self {
        WashScheme::Wash(1)
    }
}

/// Movement direction over the destination wells of a distribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl Direction {
    fn code(self) -> u8 {
        match self {
            Direction::LeftToRight => 0,
            Direction::RightToLeft => 1,
        }
    }
}

/// Parameters for reagent-distribution records.
#[derive(Clone, Debug)]
pub struct DistributionParams {
    pub diti_reuse: usize,
    pub multi_disp: usize,
    pub exclude_wells: Vec<usize>,
    pub liquid_class: String,
    pub direction: Direction,
    pub src_rack_id: String,
    pub src_rack_type: String,
    pub dst_rack_id: String,
    pub dst_rack_type: String,
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            diti_reuse: 1,
            multi_disp: 1,
            exclude_wells: Vec::new(),
            liquid_class: String::new(),
            direction: Direction::LeftToRight,
            src_rack_id: String::new(),
            src_rack_type: String::new(),
            dst_rack_id: String::new(),
            dst_rack_type: String::new(),
        }
    }
}

/// Options for one transfer operation.
#[derive(Clone, Debug, Default)]
pub struct TransferOptions {
    pub label: Option<String>,
    pub wash_scheme: WashScheme,
    pub partition_by: PartitionBy,
    pub params: PipettingParams,
}

impl TransferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn wash_scheme(mut self, wash_scheme: WashScheme) -> Self {
        self.wash_scheme = wash_scheme;
        self
    }

    pub fn partition_by(mut self, partition_by: PartitionBy) -> Self {
        self.partition_by = partition_by;
        self
    }

    pub fn liquid_class(mut self, liquid_class: &str) -> Self {
        self.params.liquid_class = liquid_class.to_string();
        self
    }
}

/// Construction-time invariants of a worklist.
#[derive(Clone, Copy, Debug)]
pub struct WorklistOptions {
    /// Device aspiration ceiling per single step.
    pub max_volume: f64,
    /// Legalize over-ceiling transfer steps by splitting; reject them when
    /// disabled.
    pub auto_split: bool,
}

impl Default for WorklistOptions {
    fn default() -> Self {
        Self {
            max_volume: 950.0,
            auto_split: true,
        }
    }
}

/// Append-only sequence of worklist instruction records.
///
/// The device family is a type parameter; well-addressing operations are
/// unavailable in spirit on [`Generic`] and fail fast with a compatibility
/// error there. Use [`EvoWorklist`] or [`FluentWorklist`].
pub struct Worklist<D: Device = Generic> {
    records: Vec<String>,
    max_volume: f64,
    auto_split: bool,
    notify: Box<dyn Notify>,
    _device: PhantomData<D>,
}

pub type EvoWorklist = Worklist<Evo>;
pub type FluentWorklist = Worklist<Fluent>;

impl<D: Device> Worklist<D> {
    pub fn new(options: WorklistOptions) -> Result<Self, Error> {
        if !(options.max_volume > 0.0 && options.max_volume.is_finite()) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid max_volume: {}", options.max_volume)));
        }
        Ok(Self {
            records: Vec::new(),
            max_volume: options.max_volume,
            auto_split: options.auto_split,
            notify: Box::new(TracingNotify),
            _device: PhantomData,
        })
    }

    pub fn with_notify(mut self, notify: Box<dyn Notify>) -> Self {
        self.notify = notify;
        self
    }

    pub fn records(&self) -> &[String] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn max_volume(&self) -> f64 {
        self.max_volume
    }

    pub fn auto_split(&self) -> bool {
        self.auto_split
    }

    /// Adds a comment record per non-empty line. Field separators are not
    /// representable inside comments.
    pub fn comment(&mut self, text: &str) -> Result<(), Error> {
        if text.contains(';') {
            return Err(
                Error::new(ErrorKind::Usage).with_message("illegal semicolon in comment")
            );
        }
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() {
                self.records.push(format!("C;{line}"));
            }
        }
        Ok(())
    }

    fn comment_opt(&mut self, label: Option<&str>) -> Result<(), Error> {
        match label {
            Some(text) => self.comment(text),
            None => Ok(()),
        }
    }

    /// Washes fixed tips or replaces DiTis with the numbered scheme.
    pub fn wash(&mut self, scheme: u8) -> Result<(), Error> {
        if !(1..=4).contains(&scheme) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("wash scheme must be 1, 2, 3 or 4, got {scheme}")));
        }
        self.records.push(format!("W{scheme};"));
        Ok(())
    }

    /// Decontamination wash followed by a normal wash.
    pub fn decontaminate(&mut self) {
        self.records.push("WD;".to_string());
    }

    /// Discards tip contents without washing or dropping tips.
    pub fn flush(&mut self) {
        self.records.push("F;".to_string());
    }

    /// Execution-order break: forces the device to run all queued pipetting
    /// commands before continuing.
    pub fn commit(&mut self) {
        self.records.push("B;".to_string());
    }

    /// Switches the DiTi type. Only legal as the very first record or
    /// directly after a break, because a break resets the DiTi type.
    pub fn set_diti(&mut self, index: usize) -> Result<(), Error> {
        let after_break = self
            .records
            .last()
            .map(|record| record.starts_with('B'))
            .unwrap_or(true);
        if !after_break {
            return Err(Error::new(ErrorKind::InvalidOperation).with_message(
                "the DiTi type can only be switched at the beginning or directly after a break",
            ));
        }
        self.records.push(format!("S;{index}"));
        Ok(())
    }

    /// Aspiration record for a single tip at a resolved well position.
    pub fn aspirate_well(
        &mut self,
        rack_label: &str,
        position: usize,
        volume: f64,
        params: &PipettingParams,
    ) -> Result<(), Error> {
        let record = self.pipetting_record('A', rack_label, position, volume, params)?;
        self.records.push(record);
        Ok(())
    }

    /// Dispense record for a single tip; uses the tip of the preceding
    /// aspirate record.
    pub fn dispense_well(
        &mut self,
        rack_label: &str,
        position: usize,
        volume: f64,
        params: &PipettingParams,
    ) -> Result<(), Error> {
        let record = self.pipetting_record('D', rack_label, position, volume, params)?;
        self.records.push(record);
        Ok(())
    }

    fn pipetting_record(
        &self,
        code: char,
        rack_label: &str,
        position: usize,
        volume: f64,
        params: &PipettingParams,
    ) -> Result<String, Error> {
        check_field("rack_label", rack_label)?;
        check_field("liquid_class", &params.liquid_class)?;
        check_field("rack_id", &params.rack_id)?;
        check_field("tube_id", &params.tube_id)?;
        check_field("rack_type", &params.rack_type)?;
        check_field("forced_rack_type", &params.forced_rack_type)?;
        let volume = self.check_volume(volume)?;
        let tip_type = "";
        Ok(format!(
            "{code};{rack_label};{rack_id};{rack_type};{position};{tube_id};{volume:.2};{liquid_class};{tip_type};{tip};{forced_rack_type}",
            rack_id = params.rack_id,
            rack_type = params.rack_type,
            tube_id = params.tube_id,
            liquid_class = params.liquid_class,
            tip = params.tip.field(),
            forced_rack_type = params.forced_rack_type,
        ))
    }

    fn check_volume(&self, volume: f64) -> Result<f64, Error> {
        if !volume.is_finite() || volume < 0.0 || volume > MAX_RECORD_VOLUME {
            return Err(
                Error::new(ErrorKind::Usage).with_message(format!("invalid volume: {volume}"))
            );
        }
        if volume > self.max_volume {
            return Err(Error::new(ErrorKind::InvalidOperation).with_message(format!(
                "volume of {volume} exceeds the step maximum of {}",
                self.max_volume
            )));
        }
        Ok((volume * 100.0).round() / 100.0)
    }

    /// Multi-dispense from a source well range into a destination well range.
    ///
    /// When the requested `multi_disp` times the volume would exceed the
    /// device ceiling, the multi-dispense count is reduced automatically and
    /// a notice is emitted; the number of washes increases accordingly.
    #[allow(clippy::too_many_arguments)]
    pub fn reagent_distribution(
        &mut self,
        src_rack_label: &str,
        src_start: usize,
        src_end: usize,
        dst_rack_label: &str,
        dst_start: usize,
        dst_end: usize,
        volume: f64,
        params: &DistributionParams,
    ) -> Result<(), Error> {
        check_field("src_rack_label", src_rack_label)?;
        check_field("src_rack_id", &params.src_rack_id)?;
        check_field("src_rack_type", &params.src_rack_type)?;
        check_field("dst_rack_label", dst_rack_label)?;
        check_field("dst_rack_id", &params.dst_rack_id)?;
        check_field("dst_rack_type", &params.dst_rack_type)?;
        check_field("liquid_class", &params.liquid_class)?;
        self.check_volume(volume)?;

        let mut excluded: Vec<usize> = params.exclude_wells.clone();
        excluded.sort_unstable();
        excluded.dedup();
        let out_of_range: Vec<usize> = excluded
            .iter()
            .copied()
            .filter(|well| *well < dst_start || *well > dst_end)
            .collect();
        if !out_of_range.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "the excluded wells {out_of_range:?} are not in the destination interval \
                 [{dst_start},{dst_end}]"
            )));
        }

        let mut multi_disp = params.multi_disp;
        if multi_disp as f64 * volume > self.max_volume {
            let allowed = (self.max_volume / volume).floor() as usize;
            self.notify.notify(
                Notice::new(
                    "multi-disp-reduced",
                    "decreasing multi_disp to account for a large dispense volume; \
                     the number of washes will increase",
                )
                .with_detail("requested", json!(multi_disp))
                .with_detail("allowed", json!(allowed))
                .with_detail("volume", json!(volume)),
            );
            multi_disp = allowed;
        }

        let exclude_str = if excluded.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = excluded.iter().map(usize::to_string).collect();
            format!(";{}", parts.join(";"))
        };
        self.records.push(format!(
            "R;{src_rack_label};{src_id};{src_type};{src_start};{src_end};{dst_rack_label};{dst_id};{dst_type};{dst_start};{dst_end};{volume};{liquid_class};{diti_reuse};{multi_disp};{direction}{exclude_str}",
            src_id = params.src_rack_id,
            src_type = params.src_rack_type,
            dst_id = params.dst_rack_id,
            dst_type = params.dst_rack_type,
            liquid_class = params.liquid_class,
            diti_reuse = params.diti_reuse,
            direction = params.direction.code(),
        ));
        Ok(())
    }

    /// Aspirates from labware wells, mutating the volume state and appending
    /// one record per positive-volume well.
    ///
    /// Well positions are resolved before any state change.
    pub fn aspirate(
        &mut self,
        labware: &Labware,
        wells: impl Into<WellSpec>,
        volumes: impl Into<VolumeSpec>,
        label: Option<&str>,
        params: &PipettingParams,
    ) -> Result<(), Error> {
        D::require_device()?;
        check_label(label)?;
        let wells = wells.into().flatten();
        let volumes = broadcast_volumes(&wells, &volumes.into())?;
        let positions = resolve_positions::<D>(labware, &wells)?;
        labware.remove(wells, VolumeSpec::Many(volumes.clone()), label)?;
        self.comment_opt(label)?;
        for (position, volume) in positions.into_iter().zip(volumes) {
            if volume > 0.0 {
                self.aspirate_well(labware.name(), position, volume, params)?;
            }
        }
        Ok(())
    }

    /// Dispenses into labware wells, optionally blending in the incoming
    /// compositions (one entry per well; `None` marks unknown liquid).
    pub fn dispense(
        &mut self,
        labware: &Labware,
        wells: impl Into<WellSpec>,
        volumes: impl Into<VolumeSpec>,
        label: Option<&str>,
        compositions: Option<&[Option<Composition>]>,
        params: &PipettingParams,
    ) -> Result<(), Error> {
        D::require_device()?;
        check_label(label)?;
        let wells = wells.into().flatten();
        let volumes = broadcast_volumes(&wells, &volumes.into())?;
        let positions = resolve_positions::<D>(labware, &wells)?;
        labware.add_with_compositions(
            wells,
            VolumeSpec::Many(volumes.clone()),
            label,
            compositions,
        )?;
        self.comment_opt(label)?;
        for (position, volume) in positions.into_iter().zip(volumes) {
            if volume > 0.0 {
                self.dispense_well(labware.name(), position, volume, params)?;
            }
        }
        Ok(())
    }

    /// Transfer operation between two labwares (or within one, for in-place
    /// mixing): partitions the request column-wise, splits over-ceiling
    /// volumes when `auto_split` is enabled, and inserts washes and
    /// execution-order breaks.
    pub fn transfer(
        &mut self,
        source: &Labware,
        source_wells: impl Into<WellSpec>,
        destination: &Labware,
        destination_wells: impl Into<WellSpec>,
        volumes: impl Into<VolumeSpec>,
        options: &TransferOptions,
    ) -> Result<(), Error> {
        D::require_device()?;
        let label = options.label.as_deref();
        check_label(label)?;
        if let WashScheme::Wash(scheme) = options.wash_scheme {
            if !(1..=4).contains(&scheme) {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("wash scheme must be 1, 2, 3 or 4, got {scheme}")));
            }
        }
        let (sources, destinations, volumes) = broadcast_transfer(
            source_wells.into().flatten(),
            destination_wells.into().flatten(),
            volumes.into().flatten(),
        )?;

        let axis = partition::optimize_partition_by(
            source,
            destination,
            options.partition_by,
            label,
            self.notify.as_ref(),
        );

        // The label applies to the whole transfer; individual steps stay
        // unlabeled and are condensed below.
        self.comment_opt(label)?;
        let mut nsteps = 0usize;
        let mut lvh_extra = 0usize;

        for group in partition::partition_by_column(&sources, &destinations, &volumes, axis)? {
            let vol_lists: Vec<Vec<f64>> = group
                .volumes
                .iter()
                .map(|volume| {
                    if self.auto_split {
                        partition::partition_volume(*volume, self.max_volume)
                    } else {
                        vec![*volume]
                    }
                })
                .collect();
            let npartitions = vol_lists.iter().map(Vec::len).max().unwrap_or(0);
            lvh_extra += vol_lists
                .iter()
                .map(|parts| parts.len().saturating_sub(1))
                .sum::<usize>();
            for p in 0..npartitions {
                let mut naccessed = 0usize;
                for ((src, dst), parts) in group
                    .sources
                    .iter()
                    .zip(&group.destinations)
                    .zip(&vol_lists)
                {
                    let Some(volume) = parts.get(p).copied() else {
                        continue;
                    };
                    if volume <= 0.0 {
                        continue;
                    }
                    self.aspirate(source, src.as_str(), volume, None, &options.params)?;
                    let incoming = source.well_composition(src)?;
                    self.dispense(
                        destination,
                        dst.as_str(),
                        volume,
                        None,
                        Some(&[incoming]),
                        &options.params,
                    )?;
                    nsteps += 1;
                    match options.wash_scheme {
                        WashScheme::Wash(scheme) => self.wash(scheme)?,
                        WashScheme::Flush => self.flush(),
                        WashScheme::Reuse => {}
                    }
                    naccessed += 1;
                }
                // Sub-steps of one logical well must not be regrouped with
                // other wells by the device queue.
                if npartitions > 1 && naccessed > 1 && p != npartitions - 1 {
                    self.commit();
                }
            }
            if npartitions > 1 {
                self.commit();
            }
        }

        if nsteps > 0 {
            let condensed = if lvh_extra > 0 {
                Some(match label {
                    Some(label) => format!("{label} ({lvh_extra} LVH steps)"),
                    None => format!("{lvh_extra} LVH steps"),
                })
            } else {
                label.map(str::to_string)
            };
            if ptr::eq(source, destination) {
                source.condense_log(nsteps * 2, CondenseLabel::Replace(condensed));
            } else {
                source.condense_log(nsteps, CondenseLabel::Replace(condensed.clone()));
                destination.condense_log(nsteps, CondenseLabel::Replace(condensed));
            }
        }
        Ok(())
    }

    /// Transfers from a trough column into many destination wells with
    /// multi-pipetting. Does not support volumes above the device ceiling.
    #[allow(clippy::too_many_arguments)]
    pub fn distribute(
        &mut self,
        source: &Labware,
        source_column: usize,
        destination: &Labware,
        destination_wells: impl Into<WellSpec>,
        volume: f64,
        label: Option<&str>,
        params: &DistributionParams,
    ) -> Result<(), Error> {
        D::require_device()?;
        check_label(label)?;
        if !source.is_trough() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "reagent distribution only works with trough sources; \"{}\" is not a trough",
                    source.name()
                ))
                .with_labware(source.name()));
        }
        if volume > self.max_volume {
            return Err(Error::new(ErrorKind::InvalidOperation).with_message(format!(
                "reagent distribution only works with volumes within the diluter maximum \
                 ({})",
                self.max_volume
            )));
        }
        if source_column >= source.columns() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("column index {source_column} out of range"))
                .with_labware(source.name()));
        }

        // The whole addressable source column feeds the distribution.
        let src_start = 1 + source.addressable_rows() * source_column;
        let src_end = src_start + source.addressable_rows() - 1;

        let destination_wells = destination_wells.into().flatten();
        if destination_wells.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("at least one destination well is required"));
        }
        let mut positions = resolve_positions::<D>(destination, &destination_wells)?;
        positions.sort_unstable();
        let dst_start = positions[0];
        let dst_end = positions[positions.len() - 1];
        let excluded: Vec<usize> = (dst_start..=dst_end)
            .filter(|position| !positions.contains(position))
            .collect();

        self.comment_opt(label)?;
        let params = DistributionParams {
            exclude_wells: excluded,
            ..params.clone()
        };
        self.reagent_distribution(
            source.name(),
            src_start,
            src_end,
            destination.name(),
            dst_start,
            dst_end,
            volume,
            &params,
        )?;

        let n_dst = positions.len();
        let source_well = format_well('A', source_column + 1);
        source.remove(source_well.as_str(), volume * n_dst as f64, label)?;
        let incoming = source.well_composition(&source_well)?;
        destination.add_with_compositions(
            destination_wells,
            volume,
            label,
            Some(&vec![incoming; n_dst]),
        )?;
        Ok(())
    }

    /// Writes the records to a `.gwl` worklist file: Latin-1 bytes, CRLF
    /// separators.
    pub fn save(&self, filepath: impl AsRef<Path>) -> Result<(), Error> {
        let filepath = filepath.as_ref();
        let has_gwl_extension = filepath
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gwl"))
            .unwrap_or(false);
        if !has_gwl_extension {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("the filename must have the .gwl extension"));
        }

        let mut bytes: Vec<u8> = Vec::new();
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                bytes.extend_from_slice(b"\r\n");
            }
            for ch in record.chars() {
                let code = ch as u32;
                if code > 0xFF {
                    return Err(Error::new(ErrorKind::Usage).with_message(format!(
                        "record contains a character outside the Latin-1 range: '{ch}'"
                    )));
                }
                bytes.push(code as u8);
            }
        }
        fs::write(filepath, bytes).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("cannot write {}", filepath.display()))
                .with_source(err)
        })
    }

    /// Scoped recording: runs `f` on a fresh worklist and saves it on every
    /// exit path. A closure error takes precedence over a save error.
    pub fn record<T>(
        filepath: impl AsRef<Path>,
        options: WorklistOptions,
        f: impl FnOnce(&mut Worklist<D>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut worklist = Worklist::<D>::new(options)?;
        let result = f(&mut worklist);
        let saved = worklist.save(filepath);
        let value = result?;
        saved?;
        Ok(value)
    }
}

impl<D: Device> fmt::Display for Worklist<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.records.join("\n"))
    }
}

fn check_field(name: &str, value: &str) -> Result<(), Error> {
    if value.len() > MAX_FIELD_LEN || value.contains(';') {
        return Err(
            Error::new(ErrorKind::Usage).with_message(format!("invalid {name}: {value}"))
        );
    }
    Ok(())
}

fn check_label(label: Option<&str>) -> Result<(), Error> {
    if let Some(label) = label {
        if label.contains(';') {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("illegal semicolon in label: {label}")));
        }
    }
    Ok(())
}

fn resolve_positions<D: Device>(
    labware: &Labware,
    wells: &[String],
) -> Result<Vec<usize>, Error> {
    wells
        .iter()
        .map(|well| D::well_position(labware, well))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        DistributionParams, EvoWorklist, PipettingParams, TipSelection, TransferOptions,
        Worklist, WorklistOptions,
    };
    use crate::core::device::Generic;
    use crate::core::error::ErrorKind;
    use crate::core::labware::{Labware, LabwareOptions};
    use crate::notice::NoticeLog;

    fn worklist() -> EvoWorklist {
        EvoWorklist::new(WorklistOptions::default()).expect("worklist")
    }

    #[test]
    fn comments_split_and_reject_separators() {
        let mut wl = worklist();
        wl.comment("").expect("empty is fine");
        wl.comment("This is a simple comment").expect("comment");
        let err = wl
            .comment("It must not contain ; semicolons")
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Usage);
        wl.comment("\n   But it may very well be\n   a multiline comment\n")
            .expect("multiline");
        assert_eq!(
            wl.records(),
            [
                "C;This is a simple comment",
                "C;But it may very well be",
                "C;a multiline comment",
            ]
        );
    }

    #[test]
    fn wash_schemes_are_validated() {
        let mut wl = worklist();
        wl.wash(1).expect("wash");
        wl.wash(4).expect("wash");
        assert_eq!(wl.wash(15).expect_err("bad scheme").kind(), ErrorKind::Usage);
        assert_eq!(wl.records(), ["W1;", "W4;"]);
    }

    #[test]
    fn simple_records_have_fixed_codes() {
        let mut wl = worklist();
        wl.decontaminate();
        wl.flush();
        wl.commit();
        assert_eq!(wl.records(), ["WD;", "F;", "B;"]);
    }

    #[test]
    fn diti_switching_is_position_gated() {
        let mut wl = worklist();
        wl.set_diti(1).expect("first record");
        let err = wl.set_diti(2).expect_err("mid-list");
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        wl.commit();
        wl.set_diti(2).expect("after break");
        assert_eq!(wl.records(), ["S;1", "B;", "S;2"]);
    }

    #[test]
    fn pipetting_records_are_bit_exact() {
        let mut wl = worklist();
        wl.aspirate_well("WaterTrough", 1, 200.0, &PipettingParams::default())
            .expect("aspirate");
        assert_eq!(wl.records()[0], "A;WaterTrough;;;1;;200.00;;;;");
        let params = PipettingParams {
            rack_id: "12345".to_string(),
            rack_type: "my_rack_id".to_string(),
            tube_id: "my_tube_id".to_string(),
            ..PipettingParams::default()
        };
        wl.dispense_well("WaterTrough", 1, 200.0, &params)
            .expect("dispense");
        assert_eq!(
            wl.records()[1],
            "D;WaterTrough;12345;my_rack_id;1;my_tube_id;200.00;;;;"
        );
        let params = PipettingParams::new()
            .liquid_class("my_liquid_class")
            .tip(TipSelection::tip(8).expect("tip"));
        let params = PipettingParams {
            forced_rack_type: "forced_rack".to_string(),
            ..params
        };
        wl.aspirate_well("WaterTrough", 1, 200.0, &params)
            .expect("aspirate");
        assert_eq!(
            wl.records()[2],
            "A;WaterTrough;;;1;;200.00;my_liquid_class;;128;forced_rack"
        );
    }

    #[test]
    fn volumes_round_to_two_decimals() {
        let mut wl = worklist();
        wl.aspirate_well("W", 1, 23.786, &PipettingParams::default())
            .expect("aspirate");
        assert_eq!(wl.records()[0], "A;W;;;1;;23.79;;;;");
    }

    #[test]
    fn record_fields_are_validated() {
        let mut wl = worklist();
        let long = "thisisaveryverylongracklabelthatexceedsthemaximumlength";
        assert!(wl
            .aspirate_well(long, 1, 15.0, &PipettingParams::default())
            .is_err());
        assert!(wl
            .aspirate_well("rack label; with semicolon", 1, 15.0, &PipettingParams::default())
            .is_err());
        assert!(wl
            .aspirate_well("W", 1, f64::NAN, &PipettingParams::default())
            .is_err());
        assert!(wl
            .aspirate_well("W", 1, -15.4, &PipettingParams::default())
            .is_err());
        let err = wl
            .aspirate_well("W", 1, 1200.0, &PipettingParams::default())
            .expect_err("over the ceiling");
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(wl.is_empty());
    }

    #[test]
    fn tip_masks_sum_like_the_device_expects() {
        assert_eq!(TipSelection::tip(4).expect("tip").field(), "8");
        assert_eq!(TipSelection::tips(&[1, 4]).expect("tips").field(), "9");
        assert_eq!(TipSelection::Any.field(), "");
        assert!(TipSelection::tip(0).is_err());
        assert!(TipSelection::tip(12).is_err());
        assert!(TipSelection::tips(&[]).is_err());
    }

    #[test]
    fn reagent_distribution_formats_and_reduces_multi_disp() {
        let log = NoticeLog::new();
        let mut wl = worklist().with_notify(Box::new(log.clone()));
        let params = DistributionParams {
            multi_disp: 6,
            ..DistributionParams::default()
        };
        wl.reagent_distribution("S1", 1, 8, "D1", 1, 96, 400.0, &params)
            .expect("distribution");
        assert_eq!(wl.records()[0], "R;S1;;;1;8;D1;;;1;96;400;;1;2;0");
        let notices = log.take();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, "multi-disp-reduced");
    }

    #[test]
    fn excluded_wells_must_be_inside_the_destination_interval() {
        let mut wl = worklist();
        let params = DistributionParams {
            exclude_wells: vec![2, 99],
            ..DistributionParams::default()
        };
        let err = wl
            .reagent_distribution("S1", 1, 8, "D1", 1, 96, 50.0, &params)
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let params = DistributionParams {
            exclude_wells: vec![7, 3],
            ..DistributionParams::default()
        };
        wl.reagent_distribution("S1", 1, 8, "D1", 1, 96, 50.0, &params)
            .expect("distribution");
        assert_eq!(wl.records()[0], "R;S1;;;1;8;D1;;;1;96;50;;1;1;0;3;7");
    }

    #[test]
    fn generic_worklists_reject_well_addressing() {
        let labware =
            Labware::new("A", 3, 4, LabwareOptions::new(0.0, 1000.0)).expect("labware");
        let mut wl = Worklist::<Generic>::new(WorklistOptions::default()).expect("worklist");
        let err = wl
            .transfer(&labware, "A01", &labware, "B01", 100.0, &TransferOptions::new())
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Compatibility);
        let err = wl
            .aspirate(&labware, "A01", 10.0, None, &PipettingParams::default())
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Compatibility);
        assert!(wl.is_empty());
    }
}
