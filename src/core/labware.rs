// Stateful labware model: volumes, composition tracking, and history.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array2;

use crate::core::composition::{self, Composition};
use crate::core::error::{Error, ErrorKind};
use crate::core::wells::{VolumeSpec, WellSpec, broadcast_volumes, format_well, split_well_id};

const ROW_LETTERS: [char; 26] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// One labeled snapshot in the volume history. The first entry is always
/// labeled `"initial"`.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub label: Option<String>,
    pub volumes: Array2<f64>,
}

/// Label resolution for [`Labware::condense_log`].
#[derive(Clone, Debug, PartialEq)]
pub enum CondenseLabel {
    /// Keep the label of the first entry in the collapsed group.
    First,
    /// Keep the label of the last entry in the collapsed group.
    Last,
    /// Replace with the given label.
    Replace(Option<String>),
}

/// Construction parameters shared by plates and troughs.
#[derive(Clone, Debug)]
pub struct LabwareOptions {
    pub min_volume: f64,
    pub max_volume: f64,
    pub initial_volumes: VolumeSpec,
    pub component_names: BTreeMap<String, Option<String>>,
}

impl LabwareOptions {
    pub fn new(min_volume: f64, max_volume: f64) -> Self {
        Self {
            min_volume,
            max_volume,
            initial_volumes: VolumeSpec::One(0.0),
            component_names: BTreeMap::new(),
        }
    }

    pub fn initial_volumes(mut self, volumes: impl Into<VolumeSpec>) -> Self {
        self.initial_volumes = volumes.into();
        self
    }

    /// Names the initial content of one well for composition tracking.
    pub fn component_name(mut self, well: &str, name: &str) -> Self {
        self.component_names
            .insert(well.to_string(), Some(name.to_string()));
        self
    }
}

struct VesselState {
    volumes: Array2<f64>,
    composition: BTreeMap<String, Array2<f64>>,
    untracked: Array2<bool>,
    history: Vec<HistoryEntry>,
}

/// A named array of liquid cavities.
///
/// The vessel state sits behind a `RefCell` so that one labware can be
/// referenced as source and destination of the same operation (in-place
/// mixing) and shared across worklists. Planning is single-threaded by
/// contract; `Labware` is deliberately not `Sync`.
pub struct Labware {
    name: String,
    rows: usize,
    columns: usize,
    min_volume: f64,
    max_volume: f64,
    virtual_rows: Option<usize>,
    state: RefCell<VesselState>,
}

impl Labware {
    /// Creates a plate-like labware with independent wells.
    pub fn new(
        name: &str,
        rows: usize,
        columns: usize,
        options: LabwareOptions,
    ) -> Result<Self, Error> {
        let initial = build_initial_volumes(name, rows, columns, &options.initial_volumes)?;
        Labware::from_parts(name, rows, columns, None, options, initial)
    }

    /// Creates a trough: one physical reservoir row per column, addressable
    /// through `virtual_rows` tip positions.
    ///
    /// `column_names` gives the per-column component names (empty means all
    /// default); explicit per-well `component_names` are not applicable.
    pub fn trough(
        name: &str,
        virtual_rows: usize,
        columns: usize,
        options: LabwareOptions,
        column_names: Vec<Option<String>>,
    ) -> Result<Self, Error> {
        if !options.component_names.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("trough contents are named per column, not per well")
                .with_labware(name));
        }
        if virtual_rows < 1 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid virtual_rows: {virtual_rows}"))
                .with_labware(name));
        }
        let column_names = if column_names.is_empty() {
            vec![None; columns]
        } else {
            column_names
        };
        let initial = build_initial_volumes(name, 1, columns, &options.initial_volumes)?;
        let per_column: Vec<f64> = initial.row(0).to_vec();
        let component_names =
            composition::trough_component_names(name, columns, &column_names, &per_column)?;
        let options = LabwareOptions {
            component_names,
            ..options
        };
        Labware::from_parts(name, 1, columns, Some(virtual_rows), options, initial)
    }

    fn from_parts(
        name: &str,
        rows: usize,
        columns: usize,
        virtual_rows: Option<usize>,
        options: LabwareOptions,
        initial: Array2<f64>,
    ) -> Result<Self, Error> {
        if rows < 1 || rows > ROW_LETTERS.len() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid rows: {rows}"))
                .with_labware(name));
        }
        if columns < 1 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid columns: {columns}"))
                .with_labware(name));
        }
        if let Some(virtual_rows) = virtual_rows {
            if virtual_rows > ROW_LETTERS.len() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid virtual_rows: {virtual_rows}"))
                    .with_labware(name));
            }
        }
        if !(options.min_volume >= 0.0 && options.min_volume.is_finite()) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid min_volume: {}", options.min_volume))
                .with_labware(name));
        }
        if !(options.max_volume > options.min_volume && options.max_volume.is_finite()) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid max_volume: {}", options.max_volume))
                .with_labware(name));
        }
        if initial.iter().any(|v| *v < 0.0) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("initial volumes cannot be negative")
                .with_labware(name));
        }
        if initial.iter().any(|v| *v > options.max_volume) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("initial volumes cannot be above max_volume")
                .with_labware(name));
        }

        let real_wells: Vec<Vec<String>> = (0..rows)
            .map(|r| {
                (1..=columns)
                    .map(|column| format_well(ROW_LETTERS[r], column))
                    .collect()
            })
            .collect();
        let composition = composition::initial_composition(
            name,
            &real_wells,
            &options.component_names,
            &initial,
        )?;

        let history = vec![HistoryEntry {
            label: Some("initial".to_string()),
            volumes: initial.clone(),
        }];
        Ok(Self {
            name: name.to_string(),
            rows,
            columns,
            min_volume: options.min_volume,
            max_volume: options.max_volume,
            virtual_rows,
            state: RefCell::new(VesselState {
                volumes: initial,
                composition,
                untracked: Array2::from_elem((rows, columns), false),
                history,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Real grid rows (1 for troughs).
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn virtual_rows(&self) -> Option<usize> {
        self.virtual_rows
    }

    /// Rows a tip bank can address: virtual rows for troughs, real otherwise.
    pub fn addressable_rows(&self) -> usize {
        self.virtual_rows.unwrap_or(self.rows)
    }

    pub fn is_trough(&self) -> bool {
        self.virtual_rows.is_some()
    }

    pub fn min_volume(&self) -> f64 {
        self.min_volume
    }

    pub fn max_volume(&self) -> f64 {
        self.max_volume
    }

    pub fn row_ids(&self) -> Vec<char> {
        ROW_LETTERS[..self.addressable_rows()].to_vec()
    }

    pub fn column_ids(&self) -> Vec<usize> {
        (1..=self.columns).collect()
    }

    /// Grid of addressable well IDs (virtual rows included for troughs).
    pub fn well_ids(&self) -> Vec<Vec<String>> {
        self.row_ids()
            .into_iter()
            .map(|row| (1..=self.columns).map(|c| format_well(row, c)).collect())
            .collect()
    }

    /// Addressable well IDs of one 0-based column, top to bottom.
    pub fn column_wells(&self, column: usize) -> Result<Vec<String>, Error> {
        if column >= self.columns {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("column index {column} out of range"))
                .with_labware(&self.name));
        }
        Ok(self
            .row_ids()
            .into_iter()
            .map(|row| format_well(row, column + 1))
            .collect())
    }

    /// Resolves a well ID to its real grid index. Trough rows collapse to 0.
    pub fn well_index(&self, well: &str) -> Result<(usize, usize), Error> {
        let (row, column) = split_well_id(well)
            .map_err(|err| err.with_labware(&self.name).with_well(well))?;
        let unknown = || {
            Error::new(ErrorKind::Usage)
                .with_message("unknown well")
                .with_labware(&self.name)
                .with_well(well)
        };
        if row.len() != 1 {
            return Err(unknown());
        }
        let letter = row.as_bytes()[0] as char;
        let r = ROW_LETTERS[..self.addressable_rows()]
            .iter()
            .position(|c| *c == letter)
            .ok_or_else(unknown)?;
        if column < 1 || column > self.columns {
            return Err(unknown());
        }
        let r = if self.is_trough() { 0 } else { r };
        Ok((r, column - 1))
    }

    /// Current volumes, one cell per real well.
    pub fn volumes(&self) -> Array2<f64> {
        self.state.borrow().volumes.clone()
    }

    pub fn volume(&self, well: &str) -> Result<f64, Error> {
        let (r, c) = self.well_index(well)?;
        Ok(self.state.borrow().volumes[[r, c]])
    }

    /// Per-component relative fraction grids.
    pub fn composition(&self) -> BTreeMap<String, Array2<f64>> {
        self.state.borrow().composition.clone()
    }

    /// Relative composition of one well.
    ///
    /// `None` means the well holds liquid of unknown identity; `Some` with an
    /// empty map is a tracked well that never held named liquid.
    pub fn well_composition(&self, well: &str) -> Result<Option<Composition>, Error> {
        let (r, c) = self.well_index(well)?;
        let state = self.state.borrow();
        if state.untracked[[r, c]] {
            return Ok(None);
        }
        let mut well_composition = Composition::new();
        for (component, fractions) in &state.composition {
            if fractions[[r, c]] > 0.0 {
                well_composition.insert(component.clone(), fractions[[r, c]]);
            }
        }
        Ok(Some(well_composition))
    }

    /// Adds liquid of unknown identity; wells receiving a positive volume
    /// become untracked. See [`Labware::add_with_compositions`].
    pub fn add(
        &self,
        wells: impl Into<WellSpec>,
        volumes: impl Into<VolumeSpec>,
        label: Option<&str>,
    ) -> Result<(), Error> {
        self.add_with_compositions(wells, volumes, label, None)
    }

    /// Adds volumes to wells, blending their composition with the incoming
    /// liquids.
    ///
    /// The overflow check runs per well before that well commits, but the
    /// batch is best-effort: wells processed earlier keep their mutation when
    /// a later well fails, and no history entry is appended for the failed
    /// batch.
    pub fn add_with_compositions(
        &self,
        wells: impl Into<WellSpec>,
        volumes: impl Into<VolumeSpec>,
        label: Option<&str>,
        compositions: Option<&[Option<Composition>]>,
    ) -> Result<(), Error> {
        let wells = wells.into().flatten();
        let volumes = broadcast_volumes(&wells, &volumes.into())?;
        if let Some(compositions) = compositions {
            if compositions.len() != wells.len() {
                return Err(Error::new(ErrorKind::Usage).with_message(
                    "well compositions must be given for either all or none of the wells",
                ));
            }
        }

        for (i, (well, volume)) in wells.iter().zip(&volumes).enumerate() {
            let (r, c) = self.well_index(well)?;
            let current_composition = self.well_composition(well)?;
            let mut state = self.state.borrow_mut();
            let v_original = state.volumes[[r, c]];
            let v_new = v_original + volume;
            if v_new > self.max_volume {
                return Err(Error::volume_overflow(
                    &self.name,
                    well,
                    v_original,
                    *volume,
                    self.max_volume,
                    label,
                ));
            }
            state.volumes[[r, c]] = v_new;

            if *volume > 0.0 {
                let incoming = match compositions {
                    Some(compositions) => compositions[i].as_ref(),
                    None => None,
                };
                match composition::combine(
                    v_original,
                    current_composition.as_ref(),
                    *volume,
                    incoming,
                ) {
                    Some(mixed) => {
                        for (component, fraction) in mixed {
                            let grid = state
                                .composition
                                .entry(component)
                                .or_insert_with(|| Array2::zeros((self.rows, self.columns)));
                            grid[[r, c]] = fraction;
                        }
                    }
                    None => {
                        state.untracked[[r, c]] = true;
                        for grid in state.composition.values_mut() {
                            grid[[r, c]] = 0.0;
                        }
                    }
                }
            }
        }
        self.log(label);
        Ok(())
    }

    /// Removes volumes from wells. The relative composition of what remains
    /// is unchanged. Same best-effort batch semantics as the add operations.
    pub fn remove(
        &self,
        wells: impl Into<WellSpec>,
        volumes: impl Into<VolumeSpec>,
        label: Option<&str>,
    ) -> Result<(), Error> {
        let wells = wells.into().flatten();
        let volumes = broadcast_volumes(&wells, &volumes.into())?;
        for (well, volume) in wells.iter().zip(&volumes) {
            let (r, c) = self.well_index(well)?;
            let mut state = self.state.borrow_mut();
            let v_original = state.volumes[[r, c]];
            let v_new = v_original - volume;
            if v_new < self.min_volume {
                return Err(Error::volume_underflow(
                    &self.name,
                    well,
                    v_original,
                    *volume,
                    self.min_volume,
                    label,
                ));
            }
            state.volumes[[r, c]] = v_new;
        }
        self.log(label);
        Ok(())
    }

    /// Appends the current volume snapshot to the history.
    pub fn log(&self, label: Option<&str>) {
        let mut state = self.state.borrow_mut();
        let volumes = state.volumes.clone();
        state.history.push(HistoryEntry {
            label: label.map(str::to_string),
            volumes,
        });
    }

    /// Collapses the last `n` history entries into one, keeping the most
    /// recent volume snapshot. `n == 0` is a no-op; `n` beyond the history
    /// collapses everything into a single entry.
    pub fn condense_log(&self, n: usize, label: CondenseLabel) {
        if n == 0 {
            return;
        }
        let mut state = self.state.borrow_mut();
        let len = state.history.len();
        let keep = len.saturating_sub(n);
        let resolved = match label {
            CondenseLabel::First => state.history[keep].label.clone(),
            CondenseLabel::Last => state.history[len - 1].label.clone(),
            CondenseLabel::Replace(label) => label,
        };
        let volumes = state.history[len - 1].volumes.clone();
        state.history.truncate(keep);
        state.history.push(HistoryEntry {
            label: resolved,
            volumes,
        });
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.borrow().history.clone()
    }

    /// A printable report of the labware history.
    pub fn report(&self) -> String {
        let mut report = self.name.clone();
        for entry in self.state.borrow().history.iter() {
            if let Some(label) = &entry.label {
                report.push('\n');
                report.push_str(label);
            }
            report.push('\n');
            report.push_str(&format_volumes(&entry.volumes));
            report.push('\n');
        }
        report
    }
}

impl fmt::Display for Labware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{}",
            self.name,
            format_volumes(&self.state.borrow().volumes)
        )
    }
}

fn build_initial_volumes(
    name: &str,
    rows: usize,
    columns: usize,
    spec: &VolumeSpec,
) -> Result<Array2<f64>, Error> {
    let shape_error = |got: usize| {
        Error::new(ErrorKind::Usage)
            .with_message(format!(
                "{got} initial volumes do not fit a {rows}x{columns} labware"
            ))
            .with_labware(name)
    };
    match spec {
        VolumeSpec::One(volume) => Ok(Array2::from_elem((rows, columns), *volume)),
        VolumeSpec::Many(values) => {
            if values.len() != rows * columns {
                return Err(shape_error(values.len()));
            }
            Array2::from_shape_vec((rows, columns), values.clone())
                .map_err(|_| shape_error(values.len()))
        }
        VolumeSpec::Grid(grid) => {
            if grid.len() != rows || grid.iter().any(|row| row.len() != columns) {
                return Err(shape_error(grid.iter().map(Vec::len).sum()));
            }
            let values: Vec<f64> = grid.iter().flatten().copied().collect();
            Array2::from_shape_vec((rows, columns), values).map_err(|_| shape_error(0))
        }
    }
}

fn format_volumes(volumes: &Array2<f64>) -> String {
    let rows: Vec<String> = volumes
        .rows()
        .into_iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|v| format!("{v:.1}")).collect();
            format!("[{}]", cells.join(", "))
        })
        .collect();
    rows.join("\n")
}
