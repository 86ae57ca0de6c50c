// Transfer partitioning: LVH volume splitting and column-wise grouping.
use std::collections::BTreeMap;

use serde_json::json;

use crate::core::error::Error;
use crate::core::labware::Labware;
use crate::core::wells::split_well_id;
use crate::notice::{Notice, Notify};

/// Caller-facing partitioning choice for a transfer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PartitionBy {
    #[default]
    Auto,
    Source,
    Destination,
}

/// The resolved grouping axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionAxis {
    Source,
    Destination,
}

/// Splits a pipetting volume into parts that respect the device ceiling.
///
/// Returns `ceil(volume / max_volume)` integral parts, all equal except the
/// last one, which absorbs the rounding remainder so the parts sum exactly to
/// the requested volume. A zero volume yields no parts.
pub fn partition_volume(volume: f64, max_volume: f64) -> Vec<f64> {
    if volume == 0.0 {
        return Vec::new();
    }
    if volume < max_volume {
        return vec![volume];
    }
    let steps = (volume / max_volume).ceil();
    let step_volume = (volume / steps).ceil();
    let n = steps as usize;
    let mut volumes = vec![step_volume; n - 1];
    volumes.push(volume - step_volume * (n as f64 - 1.0));
    volumes
}

/// Resolves the partition axis, warning about inefficient fixed choices.
///
/// `Auto` groups by source columns unless the source is a trough and the
/// destination is not: a trough column holds one liquid, so grouping by the
/// many-tip destination saves steps there.
pub(crate) fn optimize_partition_by(
    source: &Labware,
    destination: &Labware,
    requested: PartitionBy,
    label: Option<&str>,
    notify: &dyn Notify,
) -> PartitionAxis {
    match requested {
        PartitionBy::Auto => {
            if source.is_trough() && !destination.is_trough() {
                PartitionAxis::Destination
            } else {
                PartitionAxis::Source
            }
        }
        PartitionBy::Source => {
            if source.is_trough() && !destination.is_trough() {
                notify.notify(inefficiency_notice(
                    "source",
                    "destination",
                    source,
                    destination,
                    label,
                ));
            }
            PartitionAxis::Source
        }
        PartitionBy::Destination => {
            if destination.is_trough() && !source.is_trough() {
                notify.notify(inefficiency_notice(
                    "destination",
                    "source",
                    source,
                    destination,
                    label,
                ));
            }
            PartitionAxis::Destination
        }
    }
}

fn inefficiency_notice(
    chosen: &str,
    better: &str,
    source: &Labware,
    destination: &Labware,
    label: Option<&str>,
) -> Notice {
    let trough = if chosen == "source" {
        source.name()
    } else {
        destination.name()
    };
    Notice::new(
        "inefficient-partition",
        format!(
            "partitioning by \"{chosen}\" ({trough}), which is a trough while the other labware \
             is not; consider partitioning by \"{better}\""
        ),
    )
    .with_detail("partition_by", json!(chosen))
    .with_detail("source", json!(source.name()))
    .with_detail("destination", json!(destination.name()))
    .with_detail("label", json!(label))
}

/// One column-wise group of transfer rows, already sorted for execution.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnGroup {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub volumes: Vec<f64>,
}

/// Groups transfer rows by the column of the chosen axis and sorts each group
/// by the axis well ID (row letters, then column; stable for equal wells).
///
/// Groups come back in ascending column order. The ordering is a hard
/// requirement: it makes the instruction log reproducible and matches how the
/// instrument walks a column of tips.
pub(crate) fn partition_by_column(
    sources: &[String],
    destinations: &[String],
    volumes: &[f64],
    axis: PartitionAxis,
) -> Result<Vec<ColumnGroup>, Error> {
    struct Row {
        source: String,
        destination: String,
        volume: f64,
        key: (String, usize),
    }

    let mut groups: BTreeMap<usize, Vec<Row>> = BTreeMap::new();
    for ((source, destination), volume) in sources.iter().zip(destinations).zip(volumes) {
        let axis_well = match axis {
            PartitionAxis::Source => source,
            PartitionAxis::Destination => destination,
        };
        let (row, column) = split_well_id(axis_well)?;
        groups.entry(column).or_default().push(Row {
            source: source.clone(),
            destination: destination.clone(),
            volume: *volume,
            key: (row.to_string(), column),
        });
    }

    Ok(groups
        .into_values()
        .map(|mut rows| {
            rows.sort_by(|a, b| a.key.cmp(&b.key));
            let mut group = ColumnGroup {
                sources: Vec::with_capacity(rows.len()),
                destinations: Vec::with_capacity(rows.len()),
                volumes: Vec::with_capacity(rows.len()),
            };
            for row in rows {
                group.sources.push(row.source);
                group.destinations.push(row.destination);
                group.volumes.push(row.volume);
            }
            group
        })
        .collect())
}
