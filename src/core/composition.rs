// Volumetric composition blending and default component naming.
use std::collections::BTreeMap;

use ndarray::Array2;

use crate::core::error::{Error, ErrorKind};

/// Relative composition of one well: component name to fraction of the total.
pub type Composition = BTreeMap<String, f64>;

/// Computes the composition resulting from mixing two liquids.
///
/// Converts both fraction maps to absolute volumetric contributions, sums them
/// per component, and renormalizes by the combined volume. `None` on either
/// side means the liquid has no tracked identity, and the mixture inherits
/// that: the result is `None` rather than an error.
pub fn combine(
    volume_a: f64,
    composition_a: Option<&Composition>,
    volume_b: f64,
    composition_b: Option<&Composition>,
) -> Option<Composition> {
    let composition_a = composition_a?;
    let composition_b = composition_b?;
    let total = volume_a + volume_b;

    let mut contributions: BTreeMap<String, f64> = composition_a
        .iter()
        .map(|(component, fraction)| (component.clone(), fraction * volume_a))
        .collect();
    for (component, fraction) in composition_b {
        *contributions.entry(component.clone()).or_insert(0.0) += fraction * volume_b;
    }
    Some(
        contributions
            .into_iter()
            .map(|(component, contribution)| (component, contribution / total))
            .collect(),
    )
}

/// Builds the initial per-component fraction grids for a labware.
///
/// Wells with positive initial volume get a component marked at fraction 1.
/// Unnamed wells default to `"{name}.{well}"`, or the bare labware name when
/// only a single well holds liquid. Naming an empty well is a usage error.
pub(crate) fn initial_composition(
    name: &str,
    real_wells: &[Vec<String>],
    component_names: &BTreeMap<String, Option<String>>,
    initial_volumes: &Array2<f64>,
) -> Result<BTreeMap<String, Array2<f64>>, Error> {
    for well in component_names.keys() {
        if !real_wells.iter().any(|row| row.iter().any(|w| w == well)) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid component name key: {well}"))
                .with_labware(name));
        }
    }

    let n_wells: usize = real_wells.iter().map(Vec::len).sum();
    let is_multiwell = n_wells > 1;
    let mut composition: BTreeMap<String, Array2<f64>> = BTreeMap::new();
    for (r, row) in real_wells.iter().enumerate() {
        for (c, well) in row.iter().enumerate() {
            if initial_volumes[[r, c]] == 0.0 {
                if let Some(Some(cname)) = component_names.get(well) {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message(format!(
                            "a component name '{cname}' was specified for {name}.{well}, \
                             but the corresponding initial volume is 0"
                        ))
                        .with_labware(name)
                        .with_well(well));
                }
                continue;
            }

            let cname = match component_names.get(well) {
                Some(Some(cname)) => cname.clone(),
                _ if is_multiwell => format!("{name}.{well}"),
                _ => name.to_string(),
            };

            composition
                .entry(cname)
                .or_insert_with(|| Array2::zeros(initial_volumes.dim()))[[r, c]] = 1.0;
        }
    }
    Ok(composition)
}

/// Determines the fully-specified component name map for a trough.
///
/// Troughs default to per-column names (`"{name}.column_NN"` with 1-based
/// numbering, or the bare name for single-column troughs), because one column
/// is one physical reservoir no matter how many virtual rows address it.
pub(crate) fn trough_component_names(
    name: &str,
    columns: usize,
    column_names: &[Option<String>],
    initial_volumes: &[f64],
) -> Result<BTreeMap<String, Option<String>>, Error> {
    if column_names.len() != columns {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!(
                "the {} column names don't match the number of columns ({columns})",
                column_names.len()
            ))
            .with_labware(name));
    }
    if initial_volumes.len() != columns {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!(
                "the {} initial volumes don't match the number of columns ({columns})",
                initial_volumes.len()
            ))
            .with_labware(name));
    }
    if column_names
        .iter()
        .zip(initial_volumes)
        .any(|(cname, ivol)| cname.is_some() && *ivol == 0.0)
    {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("empty trough columns must be unnamed")
            .with_labware(name));
    }

    let mut component_names = BTreeMap::new();
    for (c, (cname, ivol)) in column_names.iter().zip(initial_volumes).enumerate() {
        let cname = match cname {
            Some(cname) => Some(cname.clone()),
            None if *ivol > 0.0 && columns > 1 => Some(format!("{name}.column_{:02}", c + 1)),
            None if *ivol > 0.0 => Some(name.to_string()),
            None => None,
        };
        component_names.insert(format!("A{:02}", c + 1), cname);
    }
    Ok(component_names)
}
