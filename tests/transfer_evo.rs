//! Purpose: End-to-end coverage for EVO worklist transfers.
//! Exports: Integration tests only.
//! Role: Verify record sequences, volume tracking, and history condensation.
//! Invariants: Expected record lists are bit-exact; ordering is deterministic.
use gwlkit::core::error::ErrorKind;
use gwlkit::core::labware::{Labware, LabwareOptions};
use gwlkit::core::partition::PartitionBy;
use gwlkit::core::worklist::{EvoWorklist, TransferOptions, WashScheme, WorklistOptions};

fn plate(name: &str, rows: usize, columns: usize, initial: f64) -> Labware {
    Labware::new(
        name,
        rows,
        columns,
        LabwareOptions::new(50.0, 250.0).initial_volumes(initial),
    )
    .expect("labware")
}

fn evo() -> EvoWorklist {
    EvoWorklist::new(WorklistOptions::default()).expect("worklist")
}

#[test]
fn transfer_many_to_many_records_and_state() {
    let a = plate("A", 3, 4, 200.0);
    let b = plate("B", 3, 4, 0.0);
    let mut wl = evo();
    wl.transfer(
        &a,
        vec!["A01", "B01"],
        &b,
        vec!["A01", "B01"],
        50.0,
        &TransferOptions::new().label("first transfer"),
    )
    .expect("transfer");
    wl.transfer(
        &a,
        vec!["A03", "B04"],
        &b,
        vec!["A04", "B04"],
        50.0,
        &TransferOptions::new().label("second transfer"),
    )
    .expect("transfer");

    assert_eq!(
        wl.records(),
        [
            "C;first transfer",
            "A;A;;;1;;50.00;;;;",
            "D;B;;;1;;50.00;;;;",
            "W1;",
            "A;A;;;2;;50.00;;;;",
            "D;B;;;2;;50.00;;;;",
            "W1;",
            "C;second transfer",
            "A;A;;;7;;50.00;;;;",
            "D;B;;;10;;50.00;;;;",
            "W1;",
            "A;A;;;11;;50.00;;;;",
            "D;B;;;11;;50.00;;;;",
            "W1;",
        ]
    );
    assert_eq!(
        a.volumes(),
        ndarray::array![
            [150.0, 200.0, 150.0, 200.0],
            [150.0, 200.0, 200.0, 150.0],
            [200.0, 200.0, 200.0, 200.0],
        ]
    );
    assert_eq!(
        b.volumes(),
        ndarray::array![
            [50.0, 0.0, 0.0, 50.0],
            [50.0, 0.0, 0.0, 50.0],
            [0.0, 0.0, 0.0, 0.0],
        ]
    );
    // One condensed history entry per transfer, plus the initial state.
    assert_eq!(a.history().len(), 3);
    assert_eq!(b.history().len(), 3);
    assert_eq!(a.history()[1].label.as_deref(), Some("first transfer"));
}

#[test]
fn scalar_transfer_between_two_plates_with_wash() {
    let source = plate("S", 2, 2, 200.0);
    let destination = plate("D", 2, 2, 0.0);
    let mut wl = EvoWorklist::new(WorklistOptions {
        max_volume: 250.0,
        auto_split: true,
    })
    .expect("worklist");
    wl.transfer(
        &source,
        vec!["A01", "B01"],
        &destination,
        vec!["A01", "B01"],
        50.0,
        &TransferOptions::new().wash_scheme(WashScheme::Wash(1)),
    )
    .expect("transfer");

    // Exactly two aspirate+dispense+wash triples.
    assert_eq!(
        wl.records(),
        [
            "A;S;;;1;;50.00;;;;",
            "D;D;;;1;;50.00;;;;",
            "W1;",
            "A;S;;;2;;50.00;;;;",
            "D;D;;;2;;50.00;;;;",
            "W1;",
        ]
    );
    assert_eq!(
        source.volumes(),
        ndarray::array![[150.0, 200.0], [150.0, 200.0]]
    );
    assert_eq!(
        destination.volumes(),
        ndarray::array![[50.0, 0.0], [50.0, 0.0]]
    );
}

#[test]
fn one_to_many_preserves_destination_order() {
    let a = plate("A", 3, 4, 200.0);
    let b = plate("B", 3, 4, 0.0);
    let mut wl = evo();
    wl.transfer(
        &a,
        "A01",
        &b,
        vec!["B01", "B02", "B03"],
        25.0,
        &TransferOptions::new(),
    )
    .expect("transfer");
    assert_eq!(
        wl.records(),
        [
            "A;A;;;1;;25.00;;;;",
            "D;B;;;2;;25.00;;;;",
            "W1;",
            "A;A;;;1;;25.00;;;;",
            "D;B;;;5;;25.00;;;;",
            "W1;",
            "A;A;;;1;;25.00;;;;",
            "D;B;;;8;;25.00;;;;",
            "W1;",
        ]
    );
    assert_eq!(a.volume("A01").expect("well"), 125.0);
    assert_eq!(b.volume("B02").expect("well"), 25.0);
}

#[test]
fn many_to_one_pools_into_the_destination() {
    let a = plate("A", 3, 4, 200.0);
    let b = plate("B", 3, 4, 0.0);
    let mut wl = evo();
    wl.transfer(
        &a,
        vec!["A01", "A02", "A03"],
        &b,
        "B01",
        25.0,
        &TransferOptions::new(),
    )
    .expect("transfer");
    assert_eq!(b.volume("B01").expect("well"), 75.0);
    assert_eq!(a.volume("A01").expect("well"), 175.0);
    assert_eq!(a.volume("A02").expect("well"), 175.0);
    assert_eq!(a.volume("A03").expect("well"), 175.0);
    // Three source columns, one step each: no breaks anywhere.
    assert!(wl.records().iter().all(|record| record != "B;"));
}

#[test]
fn grid_wells_flatten_column_major() {
    let a = plate("A", 3, 4, 200.0);
    let b = plate("B", 3, 4, 0.0);
    let wells: Vec<Vec<String>> = a
        .well_ids()
        .into_iter()
        .take(3)
        .map(|row| row.into_iter().take(2).collect())
        .collect();
    let mut wl = evo();
    wl.transfer(&a, wells.clone(), &b, wells, 50.0, &TransferOptions::new())
        .expect("transfer");
    assert_eq!(
        wl.records(),
        [
            "A;A;;;1;;50.00;;;;",
            "D;B;;;1;;50.00;;;;",
            "W1;",
            "A;A;;;2;;50.00;;;;",
            "D;B;;;2;;50.00;;;;",
            "W1;",
            "A;A;;;3;;50.00;;;;",
            "D;B;;;3;;50.00;;;;",
            "W1;",
            "A;A;;;4;;50.00;;;;",
            "D;B;;;4;;50.00;;;;",
            "W1;",
            "A;A;;;5;;50.00;;;;",
            "D;B;;;5;;50.00;;;;",
            "W1;",
            "A;A;;;6;;50.00;;;;",
            "D;B;;;6;;50.00;;;;",
            "W1;",
        ]
    );
}

#[test]
fn large_volume_single_well_split() {
    let src = Labware::new(
        "A",
        3,
        2,
        LabwareOptions::new(1000.0, 25_000.0).initial_volumes(12_000.0),
    )
    .expect("labware");
    let dst = Labware::new("B", 3, 2, LabwareOptions::new(1000.0, 25_000.0)).expect("labware");
    let mut wl = evo();
    wl.transfer(
        &src,
        "A01",
        &dst,
        "A01",
        2000.0,
        &TransferOptions::new().label("Transfer more than 2x the max"),
    )
    .expect("transfer");

    assert_eq!(
        wl.records(),
        [
            "C;Transfer more than 2x the max",
            "A;A;;;1;;667.00;;;;",
            "D;B;;;1;;667.00;;;;",
            "W1;",
            // no breaks when pipetting single wells
            "A;A;;;1;;667.00;;;;",
            "D;B;;;1;;667.00;;;;",
            "W1;",
            "A;A;;;1;;666.00;;;;",
            "D;B;;;1;;666.00;;;;",
            "W1;",
            "B;", // always break after a partitioned group
        ]
    );
    // Two extra steps were necessary because of LVH.
    assert!(src.report().contains("Transfer more than 2x the max (2 LVH steps)"));
    assert!(dst.report().contains("Transfer more than 2x the max (2 LVH steps)"));
    assert_eq!(src.volume("A01").expect("well"), 10_000.0);
    assert_eq!(dst.volume("A01").expect("well"), 2000.0);
}

#[test]
fn large_volume_column_split_breaks_between_layers() {
    let src = Labware::new(
        "A",
        4,
        2,
        LabwareOptions::new(1000.0, 25_000.0).initial_volumes(12_000.0),
    )
    .expect("labware");
    let dst = Labware::new("B", 4, 2, LabwareOptions::new(1000.0, 25_000.0)).expect("labware");
    let mut wl = evo();
    wl.transfer(
        &src,
        vec!["A01", "B01", "D01", "C01"],
        &dst,
        vec!["A01", "B01", "D01", "C01"],
        vec![1500.0, 250.0, 0.0, 1200.0],
        &TransferOptions::new(),
    )
    .expect("transfer");

    assert_eq!(
        wl.records(),
        [
            "A;A;;;1;;750.00;;;;",
            "D;B;;;1;;750.00;;;;",
            "W1;",
            "A;A;;;2;;250.00;;;;",
            "D;B;;;2;;250.00;;;;",
            "W1;",
            // D01 is ignored because the volume is 0
            "A;A;;;3;;600.00;;;;",
            "D;B;;;3;;600.00;;;;",
            "W1;",
            "B;", // within-column break
            "A;A;;;1;;750.00;;;;",
            "D;B;;;1;;750.00;;;;",
            "W1;",
            "A;A;;;3;;600.00;;;;",
            "D;B;;;3;;600.00;;;;",
            "W1;",
            "B;", // trailing break after the partitioned group
        ]
    );
    assert_eq!(src.volume("A01").expect("well"), 10_500.0);
    assert_eq!(src.volume("B01").expect("well"), 11_750.0);
    assert_eq!(src.volume("C01").expect("well"), 10_800.0);
    assert_eq!(src.volume("D01").expect("well"), 12_000.0);
    assert_eq!(dst.volume("C01").expect("well"), 1200.0);
    assert_eq!(dst.volume("D01").expect("well"), 0.0);
}

#[test]
fn transfer_within_one_labware_condenses_once() {
    let a = plate("A", 3, 4, 200.0);
    let mut wl = evo();
    wl.transfer(
        &a,
        "A01",
        &a,
        "B01",
        50.0,
        &TransferOptions::new().label("mix"),
    )
    .expect("transfer");
    assert_eq!(a.volume("A01").expect("well"), 150.0);
    assert_eq!(a.volume("B01").expect("well"), 250.0);
    let history = a.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].label.as_deref(), Some("mix"));
}

#[test]
fn zero_volume_transfers_emit_nothing_and_keep_history() {
    let a = plate("A", 3, 4, 200.0);
    let b = plate("B", 3, 4, 0.0);
    let mut wl = evo();
    wl.transfer(
        &a,
        vec!["A01", "B01"],
        &b,
        vec!["A01", "B01"],
        0.0,
        &TransferOptions::new().label("nothing"),
    )
    .expect("transfer");
    assert_eq!(wl.records(), ["C;nothing"]);
    assert_eq!(a.history().len(), 1);
    assert_eq!(b.history().len(), 1);
}

#[test]
fn oversized_steps_require_auto_split() {
    let src = Labware::new(
        "A",
        3,
        2,
        LabwareOptions::new(1000.0, 25_000.0).initial_volumes(12_000.0),
    )
    .expect("labware");
    let dst = Labware::new("B", 3, 2, LabwareOptions::new(1000.0, 25_000.0)).expect("labware");
    let mut wl = EvoWorklist::new(WorklistOptions {
        max_volume: 950.0,
        auto_split: false,
    })
    .expect("worklist");
    let err = wl
        .transfer(&src, "A01", &dst, "A01", 2000.0, &TransferOptions::new())
        .expect_err("should fail");
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn mismatched_lengths_are_rejected_before_any_mutation() {
    let a = plate("A", 3, 4, 200.0);
    let b = plate("B", 3, 4, 0.0);
    let mut wl = evo();
    for (src, dst, volumes) in [
        (vec!["A01", "B01", "C01"], vec!["A01", "B01"], vec![20.0]),
        (vec!["A01", "B01"], vec!["A01", "B01", "C01"], vec![20.0]),
        (vec!["A01", "B01"], vec!["A01"], vec![30.0, 40.0, 25.0]),
    ] {
        let err = wl
            .transfer(&a, src, &b, dst, volumes, &TransferOptions::new())
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.to_string().contains("must be equal"));
    }
    assert!(wl.is_empty());
    assert_eq!(a.history().len(), 1);
}

#[test]
fn underflow_during_transfer_carries_context() {
    let a = plate("A", 2, 2, 60.0);
    let b = plate("B", 2, 2, 0.0);
    let mut wl = evo();
    let err = wl
        .transfer(
            &a,
            "A01",
            &b,
            "A01",
            20.0,
            &TransferOptions::new().label("too deep"),
        )
        .expect_err("should underflow");
    assert_eq!(err.kind(), ErrorKind::VolumeUnderflow);
    assert_eq!(err.labware(), Some("A"));
    assert_eq!(err.well(), Some("A01"));
    assert_eq!(err.threshold(), Some(50.0));
}

#[test]
fn fixed_partition_axis_controls_grouping() {
    let a = plate("A", 3, 4, 200.0);
    let b = plate("B", 3, 4, 0.0);
    let mut wl = evo();
    // Sources span two columns; grouping by destination keeps one group.
    wl.transfer(
        &a,
        vec!["A01", "A02"],
        &b,
        vec!["A01", "B01"],
        25.0,
        &TransferOptions::new().partition_by(PartitionBy::Destination),
    )
    .expect("transfer");
    assert_eq!(
        wl.records(),
        [
            "A;A;;;1;;25.00;;;;",
            "D;B;;;1;;25.00;;;;",
            "W1;",
            "A;A;;;4;;25.00;;;;",
            "D;B;;;2;;25.00;;;;",
            "W1;",
        ]
    );
}
