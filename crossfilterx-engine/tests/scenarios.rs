//! End-to-end scenarios S1-S6 and the quantified invariants of the overall
//! system, driven entirely through the engine's public API.

use proptest::prelude::*;

use crossfilterx_engine::dimension::{DimKind, DimSpec};
use crossfilterx_engine::engine::{Engine, EngineConfig, RawColumn};
use crossfilterx_engine::{clear_filter, set_filter, top_k, DimId, RawRange};

fn numeric_spec(name: &str, bits: u8) -> DimSpec {
    DimSpec {
        name: name.to_string(),
        kind: DimKind::Numeric,
        bits,
        coarse_target_bins: None,
    }
}

#[test]
fn scenario_s1_recompute_after_simple_filter() {
    let mut engine = Engine::ingest(
        vec![numeric_spec("value", 4)],
        vec![RawColumn::Numeric(vec![1.0, 2.0, 3.0, 4.0])],
        EngineConfig::default(),
    )
    .unwrap();

    set_filter(&mut engine, DimId(0), Some(RawRange { range_min: 5, range_max: 10 })).unwrap();
    assert_eq!(engine.active_count(), 2);
}

#[test]
fn scenario_s5_sum_reduction_end_to_end() {
    let mut engine = Engine::ingest(
        vec![numeric_spec("value", 4)],
        vec![RawColumn::Numeric(vec![1.0, 2.0, 3.0, 4.0])],
        EngineConfig::default(),
    )
    .unwrap();

    engine
        .set_reduction(DimId(0), vec![10.0, 20.0, 30.0, 40.0])
        .unwrap();

    let reduction = engine.dimension(DimId(0)).unwrap().reduction.as_ref().unwrap();
    let mut expected = vec![0.0; 16];
    expected[0] = 10.0;
    expected[5] = 20.0;
    expected[10] = 30.0;
    expected[15] = 40.0;
    assert_eq!(reduction.front, expected);
}

#[test]
fn scenario_s6_top_k_end_to_end() {
    let mut engine = Engine::ingest(
        vec![numeric_spec("value", 4)],
        vec![RawColumn::Numeric(vec![1.0, 2.0, 3.0, 4.0, 5.0, 5.0, 5.0, 4.0, 4.0])],
        EngineConfig::default(),
    )
    .unwrap();
    // no filters: all 9 rows active
    assert_eq!(engine.active_count(), 9);

    let histogram = &engine.dimension(DimId(0)).unwrap().histogram.front;
    let top2 = top_k(histogram, 2, false);
    assert!(top2[0].count >= top2[1].count);
}

#[test]
fn invariant_refcount_mask_agreement_after_multiple_filters() {
    let mut engine = Engine::ingest(
        vec![numeric_spec("a", 4), numeric_spec("b", 4)],
        vec![
            RawColumn::Numeric((0..32).map(|v| v as f64).collect()),
            RawColumn::Numeric((0..32).map(|v| (31 - v) as f64).collect()),
        ],
        EngineConfig::default(),
    )
    .unwrap();

    set_filter(&mut engine, DimId(0), Some(RawRange { range_min: 4, range_max: 12 })).unwrap();
    set_filter(&mut engine, DimId(1), Some(RawRange { range_min: 2, range_max: 10 })).unwrap();

    let required = engine.active_filter_count();
    let mask_active: u64 = (0..engine.row_count())
        .filter(|&r| engine.is_row_active(r))
        .count() as u64;
    assert_eq!(mask_active, engine.active_count());

    for row in 0..engine.row_count() {
        let is_active = engine.is_row_active(row);
        let refcount = engine.row_refcount(row);
        assert_eq!(is_active, refcount == required, "row {row}");
    }
}

#[test]
fn clear_round_trip_restores_active_count() {
    let mut engine = Engine::ingest(
        vec![numeric_spec("value", 5)],
        vec![RawColumn::Numeric((0..100).map(|v| v as f64).collect())],
        EngineConfig::default(),
    )
    .unwrap();

    let before = engine.active_count();
    set_filter(&mut engine, DimId(0), Some(RawRange { range_min: 3, range_max: 9 })).unwrap();
    clear_filter(&mut engine, DimId(0)).unwrap();
    assert_eq!(engine.active_count(), before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn csr_correctness_matches_linear_scan(
        column in prop::collection::vec(0u16..16, 1..200),
        lo in 0u16..16,
        hi in 0u16..16,
    ) {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let csr = crossfilterx_engine::csr::CsrIndex::build(&column, 16);

        let mut expected: Vec<u32> = column
            .iter()
            .enumerate()
            .filter(|(_, &b)| b >= lo && b <= hi)
            .map(|(r, _)| r as u32)
            .collect();
        let mut actual: Vec<u32> = csr.rows_in_range(lo, hi).to_vec();
        expected.sort_unstable();
        actual.sort_unstable();
        prop_assert_eq!(expected, actual);
    }

    #[test]
    fn diff_idempotence(
        a_lo in 0u16..16, a_hi in 0u16..16,
        b_lo in 0u16..16, b_hi in 0u16..16,
    ) {
        let (a_lo, a_hi) = if a_lo <= a_hi { (a_lo, a_hi) } else { (a_hi, a_lo) };
        let (b_lo, b_hi) = if b_lo <= b_hi { (b_lo, b_hi) } else { (b_hi, b_lo) };

        let values: Vec<f64> = (0..64).map(|v| v as f64).collect();

        let mut via_transition = Engine::ingest(
            vec![numeric_spec("value", 6)],
            vec![RawColumn::Numeric(values.clone())],
            EngineConfig::default(),
        ).unwrap();
        set_filter(&mut via_transition, DimId(0), Some(RawRange { range_min: a_lo, range_max: a_hi })).unwrap();
        set_filter(&mut via_transition, DimId(0), Some(RawRange { range_min: b_lo, range_max: b_hi })).unwrap();

        let mut direct = Engine::ingest(
            vec![numeric_spec("value", 6)],
            vec![RawColumn::Numeric(values)],
            EngineConfig::default(),
        ).unwrap();
        set_filter(&mut direct, DimId(0), Some(RawRange { range_min: b_lo, range_max: b_hi })).unwrap();

        prop_assert_eq!(via_transition.active_count(), direct.active_count());
        prop_assert_eq!(
            &via_transition.dimension(DimId(0)).unwrap().histogram.front,
            &direct.dimension(DimId(0)).unwrap().histogram.front
        );
    }
}
