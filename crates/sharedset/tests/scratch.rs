use sharedset::{
    ColumnKey, ColumnRead, ColumnType, DataSetOptions, DataSetRead, DataSetW, DataType,
    MISSING_INT, MemoryMap, StoreError,
};
use sharedset_testkit::small_map;

fn ints<C: ColumnRead>(c: &C) -> Vec<i32> {
    (0..c.row_count()).map(|r| c.raw::<i32>(r).unwrap()).collect()
}

fn computed(mm: &mut MemoryMap) -> DataSetW<'_> {
    let mut ds = DataSetW::create(mm, DataSetOptions::default()).unwrap();
    ds.append_column("x", "x").unwrap();
    ds.append_column("y", "y").unwrap();
    ds.append_rows(3).unwrap();
    let mut y = ds.column_mut(1).unwrap();
    y.set_column_type(ColumnType::Computed);
    y.set_formula("x * 2").unwrap();
    y.set_formula_message("ok").unwrap();
    for (row, v) in [1, 2, 3].into_iter().enumerate() {
        y.set_ivalue(row, v, true).unwrap();
    }
    ds
}

#[test]
fn swap_publishes_scratch_storage_under_live_identity() {
    let mut mm = small_map();
    let mut ds = computed(&mut mm);
    let before = ds.column_by_id(1).unwrap().changes();
    assert_eq!(ds.scratch_id(), None);

    {
        let mut scratch = ds.scratch_column_mut().unwrap();
        assert_eq!(scratch.row_count(), 3);
        for (row, v) in [10, 20, 30].into_iter().enumerate() {
            scratch.set_ivalue(row, v, true).unwrap();
        }
    }

    let displaced = ds.swap_with_scratch_column(1).unwrap();
    assert_eq!(displaced.id(), 1);
    assert_eq!(ints(&displaced), [1, 2, 3]);

    let live = ds.column(1).unwrap();
    assert_eq!(live.id(), 1);
    assert_eq!(live.name(), "y");
    assert_eq!(live.column_type(), ColumnType::Computed);
    assert_eq!(live.formula(), Some("x * 2"));
    assert_eq!(live.formula_message(), Some("ok"));
    assert_eq!(live.changes(), before + 1);
    assert_eq!(ints(&live), [10, 20, 30]);
    assert_eq!(ds.column(0).unwrap().name(), "x");

    assert_eq!(ds.scratch_id(), Some(1));
    ds.discard_scratch_column(1);
    assert_eq!(ds.scratch_id(), None);
}

#[test]
fn discard_ignores_other_ids() {
    let mut mm = small_map();
    let mut ds = computed(&mut mm);
    ds.discard_scratch_column(1);

    ds.scratch_column_mut().unwrap();
    ds.swap_with_scratch_column(1).unwrap();
    ds.discard_scratch_column(0);
    assert_eq!(ds.scratch_id(), Some(1));
}

#[test]
fn displaced_column_is_the_next_scratch() {
    let mut mm = small_map();
    let mut ds = computed(&mut mm);

    ds.scratch_column_mut().unwrap();
    ds.swap_with_scratch_column(1).unwrap();
    {
        let mut scratch = ds.scratch_column_mut().unwrap();
        assert_eq!(ints(&scratch), [1, 2, 3]);
        scratch.set_ivalue(0, 100, true).unwrap();
    }
    ds.swap_with_scratch_column(1).unwrap();

    let live = ds.column_by_id(1).unwrap();
    assert_eq!(ints(&live), [100, 2, 3]);
    assert_eq!(live.name(), "y");
}

#[test]
fn scratch_is_sized_to_the_dataset_on_swap() {
    let mut mm = small_map();
    let mut ds = computed(&mut mm);
    ds.scratch_column_mut().unwrap();
    ds.append_rows(2).unwrap();

    ds.swap_with_scratch_column(1).unwrap();
    let live = ds.column(1).unwrap();
    assert_eq!(live.row_count(), 5);
    assert_eq!(live.raw::<i32>(4).unwrap(), MISSING_INT);
}

#[test]
fn swap_can_change_storage_and_recounts_levels() {
    let mut mm = small_map();
    let mut ds = computed(&mut mm);
    {
        let mut scratch = ds.scratch_column_mut().unwrap();
        scratch.change_data_type(DataType::Decimal).unwrap();
        scratch.set_dvalue(2, 1.5, true).unwrap();
    }
    ds.swap_with_scratch_column(1).unwrap();
    let live = ds.column(1).unwrap();
    assert_eq!(live.data_type(), DataType::Decimal);
    assert_eq!(live.raw::<f64>(2).unwrap(), 1.5);

    {
        let mut scratch = ds.scratch_column_mut().unwrap();
        scratch.append_level(7, "seven", None).unwrap();
        scratch.set_ivalue(0, 7, true).unwrap();
        scratch.set_ivalue(1, 7, true).unwrap();
        scratch.set_ivalue(2, MISSING_INT, true).unwrap();
    }
    ds.swap_with_scratch_column(1).unwrap();
    let live = ds.column(1).unwrap();
    assert_eq!(live.data_type(), DataType::Integer);
    assert_eq!(live.level_count_ex_filtered(), 1);
    assert!(!live.has_unused_levels());
}

#[test]
fn swap_of_unknown_column_fails() {
    let mut mm = small_map();
    let mut ds = computed(&mut mm);
    let err = ds.swap_with_scratch_column(42).unwrap_err();
    assert!(matches!(
        err,
        StoreError::ColumnNotFound {
            key: ColumnKey::Id(42)
        }
    ));
    assert_eq!(ds.column_count(), 2);
}
