use sharedset::{
    CellValue, ColumnRead, DataSetOptions, DataSetRead, DataSetW, DataType, MISSING_INT,
    MapError, MapOptions, MeasureType, MemoryMap, ROWS_PER_BLOCK, StorageKind, StoreError,
};
use sharedset_testkit::small_map;

fn ints(ds: &DataSetW<'_>, column: usize) -> Vec<i32> {
    let c = ds.column(column).unwrap();
    (0..c.row_count()).map(|r| c.raw::<i32>(r).unwrap()).collect()
}

fn fill(ds: &mut DataSetW<'_>, column: usize, values: &[i32]) {
    let mut c = ds.column_mut(column).unwrap();
    for (row, &v) in values.iter().enumerate() {
        c.set_ivalue(row, v, true).unwrap();
    }
}

#[test]
fn append_then_insert_row_scenario() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    ds.append_column("x", "x").unwrap();
    ds.append_rows(3).unwrap();

    assert_eq!(ds.row_count(), 3);
    assert_eq!(ints(&ds, 0), vec![MISSING_INT; 3]);

    ds.column_mut(0).unwrap().set_ivalue(1, 5, false).unwrap();
    assert_eq!(ds.column(0).unwrap().raw::<i32>(1).unwrap(), 5);

    ds.insert_rows(1, 1).unwrap();
    let x = ds.column(0).unwrap();
    assert_eq!(ds.row_count(), 4);
    assert_eq!(x.row_count(), 4);
    assert_eq!(x.raw::<i32>(1).unwrap(), MISSING_INT);
    assert_eq!(x.raw::<i32>(2).unwrap(), 5);
}

#[test]
fn new_columns_get_defaults_and_match_row_count() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    ds.append_rows(7).unwrap();
    let c = ds.append_column("age", "Age (years)").unwrap();

    assert_eq!(c.name(), "age");
    assert_eq!(c.import_name(), "Age (years)");
    assert_eq!(c.data_type(), DataType::Integer);
    assert_eq!(c.measure_type(), MeasureType::Nominal);
    assert!(c.active());
    assert!(c.trim_levels());
    assert_eq!(c.formula(), None);
    assert_eq!(c.row_count(), 7);
    assert!(c.value(6).unwrap().is_missing());
}

#[test]
fn insert_column_splices_in_order() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    for name in ["a", "b", "c"] {
        ds.append_column(name, name).unwrap();
    }
    ds.insert_column(1, "z", "z").unwrap();
    ds.insert_column(0, "first", "first").unwrap();
    ds.insert_column(5, "last", "last").unwrap();

    let names: Vec<String> = ds.columns().map(|c| c.name().to_owned()).collect();
    assert_eq!(names, ["first", "a", "z", "b", "c", "last"]);

    let err = ds.insert_column(99, "nope", "nope").unwrap_err();
    assert!(matches!(err, StoreError::OutOfRange { index: 99, count: 6 }));
}

#[test]
fn ids_are_never_reused() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    for name in ["a", "b", "c", "d"] {
        ds.append_column(name, name).unwrap();
    }
    let before: Vec<i32> = ds.columns().map(|c| c.id()).collect();
    assert_eq!(before, [0, 1, 2, 3]);

    ds.delete_columns(1, 2).unwrap();
    let after: Vec<i32> = ds.columns().map(|c| c.id()).collect();
    assert_eq!(after, [0, 3]);

    let e = ds.append_column("e", "e").unwrap().id();
    let f = ds.insert_column(0, "f", "f").unwrap().id();
    assert_eq!((e, f), (4, 5));
    assert_eq!(ds.column_by_id(3).unwrap().name(), "d");
    assert!(matches!(
        ds.column_by_id(1),
        Err(StoreError::ColumnNotFound { .. })
    ));
}

#[test]
fn capacity_is_enforced_without_consuming_ids() {
    let mut mm = small_map();
    let options = DataSetOptions::default().with_column_capacity(2);
    let mut ds = DataSetW::create(&mut mm, options).unwrap();
    ds.append_column("a", "a").unwrap();
    ds.append_column("b", "b").unwrap();

    let err = ds.append_column("c", "c").unwrap_err();
    assert!(matches!(err, StoreError::CapacityExceeded { capacity: 2 }));
    assert!(ds.insert_column(0, "c", "c").is_err());
    assert_eq!(ds.column_count(), 2);

    ds.delete_columns(0, 0).unwrap();
    assert_eq!(ds.append_column("c", "c").unwrap().id(), 2);
}

#[test]
fn delete_rows_shifts_later_rows_down() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    ds.append_column("n", "n").unwrap();
    ds.append_column("d", "d").unwrap();
    ds.column_mut(1)
        .unwrap()
        .change_data_type(DataType::Decimal)
        .unwrap();
    ds.set_row_count(6).unwrap();
    fill(&mut ds, 0, &[10, 11, 12, 13, 14, 15]);
    {
        let mut d = ds.column_mut(1).unwrap();
        for row in 0..6 {
            d.set_dvalue(row, row as f64 + 0.5, true).unwrap();
        }
    }

    ds.delete_rows(1, 3).unwrap();
    assert_eq!(ds.row_count(), 3);
    assert_eq!(ints(&ds, 0), [10, 14, 15]);
    let d = ds.column(1).unwrap();
    assert_eq!(d.row_count(), 3);
    assert_eq!(d.raw::<f64>(1).unwrap(), 4.5);
    assert_eq!(d.value(2).unwrap(), CellValue::Decimal(5.5));
}

#[test]
fn appended_decimal_rows_are_nan() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    ds.append_column("d", "d").unwrap();
    ds.column_mut(0)
        .unwrap()
        .change_data_type(DataType::Decimal)
        .unwrap();
    ds.append_rows(2).unwrap();
    let d = ds.column(0).unwrap();
    assert_eq!(d.measure_type(), MeasureType::Continuous);
    assert!(d.raw::<f64>(0).unwrap().is_nan());
    assert!(d.value(1).unwrap().is_missing());
}

#[test]
fn rows_span_several_blocks() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default().with_block_capacity(1))
        .unwrap();
    ds.append_column("n", "n").unwrap();
    let rows = ROWS_PER_BLOCK * 2 + 10;
    ds.set_row_count(rows).unwrap();
    {
        let mut c = ds.column_mut(0).unwrap();
        for row in 0..rows {
            c.set_ivalue(row, row as i32, true).unwrap();
        }
    }

    ds.insert_rows(ROWS_PER_BLOCK - 2, ROWS_PER_BLOCK + 1).unwrap();
    let c = ds.column(0).unwrap();
    assert_eq!(c.row_count(), rows + 4);
    assert_eq!(c.raw::<i32>(ROWS_PER_BLOCK - 3).unwrap(), (ROWS_PER_BLOCK - 3) as i32);
    assert_eq!(c.raw::<i32>(ROWS_PER_BLOCK).unwrap(), MISSING_INT);
    assert_eq!(c.raw::<i32>(ROWS_PER_BLOCK + 2).unwrap(), (ROWS_PER_BLOCK - 2) as i32);
    assert_eq!(c.raw::<i32>(rows + 3).unwrap(), (rows - 1) as i32);
}

#[test]
fn shrinking_and_regrowing_refills_with_missing() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    ds.append_column("n", "n").unwrap();
    ds.set_row_count(4).unwrap();
    fill(&mut ds, 0, &[1, 2, 3, 4]);

    ds.set_row_count(2).unwrap();
    ds.set_row_count(4).unwrap();
    assert_eq!(ints(&ds, 0), [1, 2, MISSING_INT, MISSING_INT]);
}

#[test]
fn lookups_report_what_was_missing() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    ds.append_column("a", "a").unwrap();
    ds.append_rows(2).unwrap();

    let err = ds.column(3).unwrap_err();
    assert!(matches!(err, StoreError::OutOfRange { index: 3, count: 1 }));
    let err = ds.column_by_name("A").unwrap_err();
    assert_eq!(err.to_string(), "no such column: 'A'");
    let err = ds.column(0).unwrap().raw::<i32>(2).unwrap_err();
    assert!(matches!(err, StoreError::OutOfRange { index: 2, count: 2 }));
    assert!(ds.delete_rows(1, 2).is_err());
    assert!(ds.delete_columns(0, 1).is_err());
    assert_eq!(ds.row_count(), 2);
}

#[test]
fn deleted_columns_are_recycled() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    ds.append_column("a", "a").unwrap();
    ds.append_column("b", "b").unwrap();
    ds.append_rows(5).unwrap();
    fill(&mut ds, 1, &[9, 9, 9, 9, 9]);

    ds.delete_columns(1, 1).unwrap();
    drop(ds);
    let used = mm.used();

    let mut ds = DataSetW::retrieve(&mut mm).unwrap();
    let c = ds.append_column("c", "c").unwrap();
    assert_eq!(c.id(), 2);
    assert_eq!(c.row_count(), 5);
    assert!((0..5).all(|r| c.raw::<i32>(r).unwrap() == MISSING_INT));
    assert_eq!(c.level_count(), 0);
    drop(ds);
    // only the two name strings were allocated
    assert!(mm.used() - used <= 32);
}

#[test]
fn editor_flags_are_process_local() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    assert!(!ds.is_edited());
    ds.set_edited(true);
    ds.set_blank(true);
    assert!(ds.is_edited() && ds.is_blank());
    drop(ds);

    let ds = DataSetW::retrieve(&mut mm).unwrap();
    assert!(!ds.is_edited());
    assert!(!ds.is_blank());
}

#[test]
fn cells_of_the_wrong_type_are_rejected() {
    let mut mm = small_map();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    ds.append_column("i", "i").unwrap();
    ds.append_column("d", "d").unwrap();
    ds.append_rows(4).unwrap();
    ds.column_mut(1)
        .unwrap()
        .change_data_type(DataType::Decimal)
        .unwrap();
    fill(&mut ds, 0, &[1, 2, 3, 4]);

    {
        let mut i = ds.column_mut(0).unwrap();
        let changes = i.changes();
        let err = i.set_dvalue(1, 2.5, false).unwrap_err();
        assert!(matches!(
            err,
            StoreError::WrongStorage {
                expected: StorageKind::Integer,
                found: StorageKind::Decimal,
                ..
            }
        ));
        assert_eq!(err.to_string(), "column i stores integer cells, not decimal");
        assert!(matches!(
            i.set_svalue(2, "x", true).unwrap_err(),
            StoreError::WrongStorage { .. }
        ));
        assert_eq!(i.changes(), changes);
    }
    assert_eq!(ints(&ds, 0), [1, 2, 3, 4]);

    {
        let mut d = ds.column_mut(1).unwrap();
        assert!(d.set_ivalue(3, 7, false).is_err());
        assert!(d.set_ivalue(1, 7, true).is_err());
    }
    let d = ds.column(1).unwrap();
    assert!((0..4).all(|r| d.raw::<f64>(r).unwrap().is_nan()));
    assert!(matches!(
        d.raw::<i32>(0).unwrap_err(),
        StoreError::WrongStorage {
            expected: StorageKind::Decimal,
            found: StorageKind::Integer,
            ..
        }
    ));
    assert!(ds.column(0).unwrap().raw::<f64>(0).is_err());
    assert_eq!(ds.column(0).unwrap().value(2).unwrap(), CellValue::from_int(3));
}

#[test]
fn exhausted_region_leaves_rows_untouched() {
    let mut mm = MemoryMap::in_memory(
        MapOptions::default()
            .with_initial_size(4096)
            .with_max_size(200_000),
    )
    .unwrap();
    let options = DataSetOptions::default()
        .with_column_capacity(8)
        .with_block_capacity(4);
    let mut ds = DataSetW::create(&mut mm, options).unwrap();
    for name in ["a", "b", "c"] {
        ds.append_column(name, name).unwrap();
    }
    ds.append_rows(10).unwrap();
    fill(&mut ds, 0, &[7; 10]);

    fn row_counts(ds: &DataSetW<'_>) -> Vec<usize> {
        ds.columns().map(|c| c.row_count()).collect()
    }

    let err = ds.append_rows(3 * ROWS_PER_BLOCK).unwrap_err();
    assert!(matches!(err, StoreError::Map(MapError::Exhausted { .. })));
    assert_eq!(ds.row_count(), 10);
    assert_eq!(row_counts(&ds), [10, 10, 10]);

    let err = ds.insert_rows(0, 3 * ROWS_PER_BLOCK - 1).unwrap_err();
    assert!(matches!(err, StoreError::Map(MapError::Exhausted { .. })));
    assert_eq!(ds.row_count(), 10);
    assert_eq!(row_counts(&ds), [10, 10, 10]);
    assert_eq!(ints(&ds, 0), [7; 10]);

    ds.append_rows(5).unwrap();
    assert_eq!(row_counts(&ds), [15, 15, 15]);
    assert_eq!(ints(&ds, 0)[..10], [7; 10]);
    assert_eq!(ints(&ds, 1)[14], MISSING_INT);
}
