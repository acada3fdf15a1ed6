use proptest::prelude::*;
use sharedset::{ColumnRead, DataSetOptions, DataSetRead, DataSetW, DataType, MISSING_INT};
use sharedset_testkit::small_map;

/// Build a dataset with an integer and a decimal column holding `values`.
fn with_values<'a>(mm: &'a mut sharedset::MemoryMap, values: &[i32]) -> DataSetW<'a> {
    let mut ds = DataSetW::create(mm, DataSetOptions::default()).unwrap();
    ds.append_column("i", "i").unwrap();
    ds.append_column("d", "d").unwrap();
    ds.column_mut(1)
        .unwrap()
        .change_data_type(DataType::Decimal)
        .unwrap();
    ds.append_rows(values.len()).unwrap();
    for (row, &v) in values.iter().enumerate() {
        ds.column_mut(0).unwrap().set_ivalue(row, v, true).unwrap();
        ds.column_mut(1)
            .unwrap()
            .set_dvalue(row, f64::from(v) / 4.0, true)
            .unwrap();
    }
    ds
}

fn column_values(ds: &DataSetW<'_>) -> (Vec<i32>, Vec<f64>) {
    let i = ds.column(0).unwrap();
    let d = ds.column(1).unwrap();
    (
        (0..i.row_count()).map(|r| i.raw::<i32>(r).unwrap()).collect(),
        (0..d.row_count()).map(|r| d.raw::<f64>(r).unwrap()).collect(),
    )
}

fn range_in(len: usize) -> impl Strategy<Value = (usize, usize)> {
    (0..len).prop_flat_map(move |start| (Just(start), start..len))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn append_rows_adds_missing_cells(initial in 0usize..20, added in 0usize..50) {
        let mut mm = small_map();
        let mut ds = with_values(&mut mm, &vec![1; initial]);
        ds.append_rows(added).unwrap();

        prop_assert_eq!(ds.row_count(), initial + added);
        let (ints, decimals) = column_values(&ds);
        prop_assert_eq!(ints.len(), initial + added);
        prop_assert!(ints[initial..].iter().all(|&v| v == MISSING_INT));
        prop_assert!(decimals[initial..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn delete_rows_closes_the_gap(
        (values, (start, end)) in prop::collection::vec(-1000i32..1000, 1..60)
            .prop_flat_map(|v| { let n = v.len(); (Just(v), range_in(n)) })
    ) {
        let mut mm = small_map();
        let mut ds = with_values(&mut mm, &values);
        ds.delete_rows(start, end).unwrap();

        let mut expected = values[..start].to_vec();
        expected.extend_from_slice(&values[end + 1..]);
        let (ints, decimals) = column_values(&ds);
        prop_assert_eq!(ds.row_count(), values.len() - (end - start + 1));
        prop_assert_eq!(&ints, &expected);
        let expected_decimals: Vec<f64> = expected.iter().map(|&v| f64::from(v) / 4.0).collect();
        prop_assert_eq!(decimals, expected_decimals);
    }

    #[test]
    fn insert_then_delete_restores_rows(
        values in prop::collection::vec(-1000i32..1000, 0..40),
        at in 0usize..40,
        count in 1usize..10,
    ) {
        let at = at.min(values.len());
        let mut mm = small_map();
        let mut ds = with_values(&mut mm, &values);
        let before = column_values(&ds);

        ds.insert_rows(at, at + count - 1).unwrap();
        prop_assert_eq!(ds.row_count(), values.len() + count);
        let (ints, _) = column_values(&ds);
        prop_assert!(ints[at..at + count].iter().all(|&v| v == MISSING_INT));

        ds.delete_rows(at, at + count - 1).unwrap();
        prop_assert_eq!(column_values(&ds), before);
    }

    #[test]
    fn ids_stay_unique_and_order_follows_requests(
        ops in prop::collection::vec((0u8..3, 0usize..8), 1..30)
    ) {
        let mut mm = small_map();
        let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
        let mut model: Vec<(i32, String)> = Vec::new();
        let mut issued = 0;

        for (n, (op, pos)) in ops.into_iter().enumerate() {
            let name = format!("c{n}");
            match op {
                0 => {
                    let id = ds.append_column(&name, &name).unwrap().id();
                    model.push((id, name));
                }
                1 => {
                    let index = pos.min(model.len());
                    let id = ds.insert_column(index, &name, &name).unwrap().id();
                    model.insert(index, (id, name));
                }
                _ if !model.is_empty() => {
                    let index = pos.min(model.len() - 1);
                    ds.delete_columns(index, index).unwrap();
                    model.remove(index);
                    continue;
                }
                _ => continue,
            }
            let newest = model.iter().map(|(id, _)| *id).max().unwrap();
            prop_assert_eq!(newest, issued);
            issued += 1;
        }

        let actual: Vec<(i32, String)> =
            ds.columns().map(|c| (c.id(), c.name().to_owned())).collect();
        prop_assert_eq!(actual, model);
    }
}
