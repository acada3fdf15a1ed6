use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sharedset::{ColumnRead, DataSetOptions, DataSetRead, DataSetW, DataType, MapOptions, MemoryMap};

const COLUMNS: usize = 8;

/// A region holding a dataset of `rows` rows: factor columns plus one decimal.
fn populated(rows: usize) -> MemoryMap {
    let mut mm = MemoryMap::in_memory(MapOptions::default()).unwrap();
    let mut ds = DataSetW::create(&mut mm, DataSetOptions::default()).unwrap();
    for i in 0..COLUMNS {
        let name = format!("c{i}");
        ds.append_column(&name, &name).unwrap();
    }
    ds.column_mut(COLUMNS - 1)
        .unwrap()
        .change_data_type(DataType::Decimal)
        .unwrap();
    ds.append_rows(rows).unwrap();
    for i in 0..COLUMNS - 1 {
        let mut c = ds.column_mut(i).unwrap();
        for v in 0..5 {
            c.append_level(v, &format!("level {v}"), None).unwrap();
        }
        for row in 0..rows {
            c.set_ivalue(row, (row % 5) as i32, true).unwrap();
        }
        c.update_level_counts();
    }
    mm
}

fn bench_row_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("rows");
    let sizes = [1_000, 10_000, 100_000];

    for n in sizes.iter() {
        let base = populated(*n);

        group.bench_with_input(BenchmarkId::new("AppendRows", n), n, |b, _| {
            b.iter_batched(
                || populated(0),
                |mut mm| {
                    let mut ds = DataSetW::retrieve(&mut mm).unwrap();
                    ds.append_rows(black_box(*n)).unwrap();
                },
                BatchSize::LargeInput,
            )
        });

        // middle insert shifts half of every column
        group.bench_with_input(BenchmarkId::new("InsertRows/Middle", n), n, |b, &n| {
            b.iter_batched(
                || populated(n),
                |mut mm| {
                    let mut ds = DataSetW::retrieve(&mut mm).unwrap();
                    ds.insert_rows(black_box(n / 2), n / 2 + 9).unwrap();
                },
                BatchSize::LargeInput,
            )
        });

        // includes the level recount of every factor column
        group.bench_with_input(BenchmarkId::new("DeleteRows/Head", n), n, |b, &n| {
            b.iter_batched(
                || populated(n),
                |mut mm| {
                    let mut ds = DataSetW::retrieve(&mut mm).unwrap();
                    ds.delete_rows(black_box(0), 9).unwrap();
                },
                BatchSize::LargeInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("ScanColumn", n), n, |b, &n| {
            let ds = sharedset::DataSet::retrieve(&base).unwrap();
            let col = ds.column(0).unwrap();
            b.iter(|| {
                let mut sum = 0i64;
                for row in 0..n {
                    sum += i64::from(col.raw::<i32>(black_box(row)).unwrap());
                }
                sum
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_row_ops);
criterion_main!(benches);
