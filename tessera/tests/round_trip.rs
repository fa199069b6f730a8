#![cfg(test)]

use tessera::{
    ArrayView, AxisOrder, Column, ColumnTypes, CompressionHint, DimLabels, NA_INTEGER, NA_REAL,
    Table, TargetType, TypePolicy, WriteOptions, attach_labels, is_na_real, read_array,
    read_labels, read_table, write_array, write_table,
};
use tessera_error::TesseraError;
use tessera_store::MemoryContainer;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn grades() -> Table {
    Table::try_new(
        ["id", "name", "score", "grade"],
        vec![
            Column::Integer(vec![1, 2, 3, NA_INTEGER, 5]),
            Column::Text(vec![
                Some("ada".into()),
                Some("brian".into()),
                None,
                Some("dennis".into()),
                Some("edsger".into()),
            ]),
            Column::Double(vec![91.5, NA_REAL, 78.0, 66.25, 88.0]),
            Column::Factor {
                codes: vec![1, 2, NA_INTEGER, 1, 3],
                levels: strings(&["A", "B", "C"]),
            },
        ],
    )
    .unwrap()
}

#[test]
fn table_round_trip() {
    let store = MemoryContainer::new();
    let table = grades();
    let types = ColumnTypes::new().with("id", "int32");
    write_table(&store, "/school/grades", &table, &types, &WriteOptions::default()).unwrap();

    let policy = TypePolicy::new().with_field("id", TargetType::Int32);
    let back = read_table(&store, "/school/grades", &policy).unwrap();
    assert_eq!(back.names(), table.names());
    assert_eq!(back.column("id"), table.column("id"));
    assert_eq!(back.column("name"), table.column("name"));
    assert_eq!(back.column("grade"), table.column("grade"));
    let Some(Column::Double(scores)) = back.column("score") else {
        panic!("expected doubles");
    };
    assert!(is_na_real(scores[1]));
    assert_eq!(scores[4], 88.0);
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn missing_integers_survive_as_doubles() {
    let store = MemoryContainer::new();
    let table = Table::try_new(["id"], vec![Column::Integer(vec![7, NA_INTEGER])]).unwrap();
    write_table(&store, "t", &table, &ColumnTypes::new(), &WriteOptions::default()).unwrap();

    let Some(Column::Double(ids)) = read_table(&store, "t", &TypePolicy::new())
        .unwrap()
        .column("id")
        .cloned()
    else {
        panic!("expected doubles");
    };
    assert_eq!(ids[0], 7.0);
    assert!(is_na_real(ids[1]));

    let policy = TypePolicy::global(TargetType::Int32);
    let back = read_table(&store, "t", &policy).unwrap();
    assert_eq!(back.column("id"), table.column("id"));
}

#[test]
fn explicit_integer_types_keep_missing_values() {
    let store = MemoryContainer::new();
    let table = Table::try_new(["id"], vec![Column::Integer(vec![7, NA_INTEGER])]).unwrap();
    let types = ColumnTypes::new().with("id", "int32");
    write_table(&store, "t", &table, &types, &WriteOptions::default()).unwrap();

    let back = read_table(&store, "t", &TypePolicy::global(TargetType::Int32)).unwrap();
    assert_eq!(back.column("id"), table.column("id"));
    // the stored minimum is outside the range that narrows on its own
    let back = read_table(&store, "t", &TypePolicy::new()).unwrap();
    assert_eq!(
        back.column("id"),
        Some(&Column::Double(vec![7.0, f64::from(i32::MIN)]))
    );

    let narrow = ColumnTypes::new().with("id", "int16");
    let err = write_table(&store, "n", &table, &narrow, &WriteOptions::default()).unwrap_err();
    let TesseraError::UnsupportedFieldType { field, .. } = &err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(field.as_ref(), "id");
    assert!(!store.paths().contains(&"/n".to_string()));
}

#[test]
fn missing_factor_values_round_trip() {
    let store = MemoryContainer::new();
    let grade = Column::Factor {
        codes: vec![NA_INTEGER, 2, 1],
        levels: strings(&["lo", "hi"]),
    };
    let table = Table::try_new(["grade"], vec![grade.clone()]).unwrap();
    write_table(&store, "t", &table, &ColumnTypes::new(), &WriteOptions::default()).unwrap();
    let back = read_table(&store, "t", &TypePolicy::new()).unwrap();
    assert_eq!(back.column("grade"), Some(&grade));

    write_array(&store, "f", &ArrayView::vector(grade.clone()), None, &WriteOptions::default())
        .unwrap();
    let back = read_array(&store, "f", &TypePolicy::new()).unwrap().unwrap();
    assert_eq!(back.data(), &grade);
}

#[test]
fn wide_integers_need_a_wide_target() {
    let store = MemoryContainer::new();
    let big = vec![1_i64 << 40, -3];
    let table = Table::try_new(["n"], vec![Column::Integer64(big.clone())]).unwrap();
    write_table(&store, "t", &table, &ColumnTypes::new(), &WriteOptions::default()).unwrap();

    let policy = TypePolicy::new().with_field("n", TargetType::WideInt64);
    let back = read_table(&store, "t", &policy).unwrap();
    assert_eq!(back.column("n"), Some(&Column::Integer64(big)));
}

#[test]
fn row_major_matrix_reads_in_host_order() {
    let store = MemoryContainer::new();
    let source = ArrayView::try_new(
        vec![2, 3],
        AxisOrder::LastFast,
        Column::Integer(vec![1, 2, 3, 4, 5, 6]),
    )
    .unwrap();
    write_array(&store, "m", &source, Some("int32"), &WriteOptions::default()).unwrap();

    let back = read_array(&store, "m", &TypePolicy::new()).unwrap().unwrap();
    assert_eq!(back.order(), AxisOrder::FirstFast);
    let Column::Integer(values) = back.data() else {
        panic!("expected integers");
    };
    let (row, col) = (1, 2);
    assert_eq!(values[row + col * back.dims()[0]], 6);
}

#[test]
fn compressed_arrays_round_trip() {
    let store = MemoryContainer::new();
    let values: Vec<f64> = (0..4096_i32).map(|i| f64::from(i) * 0.5).collect();
    let array =
        ArrayView::try_new(vec![64, 64], AxisOrder::FirstFast, Column::Double(values)).unwrap();
    let options = WriteOptions::default().with_compression(CompressionHint::new(9));
    write_array(&store, "big", &array, None, &options).unwrap();

    let created = store.create_options("/big").unwrap();
    assert_eq!(created.deflate_level, 9);
    assert_eq!(created.chunk_dims, Some(vec![64, 64]));
    let back = read_array(&store, "big", &TypePolicy::new()).unwrap().unwrap();
    assert_eq!(back, array);
}

#[test]
fn label_length_mismatch_reads_as_no_labels() {
    let store = MemoryContainer::new();
    let array = ArrayView::vector(Column::Double(vec![1.0, 2.0, 3.0]));
    write_array(&store, "v", &array, None, &WriteOptions::default()).unwrap();
    attach_labels(&store, "v", 0, &strings(&["a", "b"])).unwrap();

    let back = read_array(&store, "v", &TypePolicy::new()).unwrap().unwrap();
    assert_eq!(back.labels(), &DimLabels::None);
    assert_eq!(read_labels(&store, "v", 0).unwrap(), None);
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn labels_attached_later_are_found() {
    let store = MemoryContainer::new();
    let array = ArrayView::try_new(
        vec![2, 2, 2],
        AxisOrder::FirstFast,
        Column::Logical(vec![1, 0, 1, 0, 0, 1, 0, 1]),
    )
    .unwrap();
    write_array(&store, "cube", &array, None, &WriteOptions::default()).unwrap();
    attach_labels(&store, "cube", 2, &strings(&["early", "late"])).unwrap();
    assert!(store.paths().contains(&"/cube_dimnames_3".to_string()));

    let back = read_array(&store, "cube", &TypePolicy::new()).unwrap().unwrap();
    assert_eq!(
        back.labels(),
        &DimLabels::PerAxis(vec![None, None, Some(strings(&["early", "late"]))])
    );
}

#[test]
fn table_row_labels_use_a_hidden_name() {
    let store = MemoryContainer::new();
    let table = grades()
        .with_row_labels(strings(&["r1", "r2", "r3", "r4", "r5"]))
        .unwrap();
    write_table(&store, "g", &table, &ColumnTypes::new(), &WriteOptions::default()).unwrap();
    assert!(store.paths().contains(&"/.g_rownames".to_string()));
    assert_eq!(
        read_labels(&store, "g", 0).unwrap(),
        Some(strings(&["r1", "r2", "r3", "r4", "r5"]))
    );
    assert!(attach_labels(&store, "g", 1, &strings(&["x"])).is_err());
}

#[test]
fn overwrite_replaces_the_object() {
    let store = MemoryContainer::new();
    let labelled = grades()
        .with_row_labels(strings(&["r1", "r2", "r3", "r4", "r5"]))
        .unwrap();
    write_table(&store, "t", &labelled, &ColumnTypes::new(), &WriteOptions::default()).unwrap();
    assert!(store.paths().contains(&"/.t_rownames".to_string()));
    let replacement = Table::try_new(["x"], vec![Column::Double(vec![0.25])]).unwrap();
    write_table(&store, "t", &replacement, &ColumnTypes::new(), &WriteOptions::default())
        .unwrap();
    assert_eq!(read_table(&store, "t", &TypePolicy::new()).unwrap(), replacement);

    assert_eq!(store.paths(), vec!["/t".to_string()]);

    let keep = WriteOptions::default().with_overwrite(false);
    let err = write_table(&store, "t", &grades(), &ColumnTypes::new(), &keep).unwrap_err();
    assert_eq!(err.path(), Some("t"));
    assert_eq!(read_table(&store, "t", &TypePolicy::new()).unwrap(), replacement);
}

#[test]
fn overwritten_arrays_drop_their_labels() {
    let store = MemoryContainer::new();
    let matrix = ArrayView::try_new(
        vec![2, 2],
        AxisOrder::FirstFast,
        Column::Double(vec![1.0, 2.0, 3.0, 4.0]),
    )
    .unwrap()
    .with_labels(DimLabels::PerAxis(vec![None, Some(strings(&["x", "y"]))]))
    .unwrap();
    write_array(&store, "m", &matrix, None, &WriteOptions::default()).unwrap();
    assert!(store.paths().contains(&"/m_colnames".to_string()));

    let vector = ArrayView::vector(Column::Double(vec![5.0, 6.0]));
    write_array(&store, "m", &vector, None, &WriteOptions::default()).unwrap();
    assert_eq!(store.paths(), vec!["/m".to_string()]);
    let back = read_array(&store, "m", &TypePolicy::new()).unwrap().unwrap();
    assert_eq!(back.labels(), &DimLabels::None);
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn unsupported_types_name_the_field() {
    let store = MemoryContainer::new();
    let types = ColumnTypes::new().with("grade", "utf16");
    let err = write_table(&store, "t", &grades(), &types, &WriteOptions::default()).unwrap_err();
    let TesseraError::UnsupportedFieldType { field, .. } = &err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(field.as_ref(), "grade");
    assert!(store.paths().is_empty());

    let array = ArrayView::vector(Column::Text(vec![Some("a".into())]));
    let err = write_array(&store, "v", &array, Some("float32"), &WriteOptions::default())
        .unwrap_err();
    assert!(matches!(err, TesseraError::UnsupportedFieldType { .. }));
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn strict_policies_refuse_to_guess() {
    let store = MemoryContainer::new();
    write_table(&store, "t", &grades(), &ColumnTypes::new(), &WriteOptions::default()).unwrap();
    let err = read_table(&store, "t", &TypePolicy::new().strict()).unwrap_err();
    assert!(matches!(err, TesseraError::TypeResolutionAmbiguous(..)));

    let policy = TypePolicy::new()
        .strict()
        .with_field("id", TargetType::Int32)
        .with_field("score", TargetType::Float64);
    let back = read_table(&store, "t", &policy).unwrap();
    assert_eq!(back.column("id"), grades().column("id"));
    assert_eq!(store.open_handles(), 0);
}
