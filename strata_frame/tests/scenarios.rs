use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_frame::{
    Column, DataType, DateFormat, EngineConfig, Error, Frame, JoinEngine, Selection, Value,
};

fn s(v: &str) -> Value {
    Value::String(v.into())
}

fn sorted_rows(frame: &Frame) -> Vec<String> {
    let mut rows: Vec<String> = frame.to_rows().iter().map(|r| format!("{r:?}")).collect();
    rows.sort();
    rows
}

#[test]
fn join_fans_out_per_key() {
    let _ = strata_log::init_stderr("strata_frame=debug");
    let mut r = Frame::new("R");
    r.add(Column::from_vec(vec![1i64, 2, 2, 3]), Some("id"));
    r.add(Column::from_strs(["a", "b", "c", "d"]), Some("val"));
    let mut s_frame = Frame::new("S");
    s_frame.add(Column::from_vec(vec![2i64, 2, 3, 5]), Some("id"));
    s_frame.add(Column::from_strs(["x", "y", "z", "w"]), Some("tag"));

    let joined = r.equi_join_by_names(&s_frame, "id", "id").unwrap();
    assert_eq!(joined.names(), vec![Some("id"), Some("val"), Some("S.tag")]);

    let mut expected = Frame::new("R");
    expected.add(Column::from_vec(vec![2i64, 2, 2, 2, 3]), None);
    expected.add(Column::from_strs(["b", "b", "c", "c", "d"]), None);
    expected.add(Column::from_strs(["x", "y", "x", "y", "z"]), None);
    assert_eq!(sorted_rows(&joined), sorted_rows(&expected));
    assert_eq!(joined.to_rows()[4], vec![Value::Int64(3), s("d"), s("z")]);
}

#[test]
fn join_rejects_mismatched_key_types() {
    let mut a = Frame::new("a");
    a.add(Column::from_vec(vec![1i32]), None);
    let mut b = Frame::new("b");
    b.add(Column::from_vec(vec![1i64]), None);
    assert!(matches!(a.equi_join(&b, 0, 0), Err(Error::TypeMismatch { .. })));
    assert!(matches!(a.equi_join(&b, 0, 4), Err(Error::InvalidColumnReference(_))));
}

#[test]
fn string_join_with_long_keys_is_verified() {
    let mut a = Frame::new("a");
    a.add(
        Column::from_strs(["a fairly long key", "short", "another long key!", "short"]),
        Some("k"),
    );
    a.add(Column::from_vec(vec![0u32, 1, 2, 3]), Some("n"));
    let mut b = Frame::new("b");
    b.add(
        Column::from_strs(["short", "another long key!", "missing entirely"]),
        Some("k"),
    );
    b.add(Column::from_vec(vec![10u32, 20, 30]), Some("m"));

    let joined = a.equi_join(&b, 0, 0).unwrap();
    let mut pairs: Vec<(u32, u32)> = joined
        .column_by_name("n")
        .unwrap()
        .values::<u32>()
        .unwrap()
        .iter()
        .copied()
        .zip(joined.column_by_name("b.m").unwrap().values::<u32>().unwrap().iter().copied())
        .collect();
    pairs.sort();
    assert_eq!(pairs, vec![(1, 10), (2, 20), (3, 10)]);
}

#[test]
fn string_join_mixes_short_and_long_keys() {
    let mut a = Frame::new("a");
    a.add(Column::from_strs(["ab", "cd", "ab"]), Some("k"));
    let mut b = Frame::new("b");
    b.add(Column::from_strs(["ab", "a much longer key"]), Some("k"));
    b.add(Column::from_vec(vec![10u32, 20]), Some("m"));

    for joined in [a.equi_join(&b, 0, 0).unwrap(), b.equi_join(&a, 0, 0).unwrap()] {
        assert_eq!(joined.len(), 2);
        let keys = joined.column(0).unwrap().to_values();
        assert!(keys.iter().all(|k| *k == s("ab")));
    }
}

#[test]
fn join_on_dates() {
    let mut a = Frame::new("orders");
    a.add(
        Column::from_strs(["2024-01-02", "2023-12-31", "2024-01-02"])
            .to_date(true, DateFormat::YearMonthDay)
            .unwrap(),
        Some("day"),
    );
    let mut b = Frame::new("rates");
    b.add(
        Column::from_strs(["01022024", "02012024"])
            .to_date(false, DateFormat::DayMonthYear)
            .unwrap(),
        Some("day"),
    );
    b.add(Column::from_vec(vec![1.5f32, 2.5]), Some("rate"));
    let joined = a.equi_join(&b, 0, 0).unwrap();
    assert_eq!(joined.len(), 2);
    assert_eq!(joined.column(0).unwrap().data_type(), DataType::Date);
    assert_eq!(joined.column(1).unwrap().values::<f32>(), Some(&[2.5, 2.5][..]));
}

#[test]
fn multiplicity_law_holds_on_both_paths() {
    let mut rng = StdRng::seed_from_u64(9);
    let left: Vec<i64> = (0..500).map(|_| rng.gen_range(-20..20)).collect();
    let right: Vec<i64> = (0..350).map(|_| rng.gen_range(-5..40)).collect();
    let mut a = Frame::new("a");
    a.add(Column::from_vec(left.clone()), Some("k"));
    let mut b = Frame::new("b");
    b.add(Column::from_vec(right.clone()), Some("k"));
    b.add(Column::from_vec((0..350u32).collect()), Some("row"));

    let count = |v: &[i64]| {
        let mut m: HashMap<i64, usize> = HashMap::new();
        for &k in v {
            *m.entry(k).or_default() += 1;
        }
        m
    };
    let (lc, rc) = (count(&left[..]), count(&right[..]));

    let small = JoinEngine::new(EngineConfig {
        parallel_threshold: 16,
        workers: Some(2),
        ..EngineConfig::default()
    });
    for joined in [a.equi_join(&b, 0, 0).unwrap(), small.equi_join(&a, &b, 0, 0).unwrap()] {
        let keys = joined.column(0).unwrap().values::<i64>().unwrap();
        let out = count(keys);
        for (k, n) in &out {
            assert_eq!(*n, lc[k] * rc[k], "key {k}");
        }
        let expected: usize = lc.iter().map(|(k, n)| n * rc.get(k).copied().unwrap_or(0)).sum();
        assert_eq!(keys.len(), expected);
    }
    assert_eq!(
        a.equi_join(&b, 0, 0).unwrap(),
        small.equi_join(&a, &b, 0, 0).unwrap()
    );
}

#[test]
fn multi_key_sort_is_lexicographic_and_stable() {
    let mut rng = StdRng::seed_from_u64(3);
    let n = 2_000;
    let mut f = Frame::new("t");
    f.add(Column::from_vec((0..n).map(|_| rng.gen_range(0..5u16)).collect()), Some("a"));
    let words = ["pear", "apple", "apples and more apples", "fig"];
    f.add(Column::from_strs((0..n).map(|_| words[rng.gen_range(0..4)])), Some("b"));
    f.add(Column::from_vec((0..n as u32).collect()), Some("row"));
    f.sort_by_names(&["a", "b"], &[false, true]).unwrap();

    let rows = f.to_rows();
    for w in rows.windows(2) {
        let (x, y) = (&w[0], &w[1]);
        let (Value::UInt16(xa), Value::UInt16(ya)) = (&x[0], &y[0]) else { panic!() };
        let (Value::String(xb), Value::String(yb)) = (&x[1], &y[1]) else { panic!() };
        let (Value::UInt32(xr), Value::UInt32(yr)) = (&x[2], &y[2]) else { panic!() };
        assert!(xa > ya || (xa == ya && (xb < yb || (xb == yb && xr < yr))));
    }
}

#[test]
fn select_then_flush_and_union() {
    let mut f = Frame::new("f");
    f.add(Column::from_strs(["foo", "bar", "baz"]), Some("s"));
    let picked = f.select(&Selection::Indices(vec![2, 0]), None).unwrap();
    let col = picked.column(0).unwrap().clone().flush();
    assert_eq!(col.bytes().map(<[u8]>::len), Some(8));
    assert_eq!(col.to_values(), vec![s("baz"), s("foo")]);

    let mut two = Frame::new("two");
    two.add(Column::from_vec(vec![1u8]), None);
    two.add(Column::from_vec(vec![2u8]), None);
    let mut three = two.clone();
    three.add(Column::from_vec(vec![3u8]), None);
    assert!(matches!(two.unionize(&three), Err(Error::SchemaMismatch(_))));
}

#[test]
fn cast_and_filter_pipeline() {
    let mut f = Frame::new("raw");
    f.add(Column::from_strs(["12.5", "-3", "7", ""]), Some("amount"));
    f.add(Column::from_strs(["y", "n", "Y", "n"]), Some("keep"));

    let amount = f.column_mut(0).unwrap();
    *amount = amount.clone().cast(DataType::Float64).unwrap();
    let keep = f.remove_by_name("keep").unwrap().cast(DataType::Boolean).unwrap();
    let mask = keep.values::<bool>().unwrap().to_vec();

    let kept = f.select(&Selection::Mask(mask), Some("kept")).unwrap();
    assert_eq!(kept.column(0).unwrap().values::<f64>(), Some(&[12.5, 7.0][..]));
    assert_eq!(kept.name(), "kept");
}
