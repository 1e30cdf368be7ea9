//! Loading panels from files and slicing them into windows.

use std::io::Write;
use svcj_data::{DataError, PanelLoadOptions, ReturnPanel, ValueKind, WindowSlicer};

fn temp_csv(name: &str, content: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("svcj_{}_{}.csv", name, std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_price_file_to_windows() {
    let mut content = String::from("date,AAA,BBB\n");
    let mut a: f64 = 100.0;
    for i in 0..40 {
        a *= if i % 3 == 0 { 1.01 } else { 0.995 };
        let b = if i < 10 { String::new() } else { format!("{}", 50.0 + i as f64) };
        content.push_str(&format!("2024-{:02}-{:02},{},{}\n", 1 + i / 28, 1 + i % 28, a, b));
    }
    let path = temp_csv("prices", &content);

    let options = PanelLoadOptions {
        values: ValueKind::Prices,
        ..Default::default()
    };
    let panel = ReturnPanel::from_csv_path(&path, &options).unwrap();
    std::fs::remove_file(&path).unwrap();

    // The first row has no return for any asset
    assert_eq!(panel.n_dates(), 39);
    let aaa = panel.series_for("AAA").unwrap();
    let bbb = panel.series_for("BBB").unwrap();
    assert_eq!(aaa.len(), 39);
    // BBB starts trading on row 10, so its first return is on row 11
    assert_eq!(bbb.len(), 29);
    assert!((aaa.returns()[0] - 0.995f64.ln()).abs() < 1e-12);

    let windows: Vec<_> = WindowSlicer::new(bbb, 20, 3).unwrap().iter().collect();
    assert_eq!(windows.len(), 4);
    assert_eq!(windows[3].as_of(), bbb.dates()[29 - 1]);

    assert!(matches!(
        WindowSlicer::new(bbb, 30, 1),
        Err(DataError::InsufficientData { required: 30, actual: 29, .. })
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let result = ReturnPanel::from_csv_path("/nonexistent/returns.csv", &PanelLoadOptions::default());
    assert!(matches!(result, Err(DataError::Io(_))));
}

#[test]
fn test_custom_date_column() {
    let path = temp_csv("custom", "Date,X\n2024-01-02,0.01\n2024-01-03,-0.02\n");
    let options = PanelLoadOptions {
        date_column: "Date".to_string(),
        ..Default::default()
    };
    let panel = ReturnPanel::from_csv_path(&path, &options).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(panel.assets().collect::<Vec<_>>(), vec!["X"]);
    assert_eq!(panel.series_for("X").unwrap().returns(), &[0.01, -0.02]);
}
