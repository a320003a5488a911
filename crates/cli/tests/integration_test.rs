use chrono::NaiveDate;
use factor_platform_core::{FactorEngine, MarketDataSource, ResultStorage};
use factor_platform_data::{CsvMarketData, ParquetResultStorage};
use factor_platform_pipeline::{result_path, FactorRegistry};
use serde_json::json;

#[tokio::test]
async fn test_rmi_from_csv_to_parquet() {
    let market_dir = tempfile::tempdir().expect("Failed to create market dir");
    let results_dir = tempfile::tempdir().expect("Failed to create results dir");
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    let mut csv = String::from("timestamp,code,open,high,low,close,volume\n");
    for minute in 0..40 {
        let close = 10.0 + f64::from(minute) * 0.1;
        csv.push_str(&format!(
            "2024-03-01T09:{:02}:00Z,600000.SH,{close},{close},{close},{close},1000\n",
            minute + 10
        ));
    }
    let day_dir = market_dir.path().join("600000.SH");
    std::fs::create_dir_all(&day_dir).unwrap();
    std::fs::write(day_dir.join("20240301.csv"), csv).unwrap();

    let market = CsvMarketData::new(market_dir.path());
    let series = market.fetch("600000.SH", date).await.expect("Failed to load bars");
    assert_eq!(series.bars.len(), 40);

    let registry = FactorRegistry::with_builtins();
    let mut factor = registry.create("RMI").expect("RMI should be built in");
    factor.set_data(series);
    factor.set_params(&json!({"period": 10, "momentum": 3})).unwrap();
    factor.run().expect("RMI failed");
    let output = factor.result().unwrap();

    assert_eq!(output.len(), 40 - 3 - 10 + 1);
    assert_eq!(output.last_value(), Some(100.0));

    let storage = ParquetResultStorage::new(results_dir.path());
    let path = result_path("stock", "RMI", date, "600000.SH");
    assert!(storage.put(&path, &output).await.unwrap());

    let stored = storage.get(&path).await.expect("Failed to read result");
    assert_eq!(stored, output);
}
