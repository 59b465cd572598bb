/// Observation tables. Keys are canonical text: ISO date for daily rows,
/// RFC 3339 UTC instant for hourly rows.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS DailyTemperature (
    Date TEXT PRIMARY KEY,
    MinTemperature REAL,
    MaxTemperature REAL
);

CREATE TABLE IF NOT EXISTS HourlyTemperature (
    Timestamp TEXT PRIMARY KEY,
    Temperature REAL
);
"#;

pub const UPSERT_DAILY: &str = "INSERT OR REPLACE INTO DailyTemperature (Date, MinTemperature, MaxTemperature)
     VALUES (?, ?, ?)";

pub const UPSERT_HOURLY: &str =
  "INSERT OR REPLACE INTO HourlyTemperature (Timestamp, Temperature) VALUES (?, ?)";

pub const SELECT_DAILY: &str =
  "SELECT Date, MinTemperature, MaxTemperature FROM DailyTemperature";

pub const SELECT_HOURLY: &str = "SELECT Timestamp, Temperature FROM HourlyTemperature";
