use serde::{Deserialize, Serialize};

use crate::error::FeedError;

// ════════════════════════════════════════════════════════════════
//  Overflow Policy
// ════════════════════════════════════════════════════════════════

/// Стратегия поведения при переполнении bounded канала подписчика.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// try_send(): если канал полон — дропнуть сообщение, залогировать.
    Drop,
    /// .send().await: ждать пока появится место (back-pressure).
    #[serde(alias = "backpressure")]
    BackPressure,
}

// ════════════════════════════════════════════════════════════════
//  GeoPoint
// ════════════════════════════════════════════════════════════════

/// Геокоордината крушения. На проводе — объект `locationGPS`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

// ════════════════════════════════════════════════════════════════
//  CrashRecord
// ════════════════════════════════════════════════════════════════

/// Одно сообщение входящего потока после schema-check.
///
/// `value` — полный payload as-is (pass-through для list view),
/// `location` — извлечённая из `locationGPS` координата.
/// Конструирование через [`CrashRecord::parse`] — единственная точка
/// валидации: либо запись целиком валидна, либо named Format error.
#[derive(Debug, Clone)]
pub struct CrashRecord {
    value: serde_json::Value,
    location: GeoPoint,
}

impl CrashRecord {
    /// Разобрать текстовый фрейм потока.
    ///
    /// Требования к схеме: JSON-объект с полем `locationGPS`,
    /// внутри — числовые конечные `lon` и `lat`. Всё остальное
    /// содержимое payload'а не интерпретируется.
    pub fn parse(text: &str) -> Result<Self, FeedError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(FeedError::format_err("payload is not a JSON object"));
        }

        let gps = value
            .get("locationGPS")
            .ok_or_else(|| FeedError::format_err("missing field 'locationGPS'"))?;

        let lon = read_coord(gps, "lon")?;
        let lat = read_coord(gps, "lat")?;

        Ok(Self {
            value,
            location: GeoPoint { lon, lat },
        })
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }

    /// Полный payload.
    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Pretty-printed перепечатка payload'а (tooltip маркера).
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.value).unwrap_or_default()
    }
}

// Records сериализуются как исходный payload, без обёртки.
impl Serialize for CrashRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

fn read_coord(gps: &serde_json::Value, field: &str) -> Result<f64, FeedError> {
    let v = gps
        .get(field)
        .ok_or_else(|| FeedError::format_err(format!("missing field 'locationGPS.{field}'")))?;
    let n = v
        .as_f64()
        .ok_or_else(|| FeedError::format_err(format!("'locationGPS.{field}' is not a number")))?;
    if !n.is_finite() {
        return Err(FeedError::format_err(format!(
            "'locationGPS.{field}' is not finite"
        )));
    }
    Ok(n)
}

// ════════════════════════════════════════════════════════════════
//  Marker
// ════════════════════════════════════════════════════════════════

/// Точка на карте, производная 1:1 от записи.
#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub lng: f64,
    pub lat: f64,
    /// Tooltip: pretty-printed payload записи.
    pub message: String,
    /// Просьба карте сфокусироваться на маркере.
    pub focus: bool,
}

impl Marker {
    fn for_record(record: &CrashRecord) -> Self {
        let loc = record.location();
        Self {
            lng: loc.lon,
            lat: loc.lat,
            message: record.pretty(),
            focus: true,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  FeedEntry
// ════════════════════════════════════════════════════════════════

/// Запись + её маркер как один элемент live-последовательности.
///
/// Комбинированный кортеж делает инвариант спаренности структурным:
/// две "параллельные коллекции" наружу — это две проекции одной.
#[derive(Debug, Clone, Serialize)]
pub struct FeedEntry {
    pub record: CrashRecord,
    pub marker: Marker,
}

impl FeedEntry {
    pub fn new(record: CrashRecord) -> Self {
        let marker = Marker::for_record(&record);
        Self { record, marker }
    }
}
