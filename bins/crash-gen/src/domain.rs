use serde_json::{Map, Value, json};

use feed_api::{date_from_ms, now_ms};

use super::error::GenError;

// ═══════════════════════════════════════════════════════════════
//  RNG (xorshift64)
// ═══════════════════════════════════════════════════════════════

pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: i64) -> Self {
        let state = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
                | 1 // ensure non-zero
        } else {
            seed as u64
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Returns f64 in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / ((1u64 << 53) as f64)
    }

    pub fn next_intn(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

// ═══════════════════════════════════════════════════════════════
//  Synthetic crashes
// ═══════════════════════════════════════════════════════════════

struct Site {
    location: &'static str,
    lon: f64,
    lat: f64,
}

const SITES: &[Site] = &[
    Site { location: "Near Moscow, Russia", lon: 37.62, lat: 55.75 },
    Site { location: "Near Warsaw, Poland", lon: 21.01, lat: 52.23 },
    Site { location: "Off the coast of Ireland", lon: -10.27, lat: 53.41 },
    Site { location: "Andes mountains, Chile", lon: -70.65, lat: -33.45 },
    Site { location: "Near Tokyo, Japan", lon: 139.69, lat: 35.69 },
    Site { location: "Sahara desert, Algeria", lon: 3.05, lat: 28.03 },
    Site { location: "Near Sydney, Australia", lon: 151.21, lat: -33.87 },
    Site { location: "Near Anchorage, Alaska", lon: -149.90, lat: 61.22 },
    Site { location: "Amazon basin, Brazil", lon: -60.02, lat: -3.11 },
];

const OPERATORS: &[&str] = &[
    "Aeroflot",
    "LOT Polish Airlines",
    "Pan American World Airways",
    "Air France",
    "Japan Air Lines",
    "Qantas",
    "Varig",
];

const AIRCRAFT: &[&str] = &[
    "Douglas DC-3",
    "Boeing 707",
    "Tupolev TU-154",
    "Lockheed Constellation",
    "Ilyushin IL-18",
    "De Havilland Comet",
];

/// Генератор синтетических payload'ов: фиксированная таблица мест
/// с джиттером координат.
pub struct Synth {
    rng: Rng,
    next_id: u64,
}

impl Synth {
    pub fn new(seed: i64) -> Self {
        Self {
            rng: Rng::new(seed),
            next_id: 1,
        }
    }

    pub fn next(&mut self) -> Value {
        let id = self.next_id;
        self.next_id += 1;

        let site = &SITES[self.rng.next_intn(SITES.len())];
        let lon = site.lon + (self.rng.next_f64() * 2.0 - 1.0) * 0.5;
        let lat = site.lat + (self.rng.next_f64() * 2.0 - 1.0) * 0.25;

        let aboard = self.rng.next_intn(300) + 1;
        let fatalities = self.rng.next_intn(aboard + 1);

        json!({
            "id": id,
            "date": date_from_ms(now_ms()),
            "location": site.location,
            "operator": OPERATORS[self.rng.next_intn(OPERATORS.len())],
            "aircraftType": AIRCRAFT[self.rng.next_intn(AIRCRAFT.len())],
            "aboard": { "total": aboard },
            "fatalities": { "total": fatalities },
            "locationGPS": { "lon": lon, "lat": lat },
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  CSV replay (исторические крушения, 13 колонок)
// ═══════════════════════════════════════════════════════════════

/// Порядок колонок исходного датасета.
const COL_DATE: usize = 0;
const COL_TIME: usize = 1;
const COL_LOCATION: usize = 2;
const COL_OPERATOR: usize = 3;
const COL_FLIGHT_NO: usize = 4;
const COL_ROUTE: usize = 5;
const COL_TYPE: usize = 6;
const COL_REGISTRATION: usize = 7;
const COL_SERIAL: usize = 8;
const COL_ABOARD: usize = 9;
const COL_FATALITIES: usize = 10;
const COL_GROUND: usize = 11;
const COL_SUMMARY: usize = 12;
const NUM_COLS: usize = 13;

pub struct CsvReader {
    rows: Vec<Vec<String>>,
    pos: usize,
    pub path: String,
}

impl CsvReader {
    /// Прочитать файл, пропустить заголовок, отбросить битые строки.
    pub fn open(path: &str) -> Result<Self, GenError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GenError::Config(format!("cannot open {path}: {e}")))?;

        let mut rows = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if i == 0 {
                continue; // header
            }
            if line.trim().is_empty() {
                continue;
            }
            let fields = parse_fields(line);
            if fields.len() != NUM_COLS {
                tracing::warn!(line = i + 1, got = fields.len(), "bad column count, skipping row");
                continue;
            }
            rows.push(fields);
        }

        if rows.is_empty() {
            return Err(GenError::Config(format!("no usable rows in {path}")));
        }

        Ok(Self {
            rows,
            pos: 0,
            path: path.to_string(),
        })
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn done(&self) -> bool {
        self.pos >= self.rows.len()
    }

    /// Следующая строка как payload. Датасет не несёт координат —
    /// `locationGPS` синтезируется, чтобы дашборд мог строить маркеры.
    pub fn next_payload(&mut self, id: u64, rng: &mut Rng) -> Option<Value> {
        if self.done() {
            return None;
        }
        let fields = &self.rows[self.pos];
        self.pos += 1;
        Some(row_to_payload(fields, id, rng))
    }
}

/// Разбирает одну RFC 4180 строку (delimiter `,`) на поля с учётом quoting.
fn parse_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    let mut field = String::new();

    loop {
        if chars.peek() == Some(&'"') {
            // Quoted field (RFC 4180 rule 5-7)
            chars.next(); // consume opening quote
            loop {
                match chars.next() {
                    Some('"') => {
                        if chars.peek() == Some(&'"') {
                            // Escaped quote: "" → "
                            chars.next();
                            field.push('"');
                        } else {
                            break;
                        }
                    }
                    Some(c) => field.push(c),
                    None => break, // EOF inside quote — best effort
                }
            }
            // Consume until delimiter or end
            loop {
                match chars.peek() {
                    Some(&',') => {
                        chars.next();
                        break;
                    }
                    Some(_) => {
                        chars.next();
                    }
                    None => break,
                }
            }
        } else {
            loop {
                match chars.peek() {
                    Some(&',') => {
                        chars.next();
                        break;
                    }
                    Some(_) => field.push(chars.next().unwrap()),
                    None => break,
                }
            }
        }

        fields.push(std::mem::take(&mut field));

        if chars.peek().is_none() && !line.ends_with(',') {
            break;
        }
        if chars.peek().is_none() {
            // Trailing delimiter → one more empty field
            fields.push(String::new());
            break;
        }
    }

    fields
}

/// `?` в датасете означает отсутствующее значение.
fn present(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.is_empty() || s == "?" { None } else { Some(s) }
}

/// Разобрать "264 (passengers:252 crew:12)" → {total, passengers, crew}.
fn parse_aboard(s: &str) -> Value {
    let mut out = Map::new();
    let (total, rest) = match s.split_once('(') {
        Some((t, r)) => (t, Some(r)),
        None => (s, None),
    };
    if let Ok(n) = total.trim().parse::<i64>() {
        out.insert("total".into(), n.into());
    }
    if let Some(rest) = rest {
        for part in rest.trim_end_matches(')').split_whitespace() {
            if let Some((name, val)) = part.split_once(':') {
                if let Ok(n) = val.parse::<i64>() {
                    out.insert(name.to_string(), n.into());
                }
            }
        }
    }
    Value::Object(out)
}

fn row_to_payload(fields: &[String], id: u64, rng: &mut Rng) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), id.into());

    if let Some(date) = present(&fields[COL_DATE]) {
        let date = match present(&fields[COL_TIME]) {
            Some(time) => format!("{date} {time}"),
            None => date.to_string(),
        };
        out.insert("date".into(), date.into());
    }

    let text_cols = [
        ("location", COL_LOCATION),
        ("operator", COL_OPERATOR),
        ("flightNo", COL_FLIGHT_NO),
        ("route", COL_ROUTE),
        ("aircraftType", COL_TYPE),
        ("registration", COL_REGISTRATION),
        ("serialNumber", COL_SERIAL),
        ("summary", COL_SUMMARY),
    ];
    for (name, col) in text_cols {
        if let Some(v) = present(&fields[col]) {
            out.insert(name.into(), v.into());
        }
    }

    if let Some(v) = present(&fields[COL_ABOARD]) {
        out.insert("aboard".into(), parse_aboard(v));
    }
    if let Some(v) = present(&fields[COL_FATALITIES]) {
        out.insert("fatalities".into(), parse_aboard(v));
    }
    if let Some(v) = present(&fields[COL_GROUND]) {
        if let Ok(n) = v.parse::<i64>() {
            out.insert("ground".into(), n.into());
        }
    }

    // датасет без координат — берём случайную точку из таблицы мест
    let site = &SITES[rng.next_intn(SITES.len())];
    let lon = site.lon + (rng.next_f64() * 2.0 - 1.0) * 0.5;
    let lat = site.lat + (rng.next_f64() * 2.0 - 1.0) * 0.25;
    out.insert("locationGPS".into(), json!({ "lon": lon, "lat": lat }));

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_api::CrashRecord;

    #[test]
    fn rng_is_deterministic_for_fixed_seed() {
        let mut a = Rng::new(42);
        let mut b = Rng::new(42);
        for _ in 0..10 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn synth_payload_passes_schema_check() {
        let mut synth = Synth::new(7);
        for expected_id in 1..=5u64 {
            let payload = synth.next();
            let text = payload.to_string();
            let rec = CrashRecord::parse(&text).unwrap();
            assert_eq!(rec.value()["id"].as_u64().unwrap(), expected_id);
            assert!(rec.location().lat.abs() <= 90.0);
        }
    }

    #[test]
    fn parse_fields_handles_quoting() {
        let fields = parse_fields(r#"a,"b, с запятой","he said ""hi""",d"#);
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[1], "b, с запятой");
        assert_eq!(fields[2], r#"he said "hi""#);
    }

    #[test]
    fn parse_fields_trailing_delimiter() {
        let fields = parse_fields("a,b,");
        assert_eq!(fields, vec!["a", "b", ""]);
    }

    #[test]
    fn parse_aboard_full_form() {
        let v = parse_aboard("264 (passengers:252 crew:12)");
        assert_eq!(v["total"], 264);
        assert_eq!(v["passengers"], 252);
        assert_eq!(v["crew"], 12);
    }

    #[test]
    fn row_to_payload_skips_missing_and_adds_gps() {
        let mut rng = Rng::new(1);
        let fields: Vec<String> = vec![
            "September 02, 1998", "22:18", "Off Nova Scotia, Canada",
            "Swissair", "111", "New York - Geneva", "McDonnell Douglas MD-11",
            "HB-IWF", "?", "215 (passengers:201 crew:14)", "229", "?", "?",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let payload = row_to_payload(&fields, 9, &mut rng);
        assert_eq!(payload["id"], 9);
        assert_eq!(payload["date"], "September 02, 1998 22:18");
        assert_eq!(payload["operator"], "Swissair");
        assert!(payload.get("serialNumber").is_none());
        assert!(payload.get("summary").is_none());
        assert_eq!(payload["aboard"]["passengers"], 201);

        // и через schema-check дашборда
        let rec = CrashRecord::parse(&payload.to_string()).unwrap();
        assert!(rec.location().lon.is_finite());
    }
}
