use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// One of the seven logical weekday buckets. Not a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Mon,
        Day::Tue,
        Day::Wed,
        Day::Thu,
        Day::Fri,
        Day::Sat,
        Day::Sun,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Mon => "mon",
            Day::Tue => "tue",
            Day::Wed => "wed",
            Day::Thu => "thu",
            Day::Fri => "fri",
            Day::Sat => "sat",
            Day::Sun => "sun",
        }
    }

    /// Accepts short (`mon`) and long (`monday`) names, any case.
    pub fn parse(s: &str) -> Option<Day> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mon" | "monday" => Some(Day::Mon),
            "tue" | "tuesday" => Some(Day::Tue),
            "wed" | "wednesday" => Some(Day::Wed),
            "thu" | "thursday" => Some(Day::Thu),
            "fri" | "friday" => Some(Day::Fri),
            "sat" | "saturday" => Some(Day::Sat),
            "sun" | "sunday" => Some(Day::Sun),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn from_weekday(w: Weekday) -> Day {
        Day::ALL[w.num_days_from_monday() as usize]
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dedupes and sorts Mon→Sun.
pub fn normalize_days<I>(days: I) -> Vec<Day>
where
    I: IntoIterator<Item = Day>,
{
    days.into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Fixed, injected mapping between the logical weekdays and the date keys
/// rows are stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayTable {
    keys: [String; 7],
}

impl Default for DayTable {
    fn default() -> Self {
        // 2024-01-01 is a Monday.
        Self {
            keys: [
                "2024-01-01".to_string(),
                "2024-01-02".to_string(),
                "2024-01-03".to_string(),
                "2024-01-04".to_string(),
                "2024-01-05".to_string(),
                "2024-01-06".to_string(),
                "2024-01-07".to_string(),
            ],
        }
    }
}

impl DayTable {
    /// Builds a table from `day -> YYYY-MM-DD`. Every weekday must be present,
    /// keys must be distinct, and each date must actually fall on its weekday.
    pub fn from_map(map: &HashMap<Day, String>) -> Result<DayTable, String> {
        let mut keys: [String; 7] = Default::default();
        let mut seen = BTreeSet::new();
        for day in Day::ALL {
            let Some(raw) = map.get(&day) else {
                return Err(format!("missing date key for {}", day));
            };
            let key = raw.trim().to_string();
            let date = NaiveDate::parse_from_str(&key, "%Y-%m-%d")
                .map_err(|e| format!("invalid date key for {}: {} ({})", day, key, e))?;
            if Day::from_weekday(date.weekday()) != day {
                return Err(format!("date key {} is not a {}", key, day));
            }
            if !seen.insert(key.clone()) {
                return Err(format!("duplicate date key {}", key));
            }
            keys[day.index()] = key;
        }
        Ok(DayTable { keys })
    }

    pub fn key(&self, day: Day) -> &str {
        &self.keys[day.index()]
    }

    pub fn day_for_key(&self, key: &str) -> Option<Day> {
        Day::ALL.into_iter().find(|d| self.keys[d.index()] == key)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for day in Day::ALL {
            obj.insert(
                day.as_str().to_string(),
                serde_json::Value::String(self.key(day).to_string()),
            );
        }
        serde_json::Value::Object(obj)
    }

    pub fn from_json(v: &serde_json::Value) -> Result<DayTable, String> {
        let obj = v
            .as_object()
            .ok_or_else(|| "dayDates must be an object".to_string())?;
        let mut map = HashMap::new();
        for (k, val) in obj {
            let day = Day::parse(k).ok_or_else(|| format!("unknown day: {}", k))?;
            let s = val
                .as_str()
                .ok_or_else(|| format!("dayDates.{} must be a string", k))?;
            map.insert(day, s.to_string());
        }
        DayTable::from_map(&map)
    }
}
