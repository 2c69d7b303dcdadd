//! Fact extraction from a computed chart document.
//!
//! The document comes from an external compute provider and any part of it
//! may be missing or mis-shaped, so every lookup goes through [`dig`] and
//! yields an `Option`.

use crate::birth::ResolvedBirth;
use crate::period::{select_active, PeriodNode, PeriodSelector};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FactsError {
    #[error("cannot read chart document: {0}")]
    Io(#[from] std::io::Error),

    #[error("chart document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Follow `path` through nested objects.
pub fn dig<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |cur, key| cur.as_object()?.get(*key))
}

fn dig_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    dig(value, path).and_then(Value::as_str)
}

/// Ruling planet of a sidereal sign (Sanskrit name, common spellings).
pub fn sign_lord(sign: &str) -> Option<&'static str> {
    let lord = match sign {
        "Mesha" => "Mars",
        "Vrishabha" | "Vrishabh" => "Venus",
        "Mithuna" => "Mercury",
        "Karka" | "Karkaṭa" => "Moon",
        "Simha" => "Sun",
        "Kanya" => "Mercury",
        "Tula" => "Venus",
        "Vrischika" | "Vrichika" => "Mars",
        "Dhanu" => "Jupiter",
        "Makara" => "Saturn",
        "Kumbha" => "Saturn",
        "Meena" => "Jupiter",
        _ => return None,
    };
    Some(lord)
}

pub fn sign_english(sign: &str) -> Option<&'static str> {
    let name = match sign {
        "Mesha" => "Aries",
        "Vrishabha" | "Vrishabh" => "Taurus",
        "Mithuna" => "Gemini",
        "Karka" | "Karkaṭa" => "Cancer",
        "Simha" => "Leo",
        "Kanya" => "Virgo",
        "Tula" => "Libra",
        "Vrischika" | "Vrichika" => "Scorpio",
        "Dhanu" => "Sagittarius",
        "Makara" => "Capricorn",
        "Kumbha" => "Aquarius",
        "Meena" => "Pisces",
        _ => return None,
    };
    Some(name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivePeriod {
    pub name: String,
    pub start: String,
    pub end: String,
}

impl From<&PeriodNode> for ActivePeriod {
    fn from(p: &PeriodNode) -> Self {
        Self {
            name: p.name.clone(),
            start: p.start.clone(),
            end: p.end.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub sign: Option<String>,
    pub house: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occupant {
    pub planet: String,
    pub sign: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseInfo {
    pub sign: String,
    pub lord: Option<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartFacts {
    pub moon_sign: Option<String>,
    pub moon_nakshatra: Option<String>,
    pub place: Option<String>,
    /// `date time offset` as recorded in the document.
    pub datetime: String,
    pub ascendant: Option<String>,
    pub asc_degree: Option<f64>,
    pub mahadasha: Option<ActivePeriod>,
    pub antardasha: Option<ActivePeriod>,
    pub placements: BTreeMap<String, Placement>,
    pub by_house: BTreeMap<u32, Vec<Occupant>>,
    pub houses: BTreeMap<u32, HouseInfo>,
    pub yoga_summaries: Value,
}

fn birth_instant(doc: &Value) -> Option<DateTime<Utc>> {
    let date = dig_str(doc, &["meta", "birth", "date"])?;
    let time = dig_str(doc, &["meta", "birth", "time"]).filter(|t| !t.trim().is_empty())?;
    let tz = dig_str(doc, &["meta", "birth", "timezone"]).unwrap_or_default();
    PeriodSelector::utc()
        .normalize(&format!("{}T{}{}", date, time, tz))
        .map_err(|e| debug!(error = %e, "birth instant unreadable"))
        .ok()
}

fn house_number(block: &Value) -> Option<u32> {
    dig(block, &["house", "number"])
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0)
}

/// Walk a chart document and pull out the facts a report needs.
///
/// `reference` is the instant at which the active periods are chosen,
/// normally now.
pub fn extract_facts(doc: &Value, reference: DateTime<Utc>) -> ChartFacts {
    let empty = Value::Null;
    let kundli = dig(doc, &["kundli", "data"]).unwrap_or(&empty);

    let mut facts = ChartFacts {
        moon_sign: dig_str(kundli, &["nakshatra_details", "chandra_rasi", "name"]).map(str::to_string),
        moon_nakshatra: dig_str(kundli, &["nakshatra_details", "nakshatra", "name"]).map(str::to_string),
        place: dig_str(doc, &["meta", "birth", "location"]).map(str::to_string),
        yoga_summaries: dig(kundli, &["yoga_details"])
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| json!([])),
        ..Default::default()
    };

    let date = dig_str(doc, &["meta", "birth", "date"]).unwrap_or_default();
    let time = dig_str(doc, &["meta", "birth", "time"]).unwrap_or_default();
    let tz = dig_str(doc, &["meta", "birth", "timezone"]).unwrap_or_default();
    facts.datetime = format!("{} {} {}", date, time, tz).trim().to_string();

    let houses: &[Value] = dig(doc, &["divisional", "lagna", "data", "divisional_positions"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for block in houses {
        let sign = dig_str(block, &["rasi", "name"]);
        let number = house_number(block);
        let positions: &[Value] = block
            .get("planet_positions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for pos in positions {
            let Some(planet) = dig_str(pos, &["planet", "name"]) else {
                continue;
            };
            if planet == "Ascendant" {
                if facts.ascendant.is_none() {
                    facts.ascendant = sign.map(str::to_string);
                    facts.asc_degree = pos.get("sign_degree").and_then(Value::as_f64);
                }
                continue;
            }
            facts.placements.insert(
                planet.to_string(),
                Placement {
                    sign: sign.map(str::to_string),
                    house: number,
                },
            );
            if let Some(n) = number {
                facts.by_house.entry(n).or_default().push(Occupant {
                    planet: planet.to_string(),
                    sign: sign.map(str::to_string),
                });
            }
        }

        if let (Some(n), Some(s)) = (number, sign) {
            facts.houses.insert(
                n,
                HouseInfo {
                    sign: s.to_string(),
                    lord: sign_lord(s),
                },
            );
        }
    }

    let dasha = kundli
        .get("vimshottari_dasha")
        .filter(|v| v.is_object())
        .unwrap_or(kundli);
    let birth = birth_instant(doc);
    let majors = dasha
        .get("dasha_periods")
        .and_then(PeriodNode::list_from_value)
        .unwrap_or_default();

    if let Some(major) = select_active(&majors, reference, birth) {
        facts.antardasha = select_active(&major.children, reference, birth).map(ActivePeriod::from);
        facts.mahadasha = Some(ActivePeriod::from(major));
    }

    facts
}

/// Assemble the document shape [`extract_facts`] reads from a resolved
/// birth and the compute provider's two payloads.
pub fn chart_document(birth: &ResolvedBirth, kundli: Value, lagna_chart: Value) -> Value {
    json!({
        "meta": { "birth": birth.meta() },
        "kundli": kundli,
        "divisional": { "lagna": lagna_chart },
    })
}

pub fn load_chart_document(path: &Path) -> Result<Value, FactsError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn sample_chart() -> Value {
        json!({
            "meta": {"birth": {
                "date": "1990-04-12",
                "time": "06:45:00",
                "timezone": "+05:30",
                "location": "Chennai, India"
            }},
            "kundli": {"data": {
                "nakshatra_details": {
                    "chandra_rasi": {"name": "Vrischika"},
                    "nakshatra": {"name": "Anuradha"}
                },
                "vimshottari_dasha": {"dasha_periods": [
                    {"name": "Saturn", "start": "1988-01-01T00:00:00+05:30", "end": "2007-01-01T00:00:00+05:30",
                     "antardasha": [
                        {"name": "Saturn", "start": "1988-01-01T00:00:00+05:30", "end": "1991-01-01T00:00:00+05:30"},
                        {"name": "Mercury", "start": "1991-01-01T00:00:00+05:30", "end": "1993-09-01T00:00:00+05:30"}
                     ]},
                    {"name": "Mercury", "start": "2007-01-01T00:00:00+05:30", "end": "2024-01-01T00:00:00+05:30",
                     "antardasha": [
                        {"name": "Mercury", "start": "2007-01-01T00:00:00+05:30", "end": "2009-06-01T00:00:00+05:30"},
                        {"name": "Ketu", "start": "2009-06-01T00:00:00+05:30", "end": "2010-06-01T00:00:00+05:30"}
                     ]}
                ]},
                "yoga_details": [{"name": "Gajakesari"}]
            }},
            "divisional": {"lagna": {"data": {"divisional_positions": [
                {"house": {"number": 1}, "rasi": {"name": "Mesha"}, "planet_positions": [
                    {"planet": {"name": "Ascendant"}, "sign_degree": 12.5},
                    {"planet": {"name": "Sun"}, "sign_degree": 28.1}
                ]},
                {"house": {"number": 2}, "rasi": {"name": "Vrishabh"}, "planet_positions": []},
                {"house": {"number": 8}, "rasi": {"name": "Vrichika"}, "planet_positions": [
                    {"planet": {"name": "Moon"}, "sign_degree": 5.0},
                    {"planet": {"name": "Mars"}, "sign_degree": 17.0}
                ]}
            ]}}}
        })
    }

    fn at(s: &str) -> DateTime<Utc> {
        PeriodSelector::utc().normalize(s).unwrap()
    }

    #[test]
    fn test_dig() {
        let v = json!({"a": {"b": {"c": 3}}, "list": [1]});
        assert_eq!(dig(&v, &["a", "b", "c"]), Some(&json!(3)));
        assert_eq!(dig(&v, &[]), Some(&v));
        assert!(dig(&v, &["a", "x"]).is_none());
        assert!(dig(&v, &["list", "0"]).is_none());
        assert!(dig(&json!(null), &["a"]).is_none());
    }

    #[test]
    fn test_sign_tables() {
        assert_eq!(sign_lord("Mesha"), Some("Mars"));
        assert_eq!(sign_lord("Vrichika"), Some("Mars"));
        assert_eq!(sign_lord("Karkaṭa"), Some("Moon"));
        assert_eq!(sign_lord("Aries"), None);
        assert_eq!(sign_english("Meena"), Some("Pisces"));
        assert_eq!(sign_english("Vrishabh"), Some("Taurus"));
    }

    #[test]
    fn test_core_facts() {
        let f = extract_facts(&sample_chart(), at("2020-01-01T00:00:00Z"));
        assert_eq!(f.moon_sign.as_deref(), Some("Vrischika"));
        assert_eq!(f.moon_nakshatra.as_deref(), Some("Anuradha"));
        assert_eq!(f.place.as_deref(), Some("Chennai, India"));
        assert_eq!(f.datetime, "1990-04-12 06:45:00 +05:30");
        assert_eq!(f.ascendant.as_deref(), Some("Mesha"));
        assert_relative_eq!(f.asc_degree.unwrap(), 12.5);
        assert_eq!(f.yoga_summaries, json!([{"name": "Gajakesari"}]));
    }

    #[test]
    fn test_houses_and_placements() {
        let f = extract_facts(&sample_chart(), at("2020-01-01T00:00:00Z"));
        assert!(!f.placements.contains_key("Ascendant"));
        assert_eq!(f.placements["Mars"], Placement { sign: Some("Vrichika".into()), house: Some(8) });
        assert_eq!(f.by_house[&8].len(), 2);
        assert_eq!(f.by_house[&1][0].planet, "Sun");
        assert!(!f.by_house.contains_key(&2));
        assert_eq!(f.houses[&2].lord, Some("Venus"));
        assert_eq!(f.houses[&8].lord, Some("Mars"));
        assert_eq!(f.houses.len(), 3);
    }

    #[test]
    fn test_active_periods() {
        let f = extract_facts(&sample_chart(), at("2009-12-01T00:00:00Z"));
        assert_eq!(f.mahadasha.as_ref().map(|p| p.name.as_str()), Some("Mercury"));
        assert_eq!(f.antardasha.as_ref().map(|p| p.name.as_str()), Some("Ketu"));
        assert_eq!(f.mahadasha.unwrap().end, "2024-01-01T00:00:00+05:30");
    }

    #[test]
    fn test_reference_after_all_periods_uses_earliest() {
        let f = extract_facts(&sample_chart(), at("2030-01-01T00:00:00Z"));
        assert_eq!(f.mahadasha.unwrap().name, "Saturn");
        // the pre-birth Saturn sub period still ends after birth, so it stays eligible
        assert_eq!(f.antardasha.unwrap().name, "Saturn");
    }

    #[test]
    fn test_missing_birth_time_disables_birth_filter() {
        let doc = json!({
            "meta": {"birth": {"date": "1990-04-12", "timezone": "+05:30"}},
            "kundli": {"data": {"dasha_periods": [
                {"name": "Rahu", "start": "1970-01-01", "end": "1988-01-01"},
                {"name": "Jupiter", "start": "1988-01-01", "end": "2004-01-01"}
            ]}}
        });
        assert!(birth_instant(&doc).is_none());

        // no birth instant, so Rahu is not dropped for ending before birth
        let f = extract_facts(&doc, at("1980-01-01T00:00:00Z"));
        assert_eq!(f.mahadasha.unwrap().name, "Rahu");
        assert_eq!(f.datetime, "1990-04-12  +05:30");

        let mut timed = doc.clone();
        timed["meta"]["birth"]["time"] = json!("06:45:00");
        let f = extract_facts(&timed, at("1980-01-01T00:00:00Z"));
        assert_eq!(f.mahadasha.unwrap().name, "Jupiter");
    }

    #[test]
    fn test_dasha_without_vimshottari_wrapper() {
        let doc = json!({"kundli": {"data": {"dasha_periods": [
            {"name": "Venus", "start": "2000-01-01", "end": "2020-01-01"}
        ]}}});
        let f = extract_facts(&doc, at("2010-01-01T00:00:00Z"));
        assert_eq!(f.mahadasha.unwrap().name, "Venus");
        assert!(f.antardasha.is_none());
    }

    #[test]
    fn test_empty_and_misshaped_documents() {
        let f = extract_facts(&json!({}), Utc::now());
        assert_eq!(f, ChartFacts { yoga_summaries: json!([]), ..Default::default() });

        let odd = json!({
            "kundli": "nope",
            "divisional": {"lagna": {"data": {"divisional_positions": "x"}}},
            "meta": {"birth": {"date": 7}}
        });
        let f = extract_facts(&odd, Utc::now());
        assert!(f.mahadasha.is_none());
        assert!(f.houses.is_empty());
    }

    #[test]
    fn test_chart_document_round_trips_into_facts() {
        let birth = ResolvedBirth {
            date: "1990-04-12".into(),
            time: "06:45:00".into(),
            offset: "+05:30".into(),
            latitude: 13.0827,
            longitude: 80.2707,
            location: Some("Chennai, India".into()),
            display_name: None,
            timezone_id: Some("Asia/Kolkata".into()),
            offset_degraded: false,
            ayanamsa: 1,
            la: "en".into(),
        };
        let kundli = json!({"data": {"nakshatra_details": {"nakshatra": {"name": "Anuradha"}}}});
        let doc = chart_document(&birth, kundli, json!({"data": {"divisional_positions": []}}));

        let f = extract_facts(&doc, Utc::now());
        assert_eq!(f.place.as_deref(), Some("Chennai, India"));
        assert_eq!(f.moon_nakshatra.as_deref(), Some("Anuradha"));
        assert_eq!(f.datetime, "1990-04-12 06:45:00 +05:30");
    }

    #[test]
    fn test_load_chart_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", sample_chart()).unwrap();
        let doc = load_chart_document(file.path()).unwrap();
        assert_eq!(dig_str(&doc, &["meta", "birth", "timezone"]), Some("+05:30"));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "{{not json").unwrap();
        assert!(matches!(load_chart_document(bad.path()), Err(FactsError::Json(_))));

        let missing = load_chart_document(Path::new("/definitely/not/here.json"));
        assert!(matches!(missing, Err(FactsError::Io(_))));
    }
}
