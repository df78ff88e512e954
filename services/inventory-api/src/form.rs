//! Serde helpers for request attributes that arrive either as JSON values or
//! as multipart text parts.

use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Optional text; blank strings count as absent
pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(d)?.and_then(non_empty))
}

/// Required text, trimmed; emptiness is left to field validation
pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(String::deserialize(d)?.trim().to_string())
}

/// Optional integer from a number or numeric text
pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    match Option::<Scalar>::deserialize(d)? {
        None => Ok(None),
        Some(Scalar::Int(v)) => Ok(Some(v)),
        Some(Scalar::Text(text)) => match non_empty(text) {
            None => Ok(None),
            Some(t) => t
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected an integer, got \"{}\"", t))),
        },
        Some(_) => Err(D::Error::custom("expected an integer")),
    }
}

/// Required integer from a number or numeric text
pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    opt_int(d)?.ok_or_else(|| D::Error::custom("expected an integer"))
}

/// Required finite number from a number or numeric text
pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = match Scalar::deserialize(d)? {
        Scalar::Int(v) => v as f64,
        Scalar::Float(v) => v,
        Scalar::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a number, got \"{}\"", text)))?,
        Scalar::Bool(_) => return Err(D::Error::custom("expected a number")),
    };
    // `f64::from_str` accepts "NaN" and "inf", which no column should hold.
    if value.is_finite() {
        Ok(value)
    } else {
        Err(D::Error::custom("expected a finite number"))
    }
}

/// Boolean from `true`/`false`, `1`/`0`, or their text forms
pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match Scalar::deserialize(d)? {
        Scalar::Bool(v) => Ok(v),
        Scalar::Int(1) => Ok(true),
        Scalar::Int(0) => Ok(false),
        Scalar::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(D::Error::custom(format!("expected a boolean, got \"{}\"", other))),
        },
        _ => Err(D::Error::custom("expected a boolean")),
    }
}

/// Optional `YYYY-MM-DD` date; blank strings count as absent
pub fn opt_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    match Option::<String>::deserialize(d)?.and_then(non_empty) {
        None => Ok(None),
        Some(text) => parse_date(&text).map(Some).map_err(D::Error::custom),
    }
}

/// Required `YYYY-MM-DD` date
pub fn date<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
    let text = String::deserialize(d)?;
    parse_date(text.trim()).map_err(D::Error::custom)
}

// Accepts a bare date or the date part of an RFC 3339 timestamp.
fn parse_date(text: &str) -> Result<NaiveDate, String> {
    let date_part = text.split('T').next().unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| format!("expected a date (YYYY-MM-DD), got \"{}\"", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "opt_text")]
        website: Option<String>,
        #[serde(default, deserialize_with = "opt_int")]
        vendor_id: Option<i64>,
        #[serde(deserialize_with = "float")]
        amount: f64,
        #[serde(default, deserialize_with = "opt_date")]
        employed_at: Option<NaiveDate>,
    }

    #[test]
    fn test_form_text_values() {
        let sample: Sample = serde_json::from_value(json!({
            "website": "  ",
            "vendor_id": "12",
            "amount": "1500.50",
            "employed_at": "2024-03-01"
        }))
        .unwrap();

        assert_eq!(sample.website, None);
        assert_eq!(sample.vendor_id, Some(12));
        assert_eq!(sample.amount, 1500.5);
        assert_eq!(sample.employed_at, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_json_values() {
        let sample: Sample = serde_json::from_value(json!({
            "website": "https://acme.example",
            "vendor_id": 4,
            "amount": 20,
            "employed_at": null
        }))
        .unwrap();

        assert_eq!(sample.website.as_deref(), Some("https://acme.example"));
        assert_eq!(sample.vendor_id, Some(4));
        assert_eq!(sample.amount, 20.0);
        assert_eq!(sample.employed_at, None);
    }

    #[test]
    fn test_missing_optional_values() {
        let sample: Sample = serde_json::from_value(json!({"amount": 1})).unwrap();
        assert_eq!(sample.website, None);
        assert_eq!(sample.vendor_id, None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_value::<Sample>(json!({"amount": "lots"})).is_err());
        assert!(serde_json::from_value::<Sample>(json!({"amount": 1, "vendor_id": "x"})).is_err());
        assert!(
            serde_json::from_value::<Sample>(json!({"amount": 1, "employed_at": "03/01/2024"}))
                .is_err()
        );
        assert!(serde_json::from_value::<Sample>(json!({})).is_err());
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        for text in ["NaN", "nan", "inf", "-inf", "infinity"] {
            let err = serde_json::from_value::<Sample>(json!({ "amount": text })).unwrap_err();
            assert!(err.to_string().contains("expected a finite number"), "{}", text);
        }
    }

    #[test]
    fn test_boolean_forms() {
        #[derive(Deserialize)]
        struct Flag {
            #[serde(deserialize_with = "boolean")]
            is_active: bool,
        }

        for (value, expected) in [
            (json!(true), true),
            (json!("false"), false),
            (json!("1"), true),
            (json!(0), false),
        ] {
            let flag: Flag = serde_json::from_value(json!({ "is_active": value })).unwrap();
            assert_eq!(flag.is_active, expected);
        }
    }
}
