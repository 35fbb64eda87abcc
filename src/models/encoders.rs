//! Categorical label encoders
//!
//! Each encoder maps the sorted training classes of one feature to their
//! positions, so code `i` is `classes[i]`. Values that were not seen during
//! training resolve to a fallback code chosen once, at load time.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// On-disk form of one encoder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSpec {
    /// Training classes, in code order
    pub classes: Vec<String>,
    /// Class substituted for unseen values. Defaults to the first class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

/// On-disk form of the whole encoder table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderTableFile {
    /// Version shared with the model artifacts
    pub model_version: String,
    pub encoders: BTreeMap<String, EncoderSpec>,
    /// Localities seen with each city. Cities without an entry accept any
    /// known locality.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub localities_by_city: BTreeMap<String, Vec<String>>,
}

/// Outcome of encoding one value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoded {
    /// Value was seen in training
    Known(usize),
    /// Value was unseen; carries the fallback code
    Fallback(usize),
}

impl Encoded {
    pub fn code(self) -> usize {
        match self {
            Encoded::Known(code) | Encoded::Fallback(code) => code,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, Encoded::Fallback(_))
    }
}

/// Bidirectional category <-> code table for one feature
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
    codes: HashMap<String, usize>,
    fallback_code: usize,
}

impl LabelEncoder {
    /// Build an encoder, validating the class list and the fallback class
    pub fn new(feature: &str, spec: EncoderSpec) -> Result<Self> {
        if spec.classes.is_empty() {
            bail!("Encoder {feature} has no classes");
        }

        let mut codes = HashMap::with_capacity(spec.classes.len());
        for (code, class) in spec.classes.iter().enumerate() {
            if codes.insert(class.clone(), code).is_some() {
                bail!("Encoder {feature} lists class {class:?} more than once");
            }
        }

        let fallback_code = match &spec.fallback {
            Some(class) => match codes.get(class) {
                Some(&code) => code,
                None => bail!("Encoder {feature} fallback {class:?} is not one of its classes"),
            },
            None => 0,
        };

        Ok(Self {
            classes: spec.classes,
            codes,
            fallback_code,
        })
    }

    /// Code for a known class, if any
    pub fn lookup(&self, value: &str) -> Option<usize> {
        self.codes.get(value.trim()).copied()
    }

    /// Code for a value, substituting the fallback for unseen values
    pub fn encode(&self, value: &str) -> Encoded {
        match self.lookup(value) {
            Some(code) => Encoded::Known(code),
            None => Encoded::Fallback(self.fallback_code),
        }
    }

    /// Class for a code
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn fallback_code(&self) -> usize {
        self.fallback_code
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// All encoders, keyed by feature name. Immutable after load.
#[derive(Debug, Clone)]
pub struct EncoderTable {
    model_version: String,
    encoders: HashMap<String, LabelEncoder>,
    localities_by_city: HashMap<String, HashSet<String>>,
}

impl EncoderTable {
    pub fn from_file(file: EncoderTableFile) -> Result<Self> {
        let mut encoders = HashMap::with_capacity(file.encoders.len());
        for (feature, spec) in file.encoders {
            let encoder = LabelEncoder::new(&feature, spec)?;
            encoders.insert(feature, encoder);
        }

        let mut localities_by_city = HashMap::with_capacity(file.localities_by_city.len());
        for (city, localities) in file.localities_by_city {
            ensure_known(&encoders, "City", &city)?;
            for locality in &localities {
                ensure_known(&encoders, "Locality", locality)?;
            }
            localities_by_city.insert(city, localities.into_iter().collect());
        }

        Ok(Self {
            model_version: file.model_version,
            encoders,
            localities_by_city,
        })
    }

    /// Whether a locality was seen with a city. Cities the map does not
    /// cover accept every locality.
    pub fn locality_in_city(&self, city: &str, locality: &str) -> bool {
        self.localities_by_city
            .get(city.trim())
            .map_or(true, |localities| localities.contains(locality.trim()))
    }

    pub fn get(&self, feature: &str) -> Option<&LabelEncoder> {
        self.encoders.get(feature)
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.encoders.contains_key(feature)
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }

    /// Feature names, sorted
    pub fn feature_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.encoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn ensure_known(encoders: &HashMap<String, LabelEncoder>, feature: &str, value: &str) -> Result<()> {
    match encoders.get(feature) {
        Some(encoder) if encoder.lookup(value).is_some() => Ok(()),
        Some(_) => bail!("Locality map names unknown {feature} class {value:?}"),
        None => bail!("Locality map requires a {feature} encoder"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(classes: &[&str], fallback: Option<&str>) -> EncoderSpec {
        EncoderSpec {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            fallback: fallback.map(str::to_string),
        }
    }

    #[test]
    fn test_known_and_unknown_values() {
        let encoder = LabelEncoder::new("City", spec(&["Bengaluru", "Delhi", "Mumbai"], None)).unwrap();

        assert_eq!(encoder.encode("Mumbai"), Encoded::Known(2));
        assert_eq!(encoder.encode("  Delhi "), Encoded::Known(1));
        assert_eq!(encoder.encode("Atlantis"), Encoded::Fallback(0));
        assert_eq!(encoder.decode(2), Some("Mumbai"));
        assert_eq!(encoder.decode(7), None);
    }

    #[test]
    fn test_named_fallback_is_deterministic() {
        let encoder = LabelEncoder::new(
            "Locality",
            spec(&["Andheri", "Bandra", "Powai"], Some("Bandra")),
        )
        .unwrap();

        let first = encoder.encode("Unheard Of Nagar");
        for _ in 0..10 {
            assert_eq!(encoder.encode("Unheard Of Nagar"), first);
        }
        assert_eq!(first, Encoded::Fallback(1));
        assert!(first.is_fallback());
    }

    #[test]
    fn test_invalid_specs_are_rejected() {
        assert!(LabelEncoder::new("Empty", spec(&[], None)).is_err());
        assert!(LabelEncoder::new("Dup", spec(&["A", "A"], None)).is_err());
        assert!(LabelEncoder::new("Fb", spec(&["A", "B"], Some("C"))).is_err());
    }

    #[test]
    fn test_table_round_trips_through_json() {
        let mut encoders = BTreeMap::new();
        encoders.insert("Parking".to_string(), spec(&["No", "Yes"], None));
        let file = EncoderTableFile {
            model_version: "v1".to_string(),
            encoders,
            localities_by_city: BTreeMap::new(),
        };

        let json = serde_json::to_string(&file).unwrap();
        let table = EncoderTable::from_file(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(table.model_version(), "v1");
        assert!(table.contains("Parking"));
        assert_eq!(table.get("Parking").unwrap().lookup("Yes"), Some(1));
    }

    fn city_table(localities_by_city: &[(&str, &[&str])]) -> Result<EncoderTable> {
        let mut encoders = BTreeMap::new();
        encoders.insert("City".to_string(), spec(&["Delhi", "Mumbai", "Pune"], None));
        encoders.insert("Locality".to_string(), spec(&["Andheri", "Baner", "Bandra"], None));
        EncoderTable::from_file(EncoderTableFile {
            model_version: "v1".to_string(),
            encoders,
            localities_by_city: localities_by_city
                .iter()
                .map(|(city, localities)| {
                    (city.to_string(), localities.iter().map(|l| l.to_string()).collect())
                })
                .collect(),
        })
    }

    #[test]
    fn test_locality_must_belong_to_mapped_city() {
        let table = city_table(&[("Mumbai", &["Andheri", "Bandra"][..]), ("Pune", &["Baner"][..])]).unwrap();

        assert!(table.locality_in_city("Mumbai", "Andheri"));
        assert!(table.locality_in_city(" Pune ", "Baner "));
        assert!(!table.locality_in_city("Pune", "Andheri"));
        assert!(!table.locality_in_city("Mumbai", "Baner"));
        // Delhi has no entry
        assert!(table.locality_in_city("Delhi", "Andheri"));
    }

    #[test]
    fn test_locality_map_must_use_known_classes() {
        assert!(city_table(&[("Atlantis", &["Andheri"][..])]).is_err());
        assert!(city_table(&[("Mumbai", &["Nowhere Nagar"][..])]).is_err());
        assert!(city_table(&[]).unwrap().locality_in_city("Pune", "Bandra"));
    }
}
