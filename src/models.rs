use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Probability at or above which a visit is reported as avoidable.
pub const AVOIDABLE_THRESHOLD: f64 = 0.50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {field} option: {value:?}")]
pub struct UnknownOption {
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sex {
    #[default]
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    pub fn label(self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Sex::Male => "1",
            Sex::Female => "2",
        }
    }
}

/// Race vocabulary, listed in the order the form offers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Race {
    #[default]
    White,
    Black,
    Asian,
    Hispanic,
    Other,
    NorthAmericanNative,
    Unknown,
}

impl Race {
    pub const ALL: [Race; 7] = [
        Race::White,
        Race::Black,
        Race::Asian,
        Race::Hispanic,
        Race::Other,
        Race::NorthAmericanNative,
        Race::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Race::White => "White",
            Race::Black => "Black",
            Race::Asian => "Asian",
            Race::Hispanic => "Hispanic",
            Race::Other => "Other",
            Race::NorthAmericanNative => "North American Native",
            Race::Unknown => "Unknown",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Race::Unknown => "0",
            Race::White => "1",
            Race::Black => "2",
            Race::Other => "3",
            Race::Asian => "4",
            Race::Hispanic => "5",
            Race::NorthAmericanNative => "6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChronicFlag {
    #[default]
    No,
    Yes,
}

impl ChronicFlag {
    pub const ALL: [ChronicFlag; 2] = [ChronicFlag::No, ChronicFlag::Yes];

    pub fn label(self) -> &'static str {
        match self {
            ChronicFlag::No => "No",
            ChronicFlag::Yes => "Yes",
        }
    }

    pub fn value(self) -> u8 {
        match self {
            ChronicFlag::No => 0,
            ChronicFlag::Yes => 1,
        }
    }
}

/// Clinical classification of the primary diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BodySystem {
    #[default]
    BloodImmune,
    Circulatory,
    Dental,
    Digestive,
    Ear,
    Endocrine,
    ExternalCauses,
    Eye,
    HealthStatus,
    Genitourinary,
    Infectious,
    InjuryPoisoning,
    Congenital,
    MentalBehavioral,
    Musculoskeletal,
    Neoplasms,
    NervousSystem,
    Perinatal,
    Pregnancy,
    Respiratory,
    Skin,
    Symptoms,
    Unacceptable,
}

impl BodySystem {
    /// Form order.
    pub const ALL: [BodySystem; 23] = [
        BodySystem::BloodImmune,
        BodySystem::Circulatory,
        BodySystem::Dental,
        BodySystem::Digestive,
        BodySystem::Ear,
        BodySystem::Endocrine,
        BodySystem::ExternalCauses,
        BodySystem::Eye,
        BodySystem::HealthStatus,
        BodySystem::Genitourinary,
        BodySystem::Infectious,
        BodySystem::InjuryPoisoning,
        BodySystem::Congenital,
        BodySystem::MentalBehavioral,
        BodySystem::Musculoskeletal,
        BodySystem::Neoplasms,
        BodySystem::NervousSystem,
        BodySystem::Perinatal,
        BodySystem::Pregnancy,
        BodySystem::Respiratory,
        BodySystem::Skin,
        BodySystem::Symptoms,
        BodySystem::Unacceptable,
    ];

    /// Column order the pipeline was trained with.
    pub const PIPELINE_ORDER: [BodySystem; 23] = [
        BodySystem::Respiratory,
        BodySystem::Circulatory,
        BodySystem::Infectious,
        BodySystem::Digestive,
        BodySystem::MentalBehavioral,
        BodySystem::Musculoskeletal,
        BodySystem::Neoplasms,
        BodySystem::NervousSystem,
        BodySystem::InjuryPoisoning,
        BodySystem::Skin,
        BodySystem::Genitourinary,
        BodySystem::Endocrine,
        BodySystem::BloodImmune,
        BodySystem::Symptoms,
        BodySystem::ExternalCauses,
        BodySystem::Congenital,
        BodySystem::Perinatal,
        BodySystem::Pregnancy,
        BodySystem::Dental,
        BodySystem::Eye,
        BodySystem::Ear,
        BodySystem::HealthStatus,
        BodySystem::Unacceptable,
    ];

    // (form label, wire key, pipeline column)
    fn names(self) -> (&'static str, &'static str, &'static str) {
        match self {
            BodySystem::BloodImmune => ("Blood/Immune", "bodysystem_bloodimmune", "bodysystem_BloodImmune"),
            BodySystem::Circulatory => ("Circulatory", "bodysystem_circulatory", "bodysystem_Circulatory"),
            BodySystem::Dental => ("Dental", "bodysystem_dental", "bodysystem_Dental"),
            BodySystem::Digestive => ("Digestive", "bodysystem_digestive", "bodysystem_Digestive"),
            BodySystem::Ear => ("Ear", "bodysystem_ear", "bodysystem_Ear"),
            BodySystem::Endocrine => ("Endocrine/Metabolic", "bodysystem_endocrine", "bodysystem_Endocrine"),
            BodySystem::ExternalCauses => ("External Causes", "bodysystem_externalcauses", "bodysystem_ExternalCauses"),
            BodySystem::Eye => ("Eye", "bodysystem_eye", "bodysystem_Eye"),
            BodySystem::HealthStatus => ("Health Status/Contact", "bodysystem_healthstatus", "bodysystem_HealthStatus"),
            BodySystem::Genitourinary => ("Genitourinary", "bodysystem_genitourinary", "bodysystem_Genitourinary"),
            BodySystem::Infectious => ("Infectious", "bodysystem_infectious", "bodysystem_Infectious"),
            BodySystem::InjuryPoisoning => ("Injury/Poisoning", "bodysystem_injurypoisoning", "bodysystem_InjuryPoisoning"),
            BodySystem::Congenital => ("Congenital", "bodysystem_congenital", "bodysystem_Congenital"),
            BodySystem::MentalBehavioral => ("Mental/Behavioral", "bodysystem_mentalbehavioral", "bodysystem_MentalBehavioral"),
            BodySystem::Musculoskeletal => ("Musculoskeletal", "bodysystem_musculoskeletal", "bodysystem_Musculoskeletal"),
            BodySystem::Neoplasms => ("Neoplasms", "bodysystem_neoplasms", "bodysystem_Neoplasms"),
            BodySystem::NervousSystem => ("Nervous System", "bodysystem_nervoussystem", "bodysystem_NervousSystem"),
            BodySystem::Perinatal => ("Perinatal", "bodysystem_perinatal", "bodysystem_Perinatal"),
            BodySystem::Pregnancy => ("Pregnancy/Childbirth", "bodysystem_pregnancy", "bodysystem_Pregnancy"),
            BodySystem::Respiratory => ("Respiratory", "bodysystem_respiratory", "bodysystem_Respiratory"),
            BodySystem::Skin => ("Skin/Subcutaneous", "bodysystem_skin", "bodysystem_Skin"),
            BodySystem::Symptoms => ("Symptoms/Signs", "bodysystem_symptoms", "bodysystem_Symptoms"),
            BodySystem::Unacceptable => ("Unacceptable Diagnosis", "bodysystem_unacceptable", "bodysystem_Unacceptable"),
        }
    }

    pub fn label(self) -> &'static str {
        self.names().0
    }

    pub fn wire_key(self) -> &'static str {
        self.names().1
    }

    pub fn pipeline_column(self) -> &'static str {
        self.names().2
    }
}

impl FromStr for Sex {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Sex::ALL
            .into_iter()
            .find(|v| v.label().eq_ignore_ascii_case(s) || v.code() == s)
            .ok_or_else(|| UnknownOption { field: "sex", value: s.to_string() })
    }
}

impl FromStr for Race {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Race::ALL
            .into_iter()
            .find(|v| v.label().eq_ignore_ascii_case(s) || v.code() == s)
            .ok_or_else(|| UnknownOption { field: "race", value: s.to_string() })
    }
}

impl FromStr for ChronicFlag {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ChronicFlag::ALL
            .into_iter()
            .find(|v| v.label().eq_ignore_ascii_case(s) || v.value().to_string() == s)
            .ok_or_else(|| UnknownOption { field: "chronic condition", value: s.to_string() })
    }
}

impl FromStr for BodySystem {
    type Err = UnknownOption;

    /// Accepts the form label, the wire key, or the key without its prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BodySystem::ALL
            .into_iter()
            .find(|b| {
                b.label().eq_ignore_ascii_case(s)
                    || b.wire_key().eq_ignore_ascii_case(s)
                    || b.wire_key().trim_start_matches("bodysystem_").eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| UnknownOption { field: "body system", value: s.to_string() })
    }
}

impl fmt::Display for BodySystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One prediction request as the form builds it.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub age: u32,
    pub sex: Sex,
    pub race: Race,
    pub year: u16,
    pub total_paid_amt: f64,
    pub chronic: ChronicFlag,
    pub body_system: BodySystem,
}

impl PredictionRecord {
    /// The flat JSON object sent to `/predict`.
    pub fn to_payload(&self) -> serde_json::Value {
        // Serializing a record into a Value cannot fail: every key is a string.
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl Serialize for PredictionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(6 + BodySystem::ALL.len()))?;
        map.serialize_entry("AGE_AT_END_REF_YR", &self.age)?;
        map.serialize_entry("SEX_IDENT_CD", self.sex.code())?;
        map.serialize_entry("BENE_RACE_CD", self.race.code())?;
        map.serialize_entry("YEAR", &self.year.to_string())?;
        map.serialize_entry("total_paid_amt", &self.total_paid_amt)?;
        map.serialize_entry("primary_dx_chronic_flag", &self.chronic.value())?;
        for body_system in BodySystem::ALL {
            let active = u8::from(body_system == self.body_system);
            map.serialize_entry(body_system.wire_key(), &active)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: i64,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    LikelyAvoidable,
    LikelyNonAvoidable,
}

impl Verdict {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= AVOIDABLE_THRESHOLD {
            Verdict::LikelyAvoidable
        } else {
            Verdict::LikelyNonAvoidable
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::LikelyAvoidable => f.write_str("Likely Avoidable ED Visit"),
            Verdict::LikelyNonAvoidable => f.write_str("Likely Non-Avoidable ED Visit"),
        }
    }
}
