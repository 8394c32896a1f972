//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Patient records served on the `public:patients` topic.
//!
//! The list response carries one summary per patient (demographics and
//! treatment progress). Diagnoses, with their prescriptions and plans, only
//! come with the per-patient response and are merged in by
//! [`ListRecord::refine`].

use crate::ClientError;
use crate::retrieval::ListRecord;
use crate::retrieval::protocol;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Sex as reported by the server; `"M"` is male, anything else female.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sex {
    /// `"M"`
    Male,
    /// Any other value
    Female,
}

impl From<String> for Sex {
    fn from(value: String) -> Self {
        if value == "M" { Sex::Male } else { Sex::Female }
    }
}

impl From<Sex> for String {
    fn from(sex: Sex) -> Self {
        match sex {
            Sex::Male => "M".to_string(),
            Sex::Female => "F".to_string(),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "Male"),
            Sex::Female => write!(f, "Female"),
        }
    }
}

/// A treatment plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan label
    pub label: String,
}

/// A prescription and the plans delivering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    /// Prescription label
    pub label: String,
    /// Free-form description
    pub description: String,
    /// Number of prescribed fractions
    pub num_fractions: i64,
    /// Plans, each tagged `"Plan"` on the wire
    #[serde(default, deserialize_with = "tagged")]
    pub plans: Vec<Plan>,
}

/// A diagnosis and its prescriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Diagnosis label
    pub label: String,
    /// Free-form description
    pub description: String,
    /// Prescriptions, each tagged `"Prescription"` on the wire
    #[serde(default, deserialize_with = "tagged")]
    pub prescriptions: Vec<Prescription>,
}

/// A patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Server-side identifier
    pub id: String,
    /// Medical record number
    pub mrn: String,
    /// Date of birth as sent by the server
    pub date_of_birth: String,
    /// First name
    pub first_name: String,
    /// Middle name, empty when absent
    #[serde(default)]
    pub middle_name: String,
    /// Last name
    pub last_name: String,
    /// Sex
    pub sex: Sex,
    /// Fractions prescribed in total
    pub fractions_total: i64,
    /// Fractions delivered so far
    pub fractions_completed: i64,
    /// Weight in kilograms
    pub weight_kg: f64,
    /// Whether the patient is ready for treatment
    pub ready_for_treatment: bool,
    /// Registration timestamp as sent by the server
    pub registration_time: i64,
    /// Diagnoses, filled in by the per-patient response
    #[serde(default, deserialize_with = "tagged")]
    pub diagnoses: Vec<Diagnosis>,
}

/// Records nested in a patient carry a `type` tag naming their kind.
trait Tagged: DeserializeOwned {
    const TYPE: &'static str;
}

impl Tagged for Plan {
    const TYPE: &'static str = "Plan";
}

impl Tagged for Prescription {
    const TYPE: &'static str = "Prescription";
}

impl Tagged for Diagnosis {
    const TYPE: &'static str = "Diagnosis";
}

/// Decodes an array of tagged records, rejecting any element whose tag does
/// not match. `null` decodes as an empty list.
fn tagged<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Tagged,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    values
        .iter()
        .map(|value| protocol::decode(value, T::TYPE).map_err(D::Error::custom))
        .collect()
}

impl ListRecord for Patient {
    const LIST_TYPE: &'static str = "PatientList";
    const ITEM_TYPE: &'static str = "Patient";

    fn from_summary(summary: &Value) -> Result<Self, ClientError> {
        serde_json::from_value(summary.clone())
            .map_err(|e| ClientError::protocol(format!("malformed patient summary: {e}")))
    }

    fn refine(&mut self, detail: &Map<String, Value>) -> Result<(), ClientError> {
        let diagnoses = detail.get("diagnoses").cloned().unwrap_or(Value::Null);
        self.diagnoses = tagged(diagnoses)
            .map_err(|e| ClientError::protocol(format!("malformed patient detail: {e}")))?;
        Ok(())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.label)
    }
}

impl fmt::Display for Prescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Description: {}, Label: {}, Num Fractions: {}, Plans:[",
            self.description, self.label, self.num_fractions
        )?;
        for plan in &self.plans {
            write!(f, "{plan}")?;
        }
        writeln!(f, "]")
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Label: {}, Description: {}, Prescriptions:[",
            self.label, self.description
        )?;
        for prescription in &self.prescriptions {
            write!(f, "{prescription}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Patient ID: {}", self.id)?;
        writeln!(f, "MRN: {}", self.mrn)?;
        writeln!(f, "Date of birth: {}", self.date_of_birth)?;
        writeln!(f, "First Name: {}", self.first_name)?;
        writeln!(f, "Middle Name: {}", self.middle_name)?;
        writeln!(f, "Last Name: {}", self.last_name)?;
        writeln!(f, "Sex: {}", self.sex)?;
        writeln!(f, "Fractions Total: {}", self.fractions_total)?;
        writeln!(f, "Fractions Completed: {}", self.fractions_completed)?;
        writeln!(f, "Weight: {}", self.weight_kg)?;
        writeln!(
            f,
            "Ready for treatment: {}",
            if self.ready_for_treatment { "True" } else { "False" }
        )?;
        writeln!(f, "Registration Time: {}", self.registration_time)?;
        write!(f, "Diagnoses:[")?;
        for diagnosis in &self.diagnoses {
            writeln!(f, "{diagnosis}")?;
        }
        writeln!(f, "]")
    }
}
