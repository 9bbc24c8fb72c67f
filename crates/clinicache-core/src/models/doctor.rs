use serde::{Deserialize, Serialize};

use crate::utils::format_phone;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Doctor {
    /// Assigned by the store on insert; any value supplied by the caller is replaced.
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub specialty: String,
    pub email: String,
    pub phone: String,
}

impl Doctor {
    pub fn new(
        name: impl Into<String>,
        specialty: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            specialty: specialty.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    pub fn formatted_phone(&self) -> String {
        format_phone(&self.phone)
    }
}

/// Partial update for a doctor. Only `Some` fields are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DoctorPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl DoctorPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.specialty.is_none() && self.email.is_none() && self.phone.is_none()
    }

    pub fn apply(self, doctor: &mut Doctor) {
        if let Some(name) = self.name {
            doctor.name = name;
        }
        if let Some(specialty) = self.specialty {
            doctor.specialty = specialty;
        }
        if let Some(email) = self.email {
            doctor.email = email;
        }
        if let Some(phone) = self.phone {
            doctor.phone = phone;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_merges_only_supplied_fields() {
        let mut doctor = Doctor::new("Dr. Simi", "Farmacología", "dr.simi@hospital.com", "555-5678");
        DoctorPatch {
            phone: Some("555-0000".to_string()),
            ..Default::default()
        }
        .apply(&mut doctor);

        assert_eq!(doctor.name, "Dr. Simi");
        assert_eq!(doctor.specialty, "Farmacología");
        assert_eq!(doctor.phone, "555-0000");
    }

    #[test]
    fn test_deserialize_without_id() {
        let json = r#"{"name":"Dr. Mario","specialty":"Medicina General","email":"dr.mario@hospital.com","phone":"555-1234"}"#;
        let doctor: Doctor = serde_json::from_str(json).unwrap();
        assert_eq!(doctor.id, 0);
        assert_eq!(doctor.name, "Dr. Mario");
    }

    #[test]
    fn test_empty_patch() {
        assert!(DoctorPatch::default().is_empty());
        assert!(!DoctorPatch {
            name: Some("x".into()),
            ..Default::default()
        }
        .is_empty());
    }
}
