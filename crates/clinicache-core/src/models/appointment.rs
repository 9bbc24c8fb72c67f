use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format_appointment_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    // Aliases accept legacy records with Spanish status values
    #[serde(alias = "pendiente")]
    Pending,
    #[serde(alias = "confirmada")]
    Confirmed,
    #[serde(alias = "cancelada")]
    Cancelled,
    #[serde(alias = "completada")]
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "Pending"),
            AppointmentStatus::Confirmed => write!(f, "Confirmed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
            AppointmentStatus::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendiente" => Ok(AppointmentStatus::Pending),
            "confirmed" | "confirmada" => Ok(AppointmentStatus::Confirmed),
            "cancelled" | "canceled" | "cancelada" => Ok(AppointmentStatus::Cancelled),
            "completed" | "completada" => Ok(AppointmentStatus::Completed),
            other => Err(format!("unknown appointment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Appointment {
    #[serde(default)]
    pub id: u64,
    #[serde(rename = "patientName")]
    pub patient_name: String,
    // Not enforced by the store; delete_doctor refuses while references exist
    #[serde(rename = "doctorId")]
    pub doctor_id: u64,
    pub date: DateTime<Utc>,
    pub reason: String,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn new(
        patient_name: impl Into<String>,
        doctor_id: u64,
        date: DateTime<Utc>,
        reason: impl Into<String>,
        status: AppointmentStatus,
    ) -> Self {
        Self {
            id: 0,
            patient_name: patient_name.into(),
            doctor_id,
            date,
            reason: reason.into(),
            status,
        }
    }

    pub fn formatted_date(&self) -> String {
        format_appointment_date(&self.date)
    }
}

/// Partial update for an appointment. Only `Some` fields are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AppointmentPatch {
    #[serde(rename = "patientName", default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(rename = "doctorId", default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
}

impl AppointmentPatch {
    pub fn status(status: AppointmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply(self, appointment: &mut Appointment) {
        if let Some(patient_name) = self.patient_name {
            appointment.patient_name = patient_name;
        }
        if let Some(doctor_id) = self.doctor_id {
            appointment.doctor_id = doctor_id;
        }
        if let Some(date) = self.date {
            appointment.date = date;
        }
        if let Some(reason) = self.reason {
            appointment.reason = reason;
        }
        if let Some(status) = self.status {
            appointment.status = status;
        }
    }
}
