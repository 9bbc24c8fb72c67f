// Sample data inserted on first run.

use chrono::{DateTime, TimeZone, Utc};

use crate::models::{Appointment, AppointmentStatus, Doctor};

pub fn sample_doctors() -> Vec<Doctor> {
    vec![
        Doctor::new("Dr. Mario", "Medicina General", "dr.mario@hospital.com", "555-1234"),
        Doctor::new("Dr. Simi", "Farmacología", "dr.simi@hospital.com", "555-5678"),
        Doctor::new("Dr. Nick Riviera", "Cirugía", "dr.nick@hospital.com", "555-9012"),
        Doctor::new("Dra. Ana Polo", "Psicología", "dra.anapolo@hospital.com", "555-3456"),
    ]
}

/// Sample appointments. `doctor_ids` are the ids the sample doctors received,
/// in `sample_doctors()` order.
pub fn sample_appointments(doctor_ids: &[u64]) -> Vec<Appointment> {
    let samples = [
        ("Guaripolo", 0, at(2025, 3, 10, 10, 0), "Chequeo anual", AppointmentStatus::Pending),
        ("Juanín", 1, at(2025, 3, 11, 11, 30), "Dolor de cabeza", AppointmentStatus::Confirmed),
        ("Bodoque", 2, at(2025, 3, 12, 9, 15), "Vacunación", AppointmentStatus::Pending),
    ];

    samples
        .into_iter()
        .filter_map(|(patient, doctor, date, reason, status)| {
            doctor_ids
                .get(doctor)
                .map(|&doctor_id| Appointment::new(patient, doctor_id, date, reason, status))
        })
        .collect()
}

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_default()
}
