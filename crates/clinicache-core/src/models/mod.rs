//! Data models for hospital entities.
//!
//! This module contains the data structures persisted by the local store
//! and returned by the drug information API:
//!
//! - `Doctor`, `DoctorPatch`: Staff records with contact info
//! - `Appointment`, `AppointmentPatch`, `AppointmentStatus`: Patient bookings
//! - `DrugSearchResponse`, `DrugLabel`: openFDA drug label results

pub mod appointment;
pub mod doctor;
pub mod drug;

pub use appointment::{Appointment, AppointmentPatch, AppointmentStatus};
pub use doctor::{Doctor, DoctorPatch};
pub use drug::{DrugLabel, DrugMeta, DrugSearchResponse, OpenFda, ResultPage};
