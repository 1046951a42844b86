//! Appointments log file name.

/// Global appointments log (`date, pid, doctor` per line).
pub struct AppointmentsFile;

impl AppointmentsFile {
    pub const NAME: &'static str = "appointments.txt";
}
