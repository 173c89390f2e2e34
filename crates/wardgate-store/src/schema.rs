//! SQLite schema definition.

/// Patient and visitor tables.
///
/// `patient_code` is indexed but deliberately not UNIQUE: two registrations
/// may derive the same code, and both rows are kept.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fullname TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT NOT NULL,
    aadhaar TEXT NOT NULL,
    image_path TEXT,
    patient_code TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_code ON patients(patient_code);

-- patient_code is a soft reference: visitors may name a code that no
-- patient row carries.
CREATE TABLE IF NOT EXISTS visitors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    patient_code TEXT NOT NULL,
    ward TEXT NOT NULL,
    image_path TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_visitors_patient ON visitors(patient_code);
"#;
