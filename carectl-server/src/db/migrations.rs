//! Schema migrations
//!
//! Idempotent (`IF NOT EXISTS`) and applied in one transaction, so a failed
//! run leaves the schema untouched.

use sqlx::PgPool;

/// Tables in dependency order.
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN
                ('super_admin', 'admin', 'doctor', 'nurse', 'receptionist', 'pharmacy')),
            password_hash TEXT NOT NULL,
            phone TEXT,
            department TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "patients",
        r#"
        CREATE TABLE IF NOT EXISTS patients (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            date_of_birth DATE NOT NULL,
            gender TEXT NOT NULL CHECK (gender IN ('male', 'female', 'other')),
            phone TEXT,
            email TEXT,
            address TEXT,
            blood_group TEXT,
            emergency_contact TEXT,
            medical_history TEXT,
            registered_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "appointments",
        r#"
        CREATE TABLE IF NOT EXISTS appointments (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            patient_id UUID NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
            doctor_id UUID NOT NULL REFERENCES users(id),
            appointment_date DATE NOT NULL,
            appointment_time TIME NOT NULL,
            duration_minutes INT NOT NULL DEFAULT 30 CHECK (duration_minutes > 0),
            reason TEXT,
            notes TEXT,
            status TEXT NOT NULL DEFAULT 'scheduled'
                CHECK (status IN ('scheduled', 'completed', 'cancelled', 'no_show')),
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "vendors",
        r#"
        CREATE TABLE IF NOT EXISTS vendors (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL UNIQUE,
            contact_person TEXT,
            email TEXT,
            phone TEXT,
            address TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "medicines",
        r#"
        CREATE TABLE IF NOT EXISTS medicines (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL UNIQUE,
            generic_name TEXT,
            category TEXT,
            manufacturer TEXT,
            unit TEXT NOT NULL DEFAULT 'unit',
            unit_price_cents BIGINT NOT NULL DEFAULT 0 CHECK (unit_price_cents >= 0),
            current_stock INT NOT NULL DEFAULT 0,
            reorder_level INT NOT NULL DEFAULT 10 CHECK (reorder_level >= 0),
            vendor_id UUID REFERENCES vendors(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT medicines_stock_non_negative CHECK (current_stock >= 0)
        )
        "#,
    ),
    (
        "medicine_batches",
        r#"
        CREATE TABLE IF NOT EXISTS medicine_batches (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            medicine_id UUID NOT NULL REFERENCES medicines(id) ON DELETE CASCADE,
            batch_number TEXT NOT NULL,
            expiry_date DATE NOT NULL,
            quantity INT NOT NULL CHECK (quantity >= 0),
            received_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (medicine_id, batch_number)
        )
        "#,
    ),
    (
        "stock_transactions",
        r#"
        CREATE TABLE IF NOT EXISTS stock_transactions (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            medicine_id UUID NOT NULL REFERENCES medicines(id) ON DELETE CASCADE,
            batch_id UUID REFERENCES medicine_batches(id) ON DELETE SET NULL,
            transaction_type TEXT NOT NULL
                CHECK (transaction_type IN ('purchase', 'sale', 'return', 'adjustment', 'expired')),
            direction TEXT NOT NULL CHECK (direction IN ('increase', 'decrease')),
            quantity INT NOT NULL CHECK (quantity > 0),
            stock_after INT NOT NULL CHECK (stock_after >= 0),
            reference TEXT,
            performed_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "prescriptions",
        r#"
        CREATE TABLE IF NOT EXISTS prescriptions (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            patient_id UUID NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
            doctor_id UUID NOT NULL REFERENCES users(id),
            notes TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'partially_dispensed', 'dispensed')),
            dispensed_by UUID REFERENCES users(id) ON DELETE SET NULL,
            dispensed_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "prescription_items",
        r#"
        CREATE TABLE IF NOT EXISTS prescription_items (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            prescription_id UUID NOT NULL REFERENCES prescriptions(id) ON DELETE CASCADE,
            medicine_id UUID NOT NULL REFERENCES medicines(id),
            dosage TEXT NOT NULL,
            frequency TEXT NOT NULL,
            duration_days INT CHECK (duration_days > 0),
            quantity INT NOT NULL CHECK (quantity > 0),
            dispensed_quantity INT NOT NULL DEFAULT 0,
            CONSTRAINT prescription_items_dispensed_within_quantity
                CHECK (dispensed_quantity >= 0 AND dispensed_quantity <= quantity)
        )
        "#,
    ),
    (
        "rooms",
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            room_number TEXT NOT NULL UNIQUE,
            room_type TEXT NOT NULL
                CHECK (room_type IN ('general', 'private', 'icu', 'maternity', 'isolation')),
            capacity INT NOT NULL CHECK (capacity > 0),
            occupied INT NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'available'
                CHECK (status IN ('available', 'occupied', 'maintenance')),
            daily_rate_cents BIGINT NOT NULL DEFAULT 0 CHECK (daily_rate_cents >= 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT rooms_occupancy_within_capacity CHECK (occupied >= 0 AND occupied <= capacity)
        )
        "#,
    ),
    (
        "admissions",
        r#"
        CREATE TABLE IF NOT EXISTS admissions (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            patient_id UUID NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
            room_id UUID NOT NULL REFERENCES rooms(id),
            doctor_id UUID NOT NULL REFERENCES users(id),
            reason TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'admitted' CHECK (status IN ('admitted', 'discharged')),
            admitted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            discharged_at TIMESTAMPTZ,
            discharge_notes TEXT,
            created_by UUID REFERENCES users(id) ON DELETE SET NULL
        )
        "#,
    ),
    (
        "shifts",
        r#"
        CREATE TABLE IF NOT EXISTS shifts (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            staff_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            starts_at TIMESTAMPTZ NOT NULL,
            ends_at TIMESTAMPTZ NOT NULL,
            department TEXT,
            status TEXT NOT NULL DEFAULT 'scheduled'
                CHECK (status IN ('scheduled', 'in_progress', 'completed', 'cancelled')),
            checked_in_at TIMESTAMPTZ,
            checked_out_at TIMESTAMPTZ,
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (ends_at > starts_at)
        )
        "#,
    ),
    (
        "leave_requests",
        r#"
        CREATE TABLE IF NOT EXISTS leave_requests (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            staff_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            leave_type TEXT NOT NULL
                CHECK (leave_type IN ('sick', 'annual', 'casual', 'emergency', 'other')),
            start_date DATE NOT NULL,
            end_date DATE NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved', 'rejected')),
            reviewed_by UUID REFERENCES users(id) ON DELETE SET NULL,
            reviewed_at TIMESTAMPTZ,
            review_note TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (end_date >= start_date)
        )
        "#,
    ),
    (
        "invoices",
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            patient_id UUID NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
            admission_id UUID REFERENCES admissions(id) ON DELETE SET NULL,
            subtotal_cents BIGINT NOT NULL,
            discount_cents BIGINT NOT NULL DEFAULT 0,
            tax_cents BIGINT NOT NULL DEFAULT 0,
            total_cents BIGINT NOT NULL,
            paid_cents BIGINT NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'unpaid'
                CHECK (status IN ('unpaid', 'partially_paid', 'paid')),
            due_date DATE,
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT invoices_paid_within_total CHECK (paid_cents >= 0 AND paid_cents <= total_cents)
        )
        "#,
    ),
    (
        "invoice_items",
        r#"
        CREATE TABLE IF NOT EXISTS invoice_items (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
            description TEXT NOT NULL,
            quantity INT NOT NULL CHECK (quantity > 0),
            unit_price_cents BIGINT NOT NULL CHECK (unit_price_cents >= 0),
            amount_cents BIGINT NOT NULL
        )
        "#,
    ),
    (
        "payments",
        r#"
        CREATE TABLE IF NOT EXISTS payments (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
            amount_cents BIGINT NOT NULL CHECK (amount_cents > 0),
            method TEXT NOT NULL CHECK (method IN ('cash', 'card', 'insurance', 'bank_transfer')),
            reference TEXT,
            received_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "audit_logs",
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            actor_id UUID REFERENCES users(id) ON DELETE SET NULL,
            action TEXT NOT NULL,
            entity TEXT NOT NULL,
            entity_id UUID,
            details JSONB NOT NULL DEFAULT '{}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
];

/// Indexes, including the partial unique indexes that enforce
/// one-at-a-time rules under concurrent requests.
const INDEXES: &[&str] = &[
    // One booked appointment per doctor per start time
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_appointments_doctor_slot
        ON appointments(doctor_id, appointment_date, appointment_time)
        WHERE status = 'scheduled'",
    "CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(appointment_date)",
    "CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(lower(name))",
    "CREATE INDEX IF NOT EXISTS idx_batches_medicine_expiry ON medicine_batches(medicine_id, expiry_date)",
    "CREATE INDEX IF NOT EXISTS idx_stock_tx_medicine ON stock_transactions(medicine_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_prescriptions_patient ON prescriptions(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_prescriptions_status ON prescriptions(status)",
    "CREATE INDEX IF NOT EXISTS idx_prescription_items_rx ON prescription_items(prescription_id)",
    // One open admission per patient
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_admissions_active_patient
        ON admissions(patient_id) WHERE status = 'admitted'",
    // One shift in progress per staff member
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_shifts_active_staff
        ON shifts(staff_id) WHERE status = 'in_progress'",
    "CREATE INDEX IF NOT EXISTS idx_shifts_staff_start ON shifts(staff_id, starts_at)",
    "CREATE INDEX IF NOT EXISTS idx_leave_staff ON leave_requests(staff_id, start_date)",
    "CREATE INDEX IF NOT EXISTS idx_invoices_patient ON invoices(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_audit_created ON audit_logs(created_at DESC)",
];

/// Run all migrations
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running migrations...");
    let mut tx = pool.begin().await?;

    for (table, ddl) in TABLES {
        tracing::debug!(table, "ensuring table");
        sqlx::query(ddl).execute(&mut *tx).await?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    tracing::info!(tables = TABLES.len(), indexes = INDEXES.len(), "Migrations complete");
    Ok(())
}
