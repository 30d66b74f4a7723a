//! Staff roles and what each one may do

text_enum! {
    /// Role attached to every user account.
    pub enum Role: "role" {
        SuperAdmin => "super_admin",
        Admin => "admin",
        Doctor => "doctor",
        Nurse => "nurse",
        Receptionist => "receptionist",
        Pharmacy => "pharmacy",
    }
}

/// Coarse-grained capabilities checked by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageUsers,
    ManagePatients,
    ManageAppointments,
    ManagePharmacy,
    Prescribe,
    Dispense,
    ViewPrescriptions,
    ManageAdmissions,
    ManageStaff,
    ManageBilling,
    ViewAudit,
}

impl Role {
    pub fn allows(self, permission: Permission) -> bool {
        use Permission::*;
        use Role::*;

        match permission {
            ManageUsers | ManageStaff | ViewAudit => matches!(self, SuperAdmin | Admin),
            ManagePatients | ManageAdmissions => {
                matches!(self, SuperAdmin | Admin | Receptionist | Doctor | Nurse)
            }
            ManageAppointments => matches!(self, SuperAdmin | Admin | Receptionist | Doctor),
            ManagePharmacy => matches!(self, SuperAdmin | Admin | Pharmacy),
            Prescribe => self == Doctor,
            Dispense => self == Pharmacy,
            ViewPrescriptions => matches!(self, SuperAdmin | Admin | Doctor | Nurse | Pharmacy),
            ManageBilling => matches!(self, SuperAdmin | Admin | Receptionist),
        }
    }

    /// Whether an account with this role may create or deactivate an
    /// account with `other`. Admins cannot touch admins or super-admins.
    pub fn can_manage(self, other: Role) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Admin => !matches!(other, Role::SuperAdmin | Role::Admin),
            _ => false,
        }
    }

    /// Roles that work shifts and file leave requests.
    pub fn is_staff(self) -> bool {
        !matches!(self, Role::SuperAdmin)
    }
}
