//! Typed row ID definitions for all hospital entities.
//!
//! Each ID wraps the entity's BIGSERIAL primary key. They exist so a
//! `PatientId` can never be passed where a `DoctorId` is expected.

use crate::define_record_id;

// =============================================================================
// People
// =============================================================================

define_record_id!(PatientId);
define_record_id!(DoctorId);
define_record_id!(NurseId);
define_record_id!(LabStaffId);
define_record_id!(StaffAccountId);

// =============================================================================
// Clinical records
// =============================================================================

define_record_id!(AppointmentId);
define_record_id!(ProcedureId);
define_record_id!(LabTestId);
define_record_id!(LabTestCategoryId);
define_record_id!(PrescriptionId);

// =============================================================================
// Billing and scheduling
// =============================================================================

define_record_id!(TransactionId);
define_record_id!(DoctorScheduleId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_string() {
        let id = PatientId::new(42);
        let parsed: PatientId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn json_is_plain_integer() {
        let id = AppointmentId::new(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let parsed: AppointmentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ordering_follows_value() {
        assert!(TransactionId::new(1) < TransactionId::new(2));
    }
}
