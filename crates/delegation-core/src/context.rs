use crate::student::StaffId;
use chrono::NaiveDate;

/// Per-call context for engine operations, passed explicitly instead of read
/// from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineContext {
    pub today: NaiveDate,
    pub acting_staff: Option<StaffId>,
}

impl EngineContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            acting_staff: None,
        }
    }

    pub fn acting_as(mut self, staff_id: StaffId) -> Self {
        self.acting_staff = Some(staff_id);
        self
    }

    pub fn for_today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }
}
