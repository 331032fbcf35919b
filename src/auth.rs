use uuid::Uuid;

use crate::error::AppError;

/// Role carried by an authenticated caller. Verifying the JWT/session that
/// produces this value is out of scope; only the resulting shape and
/// the authorization predicates the Booking Engine enforces on it belong
/// to the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

impl Role {
    pub fn is_staff_or_admin(self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

/// `{userId, role}`, passed into every Booking Engine method that requires
/// authorization.
#[derive(Clone, Copy, Debug)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Customers may only act on their own bookings; staff/admin may act on any.
    pub fn require_owner_or_staff(&self, customer_ref: Uuid) -> Result<(), AppError> {
        if self.role.is_staff_or_admin() || self.user_id == customer_ref {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "customers may only act on their own bookings".into(),
            ))
        }
    }

    /// Confirm, mark-no-show, update, and extend-on-behalf-of-customer are
    /// staff/admin-only operations.
    pub fn require_staff_or_admin(&self) -> Result<(), AppError> {
        if self.role.is_staff_or_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "this operation requires staff or admin role".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_can_act_on_own_booking() {
        let uid = Uuid::new_v4();
        let ctx = AuthContext::new(uid, Role::Customer);
        assert!(ctx.require_owner_or_staff(uid).is_ok());
    }

    #[test]
    fn customer_cannot_act_on_others_booking() {
        let ctx = AuthContext::new(Uuid::new_v4(), Role::Customer);
        assert!(ctx.require_owner_or_staff(Uuid::new_v4()).is_err());
    }

    #[test]
    fn staff_can_act_on_any_booking() {
        let ctx = AuthContext::new(Uuid::new_v4(), Role::Staff);
        assert!(ctx.require_owner_or_staff(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn require_staff_or_admin_rejects_customer() {
        let ctx = AuthContext::new(Uuid::new_v4(), Role::Customer);
        assert!(ctx.require_staff_or_admin().is_err());
    }
}
