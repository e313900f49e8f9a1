//! Authorization policy: one table mapping (operation, role) to allow/deny.
//!
//! Every mutating endpoint names its operation here instead of checking role
//! lists inline, so the whole access matrix lives (and is tested) in one
//! place. Reads only require a valid session and have no operation.

use crate::models::Role;
use strum::{Display, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Operation {
    CustomerCreate,
    CustomerUpdate,
    CustomerDelete,
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    OrderCreate,
    OrderUpdate,
    OrderDelete,
    StageCreate,
    StageUpdate,
    StageDelete,
    TaskCreate,
    TaskUpdate,
    TaskDelete,
    InventoryCreate,
    InventoryUpdate,
    InventoryDelete,
    UserCreate,
    UserUpdate,
    UserDelete,
}

pub fn is_allowed(operation: Operation, role: Role) -> bool {
    use Operation::*;
    match role {
        Role::Admin => true,
        Role::Manager => !matches!(
            operation,
            CustomerDelete
                | ProductDelete
                | OrderDelete
                | TaskDelete
                | InventoryDelete
                | UserCreate
                | UserUpdate
                | UserDelete
        ),
        Role::Worker => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn admin_is_allowed_everything() {
        for op in Operation::iter() {
            assert!(is_allowed(op, Role::Admin), "admin denied {op}");
        }
    }

    #[test]
    fn worker_is_denied_every_mutation() {
        for op in Operation::iter() {
            assert!(!is_allowed(op, Role::Worker), "worker allowed {op}");
        }
    }

    #[test]
    fn manager_matrix_is_exact() {
        use Operation::*;
        let denied = [
            CustomerDelete,
            ProductDelete,
            OrderDelete,
            TaskDelete,
            InventoryDelete,
            UserCreate,
            UserUpdate,
            UserDelete,
        ];
        for op in Operation::iter() {
            let expected = !denied.contains(&op);
            assert_eq!(
                is_allowed(op, Role::Manager),
                expected,
                "manager policy wrong for {op}"
            );
        }
    }
}
