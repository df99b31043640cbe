//! Which actor may move an order from which status to which.
//!
//! ```text
//! PENDING          --client-->   CANCELLED
//! PENDING          --business--> REJECTED | CONFIRMED
//! CONFIRMED        --business--> READY_FOR_PICKUP
//! READY_FOR_PICKUP --delivery--> PICKED_UP        (on the way)
//! PICKED_UP        --delivery--> DELIVERED
//! ```
//!
//! Every move is a single hop. Terminal statuses have no way out.

use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::ActorRole;

pub struct TransitionPolicy;

impl TransitionPolicy {
    pub fn allowed_next(role: ActorRole, current: OrderStatus) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match (role, current.canonical()) {
            (ActorRole::Client, Pending) => &[Cancelled],
            (ActorRole::Business, Pending) => &[Rejected, Confirmed],
            (ActorRole::Business, Confirmed) => &[ReadyForPickup],
            (ActorRole::Delivery, ReadyForPickup) => &[PickedUp],
            (ActorRole::Delivery, PickedUp) => &[Delivered],
            _ => &[],
        }
    }

    pub fn permits(role: ActorRole, current: OrderStatus, next: OrderStatus) -> bool {
        Self::allowed_next(role, current).contains(&next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ROLES: [ActorRole; 3] = [ActorRole::Client, ActorRole::Business, ActorRole::Delivery];

    #[test]
    fn test_table() {
        assert_eq!(TransitionPolicy::allowed_next(ActorRole::Client, Pending), &[Cancelled]);
        assert_eq!(TransitionPolicy::allowed_next(ActorRole::Business, Pending), &[Rejected, Confirmed]);
        assert_eq!(TransitionPolicy::allowed_next(ActorRole::Business, Confirmed), &[ReadyForPickup]);
        assert_eq!(TransitionPolicy::allowed_next(ActorRole::Delivery, ReadyForPickup), &[PickedUp]);
        assert_eq!(TransitionPolicy::allowed_next(ActorRole::Delivery, PickedUp), &[Delivered]);
        assert!(TransitionPolicy::allowed_next(ActorRole::Client, Confirmed).is_empty());
    }

    #[test]
    fn test_terminal_statuses_have_no_exit() {
        for role in ROLES {
            for status in OrderStatus::ALL.into_iter().filter(OrderStatus::is_terminal) {
                assert!(TransitionPolicy::allowed_next(role, status).is_empty(), "{role} {status}");
            }
        }
    }

    #[test]
    fn test_no_multi_hop() {
        for role in ROLES {
            assert!(!TransitionPolicy::permits(role, Pending, Delivered));
            assert!(!TransitionPolicy::permits(role, Pending, PickedUp));
            assert!(!TransitionPolicy::permits(role, Confirmed, Delivered));
        }
    }

    #[test]
    fn test_assigned_order_waits_for_pickup() {
        assert!(TransitionPolicy::permits(ActorRole::Delivery, DeliveryAssigned, PickedUp));
        assert!(!TransitionPolicy::permits(ActorRole::Business, DeliveryAssigned, PickedUp));
    }

    #[test]
    fn test_six_distinct_moves_plus_assigned_alias() {
        let count = |statuses: &[OrderStatus]| -> usize {
            ROLES.iter().flat_map(|role| statuses.iter().map(move |s| TransitionPolicy::allowed_next(*role, *s).len())).sum()
        };
        let distinct: Vec<OrderStatus> = OrderStatus::ALL.into_iter().filter(|s| *s != DeliveryAssigned).collect();
        assert_eq!(count(&distinct), 6);
        // DELIVERY_ASSIGNED adds no move of its own, it borrows READY_FOR_PICKUP's
        assert_eq!(count(&[DeliveryAssigned]), 1);
        assert_eq!(TransitionPolicy::allowed_next(ActorRole::Delivery, DeliveryAssigned), TransitionPolicy::allowed_next(ActorRole::Delivery, ReadyForPickup));
    }
}
