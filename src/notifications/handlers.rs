//! One handler per resulting status.
//!
//! The match in [`handler_for`] has no wildcard arm, so a new status does not
//! compile until someone decides what it should send.

use crate::domain::aggregates::{Order, OrderStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    Client,
    BusinessOwners,
    AvailableCouriers,
    AssignedCourier,
}

#[derive(Clone, Copy)]
pub struct Handler {
    pub audiences: &'static [Audience],
    pub title: &'static str,
    pub body: fn(&Order) -> String,
}

pub fn handler_for(status: OrderStatus) -> Option<Handler> {
    use Audience::*;
    match status {
        // nothing is sent for a freshly placed order yet
        OrderStatus::Pending => None,
        OrderStatus::Confirmed => Some(Handler {
            audiences: &[Client],
            title: "Order confirmed",
            body: |o| format!("Your order {} was accepted and is being prepared.", short_ref(o)),
        }),
        OrderStatus::ReadyForPickup => Some(Handler {
            audiences: &[Client, AvailableCouriers],
            title: "Order ready for pickup",
            body: |o| format!("Order {} is ready to be collected.", short_ref(o)),
        }),
        OrderStatus::DeliveryAssigned => Some(Handler {
            audiences: &[Client, BusinessOwners, AssignedCourier],
            title: "Courier assigned",
            body: |o| format!("A courier has been assigned to order {}.", short_ref(o)),
        }),
        OrderStatus::PickedUp => Some(Handler {
            audiences: &[Client, BusinessOwners],
            title: "Order on the way",
            body: |o| format!("Order {} has been picked up and is on the way.", short_ref(o)),
        }),
        OrderStatus::Delivered => Some(Handler {
            audiences: &[Client, BusinessOwners],
            title: "Order delivered",
            body: |o| format!("Order {} was delivered. Total paid: {}.", short_ref(o), o.total),
        }),
        OrderStatus::Cancelled => Some(Handler {
            audiences: &[BusinessOwners],
            title: "Order cancelled",
            body: |o| format!("The customer cancelled order {}.", short_ref(o)),
        }),
        OrderStatus::Rejected => Some(Handler {
            audiences: &[Client],
            title: "Order rejected",
            body: |o| match &o.note {
                Some(reason) => format!("Order {} was rejected: {}", short_ref(o), reason),
                None => format!("Order {} was rejected by the store.", short_ref(o)),
            },
        }),
    }
}

/// First block of the order id, the reference shown to customers.
fn short_ref(order: &Order) -> String {
    let id = order.id.simple().to_string();
    format!("#{}", &id[..8].to_uppercase())
}
