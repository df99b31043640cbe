//! Status transitions: validate against the policy, persist, then notify.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus};
use crate::domain::value_objects::{Actor, ActorRole};
use crate::domain::TransitionPolicy;
use crate::ledger::{OrderLedger, StatusChange};
use crate::notifications::NotificationDispatcher;
use crate::{OrderError, Result};

pub struct StatusTransitionService {
    ledger: Arc<dyn OrderLedger>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl StatusTransitionService {
    pub fn new(ledger: Arc<dyn OrderLedger>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { ledger, dispatcher }
    }

    /// Moves one order one step. The result reflects persistence only:
    /// notification problems after the commit are logged by the dispatcher
    /// and never reach the caller.
    #[tracing::instrument(skip(self, note), fields(role = %actor.role))]
    pub async fn transition(&self, order_id: Uuid, next: OrderStatus, note: Option<String>, actor: Actor) -> Result<Order> {
        let mut tx = self.ledger.begin().await?;
        let order = tx.find_order(order_id).await?.ok_or(OrderError::OrderNotFound(order_id))?;

        let current = order.status.canonical();
        if next.canonical() == current {
            return Err(OrderError::NoOpTransition(order.status));
        }
        if !TransitionPolicy::permits(actor.role, current, next) {
            return Err(OrderError::IllegalTransition { role: actor.role, from: order.status, to: next });
        }

        let courier = (actor.role == ActorRole::Delivery && next == OrderStatus::PickedUp).then_some(actor.id);
        tx.update_status(&StatusChange { order_id, expected: order.status, next, note, delivery_agent_id: courier }).await?;
        let updated = tx.find_order(order_id).await?.ok_or(OrderError::OrderNotFound(order_id))?;
        tx.commit().await?;
        info!(%order_id, from = %order.status, to = %next, "order status changed");

        self.dispatcher.dispatch(&updated, next).await;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CatalogProduct, OrderItem};
    use crate::domain::value_objects::{Money, Quantity};
    use crate::ledger::MemoryLedger;
    use crate::notifications::testing::RecordingGateway;
    use crate::notifications::MemoryRecipientDirectory;

    struct Fixture {
        ledger: MemoryLedger,
        gateway: Arc<RecordingGateway>,
        service: StatusTransitionService,
    }

    fn fixture_with(gateway: RecordingGateway) -> (Fixture, MemoryRecipientDirectory) {
        let ledger = MemoryLedger::new();
        let directory = MemoryRecipientDirectory::new();
        let gateway = Arc::new(gateway);
        let dispatcher = NotificationDispatcher::new(Arc::new(directory.clone()), gateway.clone());
        let service = StatusTransitionService::new(Arc::new(ledger.clone()), Arc::new(dispatcher));
        (Fixture { ledger, gateway, service }, directory)
    }

    async fn seeded(f: &Fixture, status: OrderStatus) -> Order {
        let mut order = Order::placeholder(Uuid::new_v4());
        let product = CatalogProduct::new(Uuid::new_v4(), Uuid::new_v4(), "Moi moi", Money::from_minor(1200));
        order.items.push(OrderItem::priced(order.id, &product, product.base_price, Quantity::new(1).unwrap(), None));
        order.apply_totals(Money::from_minor(1200), Money::ZERO);
        order.status = status;
        f.ledger.insert(order.clone()).await;
        order
    }

    async fn stored_status(f: &Fixture, id: Uuid) -> OrderStatus {
        f.ledger.find_order(id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_business_confirms_pending_order() {
        let (f, directory) = fixture_with(RecordingGateway::default());
        let order = seeded(&f, OrderStatus::Pending).await;
        directory.register_token(order.user_id, "client").await;

        let updated = f.service.transition(order.id, OrderStatus::Confirmed, None, Actor::business(Uuid::new_v4())).await.unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);
        assert_eq!(stored_status(&f, order.id).await, OrderStatus::Confirmed);
        assert_eq!(f.gateway.statuses().await, vec!["CONFIRMED"]);
    }

    #[tokio::test]
    async fn test_client_cannot_cancel_confirmed_order() {
        let (f, _) = fixture_with(RecordingGateway::default());
        let order = seeded(&f, OrderStatus::Confirmed).await;
        let err = f.service.transition(order.id, OrderStatus::Cancelled, None, Actor::client(order.user_id)).await.unwrap_err();
        assert!(matches!(err, OrderError::IllegalTransition { role: ActorRole::Client, from: OrderStatus::Confirmed, to: OrderStatus::Cancelled }));
        assert_eq!(stored_status(&f, order.id).await, OrderStatus::Confirmed);
        assert!(f.gateway.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_every_unlisted_move_is_illegal_and_leaves_status() {
        let (f, _) = fixture_with(RecordingGateway::default());
        let actors = [Actor::client(Uuid::new_v4()), Actor::business(Uuid::new_v4()), Actor::delivery(Uuid::new_v4())];
        for actor in actors {
            for current in OrderStatus::ALL {
                for next in OrderStatus::ALL {
                    if next.canonical() == current.canonical() || TransitionPolicy::permits(actor.role, current, next) {
                        continue;
                    }
                    let order = seeded(&f, current).await;
                    let result = f.service.transition(order.id, next, Some("x".into()), actor).await;
                    assert!(matches!(result, Err(OrderError::IllegalTransition { .. })), "{} {current} -> {next}", actor.role);
                    let stored = f.ledger.find_order(order.id).await.unwrap().unwrap();
                    assert_eq!(stored.status, current);
                    assert_eq!(stored.note, None);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_terminal_orders_never_move() {
        let (f, _) = fixture_with(RecordingGateway::default());
        let actors = [Actor::client(Uuid::new_v4()), Actor::business(Uuid::new_v4()), Actor::delivery(Uuid::new_v4())];
        for current in [OrderStatus::Delivered, OrderStatus::Cancelled, OrderStatus::Rejected] {
            let order = seeded(&f, current).await;
            for actor in actors {
                for next in OrderStatus::ALL {
                    assert!(f.service.transition(order.id, next, None, actor).await.is_err());
                }
            }
            assert_eq!(stored_status(&f, order.id).await, current);
        }
    }

    #[tokio::test]
    async fn test_same_status_is_a_no_op() {
        let (f, _) = fixture_with(RecordingGateway::default());
        let order = seeded(&f, OrderStatus::Pending).await;
        let before = f.ledger.find_order(order.id).await.unwrap().unwrap();
        let err = f.service.transition(order.id, OrderStatus::Pending, Some("again".into()), Actor::business(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, OrderError::NoOpTransition(OrderStatus::Pending)));
        assert_eq!(f.ledger.find_order(order.id).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_full_delivery_path_records_courier() {
        let (f, _) = fixture_with(RecordingGateway::default());
        let order = seeded(&f, OrderStatus::Pending).await;
        let business = Actor::business(Uuid::new_v4());
        let courier = Actor::delivery(Uuid::new_v4());

        f.service.transition(order.id, OrderStatus::Confirmed, None, business).await.unwrap();
        f.service.transition(order.id, OrderStatus::ReadyForPickup, None, business).await.unwrap();
        let picked = f.service.transition(order.id, OrderStatus::PickedUp, None, courier).await.unwrap();
        assert_eq!(picked.delivery_agent_id, Some(courier.id));
        let done = f.service.transition(order.id, OrderStatus::Delivered, Some("Left at gate".into()), courier).await.unwrap();
        assert_eq!(done.status, OrderStatus::Delivered);
        assert_eq!(done.note.as_deref(), Some("Left at gate"));
    }

    #[tokio::test]
    async fn test_rejection_stores_note() {
        let (f, _) = fixture_with(RecordingGateway::default());
        let order = seeded(&f, OrderStatus::Pending).await;
        let updated = f.service.transition(order.id, OrderStatus::Rejected, Some("Out of gas".into()), Actor::business(Uuid::new_v4())).await.unwrap();
        assert_eq!(updated.note.as_deref(), Some("Out of gas"));
    }

    #[tokio::test]
    async fn test_assigned_order_can_be_picked_up() {
        let (f, _) = fixture_with(RecordingGateway::default());
        let order = seeded(&f, OrderStatus::DeliveryAssigned).await;
        let courier = Actor::delivery(Uuid::new_v4());
        let err = f.service.transition(order.id, OrderStatus::ReadyForPickup, None, courier).await.unwrap_err();
        assert!(matches!(err, OrderError::NoOpTransition(OrderStatus::DeliveryAssigned)));
        let updated = f.service.transition(order.id, OrderStatus::PickedUp, None, courier).await.unwrap();
        assert_eq!(updated.status, OrderStatus::PickedUp);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_transition() {
        let (f, directory) = fixture_with(RecordingGateway { unreachable: Some("client".into()), ..Default::default() });
        let order = seeded(&f, OrderStatus::Pending).await;
        directory.register_token(order.user_id, "client").await;

        let updated = f.service.transition(order.id, OrderStatus::Confirmed, None, Actor::business(Uuid::new_v4())).await.unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);
        assert_eq!(stored_status(&f, order.id).await, OrderStatus::Confirmed);
        assert_eq!(f.gateway.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let (f, _) = fixture_with(RecordingGateway::default());
        let id = Uuid::new_v4();
        let err = f.service.transition(id, OrderStatus::Confirmed, None, Actor::business(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, OrderError::OrderNotFound(x) if x == id));
    }
}
