//! Integration tests for the Order aggregate.
//!
//! These tests exercise the order state machine through the service, with
//! real conditional writes against the in-memory document store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{AggregateId, StoreId, UserId};
use domain::{
    Actor, Aggregate, DeliveryAddress, DomainError, LineItem, Money, OrderError, OrderNumber,
    OrderService, OrderStatus, PaymentStatus, PlaceOrder,
};
use document_store::InMemoryDocumentStore;

fn create_service() -> OrderService<InMemoryDocumentStore> {
    OrderService::new(InMemoryDocumentStore::new())
}

fn input(customer: UserId, store: StoreId) -> PlaceOrder {
    PlaceOrder {
        customer,
        store,
        items: vec![LineItem::new(
            AggregateId::new(),
            "Apple",
            None,
            "piece",
            Money::from_cents(200),
            2,
        )],
        delivery_fee: Money::from_cents(300),
        discount: Money::zero(),
        coupon: None,
        delivery_address: DeliveryAddress {
            recipient: "Ana".to_string(),
            phone: "600000000".to_string(),
            street: "Carrer Major 1".to_string(),
            detail: None,
            location: None,
        },
        pickup: None,
        note: Some("ring twice".to_string()),
        payment_method: "card".to_string(),
    }
}

async fn place(service: &OrderService<InMemoryDocumentStore>) -> (AggregateId, UserId, StoreId) {
    let customer = UserId::new();
    let store = StoreId::new();
    let number = OrderNumber::generate(Utc::now());
    let result = service
        .place(&number, input(customer, store), Utc::now())
        .await
        .unwrap();
    (result.aggregate.id().unwrap(), customer, store)
}

async fn make_ready(service: &OrderService<InMemoryDocumentStore>, id: AggregateId) {
    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
    ] {
        service
            .advance(id, Actor::System, next, Utc::now())
            .await
            .unwrap();
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn complete_order_lifecycle() {
        let service = create_service();
        let (id, customer, store) = place(&service).await;
        let merchant = Actor::Merchant {
            user: UserId::new(),
            store,
        };

        let result = service.confirm_payment(id, Utc::now()).await.unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::Confirmed);
        assert_eq!(result.aggregate.payment_status(), PaymentStatus::Paid);

        service
            .advance(id, merchant, OrderStatus::Preparing, Utc::now())
            .await
            .unwrap();
        service
            .advance(id, merchant, OrderStatus::Ready, Utc::now())
            .await
            .unwrap();

        let agent = UserId::new();
        let result = service
            .assign_agent(id, agent, Utc::now(), Duration::minutes(45))
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::Delivering);
        assert!(result.aggregate.estimated_delivery_time().is_some());

        let result = service
            .advance(id, Actor::Agent(agent), OrderStatus::Delivered, Utc::now())
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::Delivered);
        assert!(result.aggregate.actual_delivery_time().is_some());

        let order = service.order(id).await.unwrap();
        assert!(order.can_view(&Actor::Customer(customer)));
        assert_eq!(order.total(), Money::from_cents(700));
    }

    #[tokio::test]
    async fn pending_to_delivering_is_invalid() {
        let service = create_service();
        let (id, _, _) = place(&service).await;

        let result = service
            .advance(id, Actor::System, OrderStatus::Delivering, Utc::now())
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidTransition { .. }))
        ));
        assert_eq!(
            service.order(id).await.unwrap().status(),
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn placing_the_same_number_twice_fails() {
        let service = create_service();
        let number = OrderNumber::generate(Utc::now());
        let customer = UserId::new();
        let store = StoreId::new();

        service
            .place(&number, input(customer, store), Utc::now())
            .await
            .unwrap();
        let result = service
            .place(&number, input(customer, store), Utc::now())
            .await;

        assert!(matches!(result, Err(DomainError::Store(_))));
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn claimable_lists_only_ready_unbound_orders() {
        let service = create_service();
        let (ready, _, _) = place(&service).await;
        let (taken, _, _) = place(&service).await;
        place(&service).await;
        make_ready(&service, ready).await;
        make_ready(&service, taken).await;
        service
            .assign_agent(taken, UserId::new(), Utc::now(), Duration::minutes(45))
            .await
            .unwrap();

        let claimable = service.claimable(None).await.unwrap();

        assert_eq!(claimable.len(), 1);
        assert_eq!(claimable[0].id(), Some(ready));
    }

    #[tokio::test]
    async fn unpaid_created_before_respects_cutoff() {
        let service = create_service();
        let (id, _, _) = place(&service).await;

        assert!(service
            .unpaid_created_before(Utc::now() - Duration::minutes(30))
            .await
            .unwrap()
            .is_empty());

        let overdue = service
            .unpaid_created_before(Utc::now() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id(), Some(id));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn exactly_one_agent_wins_the_claim() {
        let service = Arc::new(create_service());
        let (id, _, _) = place(&service).await;
        make_ready(&service, id).await;

        let agents: Vec<UserId> = (0..16).map(|_| UserId::new()).collect();
        let tasks: Vec<_> = agents
            .iter()
            .map(|&agent| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .assign_agent(id, agent, Utc::now(), Duration::minutes(45))
                        .await
                        .map(|_| agent)
                })
            })
            .collect();

        let mut winners = Vec::new();
        let mut losers = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(agent) => winners.push(agent),
                Err(DomainError::Order(OrderError::NotAvailable)) => losers += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(losers, 15);
        let order = service.order(id).await.unwrap();
        assert_eq!(order.agent(), Some(winners[0]));
        assert_eq!(order.status(), OrderStatus::Delivering);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_and_expiry_race_yields_one_release_obligation() {
        for _ in 0..20 {
            let service = Arc::new(create_service());
            let (id, customer, _) = place(&service).await;
            let later = Utc::now() + Duration::minutes(31);

            let cancel = {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .cancel(id, Actor::Customer(customer), None, later)
                        .await
                })
            };
            let expire = {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.expire(id, later, Duration::minutes(30)).await })
            };

            let results = [cancel.await.unwrap(), expire.await.unwrap()];
            let obligations = results
                .iter()
                .filter_map(|r| r.as_ref().ok())
                .filter(|r| r.events.iter().any(|e| e.releases_inventory()))
                .count();

            assert_eq!(obligations, 1);
            let order = service.order(id).await.unwrap();
            assert_eq!(order.status(), OrderStatus::Cancelled);
            assert!(order.inventory_released());
        }
    }
}
