use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{AggregateId, StoreId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use document_store::InMemoryDocumentStore;
use domain::{
    Actor, Aggregate, CartService, DeliveryAddress, InventoryLedger, LineItem, Money, NewProduct,
    OrderNumber, OrderService, OrderStatus, PlaceOrder,
};

fn new_product(store: StoreId, stock: u32) -> NewProduct {
    NewProduct {
        store,
        name: "Bench Widget".to_string(),
        image: None,
        unit: "piece".to_string(),
        price: Money::from_cents(250),
        stock,
    }
}

fn place_input() -> PlaceOrder {
    PlaceOrder {
        customer: UserId::new(),
        store: StoreId::new(),
        items: vec![LineItem::new(
            AggregateId::new(),
            "Bench Widget",
            None,
            "piece",
            Money::from_cents(250),
            1,
        )],
        delivery_fee: Money::from_cents(300),
        discount: Money::zero(),
        coupon: None,
        delivery_address: DeliveryAddress {
            recipient: "Bench".to_string(),
            phone: "600000000".to_string(),
            street: "Bench Street 1".to_string(),
            detail: None,
            location: None,
        },
        pickup: None,
        note: None,
        payment_method: "card".to_string(),
    }
}

fn bench_reserve_uncontended(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InventoryLedger::new(InMemoryDocumentStore::new());
    let product = rt.block_on(async {
        ledger
            .list_product(new_product(StoreId::new(), u32::MAX))
            .await
            .unwrap()
    });
    let id = product.id().unwrap();

    c.bench_function("domain/reserve_uncontended", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.reserve(id, 1).await.unwrap();
            });
        });
    });
}

fn bench_reserve_contended(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = Arc::new(InventoryLedger::new(InMemoryDocumentStore::new()).with_max_attempts(1024));
    let product = rt.block_on(async {
        ledger
            .list_product(new_product(StoreId::new(), u32::MAX))
            .await
            .unwrap()
    });
    let id = product.id().unwrap();

    c.bench_function("domain/reserve_contended_16", |b| {
        b.iter(|| {
            rt.block_on(async {
                let tasks: Vec<_> = (0..16)
                    .map(|_| {
                        let ledger = Arc::clone(&ledger);
                        tokio::spawn(async move { ledger.reserve(id, 1).await })
                    })
                    .collect();
                for task in tasks {
                    task.await.unwrap().unwrap();
                }
            });
        });
    });
}

fn bench_cart_add(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let ledger = InventoryLedger::new(store.clone());
    let carts = CartService::new(store);
    let product = rt.block_on(async {
        ledger
            .list_product(new_product(StoreId::new(), 1_000))
            .await
            .unwrap()
    });
    let id = product.id().unwrap();

    c.bench_function("domain/cart_add_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                carts.add_item(UserId::new(), id, 1).await.unwrap();
            });
        });
    });
}

fn bench_claim_race(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/claim_race_8_agents", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = Arc::new(OrderService::new(InMemoryDocumentStore::new()));
                let number = OrderNumber::generate(Utc::now());
                let result = service.place(&number, place_input(), Utc::now()).await.unwrap();
                let id = result.aggregate.id().unwrap();
                for next in [
                    OrderStatus::Confirmed,
                    OrderStatus::Preparing,
                    OrderStatus::Ready,
                ] {
                    service.advance(id, Actor::System, next, Utc::now()).await.unwrap();
                }

                let tasks: Vec<_> = (0..8)
                    .map(|_| {
                        let service = Arc::clone(&service);
                        tokio::spawn(async move {
                            service
                                .assign_agent(id, UserId::new(), Utc::now(), Duration::minutes(45))
                                .await
                                .is_ok()
                        })
                    })
                    .collect();
                let mut winners = 0;
                for task in tasks {
                    if task.await.unwrap() {
                        winners += 1;
                    }
                }
                assert_eq!(winners, 1);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_reserve_uncontended,
    bench_reserve_contended,
    bench_cart_add,
    bench_claim_race,
);
criterion_main!(benches);
