//! Integration tests for the Cart Store.

use common::{AggregateId, StoreId, UserId};
use domain::{
    Aggregate, CartError, CartService, DomainError, InventoryError, InventoryLedger, Money,
    NewProduct,
};
use document_store::InMemoryDocumentStore;

struct Fixture {
    carts: CartService<InMemoryDocumentStore>,
    ledger: InventoryLedger<InMemoryDocumentStore>,
}

impl Fixture {
    fn new() -> Self {
        let store = InMemoryDocumentStore::new();
        Self {
            carts: CartService::new(store.clone()),
            ledger: InventoryLedger::new(store),
        }
    }

    async fn product(&self, store: StoreId, name: &str, price: i64, stock: u32) -> AggregateId {
        self.ledger
            .list_product(NewProduct {
                store,
                name: name.to_string(),
                image: None,
                unit: "piece".to_string(),
                price: Money::from_cents(price),
                stock,
            })
            .await
            .unwrap()
            .id()
            .unwrap()
    }
}

#[tokio::test]
async fn absent_cart_reads_as_empty() {
    let fixture = Fixture::new();
    let cart = fixture.carts.get_cart(UserId::new()).await.unwrap();

    assert!(cart.is_empty());
    assert_eq!(cart.total(), Money::zero());
}

#[tokio::test]
async fn add_items_and_compute_total() {
    let fixture = Fixture::new();
    let store = StoreId::new();
    let apple = fixture.product(store, "Apple", 200, 10).await;
    let banana = fixture.product(store, "Banana", 150, 10).await;
    let customer = UserId::new();

    fixture.carts.add_item(customer, apple, 2).await.unwrap();
    let cart = fixture.carts.add_item(customer, banana, 1).await.unwrap();

    assert_eq!(cart.items().len(), 2);
    assert_eq!(cart.store(), Some(store));
    assert_eq!(cart.total(), Money::from_cents(550));
}

#[tokio::test]
async fn add_rereads_current_price() {
    let fixture = Fixture::new();
    let apple = fixture.product(StoreId::new(), "Apple", 200, 10).await;
    let customer = UserId::new();

    fixture.carts.add_item(customer, apple, 1).await.unwrap();
    fixture
        .ledger
        .change_price(apple, Money::from_cents(300))
        .await
        .unwrap();
    let cart = fixture.carts.add_item(customer, apple, 1).await.unwrap();

    assert_eq!(cart.items()[0].price, Money::from_cents(300));
    assert_eq!(cart.total(), Money::from_cents(600));
}

#[tokio::test]
async fn store_mismatch_is_rejected() {
    let fixture = Fixture::new();
    let apple = fixture.product(StoreId::new(), "Apple", 200, 10).await;
    let bread = fixture.product(StoreId::new(), "Bread", 250, 10).await;
    let customer = UserId::new();
    fixture.carts.add_item(customer, apple, 1).await.unwrap();

    let result = fixture.carts.add_item(customer, bread, 1).await;

    assert!(matches!(
        result,
        Err(DomainError::Cart(CartError::StoreMismatch { .. }))
    ));
}

#[tokio::test]
async fn add_beyond_stock_is_rejected() {
    let fixture = Fixture::new();
    let apple = fixture.product(StoreId::new(), "Apple", 200, 1).await;

    let result = fixture.carts.add_item(UserId::new(), apple, 2).await;

    assert!(matches!(
        result,
        Err(DomainError::Cart(CartError::Stock(
            InventoryError::InsufficientStock { .. }
        )))
    ));
}

#[tokio::test]
async fn update_to_zero_removes_and_unbinds_store() {
    let fixture = Fixture::new();
    let apple = fixture.product(StoreId::new(), "Apple", 200, 10).await;
    let customer = UserId::new();
    fixture.carts.add_item(customer, apple, 3).await.unwrap();

    let cart = fixture.carts.update_item(customer, apple, 0).await.unwrap();

    assert!(cart.is_empty());
    assert_eq!(cart.store(), None);
    assert_eq!(cart.total(), Money::zero());
}

#[tokio::test]
async fn update_sets_quantity() {
    let fixture = Fixture::new();
    let apple = fixture.product(StoreId::new(), "Apple", 200, 10).await;
    let customer = UserId::new();
    fixture.carts.add_item(customer, apple, 3).await.unwrap();

    let cart = fixture.carts.update_item(customer, apple, 5).await.unwrap();

    assert_eq!(cart.items()[0].quantity, 5);
    assert_eq!(cart.total(), Money::from_cents(1000));
}

#[tokio::test]
async fn update_on_missing_cart_is_not_found() {
    let fixture = Fixture::new();
    let apple = fixture.product(StoreId::new(), "Apple", 200, 10).await;

    let result = fixture.carts.update_item(UserId::new(), apple, 1).await;
    assert!(matches!(result, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn clear_destroys_cart() {
    let fixture = Fixture::new();
    let apple = fixture.product(StoreId::new(), "Apple", 200, 10).await;
    let customer = UserId::new();
    fixture.carts.add_item(customer, apple, 1).await.unwrap();

    assert!(fixture.carts.clear(customer).await.unwrap());
    assert!(!fixture.carts.clear(customer).await.unwrap());
    assert!(fixture.carts.get_cart(customer).await.unwrap().is_empty());
}

#[tokio::test]
async fn discard_with_stale_version_keeps_cart() {
    let fixture = Fixture::new();
    let apple = fixture.product(StoreId::new(), "Apple", 200, 10).await;
    let customer = UserId::new();
    let read = fixture.carts.add_item(customer, apple, 1).await.unwrap();
    fixture.carts.add_item(customer, apple, 1).await.unwrap();

    assert!(!fixture.carts.discard(customer, read.version()).await.unwrap());

    let current = fixture.carts.get_cart(customer).await.unwrap();
    assert!(fixture.carts.discard(customer, current.version()).await.unwrap());
}
