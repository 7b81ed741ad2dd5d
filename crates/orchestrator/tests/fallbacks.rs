//! Degraded behaviour of the collaborator wrappers with their breakers forced open.

use std::sync::Arc;

use common::{CustomerId, ProductId};
use domain::{CustomerSnapshot, CustomerTier, Money, ProductSnapshot, ProductStatus};
use orchestrator::{
    ClientError, InMemoryCustomers, InMemoryInventory, ResilientCustomers, ResilientInventory,
    StockUpdateMode,
};
use resilience::{CircuitState, GuardConfig};

fn stocked_inventory() -> Arc<InMemoryInventory> {
    let inventory = Arc::new(InMemoryInventory::new());
    for id in [1, 2] {
        inventory.upsert(ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            sku: format!("SKU-{id}"),
            price: Money::from_cents(1000),
            stock_quantity: 5,
            status: ProductStatus::Active,
            available: true,
        });
    }
    inventory
}

fn known_customers() -> Arc<InMemoryCustomers> {
    let customers = Arc::new(InMemoryCustomers::new());
    customers.upsert(CustomerSnapshot {
        id: CustomerId::new(1),
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        full_name: "Alice Liddell".to_string(),
        tier: CustomerTier::Gold,
        loyalty_points: 100,
    });
    customers
}

#[tokio::test]
async fn test_inventory_fallbacks_when_open() {
    let fake = stocked_inventory();
    let inventory = ResilientInventory::new(Arc::clone(&fake), GuardConfig::default());
    inventory.guard().breaker().force_open();
    assert_eq!(inventory.state(), CircuitState::Open);

    let product = inventory.get_product(ProductId::new(1)).await.unwrap();
    assert_eq!(product.name, "Product Unavailable");
    assert_eq!(product.price, Money::zero());
    assert_eq!(product.stock_quantity, 0);
    assert_eq!(product.status, ProductStatus::Inactive);
    assert!(!product.available);

    let batch = inventory
        .get_products(&[ProductId::new(1), ProductId::new(2)])
        .await
        .unwrap();
    assert_eq!(
        batch,
        vec![
            ProductSnapshot::unavailable(ProductId::new(1)),
            ProductSnapshot::unavailable(ProductId::new(2)),
        ]
    );

    let availability = inventory
        .check_availability(&[(ProductId::new(1), 1), (ProductId::new(2), 1)])
        .await
        .unwrap();
    assert_eq!(availability.len(), 2);
    assert!(availability.values().all(|available| !available));

    let err = inventory
        .update_stock(ProductId::new(1), 1, StockUpdateMode::Reduce)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Unavailable(_)));

    // Nothing reached the service.
    assert_eq!(fake.availability_checks(), 0);
    assert!(fake.stock_updates().is_empty());
    assert_eq!(fake.stock(ProductId::new(1)), Some(5));
}

#[tokio::test]
async fn test_customer_fallbacks_when_open() {
    let fake = known_customers();
    let customers = ResilientCustomers::new(Arc::clone(&fake), GuardConfig::default());
    customers.guard().breaker().force_open();

    let customer = customers.get_customer(CustomerId::new(1)).await.unwrap();
    assert_eq!(customer.full_name, "Unknown User");
    assert_eq!(customer.email, "unknown@example.com");
    assert_eq!(customer.tier, CustomerTier::Bronze);
    assert_eq!(customer.loyalty_points, 0);

    customers
        .credit_loyalty_points(CustomerId::new(1), 50)
        .await
        .unwrap();
    assert!(fake.credits().is_empty());
    assert_eq!(fake.loyalty_points(CustomerId::new(1)), Some(100));
}

#[tokio::test]
async fn test_reset_restores_real_answers() {
    let fake = known_customers();
    let customers = ResilientCustomers::new(Arc::clone(&fake), GuardConfig::default());
    customers.guard().breaker().force_open();
    customers.guard().breaker().reset();

    let customer = customers.get_customer(CustomerId::new(1)).await.unwrap();
    assert_eq!(customer.full_name, "Alice Liddell");
    assert_eq!(customers.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_definitive_answers_bypass_fallbacks() {
    let customers = ResilientCustomers::new(known_customers(), GuardConfig::default());

    let err = customers.get_customer(CustomerId::new(2)).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::NotFound {
            entity: "customer",
            id: 2
        }
    );
}
