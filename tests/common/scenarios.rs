//! Storage scenarios shared by the PostgreSQL and SQL Server integration tests.
//!
//! Each scenario expects freshly created, empty tables.

use std::sync::Arc;

use anyhow::{ensure, Context};
use boutique_orm::domain::{
    CustomerDetails, CustomerDetailsPatch, Gender, OrderStatus, Product, ProductOrder,
    ShoppingCart,
};
use boutique_orm::{
    Crud, DatabaseRef, EagerRepository, EntityService, Executor, GenericRepository, Pageable,
    QueryExecutor, Related, RepoError, Sort, SqlValue,
};
use futures::TryStreamExt;
use rust_decimal::Decimal;

pub fn lyon_customer() -> CustomerDetails {
    CustomerDetails {
        id: None,
        gender: Gender::Male,
        phone: "555-0100".into(),
        address_line1: "1 Place Bellecour".into(),
        address_line2: None,
        city: "Lyon".into(),
        country: "FR".into(),
    }
}

pub async fn round_trip(db: Arc<DatabaseRef>) -> anyhow::Result<()> {
    let repo = GenericRepository::<CustomerDetails>::shared(db);
    let mut details = lyon_customer();
    details.address_line2 = Some("Batiment B".into());

    let saved = repo.save(details).await?;
    let id = saved.id.context("store assigned no id")?;
    let found = repo.find_by_id(id).await?.context("saved row not found")?;
    assert_eq!(found, saved);
    assert!(repo.exists_by_id(id).await?);
    Ok(())
}

pub async fn merge_patch(db: Arc<DatabaseRef>) -> anyhow::Result<()> {
    let service = EntityService::new(GenericRepository::<CustomerDetails>::shared(db));
    let saved = service.save(lyon_customer()).await?;
    let id = saved.id.context("store assigned no id")?;

    let patch = CustomerDetailsPatch {
        id: Some(id),
        city: Some("Paris".into()),
        ..Default::default()
    };
    service.partial_update(patch).await?;

    let fetched = service.find_one(id).await?.context("patched row not found")?;
    assert_eq!(fetched.gender, Gender::Male);
    assert_eq!(fetched.phone, "555-0100");
    assert_eq!(fetched.city, "Paris");
    assert_eq!(fetched.country, "FR");
    Ok(())
}

pub async fn update_of_missing_id(db: Arc<DatabaseRef>) -> anyhow::Result<()> {
    let repo = GenericRepository::<CustomerDetails>::shared(db);
    let mut ghost = lyon_customer();
    ghost.id = Some(987_654);
    let err = repo.save(ghost).await.err().context("update of a missing id succeeded")?;
    ensure!(err.is_not_found(), "unexpected error {err}");
    Ok(())
}

pub async fn delete_absent(db: Arc<DatabaseRef>) -> anyhow::Result<()> {
    let repo = GenericRepository::<CustomerDetails>::shared(db);
    assert!(repo.find_by_id(123_456).await?.is_none());
    repo.delete_by_id(123_456).await?;
    assert!(repo.find_by_id(123_456).await?.is_none());
    Ok(())
}

pub async fn pagination(db: Arc<DatabaseRef>) -> anyhow::Result<()> {
    let repo = GenericRepository::<ShoppingCart>::shared(db);
    let mut ids = Vec::new();
    for _ in 0..5 {
        let cart = repo.save(ShoppingCart::default()).await?;
        ids.push(cart.id.context("store assigned no id")?);
    }
    assert_eq!(repo.count().await?, 5);

    let first: Vec<_> = repo
        .find_all(Some(&Pageable::of(0, 2).sorted_by(Sort::asc("id"))))
        .await?
        .try_collect()
        .await?;
    assert_eq!(first.iter().map(|c| c.id).collect::<Vec<_>>(), vec![Some(ids[0]), Some(ids[1])]);

    let last: Vec<_> = repo
        .find_all(Some(&Pageable::of(2, 2).sorted_by(Sort::asc("id"))))
        .await?
        .try_collect()
        .await?;
    assert_eq!(last.iter().map(|c| c.id).collect::<Vec<_>>(), vec![Some(ids[4])]);
    Ok(())
}

pub async fn cart_lookups(db: Arc<DatabaseRef>) -> anyhow::Result<()> {
    let customers = GenericRepository::<CustomerDetails>::shared(db.clone());
    let carts = GenericRepository::<ShoppingCart>::shared(db);

    let owner = customers.save(lyon_customer()).await?.id;
    carts.save(ShoppingCart { id: None, customer_details_id: owner }).await?;
    carts.save(ShoppingCart::default()).await?;

    let owner = owner.context("store assigned no id")?;
    let owned: Vec<_> = carts.find_by_customer_details(owner).await?.try_collect().await?;
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].customer_details_id, Some(owner));

    let orphans: Vec<_> = carts.find_all_where_customer_details_is_null().await?.try_collect().await?;
    assert!(orphans.iter().all(|c| c.customer_details_id.is_none()));
    assert!(!orphans.is_empty());
    Ok(())
}

pub async fn eager_orders(db: Arc<DatabaseRef>) -> anyhow::Result<()> {
    let products = GenericRepository::<Product>::shared(db.clone());
    let orders = GenericRepository::<ProductOrder>::shared(db);

    let mug = products
        .save(Product { id: None, name: "Mug".into(), price: Decimal::new(1250, 2) })
        .await?;
    let teapot = products
        .save(Product { id: None, name: "Teapot".into(), price: Decimal::new(3490, 2) })
        .await?;
    let ids = vec![mug.id.context("no id")?, teapot.id.context("no id")?];

    let linked = orders
        .save(ProductOrder {
            id: None,
            quantity: 2,
            total_price: Decimal::new(4740, 2),
            status: OrderStatus::Paid,
            products: Related::Ids(ids.clone()),
        })
        .await?;
    orders
        .save(ProductOrder {
            id: None,
            quantity: 1,
            total_price: Decimal::ZERO,
            status: OrderStatus::Pending,
            products: Related::Unloaded,
        })
        .await?;

    let id = linked.id.context("no id")?;
    let one = orders
        .find_one_with_eager_relationships(id)
        .await?
        .context("order not found")?;
    assert_eq!(one.products.ids(), Some(ids));

    let all: Vec<_> = orders
        .find_all_with_eager_relationships(None)
        .await?
        .try_collect()
        .await?;
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|o| o.products.is_loaded()));

    orders.delete_by_id(id).await?;
    assert!(orders.find_by_id(id).await?.is_none());
    Ok(())
}

/// Stores an out-of-domain status behind the repository's back.
pub async fn corrupt_status(db: Arc<DatabaseRef>, insert_sql: &str) -> anyhow::Result<()> {
    db.execute(
        insert_sql,
        &[SqlValue::I32(1), SqlValue::Decimal(Decimal::ONE), SqlValue::Text("SHIPPED".into())],
    )
    .await?;

    let orders = GenericRepository::<ProductOrder>::shared(db);
    let results: Vec<_> = futures::StreamExt::collect(orders.find_all(None).await?).await;
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(RepoError::Decode { .. }))));
    Ok(())
}
