mod common;

use boutique_orm::domain::{
    CustomerDetails, CustomerDetailsPatch, Gender, ProductOrder, ProductOrderPatch,
};
use boutique_orm::{EntityService, GenericRepository, Pageable, Related, RepoError, Sort, SqlValue};
use common::{count_row, customer_row, key_row, linked_product_row, order_row, ScriptedExecutor};
use futures::TryStreamExt;
use std::sync::Arc;

fn service<T>(exec: ScriptedExecutor) -> (EntityService<T, ScriptedExecutor>, Arc<ScriptedExecutor>)
where
    T: boutique_orm::Entity + boutique_orm::Validatable + std::fmt::Debug,
{
    let exec = Arc::new(exec);
    (EntityService::new(GenericRepository::shared(exec.clone())), exec)
}

#[tokio::test]
async fn partial_update_overlays_only_present_fields() -> anyhow::Result<()> {
    common::init_tracing();
    let (svc, exec) = service::<CustomerDetails>(
        ScriptedExecutor::postgres()
            .rows(vec![customer_row("e", 7, "Lyon")])
            .rows(vec![key_row(7)]),
    );

    let patch: CustomerDetailsPatch = serde_json::from_str(r#"{"id": 7, "city": "Paris"}"#)?;
    let updated = svc.partial_update(patch).await?;

    assert_eq!(updated.id, Some(7));
    assert_eq!(updated.gender, Gender::Male);
    assert_eq!(updated.phone, "555-0100");
    assert_eq!(updated.city, "Paris");
    assert_eq!(updated.country, "FR");

    let calls = exec.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].0.starts_with("SELECT"));
    assert!(calls[1].0.starts_with("UPDATE customer_details SET"));
    assert_eq!(
        calls[1].1,
        vec![
            SqlValue::Text("MALE".into()),
            SqlValue::Text("555-0100".into()),
            SqlValue::Text("1 Place Bellecour".into()),
            SqlValue::Null,
            SqlValue::Text("Paris".into()),
            SqlValue::Text("FR".into()),
            SqlValue::I64(7),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn partial_update_of_missing_id_stops_before_persist() {
    let (svc, exec) = service::<CustomerDetails>(ScriptedExecutor::postgres().rows(vec![]));
    let patch = CustomerDetailsPatch {
        id: Some(70),
        city: Some("Paris".into()),
        ..Default::default()
    };
    let err = svc.partial_update(patch).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(exec.calls().len(), 1);
}

#[tokio::test]
async fn partial_update_without_id_is_rejected() {
    let (svc, exec) = service::<ProductOrder>(ScriptedExecutor::postgres());
    let err = svc
        .partial_update(ProductOrderPatch { quantity: Some(3), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
    assert!(exec.calls().is_empty());
}

#[tokio::test]
async fn partial_update_that_breaks_validation_is_not_persisted() {
    let (svc, exec) = service::<ProductOrder>(
        ScriptedExecutor::postgres().rows(vec![order_row("e", 4, "PAID")]),
    );
    let err = svc
        .partial_update(ProductOrderPatch { id: Some(4), quantity: Some(-1), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
    assert_eq!(exec.calls().len(), 1);
}

#[tokio::test]
async fn full_update_requires_an_id() {
    let (svc, _) = service::<CustomerDetails>(ScriptedExecutor::postgres());
    let details = CustomerDetails {
        id: None,
        gender: Gender::Female,
        phone: "555-0101".into(),
        address_line1: "2 Quai Saint-Antoine".into(),
        address_line2: None,
        city: "Lyon".into(),
        country: "FR".into(),
    };
    assert!(matches!(
        svc.update(details).await,
        Err(RepoError::ConstraintViolation(_))
    ));
}

#[tokio::test]
async fn find_page_counts_then_lists() -> anyhow::Result<()> {
    let (svc, exec) = service::<CustomerDetails>(
        ScriptedExecutor::postgres()
            .rows(vec![count_row(5)])
            .rows(vec![customer_row("e", 5, "Nice")]),
    );
    let page = svc
        .find_page(&Pageable::of(2, 2).sorted_by(Sort::asc("id")))
        .await?;

    assert_eq!(page.total, 5);
    assert_eq!(page.total_pages(), 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, Some(5));

    let statements = exec.statements();
    assert_eq!(statements[0], "SELECT COUNT(*) AS total FROM customer_details");
    assert!(statements[1].ends_with("ORDER BY e.id ASC LIMIT 2 OFFSET 4"));
    Ok(())
}

#[tokio::test]
async fn eager_find_one_never_returns_unloaded() -> anyhow::Result<()> {
    let (svc, _) = service::<ProductOrder>(
        ScriptedExecutor::postgres()
            .rows(vec![order_row("e", 3, "COMPLETED")])
            .rows(vec![linked_product_row(3, 10, "Mug")]),
    );
    let order = svc.find_one_with_eager_relationships(3).await?.expect("order");
    assert!(order.products.is_loaded());
    assert_eq!(order.products.ids(), Some(vec![10]));
    Ok(())
}

#[tokio::test]
async fn eager_find_all_logs_and_loads_every_order() -> anyhow::Result<()> {
    common::init_tracing();
    let (svc, exec) = service::<ProductOrder>(
        ScriptedExecutor::postgres()
            .rows(vec![order_row("e", 3, "PAID"), order_row("e", 4, "REFUNDED")])
            .rows(vec![linked_product_row(4, 10, "Mug")]),
    );
    let orders: Vec<ProductOrder> = svc
        .find_all_with_eager_relationships(None)
        .await?
        .try_collect()
        .await?;
    assert_eq!(orders[0].products, Related::Loaded(vec![]));
    assert_eq!(orders[1].products.ids(), Some(vec![10]));
    assert_eq!(exec.calls().len(), 2);
    Ok(())
}

#[tokio::test]
async fn eager_find_one_without_links_is_loaded_and_empty() -> anyhow::Result<()> {
    let (svc, _) = service::<ProductOrder>(
        ScriptedExecutor::postgres().rows(vec![order_row("e", 3, "CANCELLED")]),
    );
    let order = svc.find_one_with_eager_relationships(3).await?.expect("order");
    assert_eq!(order.products, Related::Loaded(vec![]));
    Ok(())
}

#[tokio::test]
async fn delete_of_absent_id_is_ok_and_find_stays_empty() -> anyhow::Result<()> {
    let (svc, _) = service::<CustomerDetails>(
        ScriptedExecutor::postgres().rows(vec![]).affected(0).rows(vec![]),
    );
    assert!(svc.find_one(404).await?.is_none());
    svc.delete(404).await?;
    assert!(svc.find_one(404).await?.is_none());
    Ok(())
}
