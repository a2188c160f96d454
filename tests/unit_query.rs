use boutique_orm::domain::{CustomerDetails, ProductOrder};
use boutique_orm::sql::TableRef;
use boutique_orm::{col, val, Expr, JoinType, Pageable, PlaceholderStyle, Query, RepoError, Sort, SqlValue};

const CUSTOMER_COLUMNS: &str = "e.id AS e_id, e.gender AS e_gender, e.phone AS e_phone, \
e.address_line_1 AS e_address_line_1, e.address_line_2 AS e_address_line_2, \
e.city AS e_city, e.country AS e_country";

fn customers(style: PlaceholderStyle) -> Query<CustomerDetails> {
    Query::new(TableRef::aliased("customer_details", "e"), style)
}

#[test]
fn expr_builds_and_params_order() {
    let e = col!("e.quantity")
        .gt(val!(3))
        .and(col!("e.status").eq(val!("PAID")));
    let mut ps = vec![];
    let sql = e.to_sql_with(PlaceholderStyle::AtP, &mut ps);
    assert_eq!(sql, "(e.quantity > @P1) AND (e.status = @P2)");
    assert_eq!(ps, vec![SqlValue::I32(3), SqlValue::Text("PAID".into())]);
}

#[test]
fn grouped_or_keeps_parentheses() {
    let e = col!("e.city")
        .eq(val!("Lyon"))
        .or(col!("e.city").eq(val!("Paris")))
        .group()
        .and(col!("e.country").eq(val!("FR")));
    let mut ps = vec![];
    let sql = e.to_sql_with(PlaceholderStyle::Dollar, &mut ps);
    assert_eq!(sql, "((e.city = $1) OR (e.city = $2)) AND (e.country = $3)");
    assert_eq!(ps.len(), 3);
}

#[test]
fn like_in_list_and_is_null() {
    let mut ps = vec![];
    let like = col!("e.phone").like("555-%").to_sql_with(PlaceholderStyle::Dollar, &mut ps);
    assert_eq!(like, "(e.phone LIKE $1)");

    let inl = col!("e.id")
        .in_list(vec![SqlValue::I64(1), SqlValue::I64(2)])
        .to_sql_with(PlaceholderStyle::Dollar, &mut ps);
    assert_eq!(inl, "e.id IN ($2, $3)");

    let null = col!("e.address_line_2").is_null().to_sql_with(PlaceholderStyle::Dollar, &mut ps);
    assert_eq!(null, "e.address_line_2 IS NULL");
    assert_eq!(ps.len(), 3);
}

#[test]
fn empty_in_list_matches_nothing() {
    let mut ps = vec![];
    let sql = col!("e.id").in_list(vec![]).to_sql_with(PlaceholderStyle::AtP, &mut ps);
    assert_eq!(sql, "(1 = 0)");
    assert!(ps.is_empty());
}

#[test]
fn select_lists_every_declared_column_with_prefix() {
    let (sql, params) = customers(PlaceholderStyle::Dollar).to_sql();
    assert_eq!(sql, format!("SELECT {CUSTOMER_COLUMNS} FROM customer_details e"));
    assert!(params.is_empty());
}

#[test]
fn join_and_where_build_for_pg() {
    let q = customers(PlaceholderStyle::Dollar)
        .Join(
            JoinType::Left,
            "shopping_cart c",
            col!("c.customer_details_id").eq(col!("e.id")),
        )
        .Where(col!("e.country").eq(val!("FR")))
        .Where(Expr::Col("e.city".into()).ne(val!("Lyon")))
        .OrderBy("e.id DESC")
        .Top(5);
    let (sql, params) = q.to_sql();
    assert_eq!(
        sql,
        format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer_details e \
             LEFT JOIN shopping_cart c ON (c.customer_details_id = e.id) \
             WHERE (e.country = $1) AND (e.city <> $2) ORDER BY e.id DESC LIMIT 5"
        )
    );
    assert_eq!(params.len(), 2);
}

#[test]
fn top_without_offset_uses_top_on_mssql() {
    let (sql, _) = customers(PlaceholderStyle::AtP).Top(1).to_sql();
    assert!(sql.starts_with("SELECT TOP(1) e.id AS e_id"));
    assert!(!sql.contains("FETCH NEXT"));
}

#[test]
fn paginate_pg_uses_limit_offset() {
    let page = Pageable::of(2, 2).sorted_by(Sort::asc("id"));
    let (sql, _) = customers(PlaceholderStyle::Dollar).Paginate(&page).unwrap().to_sql();
    assert!(sql.ends_with("FROM customer_details e ORDER BY e.id ASC LIMIT 2 OFFSET 4"));
}

#[test]
fn paginate_mssql_uses_offset_fetch() {
    let page = Pageable::of(2, 2).sorted_by(Sort::desc("city"));
    let (sql, _) = customers(PlaceholderStyle::AtP).Paginate(&page).unwrap().to_sql();
    assert!(sql.starts_with("SELECT e.id AS e_id"));
    assert!(sql.ends_with("ORDER BY e.city DESC OFFSET 4 ROWS FETCH NEXT 2 ROWS ONLY"));
}

#[test]
fn unsorted_mssql_page_still_has_an_order_by() {
    let (sql, _) = customers(PlaceholderStyle::AtP)
        .Paginate(&Pageable::of(0, 2))
        .unwrap()
        .to_sql();
    assert!(sql.ends_with("ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 2 ROWS ONLY"));
}

#[test]
fn sort_accepts_camel_case_property_names() {
    let page = Pageable::of(0, 10).sorted_by(Sort::desc("totalPrice"));
    let q = Query::<ProductOrder>::new(TableRef::aliased("product_order", "e"), PlaceholderStyle::Dollar)
        .Paginate(&page)
        .unwrap();
    assert!(q.to_sql().0.contains("ORDER BY e.total_price DESC LIMIT 10 OFFSET 0"));
}

#[test]
fn sort_on_unknown_field_is_rejected() {
    let page = Pageable::of(0, 10).sorted_by(Sort::asc("password"));
    let err = customers(PlaceholderStyle::Dollar).Paginate(&page).err().unwrap();
    assert!(matches!(
        err,
        RepoError::InvalidSort { table: "customer_details", ref field } if field == "password"
    ));
}

#[test]
fn association_is_not_sortable() {
    let page = Pageable::of(0, 10).sorted_by(Sort::asc("products"));
    let q = Query::<ProductOrder>::new(TableRef::aliased("product_order", "e"), PlaceholderStyle::Dollar);
    assert!(q.Paginate(&page).is_err());
}

#[test]
fn sort_parses_request_parameter() {
    assert_eq!(Sort::parse("id"), Some(Sort::asc("id")));
    assert_eq!(Sort::parse("city, DESC"), Some(Sort::desc("city")));
    assert_eq!(Sort::parse("city,sideways"), None);
    assert_eq!(Sort::parse(""), None);
}

#[test]
fn pageable_offset() {
    assert_eq!(Pageable::of(0, 20).offset(), 0);
    assert_eq!(Pageable::of(3, 20).offset(), 60);
}
