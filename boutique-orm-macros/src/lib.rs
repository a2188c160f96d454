use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Lit, Meta, NestedMeta, Type};


#[proc_macro_derive(Entity, attributes(table, column, key, relation))]
pub fn entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    TokenStream::from(entity_impl(input))
}

#[derive(Default)]
struct ColumnRules {
    name: Option<String>,
    ignore: bool,
    required: bool,
    allow_empty: Option<bool>,
    max_length: Option<usize>,
    min_length: Option<usize>,
    regex: Option<String>,
    positive: bool,
    non_negative: bool,
    error_required: Option<String>,
    error_allow_empty: Option<String>,
    error_max_length: Option<String>,
    error_min_length: Option<String>,
    error_regex: Option<String>,
    error_positive: Option<String>,
    error_non_negative: Option<String>,
}

#[derive(Default)]
struct RelationAttr {
    join_table: String,
    owner_column: String,
    target_column: String,
}

fn lit_str(lit: &Lit) -> Option<String> {
    match lit {
        Lit::Str(s) => Some(s.value()),
        _ => None,
    }
}

fn lit_usize(lit: &Lit) -> Option<usize> {
    match lit {
        Lit::Int(i) => i.base10_parse().ok(),
        _ => None,
    }
}

fn lit_bool(lit: &Lit) -> Option<bool> {
    match lit {
        Lit::Bool(b) => Some(b.value),
        _ => None,
    }
}

/// Returns `T` when `ty` is `<wrapper><T>`.
fn unwrap_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(tp) = ty else { return None };
    if tp.qself.is_some() {
        return None;
    }
    let last = tp.path.segments.last()?;
    if last.ident != wrapper {
        return None;
    }
    match &last.arguments {
        syn::PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(syn::GenericArgument::Type(t)) => Some(t),
            _ => None,
        },
        _ => None,
    }
}

fn is_ident_type(ty: &Type, name: &str) -> bool {
    matches!(ty, Type::Path(tp) if tp.qself.is_none() && tp.path.is_ident(name))
}

fn parse_column(attr: &syn::Attribute, rules: &mut ColumnRules) -> Result<(), syn::Error> {
    let list = match attr.parse_meta()? {
        Meta::List(list) => list,
        Meta::Path(_) => return Ok(()),
        other => return Err(syn::Error::new_spanned(other, "expected #[column(...)]")),
    };
    for nested in list.nested.iter() {
        match nested {
            NestedMeta::Meta(Meta::NameValue(nv)) => {
                let key = nv.path.get_ident().map(|i| i.to_string()).unwrap_or_default();
                match key.as_str() {
                    "name" => rules.name = lit_str(&nv.lit),
                    "max_length" => rules.max_length = lit_usize(&nv.lit),
                    "min_length" => rules.min_length = lit_usize(&nv.lit),
                    "regex" => rules.regex = lit_str(&nv.lit),
                    "required" => rules.required = lit_bool(&nv.lit).unwrap_or(false),
                    "allow_empty" => rules.allow_empty = lit_bool(&nv.lit),
                    "ignore" => rules.ignore = lit_bool(&nv.lit).unwrap_or(false),
                    "error_required" => rules.error_required = lit_str(&nv.lit),
                    "error_allow_empty" => rules.error_allow_empty = lit_str(&nv.lit),
                    "error_max_length" => rules.error_max_length = lit_str(&nv.lit),
                    "error_min_length" => rules.error_min_length = lit_str(&nv.lit),
                    "error_regex" => rules.error_regex = lit_str(&nv.lit),
                    "error_positive" => rules.error_positive = lit_str(&nv.lit),
                    "error_non_negative" => rules.error_non_negative = lit_str(&nv.lit),
                    _ => return Err(syn::Error::new_spanned(&nv.path, "unknown column option")),
                }
            }
            NestedMeta::Meta(Meta::Path(p)) => {
                let key = p.get_ident().map(|i| i.to_string()).unwrap_or_default();
                match key.as_str() {
                    "required" => rules.required = true,
                    "allow_empty" => rules.allow_empty = Some(true),
                    "ignore" => rules.ignore = true,
                    "positive" => rules.positive = true,
                    "non_negative" => rules.non_negative = true,
                    _ => return Err(syn::Error::new_spanned(p, "unknown column option")),
                }
            }
            other => return Err(syn::Error::new_spanned(other, "unexpected column option")),
        }
    }
    Ok(())
}

fn parse_relation(attr: &syn::Attribute) -> Result<RelationAttr, syn::Error> {
    let mut relation = RelationAttr::default();
    if let Meta::List(list) = attr.parse_meta()? {
        for nested in list.nested.iter() {
            if let NestedMeta::Meta(Meta::NameValue(nv)) = nested {
                let value = lit_str(&nv.lit).unwrap_or_default();
                if nv.path.is_ident("join_table") {
                    relation.join_table = value;
                } else if nv.path.is_ident("owner_column") {
                    relation.owner_column = value;
                } else if nv.path.is_ident("target_column") {
                    relation.target_column = value;
                } else {
                    return Err(syn::Error::new_spanned(&nv.path, "unknown relation option"));
                }
            }
        }
    }
    if relation.join_table.is_empty()
        || relation.owner_column.is_empty()
        || relation.target_column.is_empty()
    {
        return Err(syn::Error::new_spanned(
            attr,
            "#[relation] needs join_table, owner_column and target_column",
        ));
    }
    Ok(relation)
}

fn push_error(custom: &Option<String>, default: String) -> proc_macro2::TokenStream {
    match custom {
        Some(msg) => quote! { errors.push(#msg.to_string()); },
        None => quote! { errors.push(#default.to_string()); },
    }
}

/// Checks applied to a present value bound as `value`.
fn value_checks(column: &str, rules: &ColumnRules, inner: &Type, is_string: bool) -> proc_macro2::TokenStream {
    let mut checks = Vec::new();
    if is_string {
        let allow_empty = rules.allow_empty.unwrap_or(!rules.required);
        if rules.required {
            let err = push_error(&rules.error_required, format!("{column} is required"));
            checks.push(quote! { if value.is_empty() { #err } });
        } else if !allow_empty {
            let err = push_error(&rules.error_allow_empty, format!("{column} cannot be empty"));
            checks.push(quote! { if value.is_empty() { #err } });
        }
        if let Some(max) = rules.max_length {
            let err = push_error(&rules.error_max_length, format!("{column} exceeds max length {max}"));
            checks.push(quote! { if value.chars().count() > #max { #err } });
        }
        if let Some(min) = rules.min_length {
            let err = push_error(&rules.error_min_length, format!("{column} below min length {min}"));
            checks.push(quote! { if value.chars().count() < #min { #err } });
        }
        if let Some(re) = &rules.regex {
            let err = push_error(&rules.error_regex, format!("{column} has invalid format"));
            checks.push(quote! {{
                static RE: ::std::sync::OnceLock<Option<::boutique_orm::__regex::Regex>> =
                    ::std::sync::OnceLock::new();
                let re = RE.get_or_init(|| ::boutique_orm::__regex::Regex::new(#re).ok());
                if let Some(re) = re {
                    if !re.is_match(value) { #err }
                }
            }});
        }
    }
    if rules.positive {
        let err = push_error(&rules.error_positive, format!("{column} must be greater than 0"));
        checks.push(quote! {{
            let zero: #inner = ::std::default::Default::default();
            if *value <= zero { #err }
        }});
    }
    if rules.non_negative {
        let err = push_error(&rules.error_non_negative, format!("{column} must not be negative"));
        checks.push(quote! {{
            let zero: #inner = ::std::default::Default::default();
            if *value < zero { #err }
        }});
    }
    quote! { #(#checks)* }
}

pub(crate) fn entity_impl(input: DeriveInput) -> proc_macro2::TokenStream {
    match expand(input) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error(),
    }
}

fn expand(input: DeriveInput) -> Result<proc_macro2::TokenStream, syn::Error> {
    let struct_name = input.ident.clone();

    let mut table_name = struct_name.to_string();
    for attr in &input.attrs {
        if attr.path.is_ident("table") {
            if let Meta::List(list) = attr.parse_meta()? {
                for nested in list.nested.iter() {
                    if let NestedMeta::Meta(Meta::NameValue(nv)) = nested {
                        if nv.path.is_ident("name") {
                            if let Some(s) = lit_str(&nv.lit) {
                                table_name = s;
                            }
                        }
                    }
                }
            }
        }
    }

    let fields = match input.data {
        Data::Struct(ds) => match ds.fields {
            Fields::Named(named) => named.named,
            _ => return Err(syn::Error::new_spanned(&struct_name, "Entity needs named fields")),
        },
        _ => return Err(syn::Error::new_spanned(&struct_name, "Entity can only be derived for structs")),
    };

    let mut columns = Vec::new();
    let mut from_row_fields = Vec::new();
    let mut values = Vec::new();
    let mut validate_stmts = Vec::new();
    let mut assoc_consts = Vec::new();
    let mut key: Option<(syn::Ident, String)> = None;
    let mut relation: Option<(syn::Ident, Type, RelationAttr)> = None;

    for field in fields {
        let Some(ident) = field.ident.clone() else { continue };
        let ty = field.ty.clone();

        if let Some(attr) = field.attrs.iter().find(|a| a.path.is_ident("relation")) {
            let target = unwrap_generic(&ty, "Related").cloned().ok_or_else(|| {
                syn::Error::new_spanned(&ty, "#[relation] fields must be Related<T>")
            })?;
            if relation.is_some() {
                return Err(syn::Error::new_spanned(&ident, "only one #[relation] is supported"));
            }
            relation = Some((ident.clone(), target, parse_relation(attr)?));
            from_row_fields.push(quote! { #ident: ::std::default::Default::default() });
            continue;
        }

        let mut rules = ColumnRules::default();
        let mut is_key = false;
        for attr in field.attrs.iter() {
            if attr.path.is_ident("column") {
                parse_column(attr, &mut rules)?;
            } else if attr.path.is_ident("key") {
                is_key = true;
                if let Ok(Meta::List(list)) = attr.parse_meta() {
                    for nested in list.nested.iter() {
                        if let NestedMeta::Meta(Meta::NameValue(nv)) = nested {
                            if nv.path.is_ident("name") {
                                rules.name = lit_str(&nv.lit);
                            }
                        }
                    }
                }
            }
        }

        if rules.ignore {
            from_row_fields.push(quote! { #ident: ::std::default::Default::default() });
            continue;
        }

        let col_name = rules.name.clone().unwrap_or_else(|| ident.to_string());
        let col_lit = syn::LitStr::new(&col_name, Span::call_site());
        let const_ident = format_ident!("{}", ident.to_string().to_uppercase());
        assoc_consts.push(quote! { pub const #const_ident: &'static str = #col_lit; });

        let nullable = unwrap_generic(&ty, "Option");
        let inner = nullable.cloned().unwrap_or_else(|| ty.clone());

        if is_key {
            if key.is_some() {
                return Err(syn::Error::new_spanned(&ident, "only one #[key] is supported"));
            }
            if !nullable.map(|t| is_ident_type(t, "i64")).unwrap_or(false) {
                return Err(syn::Error::new_spanned(&ty, "#[key] fields must be Option<i64>"));
            }
            key = Some((ident.clone(), col_name.clone()));
            columns.push(quote! {
                ::boutique_orm::mapping::ColumnMeta {
                    name: #col_lit,
                    kind: ::boutique_orm::convert::ColumnKind::I64,
                    nullable: false,
                    is_key: true,
                }
            });
            from_row_fields.push(quote! {
                #ident: {
                    let k = column(#col_lit);
                    Some(::boutique_orm::convert::required(
                        ::boutique_orm::convert::convert::<i64>(row, &k)?,
                        &k,
                    )?)
                }
            });
            continue;
        }

        if let Some(re) = &rules.regex {
            if let Err(e) = regex::Regex::new(re) {
                return Err(syn::Error::new_spanned(&ident, format!("invalid regex: {e}")));
            }
        }

        let is_nullable = nullable.is_some();
        columns.push(quote! {
            ::boutique_orm::mapping::ColumnMeta {
                name: #col_lit,
                kind: <#inner as ::boutique_orm::convert::FromSqlValue>::KIND,
                nullable: #is_nullable,
                is_key: false,
            }
        });

        if is_nullable {
            from_row_fields.push(quote! {
                #ident: {
                    let k = column(#col_lit);
                    ::boutique_orm::convert::convert::<#inner>(row, &k)?
                }
            });
        } else {
            from_row_fields.push(quote! {
                #ident: {
                    let k = column(#col_lit);
                    ::boutique_orm::convert::required(
                        ::boutique_orm::convert::convert::<#inner>(row, &k)?,
                        &k,
                    )?
                }
            });
        }

        values.push(quote! {
            ::boutique_orm::query::ToParam::to_param(::std::clone::Clone::clone(&self.#ident))
        });

        let checks = value_checks(&col_name, &rules, &inner, is_ident_type(&inner, "String"));
        if checks.is_empty() && !(is_nullable && rules.required) {
            continue;
        }
        if is_nullable {
            let missing = if rules.required {
                push_error(&rules.error_required, format!("{col_name} is required"))
            } else {
                quote! {}
            };
            validate_stmts.push(quote! {
                match &self.#ident {
                    None => { #missing }
                    Some(value) => { let _ = value; #checks }
                }
            });
        } else {
            validate_stmts.push(quote! {{
                let value = &self.#ident;
                #checks
            }});
        }
    }

    let (key_ident, key_col) = key.ok_or_else(|| {
        syn::Error::new_spanned(&struct_name, "Entity needs exactly one #[key] field of type Option<i64>")
    })?;
    let key_lit = syn::LitStr::new(&key_col, Span::call_site());
    let table_lit = syn::LitStr::new(&table_name, Span::call_site());

    let (relation_tokens, related_ids, has_relation) = match &relation {
        Some((ident, target, rel)) => {
            let rel_name = ident.to_string();
            let join_table = &rel.join_table;
            let owner_column = &rel.owner_column;
            let target_column = &rel.target_column;
            (
                quote! { Some(&#struct_name::__RELATION) },
                quote! {
                    fn related_ids(&self) -> Option<Vec<i64>> {
                        self.#ident.ids()
                    }
                },
                quote! {
                    impl #struct_name {
                        #[doc(hidden)]
                        const __RELATION: ::boutique_orm::mapping::RelationMeta =
                            ::boutique_orm::mapping::RelationMeta {
                                name: #rel_name,
                                join_table: #join_table,
                                owner_column: #owner_column,
                                target_column: #target_column,
                            };
                    }

                    impl ::boutique_orm::mapping::HasRelation for #struct_name {
                        type Target = #target;

                        fn relation() -> &'static ::boutique_orm::mapping::RelationMeta {
                            &#struct_name::__RELATION
                        }

                        fn related(&self) -> &::boutique_orm::mapping::Related<#target> {
                            &self.#ident
                        }

                        fn related_mut(&mut self) -> &mut ::boutique_orm::mapping::Related<#target> {
                            &mut self.#ident
                        }
                    }
                },
            )
        }
        None => (quote! { None }, quote! {}, quote! {}),
    };

    Ok(quote! {
        impl ::boutique_orm::mapping::Entity for #struct_name {
            fn table() -> &'static ::boutique_orm::mapping::TableMeta {
                static TABLE_META: ::boutique_orm::mapping::TableMeta = ::boutique_orm::mapping::TableMeta {
                    name: #table_lit,
                    key: #key_lit,
                    columns: &[#(#columns),*],
                    relation: #relation_tokens,
                };
                &TABLE_META
            }

            fn from_row(
                row: &dyn ::boutique_orm::convert::Row,
                prefix: &str,
            ) -> Result<Self, ::boutique_orm::RepoError> {
                let column = |name: &str| {
                    if prefix.is_empty() {
                        name.to_string()
                    } else {
                        format!("{}_{}", prefix, name)
                    }
                };
                Ok(Self { #(#from_row_fields),* })
            }

            fn id(&self) -> Option<i64> {
                self.#key_ident
            }

            fn set_id(&mut self, id: i64) {
                self.#key_ident = Some(id);
            }

            fn values(&self) -> Vec<::boutique_orm::query::SqlValue> {
                vec![#(#values),*]
            }

            #related_ids
        }

        impl ::boutique_orm::mapping::Validatable for #struct_name {
            fn validate(&self) -> Result<(), Vec<String>> {
                #[allow(unused_mut)]
                let mut errors: Vec<String> = Vec::new();
                #(#validate_stmts)*
                if errors.is_empty() { Ok(()) } else { Err(errors) }
            }
        }

        #has_relation

        impl #struct_name {
            pub const TABLE: &'static str = #table_lit;
            #(#assoc_consts)*
        }
    })
}
