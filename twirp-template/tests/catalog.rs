//! End-to-end catalog tests over proto sources

use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use twirp_template::{
    CatalogBuilder, ImportSet, TemplateOptions, parse_catalog, parse_method_templates,
    parse_optional_fields, resolve, scan,
};

const ORDERS: &str = r#"
syntax = "proto3";
package shop.v1;

import "shop/v1/common.proto";
import "google/protobuf/timestamp.proto";

message Address {
  string street = 1;
  optional string unit = 2;
}

message CreateOrderRequest {
  string customer_id = 1;
  Address shipping = 2;
  Address billing = 3;
  repeated LineItem items = 4;
  Money total = 5;
  optional string coupon = 6;
  google.protobuf.Timestamp requested_at = 7;
  map<string, string> labels = 8;
}

message CreateOrderResponse {
  string order_id = 1;
}

service OrderService {
  // Places an order
  rpc CreateOrder(CreateOrderRequest) returns (CreateOrderResponse);
  rpc Ping(shop.v1.Money) returns (CreateOrderResponse);
}
"#;

const COMMON: &str = r#"
syntax = "proto3";
package shop.v1;

message Money {
  string currency_code = 1;
  int64 units = 2;
  optional int32 nanos = 3;
}

message LineItem {
  string sku = 1;
  uint32 quantity = 2;
}
"#;

fn imports() -> ImportSet {
    ImportSet::new().with("/repo/proto/shop/v1/common.proto", COMMON)
}

#[test]
fn test_order_service_templates() {
    let templates = parse_method_templates(ORDERS, &imports()).unwrap();
    assert_eq!(
        Value::Object(templates["CreateOrder"].clone()),
        json!({
            "customer_id": "",
            "shipping": {"street": "", "unit": ""},
            "billing": {"street": "", "unit": ""},
            "items": [],
            "total": {"currency_code": "", "units": 0, "nanos": 0},
            "coupon": "",
            "requested_at": "",
            "labels": {}
        })
    );
    assert_eq!(
        Value::Object(templates["Ping"].clone()),
        json!({"currency_code": "", "units": 0, "nanos": 0})
    );
}

#[test]
fn test_order_service_optional_fields() {
    let optional = parse_optional_fields(ORDERS, &imports()).unwrap();
    // Money comes from an import, so only its descriptor flag marks `nanos`
    assert_eq!(
        optional["CreateOrder"],
        ["shipping.unit", "billing.unit", "total.nanos", "coupon"]
    );
    assert_eq!(optional["Ping"], ["nanos"]);
}

#[test]
fn test_missing_import_degrades_to_empty_strings() {
    let templates = parse_method_templates(ORDERS, &ImportSet::new()).unwrap();
    let create = &templates["CreateOrder"];
    assert_eq!(create["total"], json!(""));
    assert_eq!(create["items"], json!([]));
    assert!(templates["Ping"].is_empty());
}

#[test]
fn test_parse_functions_agree_when_run_concurrently() {
    let imports = imports();
    let (templates, optional) = std::thread::scope(|scope| {
        let templates = scope.spawn(|| parse_method_templates(ORDERS, &imports));
        let optional = scope.spawn(|| parse_optional_fields(ORDERS, &imports));
        (
            templates.join().unwrap().unwrap(),
            optional.join().unwrap().unwrap(),
        )
    });
    assert_eq!(
        templates.keys().collect::<Vec<_>>(),
        optional.keys().collect::<Vec<_>>()
    );
    for (method, paths) in &optional {
        for path in paths {
            assert!(addresses_key(&templates[method], path), "{method}: {path}");
        }
    }
}

/// Whether the dotted `path` names a key at the right nesting depth
fn addresses_key(template: &Map<String, Value>, path: &str) -> bool {
    let mut current = template;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(value) = current.get(segment) else {
            return false;
        };
        if segments.peek().is_none() {
            return true;
        }
        match value {
            Value::Object(next) => current = next,
            _ => return false,
        }
    }
    false
}

/// Number of JSON objects in `value`, itself included
fn object_count(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(object_count).sum::<usize>(),
        _ => 0,
    }
}

/// A generated field: kind selector, message target, repeated, optional
type FieldSpec = (u8, usize, bool, bool);

const SCALARS: [&str; 6] = ["string", "int32", "bool", "double", "bytes", "uint64"];

const GENERATED_HEADER: &str = r#"syntax = "proto3";
package gen;

enum Shade {
  SHADE_DARK = 0;
  SHADE_LIGHT = 1;
}

"#;

/// Render a random schema as proto3 source, one service method per message
fn render(messages: &[Vec<FieldSpec>]) -> String {
    let mut source = String::from(GENERATED_HEADER);
    for (index, fields) in messages.iter().enumerate() {
        source.push_str(&format!("message M{index} {{\n"));
        for (number, (kind, target, repeated, optional)) in fields.iter().enumerate() {
            let ty = match *kind as usize {
                k if k < SCALARS.len() => SCALARS[k].to_string(),
                6 => "Shade".to_string(),
                7 => "Nowhere".to_string(),
                _ => format!("M{}", target % messages.len()),
            };
            let label = if *repeated {
                "repeated "
            } else if *optional {
                "optional "
            } else {
                ""
            };
            source.push_str(&format!("  {label}{ty} f{number} = {};\n", number + 1));
        }
        source.push_str("}\n\n");
    }
    source.push_str("service Gen {\n");
    for index in 0..messages.len() {
        let rpc = format!("  rpc Call{index}(M{index}) returns (M{index});\n");
        source.push_str(&rpc);
    }
    source.push_str("}\n");
    source
}

fn schema_strategy() -> impl Strategy<Value = Vec<Vec<FieldSpec>>> {
    let field = (0u8..10, 0usize..5, any::<bool>(), any::<bool>());
    prop::collection::vec(prop::collection::vec(field, 0..5), 1..5)
}

proptest! {
    #[test]
    fn prop_optional_paths_address_template_keys(messages in schema_strategy()) {
        let source = render(&messages);
        let options = TemplateOptions::default()
            .max_depth(4)
            .recursion_limit(2)
            .expansion_limit(40);
        let catalog = parse_catalog(&source, &ImportSet::new(), &options).unwrap();
        prop_assert_eq!(catalog.len(), messages.len());
        for (method, entry) in catalog.iter() {
            for path in &entry.optional_fields {
                prop_assert!(addresses_key(&entry.template, path), "{}: {}", method, path);
            }
        }
    }

    #[test]
    fn prop_cyclic_chains_stay_within_expansion_limit(k in 1usize..12, limit in 1usize..200) {
        let mut source = String::from("syntax = \"proto3\";\n");
        for i in 0..k {
            let next = (i + 1) % k;
            source.push_str(&format!("message M{i} {{\n  optional int32 n = 1;\n"));
            source.push_str(&format!("  M{next} left = 2;\n  M{next} right = 3;\n}}\n"));
        }
        source.push_str("service Chain { rpc Walk(M0) returns (M0); }\n");

        let options = TemplateOptions::default().expansion_limit(limit);
        let catalog = parse_catalog(&source, &ImportSet::new(), &options).unwrap();
        let entry = catalog.get("Walk").unwrap();
        let objects = object_count(&Value::Object(entry.template.clone()));
        prop_assert!(objects <= limit);
        // every expanded object carries exactly one optional field
        prop_assert_eq!(entry.optional_fields.len(), objects);
        for path in &entry.optional_fields {
            prop_assert!(addresses_key(&entry.template, path), "{}", path);
        }
    }

    #[test]
    fn prop_scanner_agrees_with_descriptors(messages in schema_strategy()) {
        let source = render(&messages);
        let schema = resolve(&source, &ImportSet::new()).unwrap();

        let scanned: BTreeSet<String> = scan(&source).iter().map(str::to_string).collect();
        let described: BTreeSet<String> = schema
            .messages()
            .flat_map(|(_, message)| {
                message
                    .fields
                    .iter()
                    .filter(|f| f.explicit_optional)
                    .map(move |f| format!("{}.{}", message.scoped_name, f.name))
            })
            .collect();
        prop_assert_eq!(scanned, described);
    }

    #[test]
    fn prop_catalog_is_deterministic(messages in schema_strategy()) {
        let source = render(&messages);
        let schema = resolve(&source, &ImportSet::new()).unwrap();
        let explicit = scan(&source);
        let options = TemplateOptions::default().max_depth(4).recursion_limit(2);
        let builder = CatalogBuilder::new(&schema, &explicit).options(options);
        prop_assert_eq!(builder.build(), builder.build());
    }
}
