//! Template generation orchestration
//!
//! Links every descriptor protoc sent into one schema, then writes one
//! catalog per service declared in the files to generate.

use heck::ToSnakeCase;
use prost::Message;
use prost_types::compiler::code_generator_response::File;
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use twirp_template::{CatalogBuilder, ExplicitOptionalPaths, ResolvedSchema};

use crate::error::PluginError;
use crate::params;

/// protoc feature bit for proto3 `optional` support
const FEATURE_PROTO3_OPTIONAL: u64 = 1;

/// Generate template catalogs from a CodeGeneratorRequest
pub fn generate(request: CodeGeneratorRequest) -> Result<CodeGeneratorResponse, PluginError> {
    let options = params::parse(request.parameter())?;
    let schema = ResolvedSchema::from_files(&request.proto_file);
    // Descriptors from protoc already carry the `optional` flag
    let explicit = ExplicitOptionalPaths::new();
    let builder = CatalogBuilder::new(&schema, &explicit).options(options);

    let mut files = Vec::new();
    for file_name in &request.file_to_generate {
        let file_descriptor = request
            .proto_file
            .iter()
            .find(|f| f.name() == file_name)
            .ok_or_else(|| PluginError::MissingFile(file_name.clone()))?;

        for svc in &file_descriptor.service {
            let catalog = builder.build_filtered(|service| {
                service.file == *file_name && service.name == svc.name()
            });
            tracing::info!(
                file = %file_name,
                service = %svc.name(),
                methods = catalog.len(),
                "generated templates"
            );
            files.push(File {
                name: Some(output_path(file_descriptor.package(), svc.name())),
                content: Some(format!("{}\n", serde_json::to_string_pretty(&catalog)?)),
                ..Default::default()
            });
        }
    }

    Ok(CodeGeneratorResponse {
        file: files,
        error: None,
        supported_features: Some(FEATURE_PROTO3_OPTIONAL),
    })
}

/// Decode a raw request and generate, reporting failures through the response
pub fn generate_from_bytes(bytes: &[u8]) -> CodeGeneratorResponse {
    let result = CodeGeneratorRequest::decode(bytes)
        .map_err(PluginError::from)
        .and_then(generate);
    result.unwrap_or_else(|err| {
        tracing::error!(error = %err, "template generation failed");
        CodeGeneratorResponse {
            error: Some(err.to_string()),
            supported_features: Some(FEATURE_PROTO3_OPTIONAL),
            ..Default::default()
        }
    })
}

/// `<package path>/<service>.templates.json`
fn output_path(package: &str, service: &str) -> String {
    let file = format!("{}.templates.json", service.to_snake_case());
    if package.is_empty() {
        file
    } else {
        format!("{}/{file}", package.replace('.', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, MethodDescriptorProto,
        OneofDescriptorProto, ServiceDescriptorProto,
    };
    use serde_json::{Value, json};

    fn field(name: &str, number: i32, ty: Type, type_name: Option<&str>) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(ty as i32),
            type_name: type_name.map(str::to_string),
            json_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn service(name: &str, method: &str, input: &str) -> ServiceDescriptorProto {
        ServiceDescriptorProto {
            name: Some(name.to_string()),
            method: vec![MethodDescriptorProto {
                name: Some(method.to_string()),
                input_type: Some(input.to_string()),
                output_type: Some(input.to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// Descriptors shaped the way protoc emits them: absolute type names and
    /// a synthetic oneof for each proto3 `optional` field
    fn orders_file() -> FileDescriptorProto {
        let mut count = field("count", 2, Type::Int32, None);
        count.proto3_optional = Some(true);
        count.oneof_index = Some(0);

        let mut items = field("items", 1, Type::Message, Some(".shop.v1.Item"));
        items.label = Some(Label::Repeated as i32);

        FileDescriptorProto {
            name: Some("shop/v1/orders.proto".to_string()),
            package: Some("shop.v1".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![
                DescriptorProto {
                    name: Some("Item".to_string()),
                    field: vec![field("sku", 1, Type::String, None), count],
                    oneof_decl: vec![OneofDescriptorProto {
                        name: Some("_count".to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("Order".to_string()),
                    field: vec![
                        items,
                        field("first", 2, Type::Message, Some(".shop.v1.Item")),
                    ],
                    ..Default::default()
                },
            ],
            service: vec![service("OrderService", "Place", ".shop.v1.Order")],
            ..Default::default()
        }
    }

    fn dependency_file() -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("shop/v1/admin.proto".to_string()),
            package: Some("shop.v1".to_string()),
            syntax: Some("proto3".to_string()),
            service: vec![service("AdminService", "Audit", ".shop.v1.Item")],
            ..Default::default()
        }
    }

    fn request(parameter: &str) -> CodeGeneratorRequest {
        CodeGeneratorRequest {
            file_to_generate: vec!["shop/v1/orders.proto".to_string()],
            parameter: Some(parameter.to_string()),
            proto_file: vec![dependency_file(), orders_file()],
            ..Default::default()
        }
    }

    #[test]
    fn test_one_file_per_service_to_generate() {
        let response = generate(request("")).unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.file.len(), 1);

        let file = &response.file[0];
        assert_eq!(file.name(), "shop/v1/order_service.templates.json");
        let catalog: Value = serde_json::from_str(file.content()).unwrap();
        assert_eq!(
            catalog["Place"]["template"],
            json!({"items": [], "first": {"sku": "", "count": 0}})
        );
        assert_eq!(catalog["Place"]["optional_fields"], json!(["first.count"]));
        assert_eq!(catalog["Place"]["service"], json!("shop.v1.OrderService"));
    }

    #[test]
    fn test_qualified_keys_parameter() {
        let response = generate(request("keys=qualified")).unwrap();
        let catalog: Value = serde_json::from_str(response.file[0].content()).unwrap();
        assert!(catalog.get("shop.v1.OrderService.Place").is_some());
    }

    #[test]
    fn test_recursion_parameters_reach_templates() {
        let graph = FileDescriptorProto {
            name: Some("graph.proto".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Node".to_string()),
                field: vec![field("next", 1, Type::Message, Some(".Node"))],
                ..Default::default()
            }],
            service: vec![service("Graph", "Walk", ".Node")],
            ..Default::default()
        };
        let template = |parameter: &str| {
            let request = CodeGeneratorRequest {
                file_to_generate: vec!["graph.proto".to_string()],
                parameter: Some(parameter.to_string()),
                proto_file: vec![graph.clone()],
                ..Default::default()
            };
            let response = generate(request).unwrap();
            assert_eq!(response.file[0].name(), "graph.templates.json");
            let catalog: Value = serde_json::from_str(response.file[0].content()).unwrap();
            catalog["Walk"]["template"].clone()
        };

        assert_eq!(template(""), json!({"next": {"next": {"next": ""}}}));
        assert_eq!(template("recursion_limit=1"), json!({"next": ""}));
        assert_eq!(
            template("recursion_limit=4"),
            json!({"next": {"next": {"next": {"next": ""}}}})
        );
        assert_eq!(
            template("recursion_limit=4,expansion_limit=2"),
            json!({"next": {"next": ""}})
        );
    }

    #[test]
    fn test_errors_are_reported_in_response() {
        let mut bytes = Vec::new();
        request("format=yaml").encode(&mut bytes).unwrap();
        let response = generate_from_bytes(&bytes);
        assert!(response.file.is_empty());
        assert!(response.error.unwrap().contains("format=yaml"));

        let response = generate_from_bytes(&[0xff, 0xff, 0xff]);
        assert!(response.error.is_some());
    }

    #[test]
    fn test_missing_file_to_generate() {
        let mut request = request("");
        request.file_to_generate.push("nowhere.proto".to_string());
        assert!(matches!(
            generate(request),
            Err(PluginError::MissingFile(name)) if name == "nowhere.proto"
        ));
    }

    #[test]
    fn test_output_path() {
        assert_eq!(output_path("", "Greeter"), "greeter.templates.json");
        assert_eq!(
            output_path("acme.billing.v2", "InvoiceAPI"),
            "acme/billing/v2/invoice_api.templates.json"
        );
    }
}
